use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    turnos::logging::init().context("init logging")?;

    let cli = turnos::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        turnos::cli::Command::Fetch(args) => {
            turnos::fetch::run(args).context("fetch")?;
        }
        turnos::cli::Command::Parse(args) => {
            turnos::extract::run(args).context("parse")?;
        }
    }

    Ok(())
}
