use std::io::IsTerminal as _;

use anyhow::Context as _;

/// Our own events at `info`; HTTP stack chatter only when it warns.
pub const DEFAULT_DIRECTIVES: &str = "warn,turnos=info";

/// Installs the stderr subscriber. `RUST_LOG` replaces [`DEFAULT_DIRECTIVES`].
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_DIRECTIVES))
        .context("build log filter")?;

    let stderr = std::io::stderr();
    let ansi = stderr.is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize log subscriber: {err}"))?;

    Ok(())
}
