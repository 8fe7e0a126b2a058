use std::fmt;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in, read the duty months and write one bundle per month.
    Fetch(FetchArgs),
    /// Parse a saved day detail fragment and print the record as JSON.
    Parse(ParseArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Ics,
    Both,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Portal origin.
    #[arg(long, env = "IVU_BASE_URL", default_value = crate::config::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Portal identity.
    #[arg(long, env = "IVU_USER", hide_env_values = true)]
    pub user: Option<String>,

    /// Portal passphrase.
    #[arg(long, env = "IVU_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Output directory for monthly bundles.
    #[arg(long, env = "TURNOS_DATA_DIR", default_value = "./data")]
    pub out: String,

    /// Months to read, starting with the current one.
    #[arg(long, env = "MESES_A_LEER", default_value_t = 1)]
    pub months: u32,

    /// Per-request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Attempts per request on transport failures and 5xx answers.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Backoff base; the n-th retry waits n times this long.
    #[arg(long, default_value_t = 1200)]
    pub backoff_ms: u64,

    /// Leave DESCANSO/LD/I days out of the output.
    #[arg(long)]
    pub skip_rest_days: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Timezone advertised by calendar files (`X-WR-TIMEZONE`).
    #[arg(long, env = "TURNOS_TZ", default_value = "Europe/Madrid")]
    pub timezone: String,

    /// Month overview candidate (repeatable; replaces the built-in list).
    #[arg(long = "month-candidate")]
    pub month_candidates: Vec<String>,

    /// Day detail candidate (repeatable; replaces the built-in list).
    #[arg(long = "day-candidate")]
    pub day_candidates: Vec<String>,
}

// Written by hand so `--password` never reaches the debug log.
impl fmt::Debug for FetchArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchArgs")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("out", &self.out)
            .field("months", &self.months)
            .field("timeout_secs", &self.timeout_secs)
            .field("retries", &self.retries)
            .field("backoff_ms", &self.backoff_ms)
            .field("skip_rest_days", &self.skip_rest_days)
            .field("format", &self.format)
            .field("timezone", &self.timezone)
            .field("month_candidates", &self.month_candidates)
            .field("day_candidates", &self.day_candidates)
            .finish()
    }
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Calendar date of the fragment (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,

    /// Path to the saved day detail HTML.
    #[arg(long)]
    pub html: String,

    /// Fragment reference to record (default: the file path).
    #[arg(long)]
    pub href: Option<String>,
}
