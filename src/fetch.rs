use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::calendar::SystemClock;
use crate::cli::FetchArgs;
use crate::config::{Credentials, HttpConfig, PortalConfig};
use crate::transport::{HttpTransport, RetryPolicy};

pub fn run(args: FetchArgs) -> anyhow::Result<()> {
    // Checked before anything touches the network.
    let credentials =
        Credentials::new(args.user.clone(), args.password.clone()).context("read credentials")?;
    let config = portal_config(&args)?;

    let out_dir = PathBuf::from(&args.out);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir: {}", out_dir.display()))?;

    let transport = HttpTransport::new(&config.http).context("build http client")?;
    let report = crate::pipeline::run(transport, &config, &credentials, &SystemClock)
        .context("read duty schedule")?;

    for month in &report.synthetic_months {
        tracing::info!(%month, "month read date by date (no overview)");
    }

    if report.bundles.is_empty() {
        let marker = crate::export::write_no_data_marker(
            &out_dir,
            "No duty days could be read. Check credentials, portal paths and candidates.",
        )?;
        tracing::warn!(marker = %marker.display(), "no records; wrote marker");
        return Ok(());
    }

    for bundle in &report.bundles {
        crate::export::write_bundle(&out_dir, bundle, args.format, &args.timezone)
            .with_context(|| format!("write bundle {}", bundle.year_month))?;
    }

    Ok(())
}

fn portal_config(args: &FetchArgs) -> anyhow::Result<PortalConfig> {
    let base_url = Url::parse(&args.base_url).context("parse --base-url")?;
    if base_url.scheme() != "http" && base_url.scheme() != "https" {
        anyhow::bail!("--base-url must be http/https: {base_url}");
    }

    let mut config = PortalConfig::new(base_url);
    config.months = args.months.max(1);
    config.include_rest_days = !args.skip_rest_days;
    if !args.month_candidates.is_empty() {
        config.month_candidates = args.month_candidates.clone();
    }
    if !args.day_candidates.is_empty() {
        config.day_candidates = args.day_candidates.clone();
    }
    config.http = HttpConfig {
        timeout: Duration::from_secs(args.timeout_secs.max(1)),
        retry: RetryPolicy {
            attempts: args.retries.max(1),
            backoff: Duration::from_millis(args.backoff_ms),
        },
        ..HttpConfig::default()
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;
    use crate::cli::{Cli, Command};

    fn fetch_args(extra: &[&str]) -> FetchArgs {
        let mut argv = vec!["turnos", "fetch"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Fetch(args) => args,
            Command::Parse(_) => panic!("expected fetch"),
        }
    }

    #[test]
    fn candidates_from_flags_replace_defaults() -> anyhow::Result<()> {
        let args = fetch_args(&[
            "--base-url",
            "https://portal.test",
            "--month-candidate",
            "month?x=1",
            "--day-candidate",
            "day?d={date}",
            "--skip-rest-days",
            "--retries",
            "5",
            "--backoff-ms",
            "10",
        ]);

        let config = portal_config(&args)?;

        assert_eq!(config.month_candidates, vec!["month?x=1"]);
        assert_eq!(config.day_candidates, vec!["day?d={date}"]);
        assert!(!config.include_rest_days);
        assert_eq!(config.http.retry.attempts, 5);
        assert_eq!(config.http.retry.backoff, Duration::from_millis(10));
        Ok(())
    }

    #[test]
    fn rejects_non_http_base_url() {
        let args = fetch_args(&["--base-url", "ftp://portal.test"]);
        assert!(portal_config(&args).is_err());
    }
}
