use chrono::NaiveDate;

use crate::calendar::YearMonth;

/// Failures of a single HTTP exchange, reported after retries are exhausted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{method} {url}: {message}")]
    Request {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{method} {url}: server error {status}")]
    ServerStatus {
        method: &'static str,
        url: String,
        status: u16,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("cannot derive base directory from landing url {0}")]
    BaseDirectory(String),

    #[error("no month overview data for {month}")]
    NoMonthData { month: YearMonth },

    #[error("day {date}: all {attempts} candidate urls failed (last: {last})")]
    DayFetch {
        date: NaiveDate,
        attempts: usize,
        last: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
