use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::status::DayStatus;

/// One calendar day of duty, as extracted from the portal's day detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub shift_code: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub overnight: bool,
    pub origin_from: Option<String>,
    pub origin_to: Option<String>,
    pub train_or_trip_id: Option<String>,
    pub source_fragment_ref: String,
    pub content_fingerprint: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthBundle {
    pub year_month: String,
    pub employee_id: Option<String>,
    pub generated_at: DateTime<FixedOffset>,
    pub source: String,
    pub days: Vec<DayRecord>,
}

pub fn content_fingerprint(raw: &str) -> String {
    use sha2::Digest as _;
    let digest = sha2::Sha256::digest(raw.as_bytes());
    format!("sha256:{}", hex::encode(digest))
}
