use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_LD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLD\b").expect("invalid regex: LD marker"));

static RE_DESCANSO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDESCANSO\b").expect("invalid regex: DESCANSO marker"));

static RE_I: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bI\b").expect("invalid regex: I marker"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayStatus {
    Servicio,
    Descanso,
    Ld,
    I,
    Libre,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Servicio => "SERVICIO",
            DayStatus::Descanso => "DESCANSO",
            DayStatus::Ld => "LD",
            DayStatus::I => "I",
            DayStatus::Libre => "LIBRE",
        }
    }

    /// Rest and leave markers. `LIBRE` is unresolved, not rest.
    pub fn is_rest(self) -> bool {
        matches!(self, DayStatus::Descanso | DayStatus::Ld | DayStatus::I)
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a day from the labels collected while parsing it.
///
/// Rest markers win over times; the single-letter `I` marker only counts
/// when the page did not yield both shift bounds.
pub fn classify<S: AsRef<str>>(labels: &[S], has_both_times: bool) -> DayStatus {
    let joined = labels
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");

    if RE_LD.is_match(&joined) {
        DayStatus::Ld
    } else if RE_DESCANSO.is_match(&joined) {
        DayStatus::Descanso
    } else if !has_both_times && RE_I.is_match(&joined) {
        DayStatus::I
    } else if has_both_times {
        DayStatus::Servicio
    } else {
        DayStatus::Libre
    }
}
