use std::sync::LazyLock;

use regex::Regex;

static RE_HHMM_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{1,2})\s*$").expect("invalid regex: exact hh:mm")
});

static RE_HHMM_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2}):(\d{1,2})\b").expect("invalid regex: hh:mm token")
});

/// Normalizes a free-text time such as `8:5` or ` 16:30 ` into `HH:MM`.
///
/// Returns `None` for anything that is not exactly one in-range time.
pub fn normalize(text: &str) -> Option<String> {
    let caps = RE_HHMM_EXACT.captures(text)?;
    canonical(&caps[1], &caps[2])
}

/// Every valid time token in `text`, in order of appearance, already normalized.
pub fn time_tokens(text: &str) -> Vec<String> {
    RE_HHMM_TOKEN
        .captures_iter(text)
        .filter_map(|caps| canonical(&caps[1], &caps[2]))
        .collect()
}

/// True when the shift ends earlier on the clock than it starts.
pub fn overnight(start: Option<&str>, end: Option<&str>) -> bool {
    let (Some(start), Some(end)) = (start, end) else {
        return false;
    };
    match (minutes(start), minutes(end)) {
        (Some(start), Some(end)) => end < start,
        _ => false,
    }
}

fn minutes(hhmm: &str) -> Option<u32> {
    let (hours, mins) = hhmm.split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let mins: u32 = mins.parse().ok()?;
    Some(hours * 60 + mins)
}

fn canonical(hours: &str, mins: &str) -> Option<String> {
    let hours: u32 = hours.parse().ok()?;
    let mins: u32 = mins.parse().ok()?;
    if hours < 24 && mins < 60 {
        Some(format!("{hours:02}:{mins:02}"))
    } else {
        None
    }
}
