//! Where the portal keeps its month overview and day detail fragments.
//!
//! Paths differ between deployments, so both resources are found by trying an
//! ordered list of candidate templates against the session's base directory.
//! A candidate is a structural hypothesis about the URL; transport retries
//! happen below this layer.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::calendar::YearMonth;
use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::session::Session;
use crate::transport::Transport;

const MONTH_START_PLACEHOLDER: &str = "{month_start}";

static RE_BEGIN_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"beginDate=(\d{4}-\d{2}-\d{2})").expect("invalid regex: beginDate")
});

static RE_EMPLOYEE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"allocatedEmployeeId=(\d+)").expect("invalid regex: allocatedEmployeeId")
});

static SEL_BEGIN_DATE_ATTR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-begin-date]").expect("invalid selector: data-begin-date")
});

/// Dates listed by one month overview, plus the subject id if it leaked into
/// the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthOverview {
    pub fragment_ref: String,
    pub dates: Vec<NaiveDate>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DayFragment {
    pub fragment_ref: String,
    pub html: String,
}

pub struct EndpointResolver<'a> {
    config: &'a PortalConfig,
    base_dir: Url,
}

impl<'a> EndpointResolver<'a> {
    pub fn new<T: Transport>(
        config: &'a PortalConfig,
        session: &Session<T>,
    ) -> Result<Self, PortalError> {
        let base_dir = base_dir(session.landing_url())?;
        tracing::debug!(base_dir = %base_dir, "resolved portal base directory");
        Ok(Self { config, base_dir })
    }

    /// Probes the month candidates in order; the first whose content lists
    /// dates of `month` wins.
    ///
    /// Unanchored candidates answer with the `current` month's grid, which
    /// may spill into the next month. Any other month only tries candidates
    /// carrying `{month_start}`.
    pub fn resolve_month<T: Transport>(
        &self,
        session: &Session<T>,
        month: YearMonth,
        current: YearMonth,
        nocache: i64,
    ) -> Result<MonthOverview, PortalError> {
        let month_start = month.first_day().to_string();
        let nocache = nocache.to_string();

        let candidates = self
            .config
            .month_candidates
            .iter()
            .filter(|template| {
                month == current || template.contains(MONTH_START_PLACEHOLDER)
            });
        for template in candidates {
            let fragment_ref = expand(
                template,
                &[("month_start", &month_start), ("nocache", &nocache)],
            );
            let Ok(url) = self.base_dir.join(&fragment_ref) else {
                tracing::debug!(candidate = %fragment_ref, "skipping unparsable month candidate");
                continue;
            };

            let page = match session.fetch_fragment(&url) {
                Ok(page) => page,
                Err(err) => {
                    tracing::debug!(candidate = %fragment_ref, %err, "month candidate failed");
                    continue;
                }
            };
            if !page.is_success() {
                tracing::debug!(candidate = %fragment_ref, status = page.status, "month candidate rejected");
                continue;
            }

            let (dates, employee_id) = parse_month_overview(&page.text, month);
            if dates.is_empty() {
                tracing::debug!(candidate = %fragment_ref, %month, "month candidate has no dates for month");
                continue;
            }

            tracing::info!(candidate = %fragment_ref, %month, days = dates.len(), "month overview resolved");
            return Ok(MonthOverview {
                fragment_ref,
                dates,
                employee_id,
            });
        }

        Err(PortalError::NoMonthData { month })
    }

    /// Fetches one day's detail from the first candidate that answers with
    /// a non-empty 2xx body.
    pub fn fetch_day<T: Transport>(
        &self,
        session: &Session<T>,
        date: NaiveDate,
        employee_id: Option<&str>,
    ) -> Result<DayFragment, PortalError> {
        let date_str = date.to_string();
        let employee_query = employee_id
            .map(|id| format!("&allocatedEmployeeId={id}"))
            .unwrap_or_default();

        let mut last = String::from("no candidates configured");
        for template in &self.config.day_candidates {
            let fragment_ref = expand(
                template,
                &[("date", &date_str), ("employee_query", &employee_query)],
            );
            let url = match self.base_dir.join(&fragment_ref) {
                Ok(url) => url,
                Err(err) => {
                    last = format!("{fragment_ref}: {err}");
                    continue;
                }
            };

            match session.fetch_fragment(&url) {
                Ok(page) if page.is_success() && !page.text.trim().is_empty() => {
                    return Ok(DayFragment {
                        fragment_ref,
                        html: page.text,
                    });
                }
                Ok(page) => last = format!("{fragment_ref}: status {}", page.status),
                Err(err) => last = format!("{fragment_ref}: {err}"),
            }
            tracing::debug!(%date, candidate = %fragment_ref, "day candidate failed");
        }

        Err(PortalError::DayFetch {
            date,
            attempts: self.config.day_candidates.len(),
            last,
        })
    }
}

/// Directory of the landing page: its URL minus the last path segment.
pub fn base_dir(landing: &Url) -> Result<Url, PortalError> {
    if landing.cannot_be_a_base() {
        return Err(PortalError::BaseDirectory(landing.to_string()));
    }

    let mut dir = landing.clone();
    dir.set_query(None);
    dir.set_fragment(None);
    let path = landing.path();
    let trimmed = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    dir.set_path(trimmed);
    Ok(dir)
}

/// Dates of `month` referenced by an overview fragment (sorted, unique) and
/// the first employee id found.
pub fn parse_month_overview(html: &str, month: YearMonth) -> (Vec<NaiveDate>, Option<String>) {
    let mut found = BTreeSet::new();

    for caps in RE_BEGIN_DATE.captures_iter(html) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            found.insert(date);
        }
    }

    let doc = Html::parse_document(html);
    for element in doc.select(&SEL_BEGIN_DATE_ATTR) {
        let Some(value) = element.value().attr("data-begin-date") else {
            continue;
        };
        if let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
            found.insert(date);
        }
    }

    let dates = found
        .into_iter()
        .filter(|date| month.contains(*date))
        .collect();
    let employee_id = RE_EMPLOYEE_ID
        .captures(html)
        .map(|caps| caps[1].to_owned());

    (dates, employee_id)
}

/// Substitutes `{name}` placeholders; unknown placeholders are left as-is.
pub fn expand(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
