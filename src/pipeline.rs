//! One run: log in, walk the requested months day by day, aggregate.
//!
//! Only login and base-directory resolution can end a run early. Everything
//! after that is per month or per day: a month without an overview is read
//! date by date, and a day that cannot be fetched is skipped.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar::{self, Clock, YearMonth};
use crate::config::{Credentials, PortalConfig};
use crate::endpoints::EndpointResolver;
use crate::error::PortalError;
use crate::extract::extract_day;
use crate::formats::{DayRecord, MonthBundle};
use crate::session::{self, Session};
use crate::status::DayStatus;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Authenticated,
    MonthResolved,
    DaysExtracted,
    Aggregated,
    Done,
    Failed,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, Authenticated)
                | (Init, Failed)
                | (Authenticated, MonthResolved)
                | (Authenticated, Failed)
                | (MonthResolved, DaysExtracted)
                | (DaysExtracted, MonthResolved)
                | (DaysExtracted, Aggregated)
                | (Aggregated, Done)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug)]
pub enum DayOutcome {
    Extracted(DayRecord),
    Skipped(SkippedDay),
}

#[derive(Debug)]
pub struct RunReport {
    pub bundles: Vec<MonthBundle>,
    pub skipped: Vec<SkippedDay>,
    pub synthetic_months: Vec<YearMonth>,
}

impl RunReport {
    pub fn record_count(&self) -> usize {
        self.bundles.iter().map(|bundle| bundle.days.len()).sum()
    }
}

struct Tracker {
    state: RunState,
}

impl Tracker {
    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid run transition {:?} -> {next:?}",
            self.state
        );
        tracing::debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    fn fail(&mut self, err: PortalError) -> PortalError {
        self.advance(RunState::Failed);
        err
    }
}

pub fn run<T: Transport>(
    transport: T,
    config: &PortalConfig,
    credentials: &Credentials,
    clock: &dyn Clock,
) -> Result<RunReport, PortalError> {
    let mut tracker = Tracker {
        state: RunState::Init,
    };

    tracing::info!(portal = %config.base_url, "logging in");
    let session =
        session::acquire(transport, config, credentials).map_err(|err| tracker.fail(err))?;
    tracker.advance(RunState::Authenticated);

    let resolver = EndpointResolver::new(config, &session).map_err(|err| tracker.fail(err))?;

    let mut by_month: BTreeMap<YearMonth, Vec<DayRecord>> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut synthetic_months = Vec::new();
    let mut employee_id: Option<String> = None;

    let current = YearMonth::of(clock.today());
    for month in calendar::months_from(clock.today(), config.months) {
        let nocache = clock.now().timestamp_millis();
        let dates = match resolver.resolve_month(&session, month, current, nocache) {
            Ok(overview) => {
                if employee_id.is_none() {
                    employee_id = overview.employee_id;
                }
                overview.dates
            }
            Err(err) => {
                tracing::warn!(%month, %err, "month overview unavailable; trying every date of the month");
                synthetic_months.push(month);
                month.days()
            }
        };
        tracker.advance(RunState::MonthResolved);

        for date in dates {
            match extract_one(&resolver, &session, date, employee_id.as_deref()) {
                DayOutcome::Extracted(record) => {
                    log_day(&record);
                    if !config.include_rest_days && record.status.is_rest() {
                        tracing::debug!(%date, status = %record.status, "rest day left out");
                        continue;
                    }
                    by_month.entry(month).or_default().push(record);
                }
                DayOutcome::Skipped(day) => {
                    tracing::warn!(date = %day.date, reason = %day.reason, "could not read day");
                    skipped.push(day);
                }
            }
        }
        tracker.advance(RunState::DaysExtracted);
    }

    let generated_at = clock.now();
    let source = config.source_label();
    let bundles = by_month
        .into_iter()
        .map(|(month, mut days)| {
            days.sort_by_key(|day| day.date);
            MonthBundle {
                year_month: month.to_string(),
                employee_id: employee_id.clone(),
                generated_at,
                source: source.clone(),
                days,
            }
        })
        .collect();
    tracker.advance(RunState::Aggregated);

    let report = RunReport {
        bundles,
        skipped,
        synthetic_months,
    };
    tracker.advance(RunState::Done);
    tracing::info!(
        records = report.record_count(),
        skipped = report.skipped.len(),
        "run finished"
    );
    Ok(report)
}

fn extract_one<T: Transport>(
    resolver: &EndpointResolver<'_>,
    session: &Session<T>,
    date: NaiveDate,
    employee_id: Option<&str>,
) -> DayOutcome {
    match resolver.fetch_day(session, date, employee_id) {
        Ok(fragment) => DayOutcome::Extracted(extract_day(
            date,
            &fragment.html,
            &fragment.fragment_ref,
        )),
        Err(err) => DayOutcome::Skipped(SkippedDay {
            date,
            reason: err.to_string(),
        }),
    }
}

fn log_day(record: &DayRecord) {
    if record.status == DayStatus::Servicio {
        tracing::info!(
            date = %record.date,
            status = %record.status,
            start = record.start.as_deref().unwrap_or_default(),
            end = record.end.as_deref().unwrap_or_default(),
            code = record.shift_code.as_deref().unwrap_or_default(),
            from = record.origin_from.as_deref().unwrap_or_default(),
            to = record.origin_to.as_deref().unwrap_or_default(),
            "day read"
        );
    } else {
        tracing::info!(date = %record.date, status = %record.status, "day read");
    }
}
