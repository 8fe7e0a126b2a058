use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike};

use crate::cli::OutputFormat;
use crate::formats::{DayRecord, MonthBundle};
use crate::status::DayStatus;

pub const NO_DATA_MARKER: &str = "NO_DATA.txt";

/// Writes `bundle` into `dir` in the requested format(s), replacing files from
/// earlier runs. Returns the written paths.
pub fn write_bundle(
    dir: &Path,
    bundle: &MonthBundle,
    format: OutputFormat,
    timezone: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        let path = dir.join(format!("turnos_{}.json", bundle.year_month));
        let mut json = serde_json::to_string_pretty(bundle).context("serialize month bundle")?;
        json.push('\n');
        std::fs::write(&path, json)
            .with_context(|| format!("write bundle: {}", path.display()))?;
        written.push(path);
    }

    if matches!(format, OutputFormat::Ics | OutputFormat::Both) {
        let path = dir.join(format!("turnos_{}.ics", bundle.year_month));
        std::fs::write(&path, render_ics(bundle, timezone))
            .with_context(|| format!("write calendar: {}", path.display()))?;
        written.push(path);
    }

    for path in &written {
        tracing::info!(path = %path.display(), days = bundle.days.len(), "saved");
    }
    Ok(written)
}

/// Leaves a note in `dir` for runs that produced no records at all.
pub fn write_no_data_marker(dir: &Path, detail: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(NO_DATA_MARKER);
    std::fs::write(&path, format!("{detail}\n"))
        .with_context(|| format!("write marker: {}", path.display()))?;
    Ok(path)
}

/// iCalendar text for a bundle: timed events for service days, all-day
/// events for rest days. `LIBRE` days are left out.
///
/// Times are floating local times; `timezone` is only advertised through
/// `X-WR-TIMEZONE`, so no `TZID` needs a matching `VTIMEZONE`.
pub fn render_ics(bundle: &MonthBundle, timezone: &str) -> String {
    let stamp = bundle.generated_at.with_timezone(&Utc);

    let mut calendar = Calendar::new();
    calendar
        .name(&format!("Turnos {}", bundle.year_month))
        .timezone(timezone);
    for day in &bundle.days {
        if let Some(event) = day_event(day, stamp) {
            calendar.push(event);
        }
    }
    calendar.done().to_string()
}

fn day_event(day: &DayRecord, stamp: DateTime<Utc>) -> Option<Event> {
    let mut event = Event::new();
    event.uid(&format!("{}@turnos", day.date)).timestamp(stamp);

    match (day.status, day.start.as_deref(), day.end.as_deref()) {
        (DayStatus::Servicio, Some(start), Some(end)) => {
            let end_date = if day.overnight {
                day.date.succ_opt()?
            } else {
                day.date
            };
            event
                .starts(CalendarDateTime::Floating(local_time(day.date, start)?))
                .ends(CalendarDateTime::Floating(local_time(end_date, end)?))
                .summary(&summary(day))
                .description(&description(day));
            if let Some(location) = location(day) {
                event.location(&location);
            }
        }
        (status, _, _) if status.is_rest() => {
            event
                .starts(day.date)
                .ends(day.date.succ_opt()?)
                .summary(status.as_str())
                .add_property("TRANSP", "TRANSPARENT");
        }
        _ => return None,
    }
    Some(event.done())
}

fn summary(day: &DayRecord) -> String {
    match (&day.shift_code, &day.train_or_trip_id) {
        (Some(code), Some(train)) => format!("{code} - Tren {train}"),
        (Some(code), None) => code.clone(),
        (None, Some(train)) => format!("Turno - Tren {train}"),
        (None, None) => "Turno".to_owned(),
    }
}

fn location(day: &DayRecord) -> Option<String> {
    match (&day.origin_from, &day.origin_to) {
        (Some(from), Some(to)) if from != to => Some(format!("{from} → {to}")),
        (Some(place), _) | (None, Some(place)) => Some(place.clone()),
        (None, None) => None,
    }
}

fn description(day: &DayRecord) -> String {
    let mut parts = vec![format!("Estado: {}", day.status)];
    if let Some(code) = &day.shift_code {
        parts.push(format!("Tipo: {code}"));
    }
    if let Some(train) = &day.train_or_trip_id {
        parts.push(format!("Tren: {train}"));
    }
    parts.extend(day.notes.iter().cloned());
    parts.join("\n")
}

fn local_time(date: NaiveDate, hhmm: &str) -> Option<NaiveDateTime> {
    let time = NaiveTime::parse_from_str(hhmm, "%H:%M").ok()?;
    Some(date.and_time(time))
}
