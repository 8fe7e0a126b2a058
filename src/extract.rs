//! Day detail markup → [`DayRecord`].
//!
//! Parsing is a chain of independent strategies. Each one reports every field
//! as [`Parsed::Found`] or [`Parsed::NotFound`]; for each field the earliest
//! strategy that found it wins, so a looser strategy only fills what the
//! stricter ones left open. Appending a strategy to [`STRATEGIES`] never
//! changes what the existing ones produce.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Context as _;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::cli::ParseArgs;
use crate::formats::{DayRecord, content_fingerprint};
use crate::hhmm;
use crate::status;

pub const NOTE_OVERNIGHT: &str = "crosses midnight";
pub const NOTE_START_FROM_TEXT: &str = "start inferred from page text";
pub const NOTE_END_FROM_TEXT: &str = "end inferred from page text";

const KNOWN_TABLE_CLASSES: &[&str] = &[
    "duty-components-table",
    "allocation-info",
    "duty_header_attribute",
    "table-header-block",
];

const START_ALIASES: &[&str] = &["hora inicio", "inicio", "start", "inizio", "begin"];
const END_ALIASES: &[&str] = &["hora fin", "fin", "end", "fine"];
const CODE_ALIASES: &[&str] = &["tipo", "type", "duty", "turno"];
const ORIGIN_ALIASES: &[&str] = &[
    "origen",
    "from",
    "ubicación",
    "ubicacion",
    "location",
    "luogo",
];
const DESTINATION_ALIASES: &[&str] = &["destino", "to", "destination"];
const TRAIN_ALIASES: &[&str] = &["tren", "train", "treno", "trip"];

const HEADER_LABELS: &[&str] = &[
    "tipo", "type", "turno", "duty", "código", "codigo", "code", "shift",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|err| panic!("invalid selector {css:?}: {err}"))
}

static SEL_COMPONENTS_TABLE: LazyLock<Selector> =
    LazyLock::new(|| selector("table.duty-components-table"));
static SEL_HEADER_TABLES: LazyLock<Selector> = LazyLock::new(|| {
    selector("table.allocation-info, table.duty_header_attribute, table.table-header-block")
});
static SEL_START_TIME: LazyLock<Selector> = LazyLock::new(|| selector("td.start_time"));
static SEL_END_TIME: LazyLock<Selector> = LazyLock::new(|| selector("td.end_time"));
static SEL_START_LOCATION: LazyLock<Selector> =
    LazyLock::new(|| selector("td.start_location_long_name"));
static SEL_END_LOCATION: LazyLock<Selector> =
    LazyLock::new(|| selector("td.end_location_long_name"));
static SEL_COMPONENT_TYPE: LazyLock<Selector> =
    LazyLock::new(|| selector("td.component-type, td.type"));
static SEL_TRIP_NUMBERS: LazyLock<Selector> = LazyLock::new(|| selector("td.trip_numbers"));
static SEL_TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static SEL_TR: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static SEL_TH: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static SEL_TD: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static SEL_ROW_CELLS: LazyLock<Selector> = LazyLock::new(|| selector("th, td"));
static SEL_DEFINITIONS: LazyLock<Selector> = LazyLock::new(|| selector("dt, dd"));
static SEL_HEADER_REGIONS: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "table.allocation-info, table.duty_header_attribute, table.table-header-block, \
         header, .duty-header, dl",
    )
});
static SEL_CODE_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| selector(".duty-type, .shift-code"));

static RE_TRIP_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z]{1,3}\d{3,5}|\d{3,5})\b").expect("invalid regex: trip id")
});

/// Outcome of one strategy for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Found(T),
    NotFound,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Parsed::NotFound
    }
}

impl<T> Parsed<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Parsed::Found(value),
            None => Parsed::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Parsed::Found(_))
    }

    /// Keeps `self` when found, otherwise takes `later`.
    pub fn or(self, later: Parsed<T>) -> Parsed<T> {
        match self {
            Parsed::Found(_) => self,
            Parsed::NotFound => later,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Parsed::Found(value) => Some(value),
            Parsed::NotFound => None,
        }
    }
}

/// Everything a strategy can contribute to a day.
#[derive(Debug, Default)]
pub struct DayFields {
    pub shift_code: Parsed<String>,
    pub start: Parsed<String>,
    pub end: Parsed<String>,
    pub origin_from: Parsed<String>,
    pub origin_to: Parsed<String>,
    pub train_or_trip_id: Parsed<String>,
    pub labels: Vec<String>,
    pub notes: Vec<String>,
    pub table_matched: bool,
}

impl DayFields {
    fn absorb(&mut self, later: DayFields) {
        self.shift_code = std::mem::take(&mut self.shift_code).or(later.shift_code);
        self.start = std::mem::take(&mut self.start).or(later.start);
        self.end = std::mem::take(&mut self.end).or(later.end);
        self.origin_from = std::mem::take(&mut self.origin_from).or(later.origin_from);
        self.origin_to = std::mem::take(&mut self.origin_to).or(later.origin_to);
        self.train_or_trip_id =
            std::mem::take(&mut self.train_or_trip_id).or(later.train_or_trip_id);
        self.labels.extend(later.labels);
        self.notes.extend(later.notes);
        self.table_matched |= later.table_matched;
    }
}

/// A strategy sees the parsed document and what earlier strategies found.
pub type Strategy = fn(&Html, &DayFields) -> DayFields;

pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("components-table", components_table),
    ("header-mapped-table", header_mapped_table),
    ("labeled-header", labeled_header),
    ("full-text", full_text),
];

/// Builds the record for `date` from one day detail fragment. Never fails:
/// markup no strategy understands yields a `LIBRE` record with empty fields.
pub fn extract_day(date: NaiveDate, html: &str, fragment_ref: &str) -> DayRecord {
    let doc = Html::parse_document(html);

    let mut fields = DayFields::default();
    for (name, strategy) in STRATEGIES {
        let found = strategy(&doc, &fields);
        tracing::trace!(%date, strategy = name, start = found.start.is_found(), end = found.end.is_found(), "strategy ran");
        fields.absorb(found);
    }

    into_record(date, html, fragment_ref, fields)
}

fn into_record(date: NaiveDate, html: &str, fragment_ref: &str, fields: DayFields) -> DayRecord {
    let DayFields {
        shift_code,
        start,
        end,
        origin_from,
        origin_to,
        train_or_trip_id,
        mut labels,
        mut notes,
        table_matched: _,
    } = fields;

    let shift_code = shift_code.into_option();
    let start = start.into_option();
    let end = end.into_option();
    if let Some(code) = &shift_code {
        labels.push(code.clone());
    }

    let has_both_times = start.is_some() && end.is_some();
    let status = status::classify(&labels, has_both_times);
    let overnight = hhmm::overnight(start.as_deref(), end.as_deref());
    if overnight {
        notes.push(NOTE_OVERNIGHT.to_owned());
    }

    DayRecord {
        date,
        status,
        shift_code,
        start,
        end,
        overnight,
        origin_from: origin_from.into_option(),
        origin_to: origin_to.into_option(),
        train_or_trip_id: train_or_trip_id.into_option(),
        source_fragment_ref: fragment_ref.to_owned(),
        content_fingerprint: content_fingerprint(html),
        notes,
    }
}

/// The portal's own detail table: one row per leg of the duty.
fn components_table(doc: &Html, _found: &DayFields) -> DayFields {
    let mut fields = DayFields::default();
    for header in doc.select(&SEL_HEADER_TABLES) {
        push_label(&mut fields.labels, element_text(header));
    }

    let Some(table) = doc.select(&SEL_COMPONENTS_TABLE).next() else {
        return fields;
    };
    fields.table_matched = true;

    let starts = cell_texts(table, &SEL_START_TIME);
    let ends = cell_texts(table, &SEL_END_TIME);
    fields.start = Parsed::from_option(starts.first().and_then(|t| hhmm::normalize(t)));
    fields.end = Parsed::from_option(ends.last().and_then(|t| hhmm::normalize(t)));
    fields.origin_from =
        Parsed::from_option(cell_texts(table, &SEL_START_LOCATION).into_iter().next());
    fields.origin_to = Parsed::from_option(cell_texts(table, &SEL_END_LOCATION).pop());
    fields.shift_code =
        Parsed::from_option(cell_texts(table, &SEL_COMPONENT_TYPE).into_iter().next());
    let table_text = element_text(table);
    fields.train_or_trip_id = Parsed::from_option(
        cell_texts(table, &SEL_TRIP_NUMBERS)
            .first()
            .and_then(|cell| trip_id(cell)),
    )
    .or(Parsed::from_option(trip_id(&table_text)));

    push_label(&mut fields.labels, table_text);
    fields
}

/// Any other table whose `th` headers name the columns.
fn header_mapped_table(doc: &Html, _found: &DayFields) -> DayFields {
    for table in doc.select(&SEL_TABLE) {
        if table
            .value()
            .classes()
            .any(|class| KNOWN_TABLE_CLASSES.contains(&class))
        {
            continue;
        }

        let headers: Vec<String> = table.select(&SEL_TH).map(element_text).collect();
        let columns = ColumnMap::from_headers(&headers);
        if columns.start.is_none() && columns.end.is_none() {
            continue;
        }

        let rows: Vec<Vec<String>> = table
            .select(&SEL_TR)
            .map(|tr| tr.select(&SEL_TD).map(element_text).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .collect();
        let column = |idx: Option<usize>| -> Vec<String> {
            let Some(idx) = idx else {
                return Vec::new();
            };
            rows.iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.is_empty())
                .cloned()
                .collect()
        };

        let mut fields = DayFields {
            table_matched: true,
            ..DayFields::default()
        };
        fields.start = Parsed::from_option(
            column(columns.start)
                .first()
                .and_then(|t| hhmm::normalize(t)),
        );
        fields.end =
            Parsed::from_option(column(columns.end).last().and_then(|t| hhmm::normalize(t)));
        fields.shift_code = Parsed::from_option(column(columns.code).into_iter().next());
        fields.origin_from = Parsed::from_option(column(columns.origin).into_iter().next());
        fields.origin_to = Parsed::from_option(column(columns.destination).pop());
        fields.train_or_trip_id = Parsed::from_option(
            column(columns.train)
                .first()
                .and_then(|cell| trip_id(cell)),
        );
        push_label(&mut fields.labels, element_text(table));
        return fields;
    }

    DayFields::default()
}

/// Duty type code from a header area: a `Tipo: X` style label/value pair, or
/// an element dedicated to the code.
fn labeled_header(doc: &Html, _found: &DayFields) -> DayFields {
    let mut fields = DayFields::default();

    let dedicated = doc
        .select(&SEL_CODE_ELEMENTS)
        .map(element_text)
        .find(|text| !text.is_empty());
    if let Some(code) = dedicated {
        fields.shift_code = Parsed::Found(code);
        return fields;
    }

    for region in doc.select(&SEL_HEADER_REGIONS) {
        let is_table = region.value().name() == "table";
        if !is_table {
            push_label(&mut fields.labels, element_text(region));
        }

        let mut sequences: Vec<Vec<String>> = region
            .select(&SEL_TR)
            .map(|tr| tr.select(&SEL_ROW_CELLS).map(element_text).collect())
            .collect();
        sequences.push(region.select(&SEL_DEFINITIONS).map(element_text).collect());

        let code = sequences.iter().find_map(|cells| {
            cells
                .windows(2)
                .find(|pair| {
                    is_header_label(&pair[0])
                        && !pair[1].is_empty()
                        && !is_heading_word(&pair[1])
                })
                .map(|pair| pair[1].clone())
        });
        if let Some(code) = code {
            fields.shift_code = Parsed::Found(code);
            break;
        }
    }

    fields
}

/// Last resort: any time-like tokens anywhere in the visible text.
fn full_text(doc: &Html, found: &DayFields) -> DayFields {
    let mut fields = DayFields::default();
    let text = visible_text(doc);
    if !found.table_matched {
        push_label(&mut fields.labels, text.clone());
    }
    if found.start.is_found() && found.end.is_found() {
        return fields;
    }

    let tokens = hhmm::time_tokens(&text);
    if !found.start.is_found()
        && let Some(first) = tokens.first()
    {
        fields.start = Parsed::Found(first.clone());
        fields.notes.push(NOTE_START_FROM_TEXT.to_owned());
    }
    if !found.end.is_found()
        && let Some(last) = tokens.last()
    {
        fields.end = Parsed::Found(last.clone());
        fields.notes.push(NOTE_END_FROM_TEXT.to_owned());
    }
    fields
}

#[derive(Debug, Default)]
struct ColumnMap {
    start: Option<usize>,
    end: Option<usize>,
    code: Option<usize>,
    origin: Option<usize>,
    destination: Option<usize>,
    train: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let slots: [(&mut Option<usize>, &[&str]); 6] = [
                (&mut map.start, START_ALIASES),
                (&mut map.end, END_ALIASES),
                (&mut map.code, CODE_ALIASES),
                (&mut map.origin, ORIGIN_ALIASES),
                (&mut map.destination, DESTINATION_ALIASES),
                (&mut map.train, TRAIN_ALIASES),
            ];
            for (slot, aliases) in slots {
                if slot.is_none() && matches_alias(header, aliases) {
                    *slot = Some(idx);
                    break;
                }
            }
        }
        map
    }
}

fn matches_alias(text: &str, aliases: &[&str]) -> bool {
    let padded = format!(" {} ", words(text));
    aliases
        .iter()
        .any(|alias| padded.contains(&format!(" {alias} ")))
}

fn is_header_label(text: &str) -> bool {
    let words = words(text);
    let first = words.split(' ').next().unwrap_or_default();
    HEADER_LABELS.contains(&first) && words.split(' ').count() <= 3
}

/// A cell that names a column or a label rather than holding a value.
fn is_heading_word(text: &str) -> bool {
    let words = words(text);
    [
        HEADER_LABELS,
        START_ALIASES,
        END_ALIASES,
        CODE_ALIASES,
        ORIGIN_ALIASES,
        DESTINATION_ALIASES,
        TRAIN_ALIASES,
    ]
    .iter()
    .any(|aliases| aliases.contains(&words.as_str()))
}

/// Lowercase words with punctuation dropped, single-space separated.
fn words(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn trip_id(cell: &str) -> Option<String> {
    RE_TRIP_ID.captures(cell).map(|caps| caps[1].to_owned())
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn cell_texts(table: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    table
        .select(selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_label(labels: &mut Vec<String>, text: String) {
    if !text.is_empty() {
        labels.push(text);
    }
}

/// Text a reader would see: script, style and template bodies are skipped.
fn visible_text(doc: &Html) -> String {
    let mut parts = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|element| {
                matches!(element.name(), "script" | "style" | "noscript" | "template")
            })
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    normalize_whitespace(&parts.join(" "))
}

pub fn run(args: ParseArgs) -> anyhow::Result<()> {
    let html_path = PathBuf::from(&args.html);
    let html = std::fs::read_to_string(&html_path)
        .with_context(|| format!("read day fragment: {}", html_path.display()))?;
    let fragment_ref = args.href.clone().unwrap_or_else(|| args.html.clone());

    let record = extract_day(args.date, &html, &fragment_ref);
    tracing::debug!(date = %record.date, status = %record.status, "parsed day fragment");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &record).context("serialize day record")?;
    out.write_all(b"\n").context("write newline")?;
    out.flush().context("flush stdout")?;
    Ok(())
}
