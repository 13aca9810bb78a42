//! Input normalizer: tabular (CSV) or line-oriented text → ordered payload strings.
//!
//! The normalizer never truncates. It reports the true item count; the scheduler
//! takes the `MAX_BATCH_SIZE` prefix and the caller uses `is_truncated()` to warn.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::collections::BTreeMap;

use crate::payload::{escape_wifi, has_http_scheme};
use crate::utils::config::MAX_BATCH_SIZE;
use crate::QrType;

/// Logical field name → CSV column header.
pub type ColumnMapping = BTreeMap<String, String>;

/// Header keyword → (type, logical field) used for auto-detection.
const COLUMN_AUTO_MAP: [(&str, QrType); 7] = [
    ("url", QrType::Url),
    ("link", QrType::Url),
    ("website", QrType::Url),
    ("email", QrType::Email),
    ("ssid", QrType::Wifi),
    ("phone", QrType::Sms),
    ("text", QrType::Text),
];

/// Type assumed for tabular input when no header matches a keyword.
pub const FALLBACK_QR_TYPE: QrType = QrType::Url;

/// Parsed CSV. Every row holds exactly `headers.len()` cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedCsv {
    /// Cell of `row` under `column` (first header with that name).
    pub fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        row.get(idx).map(String::as_str)
    }
}

/// Ordered payloads plus the count before any scheduling cap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedInput {
    pub items: Vec<String>,
    pub total: usize,
}

impl NormalizedInput {
    pub fn new(items: Vec<String>) -> Self {
        let total = items.len();
        Self { items, total }
    }

    /// How many items a run will actually render.
    pub fn scheduled_count(&self) -> usize {
        self.total.min(MAX_BATCH_SIZE)
    }

    pub fn is_truncated(&self) -> bool {
        self.total > MAX_BATCH_SIZE
    }

    /// The prefix a run will render.
    pub fn scheduled(&self) -> &[String] {
        &self.items[..self.scheduled_count().min(self.items.len())]
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Type and column mapping chosen for a tabular input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabularPlan {
    pub qr_type: QrType,
    pub mapping: ColumnMapping,
}

/// Parse CSV text with a header row. Headers are trimmed, blank lines skipped, short rows padded.
pub fn parse_csv(text: &str) -> Result<ParsedCsv> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("parse CSV row {}", i + 1))?;
        let mut row: Vec<String> = record.iter().take(headers.len()).map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    debug!("Parsed CSV: {} columns, {} rows", headers.len(), rows.len());
    Ok(ParsedCsv { headers, rows })
}

/// First header (in column order) that is a known keyword decides the type.
pub fn auto_detect_qr_type(headers: &[String]) -> Option<QrType> {
    headers.iter().find_map(|h| {
        let lower = h.to_lowercase();
        COLUMN_AUTO_MAP
            .iter()
            .find(|(keyword, _)| *keyword == lower)
            .map(|(_, t)| *t)
    })
}

fn find_header(headers: &[String], candidates: &[&str]) -> Option<String> {
    headers
        .iter()
        .find(|h| candidates.contains(&h.to_lowercase().as_str()))
        .cloned()
}

/// Default logical-field → column mapping for a type. Types without rules get an empty mapping.
pub fn auto_detect_column_mapping(headers: &[String], qr_type: QrType) -> ColumnMapping {
    let rules: &[(&str, &[&str])] = match qr_type {
        QrType::Url => &[("url", &["url", "link", "website"])],
        QrType::Email => &[("email", &["email", "mail"]), ("subject", &["subject"])],
        QrType::Text => &[("text", &["text", "content", "data"])],
        QrType::Wifi => &[("ssid", &["ssid", "network"]), ("password", &["password", "pass"])],
        _ => &[],
    };
    rules
        .iter()
        .filter_map(|(field, candidates)| {
            find_header(headers, candidates).map(|col| (field.to_string(), col))
        })
        .collect()
}

/// Logical fields a type accepts in tabular mode.
pub fn mapping_fields(qr_type: QrType) -> &'static [&'static str] {
    match qr_type {
        QrType::Url => &["url"],
        QrType::Text => &["text"],
        QrType::Email => &["email", "subject"],
        QrType::Wifi => &["ssid", "password", "encryption"],
        QrType::Sms => &["phone"],
        _ => &["text"],
    }
}

/// Project one row to a payload string.
///
/// WiFi rows are synthesized here directly (always `H:false`) rather than going
/// through the typed formatter.
pub fn map_row_to_payload(
    csv: &ParsedCsv,
    row: &[String],
    qr_type: QrType,
    mapping: &ColumnMapping,
) -> String {
    let get = |field: &str| -> String {
        mapping
            .get(field)
            .and_then(|col| csv.cell(row, col))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };
    let first_cell = || row.first().cloned().unwrap_or_default();
    let or_first = |value: String| if value.is_empty() { first_cell() } else { value };

    match qr_type {
        QrType::Url => {
            let url = or_first(get("url"));
            if has_http_scheme(&url) {
                url
            } else {
                format!("https://{url}")
            }
        }
        QrType::Text => or_first(get("text")),
        QrType::Email => {
            let subject = get("subject");
            let query = if subject.is_empty() {
                String::new()
            } else {
                format!("?subject={}", urlencoding::encode(&subject))
            };
            format!("mailto:{}{}", get("email"), query)
        }
        QrType::Wifi => {
            let enc = get("encryption");
            let enc = if enc.is_empty() { "WPA".to_string() } else { enc };
            format!(
                "WIFI:T:{};S:{};P:{};H:false;;",
                enc,
                escape_wifi(&get("ssid")),
                escape_wifi(&get("password"))
            )
        }
        QrType::Sms => format!("sms:{}", get("phone")),
        _ => first_cell(),
    }
}

/// Resolve type (explicit, detected, or fallback) and mapping (auto-detected, then overrides).
pub fn plan_tabular(
    csv: &ParsedCsv,
    qr_type: Option<QrType>,
    overrides: &ColumnMapping,
) -> TabularPlan {
    let qr_type = qr_type
        .or_else(|| auto_detect_qr_type(&csv.headers))
        .unwrap_or(FALLBACK_QR_TYPE);
    let mut mapping = auto_detect_column_mapping(&csv.headers, qr_type);
    let accepted = mapping_fields(qr_type);
    for (field, column) in overrides {
        if !accepted.contains(&field.as_str()) {
            warn!(
                "Ignoring mapping {}={}: {} rows accept {}",
                field,
                column,
                qr_type,
                accepted.join(", ")
            );
            continue;
        }
        if !csv.headers.contains(column) {
            warn!("Mapped column {:?} for {} is not in the CSV header", column, field);
        }
        mapping.insert(field.clone(), column.clone());
    }
    TabularPlan { qr_type, mapping }
}

/// Every row projected in input order.
pub fn normalize_tabular(csv: &ParsedCsv, plan: &TabularPlan) -> NormalizedInput {
    NormalizedInput::new(
        csv.rows
            .iter()
            .map(|row| map_row_to_payload(csv, row, plan.qr_type, &plan.mapping))
            .collect(),
    )
}

/// Split on newlines (`\r\n` included), trim, drop empty lines.
pub fn parse_batch_text(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn normalize_lines(text: &str) -> NormalizedInput {
    NormalizedInput::new(parse_batch_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_csv_trims_headers_and_pads_rows() {
        let csv = parse_csv(" url , name\nexample.com,Ex\n\nshort\n").unwrap();
        assert_eq!(csv.headers, headers(&["url", "name"]));
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(csv.rows[1], vec!["short".to_string(), String::new()]);
    }

    #[test]
    fn test_parse_csv_quoted_fields() {
        let csv = parse_csv("text\n\"hello, world\"\n\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(csv.rows[0][0], "hello, world");
        assert_eq!(csv.rows[1][0], "say \"hi\"");
    }

    #[test]
    fn test_auto_detect_qr_type_first_match_wins() {
        assert_eq!(auto_detect_qr_type(&headers(&["name", "Website"])), Some(QrType::Url));
        assert_eq!(auto_detect_qr_type(&headers(&["SSID", "url"])), Some(QrType::Wifi));
        assert_eq!(auto_detect_qr_type(&headers(&["phone"])), Some(QrType::Sms));
        assert_eq!(auto_detect_qr_type(&headers(&["foo", "bar"])), None);
    }

    #[test]
    fn test_auto_detect_column_mapping() {
        let m = auto_detect_column_mapping(&headers(&["Mail", "Subject"]), QrType::Email);
        assert_eq!(m.get("email").map(String::as_str), Some("Mail"));
        assert_eq!(m.get("subject").map(String::as_str), Some("Subject"));

        let m = auto_detect_column_mapping(&headers(&["network", "pass"]), QrType::Wifi);
        assert_eq!(m.len(), 2);
        assert!(auto_detect_column_mapping(&headers(&["phone"]), QrType::Sms).is_empty());
    }

    #[test]
    fn test_map_row_url_falls_back_to_first_cell() {
        let csv = parse_csv("name,url\nexample.com,\n").unwrap();
        let mapping = auto_detect_column_mapping(&csv.headers, QrType::Url);
        assert_eq!(
            map_row_to_payload(&csv, &csv.rows[0], QrType::Url, &mapping),
            "https://example.com"
        );
    }

    #[test]
    fn test_map_row_wifi_always_visible() {
        let csv = parse_csv("ssid,password\nHome;Net,p:w\n").unwrap();
        let mapping = auto_detect_column_mapping(&csv.headers, QrType::Wifi);
        assert_eq!(
            map_row_to_payload(&csv, &csv.rows[0], QrType::Wifi, &mapping),
            r"WIFI:T:WPA;S:Home\;Net;P:p\:w;H:false;;"
        );
    }

    #[test]
    fn test_map_row_email_subject_only() {
        let csv = parse_csv("email,subject\na@b.co,Hi there\n").unwrap();
        let mapping = auto_detect_column_mapping(&csv.headers, QrType::Email);
        assert_eq!(
            map_row_to_payload(&csv, &csv.rows[0], QrType::Email, &mapping),
            "mailto:a@b.co?subject=Hi%20there"
        );
    }

    #[test]
    fn test_map_row_missing_column_is_empty() {
        let csv = parse_csv("phone\n555\n").unwrap();
        let mut mapping = ColumnMapping::new();
        mapping.insert("phone".into(), "nope".into());
        assert_eq!(map_row_to_payload(&csv, &csv.rows[0], QrType::Sms, &mapping), "sms:");
    }

    #[test]
    fn test_plan_applies_overrides() {
        let csv = parse_csv("link,alt\na.com,b.com\n").unwrap();
        let mut overrides = ColumnMapping::new();
        overrides.insert("url".into(), "alt".into());
        let plan = plan_tabular(&csv, None, &overrides);
        assert_eq!(plan.qr_type, QrType::Url);
        let out = normalize_tabular(&csv, &plan);
        assert_eq!(out.items, vec!["https://b.com".to_string()]);
    }

    #[test]
    fn test_plan_ignores_overrides_for_unknown_fields() {
        let csv = parse_csv("ssid,pw,extra
Home,secret,x
").unwrap();
        let mut overrides = ColumnMapping::new();
        overrides.insert("password".into(), "pw".into());
        overrides.insert("phone".into(), "extra".into());
        let plan = plan_tabular(&csv, None, &overrides);
        assert_eq!(plan.qr_type, QrType::Wifi);
        assert_eq!(plan.mapping.get("password").map(String::as_str), Some("pw"));
        assert!(!plan.mapping.contains_key("phone"));
        assert_eq!(
            normalize_tabular(&csv, &plan).items,
            vec!["WIFI:T:WPA;S:Home;P:secret;H:false;;".to_string()]
        );
    }

    #[test]
    fn test_parse_batch_text() {
        assert_eq!(
            parse_batch_text("  a \r\n\r\n b\n\n"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_batch_text("\n  \n").is_empty());
    }

    #[test]
    fn test_normalized_input_counts() {
        let lines: String = (0..600).map(|i| format!("line {i}\n")).collect();
        let input = normalize_lines(&lines);
        assert_eq!(input.total, 600);
        assert_eq!(input.items.len(), 600);
        assert_eq!(input.scheduled_count(), MAX_BATCH_SIZE);
        assert_eq!(input.scheduled().len(), MAX_BATCH_SIZE);
        assert!(input.is_truncated());
    }
}
