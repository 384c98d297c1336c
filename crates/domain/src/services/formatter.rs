//! Streaming export formatters.
//!
//! Each formatter consumes events one at a time, so the runner can page
//! through a large event log without holding the full record set in memory.
//! Only the formatted output accumulates, which is what the artifact store
//! ultimately receives.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{AuditEvent, ExportFormat, ExportJob};

/// Formatting errors. Surfaced to the runner, which fails the job.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Incremental formatter for one export artifact.
pub trait ExportFormatter: Send {
    /// Append one event to the artifact.
    fn write_event(&mut self, event: &AuditEvent) -> Result<(), FormatError>;

    /// Close the artifact and take the formatted bytes.
    fn finish(&mut self) -> Result<Vec<u8>, FormatError>;
}

/// Create the formatter for a job. `generated_at` stamps the table format's
/// metadata sheet; it is an explicit parameter so output is deterministic.
pub fn new_formatter(job: &ExportJob, generated_at: DateTime<Utc>) -> Box<dyn ExportFormatter> {
    match job.format {
        ExportFormat::Csv => Box::new(CsvFormatter::new()),
        ExportFormat::Json => Box::new(JsonFormatter::new()),
        ExportFormat::Table => Box::new(TableFormatter::new(job, generated_at)),
    }
}

/// Fixed CSV column set, one row per event.
const CSV_HEADER: &str =
    "id,occurred_at,actor_id,actor_email,event_type,entity_type,entity_id,entity_name,details";

/// CSV formatter with standard quoting and a UTF-8 BOM so spreadsheet
/// applications pick up the encoding.
pub struct CsvFormatter {
    buf: String,
}

impl CsvFormatter {
    pub fn new() -> Self {
        let mut buf = String::new();
        buf.push('\u{FEFF}');
        buf.push_str(CSV_HEADER);
        buf.push('\n');
        Self { buf }
    }
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportFormatter for CsvFormatter {
    fn write_event(&mut self, event: &AuditEvent) -> Result<(), FormatError> {
        let details = match &event.details {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };

        let fields = [
            event.id.to_string(),
            event.occurred_at.to_rfc3339(),
            event.actor_id.map(|id| id.to_string()).unwrap_or_default(),
            event.actor_email.clone().unwrap_or_default(),
            event.event_type.to_string(),
            event.entity_type.to_string(),
            event.entity_id.clone().unwrap_or_default(),
            event.entity_name.clone().unwrap_or_default(),
            details,
        ];

        let mut first = true;
        for field in &fields {
            if !first {
                self.buf.push(',');
            }
            first = false;
            self.buf.push_str(&escape_csv(field));
        }
        self.buf.push('\n');
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, FormatError> {
        Ok(std::mem::take(&mut self.buf).into_bytes())
    }
}

/// Escape a value for CSV output (doubled embedded quotes).
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// JSON formatter producing an array of event objects, written
/// incrementally.
pub struct JsonFormatter {
    buf: String,
    count: u64,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            buf: String::from("["),
            count: 0,
        }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportFormatter for JsonFormatter {
    fn write_event(&mut self, event: &AuditEvent) -> Result<(), FormatError> {
        if self.count > 0 {
            self.buf.push(',');
        }
        self.buf.push_str("\n  ");
        self.buf.push_str(&serde_json::to_string(event)?);
        self.count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, FormatError> {
        let mut buf = std::mem::take(&mut self.buf);
        if self.count > 0 {
            buf.push('\n');
        }
        buf.push(']');
        Ok(buf.into_bytes())
    }
}

/// Spreadsheet formatter producing a single-file XML Spreadsheet 2003
/// workbook: one metadata worksheet with the job parameters, plus one
/// worksheet per entity kind encountered in the export.
pub struct TableFormatter {
    meta_rows: Vec<Vec<String>>,
    /// Row buffers per worksheet, keyed by entity kind. BTreeMap keeps the
    /// sheet order stable.
    sheets: BTreeMap<String, SheetBuf>,
}

struct SheetBuf {
    rows: String,
    row_count: u64,
}

const EVENT_SHEET_HEADER: [&str; 8] = [
    "Id",
    "Occurred At",
    "Actor Id",
    "Actor Email",
    "Event Type",
    "Entity Id",
    "Entity Name",
    "Details",
];

impl TableFormatter {
    pub fn new(job: &ExportJob, generated_at: DateTime<Utc>) -> Self {
        let filter_list = |items: Vec<String>| -> String {
            if items.is_empty() {
                "all".to_string()
            } else {
                items.join(", ")
            }
        };

        let meta_rows = vec![
            vec!["Job".to_string(), job.job_id.clone()],
            vec!["Organization".to_string(), job.organization_id.to_string()],
            vec!["Format".to_string(), job.format.to_string()],
            vec!["From".to_string(), job.date_from.to_rfc3339()],
            vec!["To".to_string(), job.date_to.to_rfc3339()],
            vec![
                "Event Types".to_string(),
                filter_list(job.event_types.iter().map(|t| t.to_string()).collect()),
            ],
            vec![
                "Entity Types".to_string(),
                filter_list(job.entity_types.iter().map(|t| t.to_string()).collect()),
            ],
            vec!["Generated At".to_string(), generated_at.to_rfc3339()],
        ];

        Self {
            meta_rows,
            sheets: BTreeMap::new(),
        }
    }

    fn push_row(buf: &mut String, cells: &[String]) {
        buf.push_str("   <Row>\n");
        for cell in cells {
            buf.push_str("    <Cell><Data ss:Type=\"String\">");
            buf.push_str(&escape_xml(cell));
            buf.push_str("</Data></Cell>\n");
        }
        buf.push_str("   </Row>\n");
    }
}

impl ExportFormatter for TableFormatter {
    fn write_event(&mut self, event: &AuditEvent) -> Result<(), FormatError> {
        let details = match &event.details {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };

        let sheet = self
            .sheets
            .entry(event.entity_type.to_string())
            .or_insert_with(|| {
                let mut rows = String::new();
                Self::push_row(
                    &mut rows,
                    &EVENT_SHEET_HEADER.map(str::to_string),
                );
                SheetBuf { rows, row_count: 0 }
            });

        Self::push_row(
            &mut sheet.rows,
            &[
                event.id.to_string(),
                event.occurred_at.to_rfc3339(),
                event.actor_id.map(|id| id.to_string()).unwrap_or_default(),
                event.actor_email.clone().unwrap_or_default(),
                event.event_type.to_string(),
                event.entity_id.clone().unwrap_or_default(),
                event.entity_name.clone().unwrap_or_default(),
                details,
            ],
        );
        sheet.row_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, FormatError> {
        let mut out = String::from(
            "<?xml version=\"1.0\"?>\n\
             <?mso-application progid=\"Excel.Sheet\"?>\n\
             <Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\"\n \
             xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
        );

        out.push_str(" <Worksheet ss:Name=\"Export\">\n  <Table>\n");
        for row in &self.meta_rows {
            Self::push_row(&mut out, row);
        }
        out.push_str("  </Table>\n </Worksheet>\n");

        for (name, sheet) in &self.sheets {
            out.push_str(&format!(
                " <Worksheet ss:Name=\"{}\">\n  <Table>\n",
                escape_xml(&sheet_name(name))
            ));
            out.push_str(&sheet.rows);
            out.push_str("  </Table>\n </Worksheet>\n");
        }

        out.push_str("</Workbook>\n");
        self.meta_rows.clear();
        self.sheets.clear();
        Ok(out.into_bytes())
    }
}

/// Escape a value for XML text content and attributes.
fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Worksheet names are capped at 31 characters and cannot contain
/// `[ ] : * ? / \`.
fn sheet_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(31)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, EventType, ExportFormat, NewExportJob};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event(n: u32) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, n, 0).unwrap(),
            actor_id: Some(Uuid::new_v4()),
            actor_email: Some(format!("user{}@example.com", n)),
            event_type: EventType::Update,
            entity_type: EntityType::Course,
            entity_id: Some(format!("course-{}", n)),
            entity_name: Some(format!("Course {}", n)),
            details: None,
        }
    }

    fn test_job(format: ExportFormat) -> ExportJob {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        NewExportJob::on_demand(
            Uuid::new_v4(),
            format,
            now - chrono::Duration::days(7),
            now,
            vec![],
            vec![],
        )
        .unwrap()
        .build(now)
    }

    /// Minimal CSV reader for round-trip assertions: splits records and
    /// fields honoring quoted fields with doubled quotes.
    fn parse_csv(input: &str) -> Vec<Vec<String>> {
        let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => in_quotes = false,
                    other => field.push(other),
                }
            } else {
                match c {
                    '"' => in_quotes = true,
                    ',' => row.push(std::mem::take(&mut field)),
                    '\n' => {
                        row.push(std::mem::take(&mut field));
                        rows.push(std::mem::take(&mut row));
                    }
                    other => field.push(other),
                }
            }
        }
        if !field.is_empty() || !row.is_empty() {
            row.push(field);
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("hello,world"), "\"hello,world\"");
        assert_eq!(escape_csv("hello\"world"), "\"hello\"\"world\"");
        assert_eq!(escape_csv("hello\nworld"), "\"hello\nworld\"");
    }

    #[test]
    fn test_csv_has_bom_and_header() {
        let mut formatter = CsvFormatter::new();
        let bytes = formatter.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with('\u{FEFF}'));
        assert!(text.contains("id,occurred_at,actor_id"));
    }

    #[test]
    fn test_csv_roundtrip_field_counts() {
        let mut formatter = CsvFormatter::new();
        let mut events: Vec<AuditEvent> = (0..5).map(event).collect();
        // An awkward value that needs quoting
        events[2].entity_name = Some("Maths, \"Advanced\"\nTerm 2".to_string());
        events[3].details = Some(serde_json::json!({"old": 1, "new": 2}));

        for e in &events {
            formatter.write_event(e).unwrap();
        }
        let text = String::from_utf8(formatter.finish().unwrap()).unwrap();

        let rows = parse_csv(&text);
        assert_eq!(rows.len(), 6); // header + 5 data rows
        let width = rows[0].len();
        assert_eq!(width, 9);
        for row in &rows {
            assert_eq!(row.len(), width);
        }
        assert_eq!(rows[3][7], "Maths, \"Advanced\"\nTerm 2");
    }

    #[test]
    fn test_json_empty_is_valid_array() {
        let mut formatter = JsonFormatter::new();
        let bytes = formatter.finish().unwrap();
        let parsed: Vec<AuditEvent> = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_json_roundtrip_preserves_fields() {
        let mut formatter = JsonFormatter::new();
        let events: Vec<AuditEvent> = (0..4).map(event).collect();
        for e in &events {
            formatter.write_event(e).unwrap();
        }
        let bytes = formatter.finish().unwrap();

        let parsed: Vec<AuditEvent> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), events.len());
        for (a, b) in parsed.iter().zip(events.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.occurred_at, b.occurred_at);
            assert_eq!(a.actor_email, b.actor_email);
            assert_eq!(a.event_type, b.event_type);
            assert_eq!(a.entity_type, b.entity_type);
            assert_eq!(a.entity_name, b.entity_name);
        }
    }

    #[test]
    fn test_table_has_metadata_and_category_sheets() {
        let job = test_job(ExportFormat::Table);
        let generated_at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let mut formatter = TableFormatter::new(&job, generated_at);

        let mut lesson_event = event(1);
        lesson_event.entity_type = EntityType::Lesson;
        formatter.write_event(&event(0)).unwrap();
        formatter.write_event(&lesson_event).unwrap();
        formatter.write_event(&event(2)).unwrap();

        let text = String::from_utf8(formatter.finish().unwrap()).unwrap();

        assert!(text.starts_with("<?xml version=\"1.0\"?>"));
        assert!(text.contains("ss:Name=\"Export\""));
        assert!(text.contains("ss:Name=\"course\""));
        assert!(text.contains("ss:Name=\"lesson\""));
        assert!(text.contains(&job.job_id));
        assert!(text.contains("2024-03-02T00:00:00+00:00"));
        // Balanced worksheet tags: metadata + two category sheets
        assert_eq!(text.matches("<Worksheet").count(), 3);
        assert_eq!(text.matches("</Worksheet>").count(), 3);
    }

    #[test]
    fn test_table_escapes_xml_content() {
        let job = test_job(ExportFormat::Table);
        let mut formatter = TableFormatter::new(&job, Utc::now());
        let mut e = event(0);
        e.entity_name = Some("Fish & <Chips>".to_string());
        formatter.write_event(&e).unwrap();
        let text = String::from_utf8(formatter.finish().unwrap()).unwrap();
        assert!(text.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(!text.contains("Fish & <Chips>"));
    }

    #[test]
    fn test_sheet_name_sanitized_and_capped() {
        assert_eq!(sheet_name("grade/override"), "grade_override");
        let long = "x".repeat(40);
        assert_eq!(sheet_name(&long).len(), 31);
    }

    #[test]
    fn test_new_formatter_picks_implementation() {
        let job = test_job(ExportFormat::Csv);
        let mut f = new_formatter(&job, Utc::now());
        let bytes = f.finish().unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("id,occurred_at"));
    }
}
