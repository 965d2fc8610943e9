//! Grouping of formatted records into output files.
//!
//! A [`BatchWriter`] owns the records of one grouping key. A full batch is
//! only emitted once the next record arrives, so a key that fits into one
//! batch is written without an index.

use std::collections::BTreeMap;

use crate::domain::{ArchiveKind, EventItem, FormattedRecord, OutputUnit};

/// Frames the file header.
pub const FILE_RULE: &str =
    "################################################################################";

const OUTPUT_EXTENSION: &str = "txt";

/// Ordered records bound for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Grouping key the records belong to.
    pub key: String,
    /// 1-based position among the key's batches; `None` for a lone batch.
    pub index: Option<usize>,
    pub records: Vec<FormattedRecord>,
}

impl Batch {
    /// Deterministic, sanitized file name.
    #[must_use]
    pub fn file_name(&self) -> String {
        let stem = sanitize_name(&self.key);
        match self.index {
            Some(index) => format!("{stem}_{index:03}.{OUTPUT_EXTENSION}"),
            None => format!("{stem}.{OUTPUT_EXTENSION}"),
        }
    }

    /// Renders the batch as one output file.
    #[must_use]
    pub fn into_unit(self, kind: ArchiveKind, incomplete: Option<&str>) -> OutputUnit {
        let mut content = String::new();
        content.push_str(FILE_RULE);
        content.push('\n');
        content.push_str(&format!("# Archive: {kind}\n"));
        content.push_str(&format!("# Source: {}\n", self.key));
        if let Some(index) = self.index {
            content.push_str(&format!("# Batch: {index}\n"));
        }
        content.push_str(&format!("# Records: {}\n", self.records.len()));
        if let Some(reason) = incomplete {
            let reason = reason.split_whitespace().collect::<Vec<_>>().join(" ");
            content.push_str(&format!("# Status: incomplete - {reason}\n"));
        }
        content.push_str(FILE_RULE);
        content.push_str("\n\n");

        let name = self.file_name();
        let body: Vec<&str> = self.records.iter().map(FormattedRecord::as_str).collect();
        content.push_str(&body.join("\n"));

        OutputUnit { name, content }
    }
}

/// Accumulates records for one grouping key into bounded batches.
#[derive(Debug)]
pub struct BatchWriter {
    key: String,
    max_records: usize,
    current: Vec<FormattedRecord>,
    emitted: usize,
}

impl BatchWriter {
    /// `max_records` of `None` means a single unbounded batch.
    #[must_use]
    pub fn new(key: impl Into<String>, max_records: Option<usize>) -> Self {
        Self {
            key: key.into(),
            max_records: max_records.unwrap_or(usize::MAX).max(1),
            current: Vec::new(),
            emitted: 0,
        }
    }

    /// Adds a record; returns the previous batch once it is known to be full
    /// and followed by more records.
    pub fn push(&mut self, record: FormattedRecord) -> Option<Batch> {
        let full = if self.current.len() >= self.max_records {
            self.emitted += 1;
            Some(Batch {
                key: self.key.clone(),
                index: Some(self.emitted),
                records: std::mem::take(&mut self.current),
            })
        } else {
            None
        };

        self.current.push(record);
        full
    }

    /// Flushes the remaining records. A key with no records yields nothing.
    #[must_use]
    pub fn finish(self) -> Option<Batch> {
        if self.current.is_empty() {
            return None;
        }

        let index = (self.emitted > 0).then_some(self.emitted + 1);
        Some(Batch {
            key: self.key,
            index,
            records: self.current,
        })
    }

    /// Records buffered and not yet emitted.
    #[cfg(test)]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.current.len()
    }
}

/// Splits a finished record stream into batches.
#[must_use]
pub fn batch_all(
    key: &str,
    records: impl IntoIterator<Item = FormattedRecord>,
    max_records: Option<usize>,
) -> Vec<Batch> {
    let mut writer = BatchWriter::new(key, max_records);
    let mut batches: Vec<Batch> = records.into_iter().filter_map(|r| writer.push(r)).collect();
    batches.extend(writer.finish());
    batches
}

/// Restricts a grouping key to `[A-Za-z0-9_]`.
#[must_use]
pub fn sanitize_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Groups calendar events by the year-month of their start, each group sorted
/// by start ascending. Undated events form a final `undated` group.
#[must_use]
pub fn group_events_by_month(
    calendar: &str,
    events: Vec<EventItem>,
) -> Vec<(String, Vec<EventItem>)> {
    let mut dated: BTreeMap<(i32, u32), Vec<EventItem>> = BTreeMap::new();
    let mut undated = Vec::new();

    for event in events {
        match event.meta.start {
            Some(start) => {
                let date = start.date();
                dated
                    .entry((chrono::Datelike::year(&date), chrono::Datelike::month(&date)))
                    .or_default()
                    .push(event);
            }
            None => undated.push(event),
        }
    }

    let mut groups: Vec<(String, Vec<EventItem>)> = dated
        .into_iter()
        .map(|((year, month), mut items)| {
            items.sort_by_key(|e| e.meta.start.and_then(|s| s.instant()));
            (format!("{calendar}_{year:04}_{month:02}"), items)
        })
        .collect();

    if !undated.is_empty() {
        groups.push((format!("{calendar}_undated"), undated));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentPart, EventMeta, EventTime, RawItem};
    use chrono::{DateTime, NaiveDate};

    fn record(n: usize) -> FormattedRecord {
        FormattedRecord::new(format!("record {n}\n"))
    }

    #[test]
    fn test_250_records_make_three_batches() {
        let batches = batch_all("INBOX", (0..250).map(record), Some(100));

        let sizes: Vec<_> = batches.iter().map(|b| b.records.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);

        let names: Vec<_> = batches.iter().map(Batch::file_name).collect();
        assert_eq!(names, vec!["INBOX_001.txt", "INBOX_002.txt", "INBOX_003.txt"]);

        assert_eq!(batches[0].records[0], record(0));
        assert_eq!(batches[2].records[49], record(249));
    }

    #[test]
    fn test_single_batch_has_no_index() {
        let batches = batch_all("general", (0..100).map(record), Some(100));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].index, None);
        assert_eq!(batches[0].file_name(), "general.txt");
    }

    #[test]
    fn test_full_batch_waits_for_next_record() {
        let mut writer = BatchWriter::new("k", Some(2));
        assert!(writer.push(record(1)).is_none());
        assert!(writer.push(record(2)).is_none());
        let first = writer.push(record(3)).unwrap();
        assert_eq!(first.index, Some(1));
        assert_eq!(writer.pending(), 1);
        assert_eq!(writer.finish().unwrap().index, Some(2));
    }

    #[test]
    fn test_empty_writer_yields_nothing() {
        assert!(BatchWriter::new("empty", Some(10)).finish().is_none());
        assert!(batch_all("empty", Vec::new(), None).is_empty());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("general"), "general");
        assert_eq!(sanitize_name("#dev-ops / alerts!"), "dev_ops_alerts");
        assert_eq!(sanitize_name("Work/Projects 2024"), "Work_Projects_2024");
        assert_eq!(sanitize_name("Café"), "Caf");
        assert_eq!(sanitize_name("!!!"), "unnamed");
    }

    #[test]
    fn test_unit_header() {
        let batch = Batch {
            key: "Work/Projects".into(),
            index: Some(2),
            records: vec![record(1), record(2)],
        };
        let unit = batch.into_unit(ArchiveKind::Email, Some("HTTP error:\ntimed out"));

        assert_eq!(unit.name, "Work_Projects_002.txt");
        let expected = format!(
            "{FILE_RULE}\n# Archive: email\n# Source: Work/Projects\n# Batch: 2\n# Records: 2\n\
             # Status: incomplete - HTTP error: timed out\n{FILE_RULE}\n\nrecord 1\n\nrecord 2\n"
        );
        assert_eq!(unit.content, expected);
    }

    fn event(id: &str, start: Option<EventTime>) -> EventItem {
        RawItem {
            id: id.into(),
            timestamp: None,
            content: ContentPart::default(),
            meta: EventMeta {
                start,
                ..EventMeta::default()
            },
        }
    }

    #[test]
    fn test_mixed_event_times_sort_chronologically() {
        let at = |secs| DateTime::from_timestamp(secs, 0).map(EventTime::DateTime);
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).map(EventTime::Date);

        let events = vec![
            event("allday-2nd", day(2024, 3, 2)),
            event("timed-1st", at(1_709_290_800)), // 2024-03-01 11:00
            event("allday-1st", day(2024, 3, 1)),
        ];

        let groups = group_events_by_month("Team", events);
        let ids: Vec<_> = groups[0].1.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["allday-1st", "timed-1st", "allday-2nd"]);
    }

    #[test]
    fn test_calendar_grouping_by_month() {
        let at = |secs| DateTime::from_timestamp(secs, 0).map(EventTime::DateTime);
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).map(EventTime::Date);

        let events = vec![
            event("mar-late", at(1_711_800_000)),   // 2024-03-30
            event("feb", at(1_707_000_000)),        // 2024-02-03
            event("mar-allday", day(2024, 3, 1)),
            event("none", None),
            event("mar-early", at(1_709_290_800)),  // 2024-03-01 11:00
        ];

        let groups = group_events_by_month("Team Calendar", events);
        let summary: Vec<(String, Vec<String>)> = groups
            .into_iter()
            .map(|(key, items)| (key, items.into_iter().map(|e| e.id).collect()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Team Calendar_2024_02".to_string(), vec!["feb".to_string()]),
                (
                    "Team Calendar_2024_03".to_string(),
                    vec![
                        "mar-allday".to_string(),
                        "mar-early".to_string(),
                        "mar-late".to_string()
                    ]
                ),
                ("Team Calendar_undated".to_string(), vec!["none".to_string()]),
            ]
        );
    }
}
