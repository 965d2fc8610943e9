//! Shared plumbing for the archivers: the output seam and per-collection
//! bookkeeping.

use crate::domain::{
    AppError, ArchiveKind, CollectionReport, CollectionStatus, OutputUnit, Result,
};

use super::batch::Batch;

/// Destination for finished output files.
pub trait OutputSink {
    /// Persists one complete file.
    ///
    /// # Errors
    /// Returns error if the unit could not be written.
    fn write_unit(&mut self, unit: &OutputUnit) -> Result<()>;
}

/// Whether an error concerns a single item payload rather than the collection.
///
/// Such items are logged and skipped; anything else aborts the collection.
#[must_use]
pub const fn is_item_defect(err: &AppError) -> bool {
    matches!(err, AppError::InvalidData { .. } | AppError::JsonParse { .. })
}

/// Progress of one grouping key while it is being archived.
#[derive(Debug)]
pub struct CollectionRun {
    kind: ArchiveKind,
    key: String,
    records: usize,
    files: usize,
}

impl CollectionRun {
    #[must_use]
    pub fn start(kind: ArchiveKind, key: impl Into<String>) -> Self {
        let key = key.into();
        tracing::info!(kind = %kind, collection = %key, "Archiving collection");
        Self {
            kind,
            key,
            records: 0,
            files: 0,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Counts one formatted record.
    pub fn record(&mut self) {
        self.records += 1;
    }

    /// Renders and writes a batch.
    ///
    /// # Errors
    /// Returns error if the sink rejects the file.
    pub fn write(
        &mut self,
        sink: &mut dyn OutputSink,
        batch: Batch,
        incomplete: Option<&AppError>,
    ) -> Result<()> {
        let reason = incomplete.map(ToString::to_string);
        let unit = batch.into_unit(self.kind, reason.as_deref());
        sink.write_unit(&unit)?;
        tracing::debug!(file = %unit.name, "Wrote archive file");
        self.files += 1;
        Ok(())
    }

    /// Closes the run. `outcome` is `Err` when writing failed, otherwise it
    /// carries the fetch error that cut enumeration short, if any.
    #[must_use]
    pub fn finish(self, outcome: Result<Option<AppError>>) -> CollectionReport {
        let status = match outcome {
            Ok(None) => {
                tracing::info!(
                    collection = %self.key,
                    records = self.records,
                    files = self.files,
                    "Collection archived"
                );
                CollectionStatus::Complete
            }
            Ok(Some(e)) => {
                tracing::warn!(
                    collection = %self.key,
                    records = self.records,
                    error = %e,
                    "Collection aborted, partial results written"
                );
                CollectionStatus::Incomplete {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                tracing::error!(collection = %self.key, error = %e, "Failed to write collection");
                CollectionStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        CollectionReport {
            key: self.key,
            records: self.records,
            files: self.files,
            status,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the archiver tests.

    use std::time::Duration;

    use super::OutputSink;
    use crate::application::paginator::Pacer;
    use crate::domain::{AppError, OutputUnit, Result};

    /// Keeps written units in memory; fails for names in `reject`.
    #[derive(Default)]
    pub struct MemorySink {
        pub units: Vec<OutputUnit>,
        pub reject: Vec<String>,
    }

    impl MemorySink {
        pub fn names(&self) -> Vec<&str> {
            self.units.iter().map(|u| u.name.as_str()).collect()
        }

        pub fn get(&self, name: &str) -> &OutputUnit {
            self.units
                .iter()
                .find(|u| u.name == name)
                .unwrap_or_else(|| panic!("no unit named {name}"))
        }
    }

    impl OutputSink for MemorySink {
        fn write_unit(&mut self, unit: &OutputUnit) -> Result<()> {
            if self.reject.iter().any(|r| *r == unit.name) {
                return Err(AppError::io(
                    format!("Failed to write {}", unit.name),
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.units.push(unit.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingPacer {
        pub pauses: Vec<Duration>,
    }

    impl Pacer for RecordingPacer {
        fn pause(&mut self, delay: Duration) {
            self.pauses.push(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use crate::application::batch::batch_all;
    use crate::domain::FormattedRecord;

    #[test]
    fn test_item_defects() {
        assert!(is_item_defect(&AppError::InvalidData {
            message: "missing ts".into()
        }));
        assert!(!is_item_defect(&AppError::api("Gmail", "rateLimitExceeded")));
    }

    #[test]
    fn test_incomplete_run_marks_file() {
        let mut sink = MemorySink::default();
        let mut run = CollectionRun::start(ArchiveKind::Chat, "general");
        run.record();

        let batch = batch_all("general", vec![FormattedRecord::new("r\n".into())], None)
            .pop()
            .unwrap();
        let error = AppError::api("Slack", "ratelimited");
        run.write(&mut sink, batch, Some(&error)).unwrap();

        let report = run.finish(Ok(Some(error)));
        assert_eq!(report.files, 1);
        assert_eq!(
            report.status,
            CollectionStatus::Incomplete {
                reason: "Slack API error: ratelimited".into()
            }
        );
        assert!(sink.units[0]
            .content
            .contains("# Status: incomplete - Slack API error: ratelimited\n"));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let mut sink = MemorySink {
            reject: vec!["general.txt".into()],
            ..MemorySink::default()
        };
        let mut run = CollectionRun::start(ArchiveKind::Chat, "general");
        let batch = batch_all("general", vec![FormattedRecord::new("r\n".into())], None)
            .pop()
            .unwrap();

        let outcome = run.write(&mut sink, batch, None).map(|()| None);
        let report = run.finish(outcome);
        assert!(matches!(report.status, CollectionStatus::Failed { .. }));
        assert_eq!(report.files, 0);
    }
}
