//! Email archiver.
//!
//! Enumerates message ids per collection, hydrates each message and streams
//! the formatted records into bounded batch files. The collections depend on
//! the configured mode.

use std::collections::HashMap;

use crate::domain::{
    AppError, ArchiveKind, ArchiveReport, CollectionReport, CollectionStatus, EmailConfig,
    EmailItem, EmailMode, EmailOptions, Result,
};

use super::archive::{is_item_defect, CollectionRun, OutputSink};
use super::batch::BatchWriter;
use super::extractor::{extract_content, ExtractOptions};
use super::formatter::format_email;
use super::paginator::{collect_partial, Pacer, Page, PageOptions, Paginator};

/// A mailbox label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailLabel {
    pub id: String,
    pub name: String,
}

/// Remote mail service.
pub trait MailApi {
    /// Every label in the mailbox.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn labels(&mut self) -> Result<Vec<MailLabel>>;

    /// One page of message ids matching the label filter and search query.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn message_ids(
        &mut self,
        label_ids: &[String],
        query: &str,
        cursor: Option<&str>,
    ) -> Result<Page<String>>;

    /// One fully hydrated message. Label ids are returned as-is.
    ///
    /// # Errors
    /// Returns error if the request fails or the payload is malformed.
    fn message(&mut self, id: &str) -> Result<EmailItem>;
}

/// One grouping key and the label filter that selects it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MailCollection {
    key: String,
    label_ids: Vec<String>,
}

/// Archives a mailbox.
pub struct EmailArchiver<A> {
    api: A,
    config: EmailConfig,
}

impl<A: MailApi> EmailArchiver<A> {
    pub const fn new(api: A, config: EmailConfig) -> Self {
        Self { api, config }
    }

    #[cfg(test)]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Archives every collection selected by the configured mode.
    ///
    /// # Errors
    /// Returns error if the search query cannot be built.
    pub fn run(&mut self, sink: &mut dyn OutputSink, pacer: &mut dyn Pacer) -> Result<ArchiveReport> {
        for option in self.config.ignored_overrides() {
            tracing::warn!(
                option,
                mode = %self.config.mode,
                "Option is only honoured in 'all' and 'query' modes, ignoring"
            );
        }

        let options = self.config.options();
        let query = self.config.search_query()?;
        tracing::info!(mode = %self.config.mode, query = %query, "Archiving mailbox");

        let label_names = self.label_names();
        let mut report = ArchiveReport::new(ArchiveKind::Email);

        for collection in self.collections(&label_names) {
            let collection = match collection {
                Ok(collection) => collection,
                Err(missing) => {
                    report.collections.push(missing);
                    continue;
                }
            };
            let result =
                self.archive_collection(&collection, &query, options, &label_names, sink, pacer);
            report.collections.push(result);
        }

        Ok(report)
    }

    /// Label id to display name. Falls back to raw ids when listing fails.
    fn label_names(&mut self) -> HashMap<String, String> {
        match self.api.labels() {
            Ok(labels) => labels.into_iter().map(|l| (l.id, l.name)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not list labels, showing label ids");
                HashMap::new()
            }
        }
    }

    /// Collections for the mode. A configured label that does not exist
    /// yields a failed report instead.
    fn collections(
        &self,
        label_names: &HashMap<String, String>,
    ) -> Vec<std::result::Result<MailCollection, CollectionReport>> {
        let single = |key: &str, label: Option<&str>| {
            vec![Ok(MailCollection {
                key: key.to_string(),
                label_ids: label.map(|l| vec![l.to_string()]).unwrap_or_default(),
            })]
        };

        match self.config.mode {
            EmailMode::Inbox => single("INBOX", Some("INBOX")),
            EmailMode::Sent => single("SENT", Some("SENT")),
            EmailMode::All => single("all_mail", None),
            EmailMode::Query => single("search", None),
            EmailMode::Labels => self
                .config
                .labels
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(|wanted| {
                    label_names
                        .iter()
                        .find(|(id, name)| *id == wanted || name.eq_ignore_ascii_case(wanted))
                        .map(|(id, name)| MailCollection {
                            key: name.clone(),
                            label_ids: vec![id.clone()],
                        })
                        .ok_or_else(|| {
                            tracing::warn!(label = wanted, "Label not found in mailbox");
                            CollectionReport {
                                key: wanted.to_string(),
                                records: 0,
                                files: 0,
                                status: CollectionStatus::Failed {
                                    reason: format!("label '{wanted}' not found"),
                                },
                            }
                        })
                })
                .collect(),
        }
    }

    fn archive_collection(
        &mut self,
        collection: &MailCollection,
        query: &str,
        options: EmailOptions,
        label_names: &HashMap<String, String>,
        sink: &mut dyn OutputSink,
        pacer: &mut dyn Pacer,
    ) -> CollectionReport {
        let mut run = CollectionRun::start(ArchiveKind::Email, collection.key.as_str());
        let outcome =
            self.stream_collection(&mut run, collection, query, options, label_names, sink, pacer);
        run.finish(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn stream_collection(
        &mut self,
        run: &mut CollectionRun,
        collection: &MailCollection,
        query: &str,
        options: EmailOptions,
        label_names: &HashMap<String, String>,
        sink: &mut dyn OutputSink,
        pacer: &mut dyn Pacer,
    ) -> Result<Option<AppError>> {
        let delay = self.config.delay();
        // The label listing always precedes the first id page.
        pacer.pause(delay);
        let api = &mut self.api;
        let (ids, mut failure) = collect_partial(Paginator::new(
            |cursor: Option<&str>| api.message_ids(&collection.label_ids, query, cursor),
            &mut *pacer,
            PageOptions::new(delay, self.config.max_results),
        ));
        tracing::debug!(collection = %collection.key, messages = ids.len(), "Listed messages");

        let extract = ExtractOptions {
            preserve_markup: options.include_html,
        };
        let mut writer = BatchWriter::new(collection.key.as_str(), Some(self.config.batch_size));

        for id in &ids {
            pacer.pause(delay);
            let mut item = match self.api.message(id) {
                Ok(item) => item,
                Err(e) if is_item_defect(&e) => {
                    tracing::warn!(message = %id, error = %e, "Skipping malformed message");
                    continue;
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    break;
                }
            };

            for label in &mut item.meta.labels {
                if let Some(name) = label_names.get(label.as_str()) {
                    label.clone_from(name);
                }
            }

            let content = extract_content(&item.content, extract);
            run.record();
            if let Some(batch) = writer.push(format_email(&item, &content)) {
                run.write(sink, batch, None)?;
            }
        }

        if let Some(batch) = writer.finish() {
            run.write(sink, batch, failure.as_ref())?;
        }

        Ok(failure)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::application::archive::testing::{MemorySink, RecordingPacer};
    use crate::domain::{ContentPart, EmailMeta, RawItem};

    #[derive(Default)]
    struct FakeMail {
        ids: Vec<String>,
        page_size: usize,
        /// Message id that fails with a service error.
        broken: Option<String>,
        /// Message id whose payload is malformed.
        malformed: Option<String>,
        queries: Vec<(Vec<String>, String)>,
        fetched: usize,
    }

    impl FakeMail {
        fn with_messages(count: usize) -> Self {
            Self {
                ids: (0..count).map(|n| format!("m{n:03}")).collect(),
                page_size: 40,
                ..Self::default()
            }
        }
    }

    impl MailApi for FakeMail {
        fn labels(&mut self) -> Result<Vec<MailLabel>> {
            Ok(vec![
                MailLabel {
                    id: "INBOX".into(),
                    name: "INBOX".into(),
                },
                MailLabel {
                    id: "Label_7".into(),
                    name: "Work/Projects".into(),
                },
            ])
        }

        fn message_ids(
            &mut self,
            label_ids: &[String],
            query: &str,
            cursor: Option<&str>,
        ) -> Result<Page<String>> {
            self.queries.push((label_ids.to_vec(), query.to_string()));
            let start: usize = cursor.map_or(0, |c| c.parse().unwrap());
            let end = (start + self.page_size).min(self.ids.len());
            let next = (end < self.ids.len()).then(|| end.to_string());
            Ok(Page::new(self.ids[start..end].to_vec(), next))
        }

        fn message(&mut self, id: &str) -> Result<EmailItem> {
            self.fetched += 1;
            if self.broken.as_deref() == Some(id) {
                return Err(AppError::api("Gmail", "backendError"));
            }
            if self.malformed.as_deref() == Some(id) {
                return Err(AppError::InvalidData {
                    message: "missing payload".into(),
                });
            }
            Ok(RawItem {
                id: id.to_string(),
                timestamp: DateTime::from_timestamp(1_700_000_000, 0),
                content: ContentPart::text(format!("body of {id}")),
                meta: EmailMeta {
                    subject: Some(format!("Subject {id}")),
                    labels: vec!["INBOX".into(), "Label_7".into()],
                    ..EmailMeta::default()
                },
            })
        }
    }

    #[test]
    fn test_inbox_batches_and_labels() {
        let mut sink = MemorySink::default();
        let mut pacer = RecordingPacer::default();
        let mut archiver = EmailArchiver::new(FakeMail::with_messages(250), EmailConfig::default());
        let report = archiver.run(&mut sink, &mut pacer).unwrap();

        assert_eq!(
            sink.names(),
            vec!["INBOX_001.txt", "INBOX_002.txt", "INBOX_003.txt"]
        );
        assert!(sink.get("INBOX_003.txt").content.contains("# Records: 50\n"));
        assert!(sink
            .get("INBOX_001.txt")
            .content
            .contains("Labels: INBOX, Work/Projects\n"));
        assert_eq!(report.total_records(), 250);
        assert_eq!(report.total_files(), 3);

        let (labels, query) = &archiver.api().queries[0];
        assert_eq!(labels, &vec!["INBOX".to_string()]);
        assert_eq!(query, "-category:promotions");

        // One pause ahead of the id listing, six between its seven pages and
        // one per hydrated message.
        assert_eq!(pacer.pauses.len(), 1 + 6 + 250);
    }

    #[test]
    fn test_malformed_message_is_skipped() {
        let api = FakeMail {
            malformed: Some("m001".into()),
            ..FakeMail::with_messages(3)
        };
        let mut sink = MemorySink::default();
        let report = EmailArchiver::new(api, EmailConfig::default())
            .run(&mut sink, &mut RecordingPacer::default())
            .unwrap();

        assert_eq!(report.total_records(), 2);
        assert_eq!(report.collections[0].status, CollectionStatus::Complete);
        assert!(!sink.get("INBOX.txt").content.contains("Message-ID: m001"));
    }

    #[test]
    fn test_service_error_aborts_with_partial_file() {
        let api = FakeMail {
            broken: Some("m002".into()),
            ..FakeMail::with_messages(5)
        };
        let mut sink = MemorySink::default();
        let mut archiver = EmailArchiver::new(api, EmailConfig::default());
        let report = archiver
            .run(&mut sink, &mut RecordingPacer::default())
            .unwrap();

        assert_eq!(archiver.api().fetched, 3);
        assert_eq!(report.total_records(), 2);
        let content = &sink.get("INBOX.txt").content;
        assert!(content.contains("# Records: 2\n"));
        assert!(content.contains("# Status: incomplete - Gmail API error: backendError\n"));
    }

    #[test]
    fn test_labels_mode_uses_label_names_and_reports_missing() {
        let config = EmailConfig {
            mode: EmailMode::Labels,
            labels: vec!["work/projects".into(), "Nope".into()],
            include_html: Some(true),
            ..EmailConfig::default()
        };
        let mut sink = MemorySink::default();
        let mut archiver = EmailArchiver::new(FakeMail::with_messages(2), config);
        let report = archiver
            .run(&mut sink, &mut RecordingPacer::default())
            .unwrap();

        assert_eq!(sink.names(), vec!["Work_Projects.txt"]);
        assert!(sink
            .get("Work_Projects.txt")
            .content
            .contains("# Source: Work/Projects\n"));
        assert_eq!(archiver.api().queries[0].0, vec!["Label_7".to_string()]);
        assert_eq!(archiver.api().queries[0].1, "");
        assert!(matches!(
            report.collections[1].status,
            CollectionStatus::Failed { .. }
        ));
    }

    #[test]
    fn test_max_results_limits_hydration() {
        let config = EmailConfig {
            max_results: Some(45),
            ..EmailConfig::default()
        };
        let mut archiver = EmailArchiver::new(FakeMail::with_messages(100), config);
        let report = archiver
            .run(&mut MemorySink::default(), &mut RecordingPacer::default())
            .unwrap();

        assert_eq!(report.total_records(), 45);
        assert_eq!(archiver.api().fetched, 45);
        assert_eq!(archiver.api().queries.len(), 2);
    }
}
