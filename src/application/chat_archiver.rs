//! Chat archiver.
//!
//! Writes one file per conversation with messages in timestamp order. Thread
//! replies are pulled in when configured and carry their parent id.

use crate::domain::{
    AppError, ArchiveKind, ArchiveReport, ChatConfig, ChatItem, CollectionReport, FormattedRecord,
    Result,
};

use super::archive::{CollectionRun, OutputSink};
use super::batch::batch_all;
use super::extractor::{extract_content, ExtractOptions};
use super::formatter::format_chat_message;
use super::identity::{IdentityCache, IdentitySource};
use super::paginator::{collect_partial, Pacer, Page, PageOptions, Paginator};

/// A conversation as listed by the chat service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
}

impl Conversation {
    /// Grouping key used for the output file.
    #[must_use]
    pub fn key(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    fn matches(&self, wanted: &str) -> bool {
        let wanted = wanted.trim().trim_start_matches('#');
        self.id == wanted || self.name.eq_ignore_ascii_case(wanted)
    }
}

/// Remote chat service.
pub trait ChatApi: IdentitySource {
    /// One page of conversations.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn conversations(&mut self, cursor: Option<&str>) -> Result<Page<Conversation>>;

    /// One page of a conversation's top-level messages.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn history(&mut self, conversation_id: &str, cursor: Option<&str>) -> Result<Page<ChatItem>>;

    /// One page of a thread's replies, parent excluded or not.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn replies(
        &mut self,
        conversation_id: &str,
        thread_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<ChatItem>>;
}

/// Archives chat conversations.
pub struct ChatArchiver<A> {
    api: A,
    config: ChatConfig,
}

impl<A: ChatApi> ChatArchiver<A> {
    pub const fn new(api: A, config: ChatConfig) -> Self {
        Self { api, config }
    }

    #[cfg(test)]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Archives every selected conversation.
    ///
    /// A conversation whose enumeration fails is written partially and marked
    /// incomplete; the run continues with the next one.
    ///
    /// # Errors
    /// Returns error if no conversation could be listed at all.
    pub fn run(&mut self, sink: &mut dyn OutputSink, pacer: &mut dyn Pacer) -> Result<ArchiveReport> {
        let conversations = self.select_conversations(pacer)?;
        tracing::info!(count = conversations.len(), "Archiving conversations");

        let mut identities = IdentityCache::new();
        let mut report = ArchiveReport::new(ArchiveKind::Chat);

        for conversation in &conversations {
            let collection = self.archive_conversation(conversation, &mut identities, sink, pacer);
            report.collections.push(collection);
        }

        report.identity_lookups = identities.lookups();
        Ok(report)
    }

    fn select_conversations(&mut self, pacer: &mut dyn Pacer) -> Result<Vec<Conversation>> {
        let api = &mut self.api;
        let pages = Paginator::new(
            |cursor: Option<&str>| api.conversations(cursor),
            &mut *pacer,
            PageOptions::new(self.config.delay(), None),
        );

        let (mut conversations, error) = collect_partial(pages);
        if let Some(e) = error {
            if conversations.is_empty() {
                return Err(e);
            }
            tracing::warn!(error = %e, "Conversation listing cut short, continuing with partial list");
        }

        if !self.config.conversations.is_empty() {
            conversations.retain(|c| self.config.conversations.iter().any(|w| c.matches(w)));
            for wanted in &self.config.conversations {
                if !conversations.iter().any(|c| c.matches(wanted)) {
                    tracing::warn!(conversation = %wanted, "Configured conversation not found");
                }
            }
        }

        Ok(conversations)
    }

    fn archive_conversation(
        &mut self,
        conversation: &Conversation,
        identities: &mut IdentityCache,
        sink: &mut dyn OutputSink,
        pacer: &mut dyn Pacer,
    ) -> CollectionReport {
        let mut run = CollectionRun::start(ArchiveKind::Chat, conversation.key());

        let (mut messages, failure) = self.fetch_messages(conversation, pacer);
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let options = ExtractOptions {
            preserve_markup: self.config.include_markup,
        };
        let records: Vec<FormattedRecord> = messages
            .iter()
            .map(|message| {
                let content = extract_content(&message.content, options);
                run.record();
                format_chat_message(message, &content, identities, &mut self.api)
            })
            .collect();

        let outcome = batch_all(run.key(), records, None)
            .into_iter()
            .try_for_each(|batch| run.write(sink, batch, failure.as_ref()))
            .map(|()| failure);

        run.finish(outcome)
    }

    /// Top-level messages plus, when enabled, thread replies.
    fn fetch_messages(
        &mut self,
        conversation: &Conversation,
        pacer: &mut dyn Pacer,
    ) -> (Vec<ChatItem>, Option<AppError>) {
        // The conversation listing always precedes the first history page.
        pacer.pause(self.config.delay());
        let options = PageOptions::new(self.config.delay(), self.config.max_messages);
        let api = &mut self.api;
        let (mut messages, failure) = collect_partial(Paginator::new(
            |cursor: Option<&str>| api.history(&conversation.id, cursor),
            &mut *pacer,
            options,
        ));

        if failure.is_some() || !self.config.include_threads {
            return (messages, failure);
        }

        let parents: Vec<String> = messages
            .iter()
            .filter(|m| m.meta.reply_count > 0 && m.meta.parent_id.is_none())
            .map(|m| m.id.clone())
            .collect();

        for parent in parents {
            pacer.pause(self.config.delay());
            let api = &mut self.api;
            let (replies, error) = collect_partial(Paginator::new(
                |cursor: Option<&str>| api.replies(&conversation.id, &parent, cursor),
                &mut *pacer,
                PageOptions::new(self.config.delay(), None),
            ));

            messages.extend(replies.into_iter().filter(|r| r.id != parent).map(|mut r| {
                r.meta.parent_id = Some(parent.clone());
                r
            }));

            if let Some(e) = error {
                return (messages, Some(e));
            }
        }

        (messages, None)
    }
}
