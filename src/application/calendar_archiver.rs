//! Calendar archiver.
//!
//! Collects each calendar's events in the configured window, groups them by
//! start month and writes every group as one or more batch files.

use crate::domain::{
    AppError, ArchiveKind, ArchiveReport, CalendarConfig, CollectionReport, DateRange, EventItem,
    Result,
};

use super::archive::{CollectionRun, OutputSink};
use super::batch::{batch_all, group_events_by_month};
use super::extractor::{extract_content, ExtractOptions};
use super::formatter::format_event;
use super::paginator::{collect_partial, Pacer, Page, PageOptions, Paginator};

/// Remote calendar service.
pub trait CalendarApi {
    /// Display name of a calendar.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn calendar_name(&mut self, calendar_id: &str) -> Result<String>;

    /// One page of expanded events inside `window`, ordered by start.
    ///
    /// # Errors
    /// Returns error if the request fails.
    fn events(
        &mut self,
        calendar_id: &str,
        window: DateRange,
        cursor: Option<&str>,
    ) -> Result<Page<EventItem>>;
}

/// Archives calendars.
pub struct CalendarArchiver<A> {
    api: A,
    config: CalendarConfig,
}

impl<A: CalendarApi> CalendarArchiver<A> {
    pub const fn new(api: A, config: CalendarConfig) -> Self {
        Self { api, config }
    }

    /// Archives every configured calendar.
    ///
    /// # Errors
    /// Returns error if the time window is invalid.
    pub fn run(&mut self, sink: &mut dyn OutputSink, pacer: &mut dyn Pacer) -> Result<ArchiveReport> {
        let window = self.config.window()?;
        let mut report = ArchiveReport::new(ArchiveKind::Calendar);

        let calendars: Vec<String> = self
            .config
            .calendars
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        for (position, calendar_id) in calendars.iter().enumerate() {
            if position > 0 {
                pacer.pause(self.config.delay());
            }
            let collection = self.archive_calendar(calendar_id, window, sink, pacer);
            report.collections.push(collection);
        }

        Ok(report)
    }

    fn archive_calendar(
        &mut self,
        calendar_id: &str,
        window: DateRange,
        sink: &mut dyn OutputSink,
        pacer: &mut dyn Pacer,
    ) -> CollectionReport {
        let name = match self.api.calendar_name(calendar_id) {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => calendar_id.to_string(),
            Err(e) => {
                tracing::warn!(calendar = calendar_id, error = %e, "Could not resolve calendar name");
                calendar_id.to_string()
            }
        };

        let mut run = CollectionRun::start(ArchiveKind::Calendar, name.as_str());

        pacer.pause(self.config.delay());
        let api = &mut self.api;
        let (events, failure) = collect_partial(Paginator::new(
            |cursor: Option<&str>| api.events(calendar_id, window, cursor),
            &mut *pacer,
            PageOptions::new(self.config.delay(), self.config.max_results),
        ));

        let outcome = self.write_groups(&mut run, &name, events, failure.as_ref(), sink);
        run.finish(outcome.map(|()| failure))
    }

    fn write_groups(
        &self,
        run: &mut CollectionRun,
        calendar: &str,
        events: Vec<EventItem>,
        failure: Option<&AppError>,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let options = ExtractOptions {
            preserve_markup: self.config.include_markup,
        };

        for (key, group) in group_events_by_month(calendar, events) {
            let records: Vec<_> = group
                .iter()
                .map(|event| {
                    run.record();
                    format_event(event, &extract_content(&event.content, options))
                })
                .collect();

            for batch in batch_all(&key, records, Some(self.config.batch_size)) {
                run.write(sink, batch, failure)?;
            }
        }

        Ok(())
    }
}
