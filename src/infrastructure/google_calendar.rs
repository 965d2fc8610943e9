//! Google Calendar API adapter.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::application::{CalendarApi, Page};
use crate::domain::{
    Attendee, ContentPart, DateRange, EventItem, EventMeta, EventTime, RawItem, Result,
};

use super::http::ApiClient;

pub const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct CalendarInfo {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    html_link: Option<String>,
    #[serde(default)]
    start: Option<EventDate>,
    #[serde(default)]
    end: Option<EventDate>,
    #[serde(default)]
    organizer: Option<Person>,
    #[serde(default)]
    attendees: Vec<Person>,
    #[serde(default)]
    recurrence: Vec<String>,
    #[serde(default)]
    recurring_event_id: Option<String>,
    #[serde(default)]
    attachments: Vec<EventAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDate {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_time: Option<String>,
}

impl EventDate {
    fn parse(&self) -> Option<EventTime> {
        if let Some(dt) = self.date_time.as_deref() {
            return DateTime::parse_from_rfc3339(dt)
                .ok()
                .map(|d| EventTime::DateTime(d.with_timezone(&Utc)));
        }
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(EventTime::Date)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    response_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventAttachment {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

fn convert_event(event: Event) -> EventItem {
    let start = event.start.as_ref().and_then(EventDate::parse);
    let end = event.end.as_ref().and_then(EventDate::parse);

    let mut parts = Vec::new();
    if let Some(description) = event.description.filter(|d| !d.trim().is_empty()) {
        parts.push(ContentPart::html(description));
    }
    for attachment in event.attachments {
        parts.push(ContentPart::attachment(
            attachment.title.unwrap_or_else(|| "unnamed file".to_string()),
            attachment.mime_type.unwrap_or_default(),
            0,
        ));
    }

    let recurrence = if event.recurrence.is_empty() {
        event
            .recurring_event_id
            .map(|id| vec![format!("instance of {id}")])
            .unwrap_or_default()
    } else {
        event.recurrence
    };

    let organizer = event
        .organizer
        .and_then(|o| o.display_name.or(o.email));

    let attendees = event
        .attendees
        .into_iter()
        .map(|p| Attendee {
            name: p.display_name,
            email: p.email,
            response: p.response_status,
        })
        .collect();

    RawItem {
        id: event.id,
        timestamp: start.and_then(|s| s.instant()),
        content: ContentPart::multipart("mixed", parts),
        meta: EventMeta {
            title: event.summary,
            start,
            end,
            status: event.status,
            organizer,
            location: event.location,
            recurrence,
            attendees,
            link: event.html_link,
        },
    }
}

/// Google Calendar API client.
pub struct CalendarClient {
    http: ApiClient,
    page_size: u32,
}

impl CalendarClient {
    #[must_use]
    pub const fn new(http: ApiClient, page_size: u32) -> Self {
        Self { http, page_size }
    }
}

impl CalendarApi for CalendarClient {
    fn calendar_name(&mut self, calendar_id: &str) -> Result<String> {
        let info: CalendarInfo = self.http.get_json(&["calendars", calendar_id], &[])?;
        Ok(info.summary.unwrap_or_else(|| calendar_id.to_string()))
    }

    fn events(
        &mut self,
        calendar_id: &str,
        window: DateRange,
        cursor: Option<&str>,
    ) -> Result<Page<EventItem>> {
        let mut params: Vec<(&str, String)> = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", self.page_size.to_string()),
        ];
        if let Some(after) = window.after {
            params.push(("timeMin", format!("{after}T00:00:00Z")));
        }
        if let Some(before) = window.before {
            params.push(("timeMax", format!("{before}T00:00:00Z")));
        }
        if let Some(cursor) = cursor {
            params.push(("pageToken", cursor.to_string()));
        }

        let list: EventList = self
            .http
            .get_json(&["calendars", calendar_id, "events"], &params)?;
        Ok(Page::new(
            list.items.into_iter().map(convert_event).collect(),
            list.next_page_token,
        ))
    }
}
