//! Gmail API adapter.
//!
//! Message payloads arrive as a MIME part tree with base64url bodies; they map
//! one-to-one onto [`ContentPart`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::application::{MailApi, MailLabel, Page};
use crate::domain::{AppError, ContentPart, EmailItem, EmailMeta, RawItem, Result};

use super::http::ApiClient;

pub const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    label_ids: Vec<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    internal_date: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    data: Option<String>,
}

/// Decodes a base64url body, padded or not.
fn decode_body(data: &str) -> Result<String> {
    let trimmed = data.trim().trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| AppError::InvalidData {
            message: format!("invalid base64url body: {e}"),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .filter(|v| !v.trim().is_empty())
}

fn convert_part(part: MessagePart) -> ContentPart {
    let (size, data) = part.body.map_or((0, None), |b| (b.size, b.data));
    let body = data.and_then(|d| match decode_body(&d) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(mime = %part.mime_type, error = %e, "Dropping undecodable body");
            None
        }
    });

    ContentPart {
        mime_type: part.mime_type,
        filename: Some(part.filename).filter(|f| !f.trim().is_empty()),
        size,
        body,
        parts: part.parts.into_iter().map(convert_part).collect(),
    }
}

fn parse_internal_date(ms: &str) -> Option<DateTime<Utc>> {
    ms.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn convert_message(message: Message) -> Result<EmailItem> {
    let mut payload = message.payload.ok_or_else(|| AppError::InvalidData {
        message: format!("message {} has no payload", message.id),
    })?;
    let headers = std::mem::take(&mut payload.headers);

    let timestamp = message
        .internal_date
        .as_deref()
        .and_then(parse_internal_date)
        .or_else(|| {
            header(&headers, "Date")
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc))
        });

    let meta = EmailMeta {
        thread_id: message.thread_id,
        from: header(&headers, "From").map(String::from),
        to: header(&headers, "To").map(String::from),
        cc: header(&headers, "Cc").map(String::from),
        subject: header(&headers, "Subject").map(String::from),
        labels: message.label_ids,
    };

    Ok(RawItem {
        id: message.id,
        timestamp,
        content: convert_part(payload),
        meta,
    })
}

/// Gmail API client for the authenticated user's mailbox.
pub struct GmailClient {
    http: ApiClient,
    page_size: u32,
}

impl GmailClient {
    #[must_use]
    pub const fn new(http: ApiClient, page_size: u32) -> Self {
        Self { http, page_size }
    }
}

impl MailApi for GmailClient {
    fn labels(&mut self) -> Result<Vec<MailLabel>> {
        let list: LabelList = self.http.get_json(&["users", "me", "labels"], &[])?;
        Ok(list
            .labels
            .into_iter()
            .map(|l| MailLabel {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    fn message_ids(
        &mut self,
        label_ids: &[String],
        query: &str,
        cursor: Option<&str>,
    ) -> Result<Page<String>> {
        let mut params: Vec<(&str, String)> = label_ids
            .iter()
            .map(|id| ("labelIds", id.clone()))
            .collect();
        params.push(("maxResults", self.page_size.to_string()));
        if !query.is_empty() {
            params.push(("q", query.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("pageToken", cursor.to_string()));
        }

        let list: MessageList = self.http.get_json(&["users", "me", "messages"], &params)?;
        Ok(Page::new(
            list.messages.into_iter().map(|m| m.id).collect(),
            list.next_page_token,
        ))
    }

    fn message(&mut self, id: &str) -> Result<EmailItem> {
        let message: Message = self.http.get_json(
            &["users", "me", "messages", id],
            &[("format", "full".to_string())],
        )?;
        convert_message(message)
    }
}
