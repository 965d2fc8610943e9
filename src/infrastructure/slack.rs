//! Slack Web API adapter.
//!
//! Maps `conversations.*` and `users.info` responses onto chat items. Slack's
//! angle-bracket markup is rewritten to plain text here, before the content
//! reaches the tag stripper.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::application::{ChatApi, Conversation, IdentitySource, Page};
use crate::domain::{AppError, ChatItem, ChatMeta, ContentPart, RawItem, Result};

use super::http::ApiClient;

pub const SLACK_API_URL: &str = "https://slack.com/api";
const SERVICE: &str = "Slack";

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex must compile")
}

/// `<@U1>`, `<#C1|name>`, `<!here>`, `<!subteam^S1|@team>`.
static SPECIAL_MENTION: Lazy<Regex> =
    Lazy::new(|| compile(r"<([@#!])([^<>|]+)(?:\|([^<>]*))?>"));
/// `<https://example.com|label>`.
static LABELLED_LINK: Lazy<Regex> = Lazy::new(|| compile(r"<([^<>|\s]+)\|([^<>]+)>"));
/// `<https://example.com>`, `<mailto:a@b.c>`.
static BARE_LINK: Lazy<Regex> = Lazy::new(|| compile(r"<([a-z][a-z0-9+.-]*:[^<>\s]+)>"));

/// Rewrite Slack markup to readable text.
#[must_use]
pub fn rewrite_markup(text: &str) -> String {
    let text = SPECIAL_MENTION.replace_all(text, |caps: &Captures| {
        let sigil = &caps[1];
        let target = &caps[2];
        let label = caps.get(3).map(|m| m.as_str()).filter(|l| !l.is_empty());
        match (sigil, label) {
            ("!", Some(label)) => label.to_string(),
            ("!", None) => format!("@{}", target.split('^').next().unwrap_or(target)),
            ("@", Some(label)) => format!("@{}", label.trim_start_matches('@')),
            ("#", Some(label)) => format!("#{}", label.trim_start_matches('#')),
            (sigil, None) => format!("{sigil}{target}"),
            (_, Some(label)) => label.to_string(),
        }
    });
    let text = LABELLED_LINK.replace_all(&text, |caps: &Captures| {
        let url = &caps[1];
        let label = &caps[2];
        if label == url {
            url.to_string()
        } else {
            format!("{label} ({url})")
        }
    });
    BARE_LINK.replace_all(&text, "$1").into_owned()
}

#[derive(Debug, Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_im: bool,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct Message {
    ts: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    bot_profile: Option<BotProfile>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    reply_count: u32,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    files: Vec<File>,
    #[serde(default)]
    attachments: Vec<LegacyAttachment>,
}

#[derive(Debug, Deserialize)]
struct BotProfile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct LegacyAttachment {
    #[serde(default)]
    pretext: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    fallback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: User,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

impl User {
    fn display_name(self) -> Option<String> {
        let profile = self.profile.unwrap_or(Profile {
            display_name: None,
            real_name: None,
        });
        [profile.real_name, self.real_name, profile.display_name, self.name]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
    }
}

/// Checks the `ok` flag and decodes the payload.
fn parse_response<T: DeserializeOwned>(value: Value) -> Result<T> {
    if value.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(AppError::api(SERVICE, error));
    }
    serde_json::from_value(value).map_err(AppError::json_parse)
}

fn next_cursor(meta: ResponseMetadata) -> Option<String> {
    meta.next_cursor.filter(|c| !c.is_empty())
}

/// Slack `ts` values are `seconds.micros`.
fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{frac:0<6}").get(..6)?.parse().ok()?;
    DateTime::from_timestamp(secs, micros * 1000)
}

fn convert_channel(channel: Channel) -> Conversation {
    let name = match (channel.name, channel.is_im, channel.user) {
        (Some(name), _, _) if !name.is_empty() => name,
        (_, true, Some(user)) => format!("dm_{user}"),
        _ => channel.id.clone(),
    };
    Conversation {
        id: channel.id,
        name,
    }
}

fn convert_message(raw: Value) -> Result<ChatItem> {
    let message: Message = serde_json::from_value(raw).map_err(AppError::json_parse)?;
    let timestamp = parse_ts(&message.ts).ok_or_else(|| AppError::InvalidData {
        message: format!("unparseable message ts '{}'", message.ts),
    })?;

    let mut parts = Vec::new();
    if !message.text.trim().is_empty() {
        parts.push(ContentPart::text(rewrite_markup(&message.text)));
    }

    for attachment in &message.attachments {
        let mut texts: Vec<ContentPart> = [&attachment.pretext, &attachment.title, &attachment.text]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .map(|t| ContentPart::text(rewrite_markup(t)))
            .collect();
        if texts.is_empty() {
            if let Some(fallback) = attachment.fallback.as_deref() {
                texts.push(ContentPart::text(rewrite_markup(fallback)));
            }
        }
        if !texts.is_empty() {
            parts.push(ContentPart::multipart("mixed", texts));
        }
    }

    for file in message.files {
        let name = file
            .name
            .or(file.title)
            .unwrap_or_else(|| "unnamed file".to_string());
        parts.push(ContentPart::attachment(
            name,
            file.mimetype.unwrap_or_default(),
            file.size,
        ));
    }

    let sender_label = message
        .username
        .or_else(|| message.bot_profile.and_then(|b| b.name))
        .or(message.bot_id);
    let parent_id = message.thread_ts.filter(|t| *t != message.ts);

    Ok(RawItem {
        id: message.ts,
        timestamp: Some(timestamp),
        content: ContentPart::multipart("mixed", parts),
        meta: ChatMeta {
            sender_id: message.user,
            sender_label,
            subtype: message.subtype,
            reply_count: message.reply_count,
            parent_id,
        },
    })
}

/// Converts a page of raw messages, skipping malformed ones.
fn convert_messages(list: MessageList) -> Page<ChatItem> {
    let items = list
        .messages
        .into_iter()
        .filter_map(|raw| match convert_message(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed message");
                None
            }
        })
        .collect();
    Page::new(items, next_cursor(list.response_metadata))
}

/// Slack Web API client.
pub struct SlackClient {
    http: ApiClient,
    page_size: u32,
    types: String,
}

impl SlackClient {
    #[must_use]
    pub const fn new(http: ApiClient, page_size: u32, types: String) -> Self {
        Self {
            http,
            page_size,
            types,
        }
    }

    fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T> {
        let value: Value = self.http.get_json(&[method], query)?;
        parse_response(value)
    }

    fn paged_query<'a>(
        &self,
        mut query: Vec<(&'a str, String)>,
        cursor: Option<&str>,
    ) -> Vec<(&'a str, String)> {
        query.push(("limit", self.page_size.to_string()));
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        query
    }
}

impl IdentitySource for SlackClient {
    fn lookup(&mut self, id: &str) -> Result<Option<String>> {
        match self.call::<UserInfo>("users.info", &[("user", id.to_string())]) {
            Ok(info) => Ok(info.user.display_name()),
            Err(AppError::Api { message, .. }) if message == "user_not_found" => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ChatApi for SlackClient {
    fn conversations(&mut self, cursor: Option<&str>) -> Result<Page<Conversation>> {
        let query = self.paged_query(
            vec![
                ("types", self.types.clone()),
                ("exclude_archived", "false".to_string()),
            ],
            cursor,
        );
        let list: ChannelList = self.call("conversations.list", &query)?;
        Ok(Page::new(
            list.channels.into_iter().map(convert_channel).collect(),
            next_cursor(list.response_metadata),
        ))
    }

    fn history(&mut self, conversation_id: &str, cursor: Option<&str>) -> Result<Page<ChatItem>> {
        let query = self.paged_query(vec![("channel", conversation_id.to_string())], cursor);
        let list: MessageList = self.call("conversations.history", &query)?;
        Ok(convert_messages(list))
    }

    fn replies(
        &mut self,
        conversation_id: &str,
        thread_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<ChatItem>> {
        let query = self.paged_query(
            vec![
                ("channel", conversation_id.to_string()),
                ("ts", thread_id.to_string()),
            ],
            cursor,
        );
        let list: MessageList = self.call("conversations.replies", &query)?;
        Ok(convert_messages(list))
    }
}
