//! Slack Web API adapter (token check, channel listing, history export).
//!
//! All calls go through [`SlackClient::call`], which maps transport and API
//! failures into the core error type. Credential failures become
//! `Error::Auth` so the binary can fail a run before any send attempt.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use sedigest_core::{
    domain::{Channel, ChannelId, Message, UserId},
    errors::Error,
    Result,
};

const API_BASE: &str = "https://slack.com/api";
const PAGE_LIMIT: &str = "200";

/// Slack error strings that mean the token itself is bad.
const AUTH_ERRORS: &[&str] = &[
    "not_authed",
    "invalid_auth",
    "token_revoked",
    "token_expired",
    "account_inactive",
];

/// Besides plain user messages, only these announcement subtypes are kept.
const ANNOUNCEMENT_SUBTYPES: &[&str] = &["channel_join", "channel_topic", "file_share"];

#[derive(Clone, Debug)]
pub struct SlackClient {
    token: String,
    http: reqwest::Client,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            token: token.into(),
            http,
        }
    }

    /// Validate the token before doing anything else.
    pub async fn auth_test(&self) -> Result<()> {
        let resp: AuthTestResponse = self.call("auth.test", &[]).await?;
        check_ok("auth.test", resp.ok, resp.error)?;
        tracing::debug!(
            team = resp.team.as_deref().unwrap_or(""),
            user = resp.user.as_deref().unwrap_or(""),
            "token accepted"
        );
        Ok(())
    }

    /// List public, non-archived channels.
    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("limit", PAGE_LIMIT.to_string()),
                ("exclude_archived", "true".to_string()),
                ("types", "public_channel".to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let resp: ChannelsResponse = self.call("conversations.list", &params).await?;
            check_ok("conversations.list", resp.ok, resp.error)?;

            channels.extend(resp.channels.into_iter().map(|c| Channel {
                id: ChannelId(c.id),
                name: c.name,
            }));

            cursor = next_cursor(resp.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        Ok(channels)
    }

    /// Map user ids to display names (display name, then real name, then
    /// the login name).
    pub async fn list_users(&self) -> Result<HashMap<String, String>> {
        let mut users = HashMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let resp: UsersResponse = self.call("users.list", &params).await?;
            check_ok("users.list", resp.ok, resp.error)?;

            for member in resp.members {
                users.insert(member.id.clone(), display_name(member));
            }

            cursor = next_cursor(resp.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        Ok(users)
    }

    /// Fetch one channel's history within `[oldest, latest)`, following the
    /// pagination cursor until the window is exhausted.
    pub async fn channel_history(
        &self,
        channel: &ChannelId,
        oldest: f64,
        latest: f64,
    ) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("channel", channel.0.clone()),
                ("limit", PAGE_LIMIT.to_string()),
                ("oldest", format!("{oldest:.6}")),
                ("latest", format!("{latest:.6}")),
                ("inclusive", "true".to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let resp: HistoryResponse = self.call("conversations.history", &params).await?;
            check_ok("conversations.history", resp.ok, resp.error)?;

            for raw in resp.messages {
                if let Some(msg) = convert_message(channel, raw) {
                    out.push(msg);
                }
            }

            cursor = next_cursor(resp.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(channel = %channel.0, count = out.len(), "history fetched");
        Ok(out)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{API_BASE}/{method}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("slack {method} request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "slack {method} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Fetch(format!("slack {method} json error: {e}")))
    }
}

fn check_ok(method: &str, ok: bool, error: Option<String>) -> Result<()> {
    if ok {
        return Ok(());
    }

    let err = error.unwrap_or_else(|| "unknown_error".to_string());
    if AUTH_ERRORS.contains(&err.as_str()) {
        return Err(Error::Auth(format!("slack {method} rejected token: {err}")));
    }
    Err(Error::Fetch(format!("slack {method} failed: {err}")))
}

fn next_cursor(md: Option<ResponseMetadata>) -> Option<String> {
    md.and_then(|m| m.next_cursor).filter(|c| !c.is_empty())
}

fn convert_message(channel: &ChannelId, raw: WireMessage) -> Option<Message> {
    if let Some(subtype) = &raw.subtype {
        if !ANNOUNCEMENT_SUBTYPES.contains(&subtype.as_str()) {
            return None;
        }
    }

    let ts = raw.ts.parse::<f64>().ok()?;
    let bot = raw.bot_id.is_some();

    Some(Message {
        channel: channel.clone(),
        user: raw.user.map(UserId),
        username: raw.username,
        bot,
        ts,
        text: raw.text,
    })
}

fn display_name(member: WireUser) -> String {
    let profile_name = member
        .profile
        .and_then(|p| p.display_name)
        .filter(|s| !s.trim().is_empty());
    if let Some(name) = profile_name {
        return name;
    }

    if let Some(real) = member.real_name.filter(|s| !s.trim().is_empty()) {
        return real;
    }

    member.name
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channels: Vec<WireChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    members: Vec<WireUser>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<WireProfile>,
}

#[derive(Debug, Deserialize)]
struct WireProfile {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<WireMessage>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    ts: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_auth_maps_to_auth_error() {
        let err = check_ok("auth.test", false, Some("invalid_auth".to_string())).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn other_api_errors_map_to_fetch_error() {
        let err = check_ok("conversations.list", false, Some("ratelimited".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[test]
    fn parses_channel_list_page() {
        let body = r#"{
            "ok": true,
            "channels": [
                {"id": "C024BE91L", "name": "general", "is_channel": true},
                {"id": "C024BE91K", "name": "random", "is_channel": true}
            ],
            "response_metadata": {"next_cursor": "dGVhbTpDMDI0QkU5MUw="}
        }"#;
        let resp: ChannelsResponse = serde_json::from_str(body).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.channels.len(), 2);
        assert_eq!(resp.channels[0].name, "general");
        assert_eq!(
            next_cursor(resp.response_metadata).as_deref(),
            Some("dGVhbTpDMDI0QkU5MUw=")
        );
    }

    #[test]
    fn empty_cursor_ends_pagination() {
        let body = r#"{"ok": true, "channels": [], "response_metadata": {"next_cursor": ""}}"#;
        let resp: ChannelsResponse = serde_json::from_str(body).unwrap();
        assert!(next_cursor(resp.response_metadata).is_none());
    }

    #[test]
    fn parses_history_page_and_filters_subtypes() {
        let body = r#"{
            "ok": true,
            "messages": [
                {"type": "message", "user": "U012AB3CDE", "text": "hi", "ts": "1699963200.000100"},
                {"type": "message", "subtype": "message_changed", "ts": "1699963201.000000", "text": ""},
                {"type": "message", "subtype": "channel_join", "user": "U061F7AUR", "text": "<@U061F7AUR> has joined", "ts": "1699963202.000200"},
                {"type": "message", "bot_id": "B19", "username": "deploybot", "text": "shipped", "ts": "1699963203.000300"}
            ],
            "has_more": false
        }"#;
        let resp: HistoryResponse = serde_json::from_str(body).unwrap();
        let channel = ChannelId("C024BE91L".to_string());

        let messages: Vec<Message> = resp
            .messages
            .into_iter()
            .filter_map(|m| convert_message(&channel, m))
            .collect();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].user.as_ref().unwrap().0, "U012AB3CDE");
        assert!((messages[0].ts - 1_699_963_200.0001).abs() < 1e-6);
        assert!(messages[2].bot);
        assert_eq!(messages[2].username.as_deref(), Some("deploybot"));
    }

    #[test]
    fn display_name_fallback_chain() {
        let body = r#"{
            "ok": true,
            "members": [
                {"id": "U1", "name": "alice.login", "real_name": "Alice A", "profile": {"display_name": "alice"}},
                {"id": "U2", "name": "bob.login", "real_name": "Bob B", "profile": {"display_name": ""}},
                {"id": "U3", "name": "carol.login"}
            ]
        }"#;
        let resp: UsersResponse = serde_json::from_str(body).unwrap();
        let names: HashMap<String, String> = resp
            .members
            .into_iter()
            .map(|m| (m.id.clone(), display_name(m)))
            .collect();

        assert_eq!(names["U1"], "alice");
        assert_eq!(names["U2"], "Bob B");
        assert_eq!(names["U3"], "carol.login");
    }

    #[test]
    fn auth_failure_body_parses() {
        let body = r#"{"ok": false, "error": "invalid_auth"}"#;
        let resp: AuthTestResponse = serde_json::from_str(body).unwrap();
        let err = check_ok("auth.test", resp.ok, resp.error).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
