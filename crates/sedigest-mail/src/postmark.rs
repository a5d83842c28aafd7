//! Postmark transactional API backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sedigest_core::{errors::Error, Result};

use crate::{DeliveryPort, Email};

const EMAIL_URL: &str = "https://api.postmarkapp.com/email";

#[derive(Clone, Debug)]
pub struct PostmarkClient {
    server_token: String,
    http: reqwest::Client,
}

impl PostmarkClient {
    pub fn new(server_token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            server_token: server_token.into(),
            http,
        }
    }
}

#[async_trait]
impl DeliveryPort for PostmarkClient {
    fn backend_name(&self) -> &'static str {
        "postmark"
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let payload = OutboundEmail {
            from: &email.from,
            to: &email.to,
            subject: &email.subject,
            html_body: &email.html_body,
            text_body: &email.text_body,
            message_stream: "outbound",
        };

        let resp = self
            .http
            .post(EMAIL_URL)
            .header("X-Postmark-Server-Token", &self.server_token)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("postmark request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!(
                "postmark rejected the message: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let ack: PostmarkResponse = resp
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("postmark json error: {e}")))?;

        if ack.error_code != 0 {
            return Err(Error::Delivery(format!(
                "postmark error {}: {}",
                ack.error_code, ack.message
            )));
        }

        tracing::debug!(message_id = %ack.message_id, "postmark accepted the message");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkResponse {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "MessageID")]
    message_id: String,
}
