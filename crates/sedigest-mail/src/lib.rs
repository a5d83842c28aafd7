//! Email delivery backends (Postmark HTTP API, direct SMTP).
//!
//! Backends live behind [`DeliveryPort`] so the pipeline and its tests do
//! not care which one is configured.

pub mod postmark;
pub mod smtp;

use async_trait::async_trait;

use sedigest_core::{
    config::{Config, DeliveryConfig},
    domain::Digest,
    Result,
};

use crate::postmark::PostmarkClient;
use crate::smtp::SmtpMailer;

/// A fully addressed, rendered email ready to hand to a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl Email {
    pub fn from_digest(cfg: &Config, digest: &Digest) -> Self {
        Self {
            from: cfg.from.clone(),
            to: cfg.to.clone(),
            subject: digest.subject.clone(),
            html_body: digest.html_body.clone(),
            text_body: digest.text_body.clone(),
        }
    }
}

/// Port for submitting one rendered email.
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn send(&self, email: &Email) -> Result<()>;
}

/// Construct the backend selected by configuration.
pub fn backend_for(cfg: &Config) -> Box<dyn DeliveryPort> {
    match &cfg.delivery {
        DeliveryConfig::Postmark { server_token } => {
            Box::new(PostmarkClient::new(server_token.clone()))
        }
        DeliveryConfig::Smtp(smtp) => Box::new(SmtpMailer::new(smtp.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use sedigest_core::config::{Overrides, SmtpConfig, Window};

    struct RecordingPort {
        sent: Mutex<Vec<Email>>,
    }

    #[async_trait]
    impl DeliveryPort for RecordingPort {
        fn backend_name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, email: &Email) -> Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn config(delivery: DeliveryConfig) -> Config {
        Config {
            token: "xoxb-test".to_string(),
            from: "digest@example.com".to_string(),
            to: "team@example.com".to_string(),
            delivery,
            window: Window::resolve(Some(0.0), Some(86_400.0)).unwrap(),
        }
    }

    fn digest() -> Digest {
        Digest {
            subject: "Slack Digest for Tuesday, November 14, 2023 (UTC)".to_string(),
            html_body: "<div><h2>digest</h2></div>".to_string(),
            text_body: "digest".to_string(),
        }
    }

    #[test]
    fn email_carries_addresses_and_rendering() {
        let cfg = config(DeliveryConfig::Postmark {
            server_token: "pm".to_string(),
        });
        let email = Email::from_digest(&cfg, &digest());
        assert_eq!(email.from, "digest@example.com");
        assert_eq!(email.to, "team@example.com");
        assert_eq!(email.subject, digest().subject);
    }

    #[test]
    fn backend_selection_follows_config() {
        let pm = config(DeliveryConfig::Postmark {
            server_token: "pm".to_string(),
        });
        assert_eq!(backend_for(&pm).backend_name(), "postmark");

        let smtp = config(DeliveryConfig::Smtp(SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "digest@example.com".to_string(),
            password: "hunter2".to_string(),
        }));
        assert_eq!(backend_for(&smtp).backend_name(), "smtp");
    }

    #[tokio::test]
    async fn send_through_the_port_succeeds_for_any_backend() {
        let port = RecordingPort {
            sent: Mutex::new(Vec::new()),
        };
        let cfg = config(DeliveryConfig::Postmark {
            server_token: "pm".to_string(),
        });
        let email = Email::from_digest(&cfg, &digest());

        let dyn_port: &dyn DeliveryPort = &port;
        dyn_port.send(&email).await.unwrap();

        let sent = port.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], email);
    }

    #[test]
    fn unknown_backend_never_reaches_construction() {
        // Config::load is the gate; an unrecognized value fails there.
        let err = sedigest_core::config::Config::load(Overrides {
            from: Some("a@example.com".to_string()),
            to: Some("b@example.com".to_string()),
            token: Some("xoxb".to_string()),
            delivery: Some("carrier-pigeon".to_string()),
            start_ts: Some(0.0),
            end_ts: Some(86_400.0),
        })
        .unwrap_err();
        assert!(matches!(err, sedigest_core::Error::Config(_)));
    }
}
