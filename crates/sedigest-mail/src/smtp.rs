//! Direct SMTP backend (STARTTLS + credentials).
//!
//! lettre's blocking transport runs inside `spawn_blocking`; email is a
//! once-a-day path and does not justify the async transport's extra
//! dependency surface.

use async_trait::async_trait;

use sedigest_core::{config::SmtpConfig, errors::Error, Result};

use crate::{DeliveryPort, Email};

#[derive(Clone, Debug)]
pub struct SmtpMailer {
    cfg: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(cfg: SmtpConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl DeliveryPort for SmtpMailer {
    fn backend_name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let cfg = self.cfg.clone();
        let email = email.clone();

        tokio::task::spawn_blocking(move || send_blocking(&cfg, &email))
            .await
            .map_err(|e| Error::Delivery(format!("smtp task join error: {e}")))?
    }
}

fn send_blocking(cfg: &SmtpConfig, email: &Email) -> Result<()> {
    use lettre::message::{MultiPart, SinglePart};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};

    let message = Message::builder()
        .from(
            email
                .from
                .parse()
                .map_err(|e| Error::Config(format!("invalid from address: {e}")))?,
        )
        .to(email
            .to
            .parse()
            .map_err(|e| Error::Config(format!("invalid to address: {e}")))?)
        .subject(email.subject.clone())
        .multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(email.text_body.clone()))
                .singlepart(SinglePart::html(email.html_body.clone())),
        )
        .map_err(|e| Error::Delivery(format!("build email: {e}")))?;

    let credentials = Credentials::new(cfg.user.clone(), cfg.password.clone());
    let transport = SmtpTransport::starttls_relay(&cfg.host)
        .map_err(|e| Error::Delivery(format!("smtp starttls: {e}")))?
        .credentials(credentials)
        .port(cfg.port)
        .build();

    transport
        .send(&message)
        .map_err(|e| Error::Delivery(format!("smtp send: {e}")))?;

    tracing::debug!(host = %cfg.host, "smtp accepted the message");
    Ok(())
}
