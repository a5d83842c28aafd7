use std::path::Path;

use clap::Parser;
use tracing::info;

use sedigest_core::{
    config::{self, Config, Overrides},
    digest::build_digest,
    formatting::Names,
    logging, Result,
};
use sedigest_mail::{backend_for, Email};
use sedigest_slack::SlackClient;

/// Email a digest of recent Slack activity.
#[derive(Debug, Parser)]
#[command(name = "sedigest", version)]
struct Cli {
    /// Sender address.
    #[arg(long, env = "SLACKEMAILDIGEST_FROM")]
    from: Option<String>,

    /// Recipient address.
    #[arg(long, env = "SLACKEMAILDIGEST_TO")]
    to: Option<String>,

    /// Slack API token.
    #[arg(long, env = "SLACKEMAILDIGEST_TOKEN")]
    token: Option<String>,

    /// Delivery backend: postmark or smtp.
    #[arg(long, env = "SLACKEMAILDIGEST_DELIVERY")]
    delivery: Option<String>,

    /// UTC epoch seconds of the first message to include.
    /// Defaults to the start of yesterday (UTC).
    #[arg(long, env = "SLACKEMAILDIGEST_START_TS")]
    start_ts: Option<f64>,

    /// UTC epoch seconds of the end of the window.
    /// Defaults to one day after the start.
    #[arg(long, env = "SLACKEMAILDIGEST_END_TS")]
    end_ts: Option<f64>,
}

#[tokio::main]
async fn main() {
    // Load .env before clap resolves env fallbacks.
    config::load_dotenv_if_present(Path::new(".env"));
    let cli = Cli::parse();

    if let Err(e) = logging::init("sedigest") {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let overrides = Overrides {
        from: cli.from,
        to: cli.to,
        token: cli.token,
        delivery: cli.delivery,
        start_ts: cli.start_ts,
        end_ts: cli.end_ts,
    };

    let result = match Config::load(overrides) {
        Ok(cfg) => run(&cfg).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!("digest run failed: {e}");
        std::process::exit(1);
    }
}

/// One run: fetch, format, send. Strictly sequential; any error aborts.
async fn run(cfg: &Config) -> Result<()> {
    let slack = SlackClient::new(&cfg.token);

    // Fails on a bad token before anything is fetched or sent.
    slack.auth_test().await?;

    let channels = slack.list_channels().await?;
    let users = slack.list_users().await?;
    info!(
        channels = channels.len(),
        users = users.len(),
        "workspace inventory fetched"
    );

    let mut messages = Vec::new();
    for channel in &channels {
        let mut history = slack
            .channel_history(&channel.id, cfg.window.start_ts, cfg.window.end_ts)
            .await?;
        messages.append(&mut history);
    }
    info!(messages = messages.len(), "history fetched");

    let names = Names {
        users,
        channels: channels
            .iter()
            .map(|c| (c.id.0.clone(), c.name.clone()))
            .collect(),
    };

    let digest = build_digest(&channels, messages, &names, &cfg.window);
    info!(subject = %digest.subject, "digest rendered");

    let email = Email::from_digest(cfg, &digest);
    let backend = backend_for(cfg);
    backend.send(&email).await?;
    info!(backend = backend.backend_name(), to = %cfg.to, "digest sent");

    Ok(())
}
