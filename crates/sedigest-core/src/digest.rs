//! Digest assembly: group fetched messages by channel, order them, render
//! the email subject and bodies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::Window;
use crate::domain::{Channel, Digest, Message};
use crate::formatting::{escape_html, mrkdwn_to_html, Names};

/// Messages further apart than this get a visual conversation break.
const CONVERSATION_BREAK_SECS: f64 = 30.0 * 60.0;

const DATE_FMT: &str = "%A, %B %d, %Y";

const BODY_STYLE: &str =
    "font-family: Slack-Lato,appleLogo,sans-serif; font-size: .9375rem; line-height: 1.375rem;";

/// Build the digest for one run.
///
/// Sections are ordered by channel name; messages within a section by
/// numeric `ts` (stable, so equal timestamps keep their fetch order).
/// Channels with no messages in the window are omitted. Deterministic:
/// the same input always renders byte-identical output.
pub fn build_digest(
    channels: &[Channel],
    mut messages: Vec<Message>,
    names: &Names,
    window: &Window,
) -> Digest {
    messages.sort_by(|a, b| a.ts.total_cmp(&b.ts));

    let mut by_channel: HashMap<&str, Vec<&Message>> = HashMap::new();
    for msg in &messages {
        by_channel.entry(msg.channel.0.as_str()).or_default().push(msg);
    }

    let mut ordered: Vec<&Channel> = channels
        .iter()
        .filter(|c| by_channel.contains_key(c.id.0.as_str()))
        .collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let subject = subject_line(&messages, window);

    let mut sections = Vec::new();
    let mut counts = Vec::new();
    for ch in &ordered {
        let msgs = &by_channel[ch.id.0.as_str()];
        sections.push(render_section(ch, msgs, names));
        counts.push(format!("#{}: {} messages", ch.name, msgs.len()));
    }

    let html_body = if sections.is_empty() {
        format!(
            "<div style=\"{BODY_STYLE}\">\n<h2>{}</h2>\n<h2>There was no Slack activity</h2>\n</div>",
            escape_html(&subject)
        )
    } else {
        format!(
            "<div style=\"{BODY_STYLE}\">\n<h2>{}</h2>\n{}\n</div>",
            escape_html(&subject),
            sections.join("\n")
        )
    };

    // Mail clients show the plain part as the snippet; a short summary is
    // more useful there than a full rendering.
    let text_body = if counts.is_empty() {
        format!("{subject}\n\nThere was no Slack activity.")
    } else {
        format!("{subject}\n\n{}", counts.join("\n"))
    };

    Digest {
        subject,
        html_body,
        text_body,
    }
}

fn subject_line(messages: &[Message], window: &Window) -> String {
    let date_str = if messages.is_empty() {
        utc(window.start_ts).format(DATE_FMT).to_string()
    } else {
        let first_ts = messages[0].ts;
        // A message right on the day boundary belongs to the previous day.
        let last_ts = (messages[messages.len() - 1].ts - 1.0).max(first_ts);

        let start = utc(first_ts).format(DATE_FMT).to_string();
        let end = utc(last_ts).format(DATE_FMT).to_string();
        if start == end {
            start
        } else {
            format!("{start} to {end}")
        }
    };

    format!("Slack Digest for {date_str} (UTC)")
}

fn render_section(channel: &Channel, msgs: &[&Message], names: &Names) -> String {
    let mut bits = Vec::new();
    bits.push(format!("<h3>#{}</h3>", escape_html(&channel.name)));

    let mut last_ts = msgs.first().map(|m| m.ts).unwrap_or(0.0);
    for msg in msgs {
        if msg.ts - last_ts >= CONVERSATION_BREAK_SECS {
            bits.push("<hr>".to_string());
        }
        last_ts = msg.ts;
        bits.push(render_message(msg, names));
    }

    bits.join("\n")
}

fn render_message(msg: &Message, names: &Names) -> String {
    let author = escape_html(&author_name(msg, names));
    let stamp = utc(msg.ts).format("%I:%M %p").to_string();
    let text = mrkdwn_to_html(&msg.text, names);

    format!(
        "<table><tr><td><b>{author}</b> <font color=\"#7f7f7f\">{stamp}</font><br>\n{text}\n</td></tr></table>"
    )
}

fn author_name(msg: &Message, names: &Names) -> String {
    if let Some(user) = &msg.user {
        return names
            .users
            .get(&user.0)
            .cloned()
            .unwrap_or_else(|| user.0.clone());
    }

    if let Some(username) = &msg.username {
        if msg.bot {
            return format!("{username} (BOT)");
        }
        return username.clone();
    }

    "unknown".to_string()
}

fn utc(ts: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts as i64, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
