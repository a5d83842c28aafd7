/// Slack channel id (`C…`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub String);

/// Slack user id (`U…`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// A public channel as returned by `conversations.list`.
#[derive(Clone, Debug)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

/// One fetched message. Authors are resolved to display names at render time.
#[derive(Clone, Debug)]
pub struct Message {
    pub channel: ChannelId,
    /// Author user id for human messages; bot messages carry `username` instead.
    pub user: Option<UserId>,
    pub username: Option<String>,
    pub bot: bool,
    /// Slack `ts`: epoch seconds with a fractional disambiguator. Ordering is numeric.
    pub ts: f64,
    /// Raw mrkdwn text, still Slack-entity-escaped.
    pub text: String,
}

/// The rendered digest for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}
