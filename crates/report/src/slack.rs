use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::error::{Error, Result};
use crate::{Report, ReportSink};

static DEFAULT_ICON_EMOJI: &str = ":robot_face:";
static DEFAULT_USERNAME: &str = "Azure";

#[derive(Debug, Serialize)]
struct Payload<'a> {
    text: String,
    username: &'a str,
    icon_emoji: &'a str,
}

/// Posts reports to a Slack incoming webhook as a preformatted block.
#[derive(Clone, Debug)]
pub struct SlackWebhookSink {
    client: Client,
    url: Url,
    username: String,
    icon_emoji: String,
}

impl SlackWebhookSink {
    /// Creates a sink posting to `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
            username: DEFAULT_USERNAME.to_string(),
            icon_emoji: DEFAULT_ICON_EMOJI.to_string(),
        }
    }

    /// Overrides the username shown for the message.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Overrides the emoji shown for the message.
    #[must_use]
    pub fn with_icon_emoji(mut self, icon_emoji: impl Into<String>) -> Self {
        self.icon_emoji = icon_emoji.into();
        self
    }

    fn payload(&self, report: &Report) -> Payload<'_> {
        Payload {
            text: format!("```{}```", report.render()),
            username: &self.username,
            icon_emoji: &self.icon_emoji,
        }
    }
}

#[async_trait]
impl ReportSink for SlackWebhookSink {
    async fn deliver(&self, report: &Report) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&self.payload(report))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        info!(rows = report.rows.len(), "posted report to slack");
        Ok(())
    }
}
