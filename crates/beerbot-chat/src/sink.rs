//! Where the bot's answers go: a terminal or a Slack channel.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use beerbot_core::config::SlackConfig;
use beerbot_core::error::{Error, Result};

use crate::format::{Attachment, DisplayMessage};

pub trait MessageSink {
    fn send_attachments(&self, message: &DisplayMessage) -> Result<()>;

    fn reply(&self, text: &str) -> Result<()>;

    /// Add an emoji reaction (name without colons, e.g. `+1`).
    fn react(&self, emoji: &str) -> Result<()>;
}

impl<T: MessageSink + ?Sized> MessageSink for Box<T> {
    fn send_attachments(&self, message: &DisplayMessage) -> Result<()> {
        (**self).send_attachments(message)
    }

    fn reply(&self, text: &str) -> Result<()> {
        (**self).reply(text)
    }

    fn react(&self, emoji: &str) -> Result<()> {
        (**self).react(emoji)
    }
}

/// Writes plain-text renderings to any `Write`.
pub struct ConsoleSink<W: Write> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|_| Error::Sink("console lock poisoned".to_string()))
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut out = self.out.lock().map_err(|_| Error::Sink("console lock poisoned".to_string()))?;
        for line in lines {
            writeln!(out, "{line}").map_err(|e| Error::Sink(e.to_string()))?;
        }
        out.flush().map_err(|e| Error::Sink(e.to_string()))
    }
}

impl<W: Write> MessageSink for ConsoleSink<W> {
    fn send_attachments(&self, message: &DisplayMessage) -> Result<()> {
        let mut lines = Vec::new();
        if let Some(header) = message.header() {
            lines.extend(header.title.clone());
            lines.extend(header.text.clone());
        }
        for item in message.items() {
            lines.push(render_item(item));
        }
        self.write_lines(&lines)
    }

    fn reply(&self, text: &str) -> Result<()> {
        self.write_lines(&[text.to_string()])
    }

    fn react(&self, emoji: &str) -> Result<()> {
        self.write_lines(&[format!(":{emoji}:")])
    }
}

fn render_item(item: &Attachment) -> String {
    let mut line = format!("  * {}", item.title.as_deref().unwrap_or_default());
    if !item.fields.is_empty() {
        let fields: Vec<String> = item.fields.iter().map(|f| format!("{}: {}", f.title, f.value)).collect();
        line.push_str(&format!(" [{}]", fields.join(" | ")));
    }
    if let Some(text) = &item.text {
        line.push_str(&format!("\n      {text}"));
    }
    line.trim_end().to_string()
}

/// Posts to a Slack channel through the Web API.
///
/// Reactions are added to the last message this sink posted.
pub struct SlackSink {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    api_base: String,
    token: String,
    channel: String,
    last_ts: Mutex<Option<String>>,
}

impl SlackSink {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let token = config
            .api_token
            .clone()
            .ok_or_else(|| Error::InvalidConfig("slack.api_token is required".to_string()))?;
        let channel = config
            .channel
            .clone()
            .ok_or_else(|| Error::InvalidConfig("slack.channel is required".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Sink(e.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Sink(e.to_string()))?;
        Ok(Self {
            client,
            runtime,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            channel,
            last_ts: Mutex::new(None),
        })
    }

    fn call(&self, method: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{method}", self.api_base);
        debug!(method, "slack api call");
        let response: Value = self.runtime.block_on(async {
            self.client
                .post(&url)
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        })
        .map_err(|e| Error::Sink(format!("{method}: {e}")))?;
        check_response(method, response)
    }

    fn post(&self, body: &Value) -> Result<()> {
        let response = self.call("chat.postMessage", body)?;
        let ts = response.get("ts").and_then(Value::as_str).map(str::to_string);
        *self.last_ts.lock().map_err(|_| Error::Sink("slack state lock poisoned".to_string()))? = ts;
        Ok(())
    }
}

impl MessageSink for SlackSink {
    fn send_attachments(&self, message: &DisplayMessage) -> Result<()> {
        self.post(&post_message_body(&self.channel, "", Some(message)))
    }

    fn reply(&self, text: &str) -> Result<()> {
        self.post(&post_message_body(&self.channel, text, None))
    }

    fn react(&self, emoji: &str) -> Result<()> {
        let ts = self.last_ts.lock().map_err(|_| Error::Sink("slack state lock poisoned".to_string()))?.clone();
        let Some(ts) = ts else {
            warn!(emoji, channel = %self.channel, "reaction dropped: nothing posted yet to react to");
            return Ok(());
        };
        self.call("reactions.add", &json!({"channel": self.channel, "name": emoji, "timestamp": ts}))
            .map(|_| ())
    }
}

fn post_message_body(channel: &str, text: &str, message: Option<&DisplayMessage>) -> Value {
    let mut body = json!({"channel": channel, "text": text});
    if let Some(message) = message {
        body["attachments"] = json!(message);
    }
    body
}

/// Slack answers 200 even for failures; `ok: false` carries the reason.
fn check_response(method: &str, response: Value) -> Result<Value> {
    if response.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(response);
    }
    let reason = response.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    Err(Error::Sink(format!("{method}: {reason}")))
}
