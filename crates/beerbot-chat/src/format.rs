//! Renders aggregated search results as chat attachments.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use beerbot_core::types::{AggregatedResult, DocFields};

pub const COLOR: &str = "#36a64f";
pub const AUTHOR: &str = "BeerBot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Beer,
    Brewery,
}

impl ResultKind {
    pub fn noun(self) -> &'static str {
        match self {
            ResultKind::Beer => "beer",
            ResultKind::Brewery => "brewery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// One chat attachment. Absent values are left out of the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl Attachment {
    fn item() -> Self {
        Self { color: COLOR.to_string(), ..Self::default() }
    }
}

/// A header attachment followed by one attachment per result row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayMessage {
    pub attachments: Vec<Attachment>,
}

impl DisplayMessage {
    pub fn header(&self) -> Option<&Attachment> {
        self.attachments.first()
    }

    pub fn items(&self) -> &[Attachment] {
        self.attachments.get(1..).unwrap_or_default()
    }
}

pub fn format(result: &AggregatedResult, term: &str, kind: ResultKind) -> DisplayMessage {
    format_at(result, term, kind, Utc::now().timestamp())
}

/// [`format`] with a fixed header timestamp (seconds since the epoch).
pub fn format_at(result: &AggregatedResult, term: &str, kind: ResultKind, ts: i64) -> DisplayMessage {
    let n = result.len();
    let text = match kind {
        ResultKind::Beer if n > 0 => Some(format!("Here are the first {n}:")),
        ResultKind::Beer => None,
        ResultKind::Brewery => Some(format!("Here are the first {n}")),
    };
    let header = Attachment {
        color: COLOR.to_string(),
        author_name: Some(AUTHOR.to_string()),
        title: Some(format!("There are {} {} results for {term}", result.total_hits, kind.noun())),
        text,
        fields: Vec::new(),
        footer: Some(AUTHOR.to_string()),
        ts: Some(ts),
    };

    let mut attachments = Vec::with_capacity(n + 1);
    attachments.push(header);
    for row in &result.rows {
        let fields = row.doc.as_ref().map(|d| d.fields()).unwrap_or_default();
        attachments.push(match kind {
            ResultKind::Beer => beer_item(&fields),
            ResultKind::Brewery => brewery_item(&fields),
        });
    }
    DisplayMessage { attachments }
}

fn beer_item(doc: &DocFields<'_>) -> Attachment {
    let short = |title: &str, value: Option<&str>| {
        value.map(|v| AttachmentField { title: title.to_string(), value: v.to_string(), short: true })
    };
    Attachment {
        title: doc.name.map(str::to_string),
        fields: [short("Category", doc.category), short("Style", doc.style)].into_iter().flatten().collect(),
        ..Attachment::item()
    }
}

fn brewery_item(doc: &DocFields<'_>) -> Attachment {
    Attachment {
        title: doc.name.map(str::to_string),
        text: doc.description.map(str::to_string),
        ..Attachment::item()
    }
}
