//! Timeline item types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id used for the single in-progress slot.
pub const CURRENT_ITEM_ID: &str = "waiting";

/// Status of a timeline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStatus {
    Waiting,
    Success,
    Error,
    Warning,
    Completed,
}

impl TimelineStatus {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineStatus::Waiting => "waiting",
            TimelineStatus::Success => "success",
            TimelineStatus::Error => "error",
            TimelineStatus::Warning => "warning",
            TimelineStatus::Completed => "completed",
        }
    }

    /// Terminal statuses are never followed by `Waiting` for the same id.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TimelineStatus::Success | TimelineStatus::Error | TimelineStatus::Completed
        )
    }
}

/// A piece of a structured description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Link { text: String, url: String },
}

/// Human-readable description that may embed links to external resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description {
    segments: Vec<Segment>,
}

impl Description {
    /// Empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append plain text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Text { text: text.into() });
        self
    }

    /// Append a hyperlink.
    pub fn link(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.segments.push(Segment::Link {
            text: text.into(),
            url: url.into(),
        });
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First link url, if any.
    pub fn first_url(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Link { url, .. } => Some(url.as_str()),
            Segment::Text { .. } => None,
        })
    }
}

impl From<&str> for Description {
    fn from(text: &str) -> Self {
        Description::new().text(text)
    }
}

impl From<String> for Description {
    fn from(text: String) -> Self {
        Description::new().text(text)
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text { text } => f.write_str(text)?,
                Segment::Link { text, .. } => f.write_str(text)?,
            }
        }
        Ok(())
    }
}

/// A displayed record of a stage's current or final status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    /// Unique within a run; the key for in-place updates.
    pub id: String,
    pub status: TimelineStatus,
    pub title: String,
    pub description: Description,
    /// Time of the last status change.
    pub date: DateTime<Utc>,
}

impl TimelineItem {
    pub fn new(
        id: impl Into<String>,
        status: TimelineStatus,
        title: impl Into<String>,
        description: impl Into<Description>,
    ) -> Self {
        Self {
            id: id.into(),
            status,
            title: title.into(),
            description: description.into(),
            date: Utc::now(),
        }
    }

    pub fn waiting(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<Description>,
    ) -> Self {
        Self::new(id, TimelineStatus::Waiting, title, description)
    }

    pub fn success(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<Description>,
    ) -> Self {
        Self::new(id, TimelineStatus::Success, title, description)
    }

    pub fn error(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<Description>,
    ) -> Self {
        Self::new(id, TimelineStatus::Error, title, description)
    }

    /// Item for the in-progress slot.
    pub fn current(title: impl Into<String>, description: impl Into<Description>) -> Self {
        Self::waiting(CURRENT_ITEM_ID, title, description)
    }

    /// Merge a partial update into this item.
    pub fn apply(&mut self, update: TimelineUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        self.date = update.date.unwrap_or_else(Utc::now);
    }
}

/// Partial update applied to an existing item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineUpdate {
    pub status: Option<TimelineStatus>,
    pub title: Option<String>,
    pub description: Option<Description>,
    pub date: Option<DateTime<Utc>>,
}

impl TimelineUpdate {
    pub fn status(status: TimelineStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn waiting(description: impl Into<Description>) -> Self {
        Self::status(TimelineStatus::Waiting).with_description(description)
    }

    pub fn success(title: impl Into<String>, description: impl Into<Description>) -> Self {
        Self::status(TimelineStatus::Success)
            .with_title(title)
            .with_description(description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<Description>) -> Self {
        Self::status(TimelineStatus::Error)
            .with_title(title)
            .with_description(description)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<Description>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Committed log plus the optional current slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub items: Vec<TimelineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<TimelineItem>,
}

impl TimelineSnapshot {
    /// The log followed by the current slot, in display order.
    pub fn render(&self) -> Vec<TimelineItem> {
        let mut items = self.items.clone();
        if let Some(current) = &self.current {
            items.push(current.clone());
        }
        items
    }

    /// Last committed item with the given id.
    pub fn find(&self, id: &str) -> Option<&TimelineItem> {
        self.items.iter().rev().find(|item| item.id == id)
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status == TimelineStatus::Error)
    }
}

/// Shorten a long identifier to `abcd...wxyz`.
pub fn shorten(s: &str) -> String {
    if s.chars().count() < 10 {
        return s.to_string();
    }
    let head: String = s.chars().take(4).collect();
    let tail: String = s
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", head, tail)
}
