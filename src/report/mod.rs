//! Structured human-facing reports.
//!
//! Workflows build a [`Report`] value; renderers turn it into markdown or
//! plain text, and a [`ReportSink`] receives the rendered output.

mod prompt;
mod render;

use serde::Serialize;

pub use prompt::{ConfirmationPrompt, PromptOption};
pub use render::{render_markdown, render_plain};

/// Ordered list of typed sections under a title.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.push(section);
        self
    }

    /// Empty sections are dropped so optional parts need no special casing.
    pub fn push(&mut self, section: Section) {
        if !section.blocks.is_empty() {
            self.sections.push(section);
        }
    }

    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.heading.as_deref() == Some(heading))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: Some(heading.into()),
            blocks: Vec::new(),
        }
    }

    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Paragraph(text.into()));
        self
    }

    /// Adds a bullet list; an empty list adds nothing.
    pub fn bullets<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        if !items.is_empty() {
            self.blocks.push(Block::Bullets(items));
        }
        self
    }

    pub fn entry(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let pair = (key.into(), value.to_string());
        match self.blocks.last_mut() {
            Some(Block::KeyValues(pairs)) => pairs.push(pair),
            _ => self.blocks.push(Block::KeyValues(vec![pair])),
        }
        self
    }

    /// Value of the first key/value entry with this key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::KeyValues(pairs) => pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Block {
    Paragraph(String),
    Bullets(Vec<String>),
    KeyValues(Vec<(String, String)>),
}

/// Destination for formatted progress and summary output. Nothing parses
/// what is written here.
pub trait ReportSink: Send + Sync {
    fn emit(&self, text: &str);
}

/// Sink that keeps every emitted message, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: std::sync::Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|message| message.contains(needle))
    }
}

impl ReportSink for RecordingSink {
    fn emit(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }
}
