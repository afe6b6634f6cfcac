//! Append-only record of one query's reasoning and acting history.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The query being answered.
    User,
    /// Raw model output and the final answer.
    Assistant,
    /// Observations from tools and recoverable errors.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered log of entries. Entries can be appended and read, never edited or
/// removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// Role sequence, for comparing runs while ignoring timestamps.
    pub fn shape(&self) -> Vec<Role> {
        self.entries.iter().map(|e| e.role).collect()
    }

    /// One `timestamp - role: content` line per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{} - {}: {}",
                    e.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                    e.role,
                    e.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut t = Transcript::new();
        t.append(Role::User, "Query: hi");
        t.append(Role::Assistant, "Thought: ...");
        t.append(Role::System, "Observation from X: y");

        assert_eq!(t.len(), 3);
        assert_eq!(t.shape(), vec![Role::User, Role::Assistant, Role::System]);
        assert_eq!(t.last().unwrap().content, "Observation from X: y");
        assert!(t.entries()[0].timestamp <= t.entries()[2].timestamp);
    }

    #[test]
    fn render_tags_each_line_with_role() {
        let mut t = Transcript::new();
        t.append(Role::User, "Query: capital of France?");
        t.append(Role::Assistant, "Answer: Paris");

        let rendered = t.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - user: Query: capital of France?"));
        assert!(lines[1].ends_with(" - assistant: Answer: Paris"));
    }
}
