//! Running chat log a front end renders next to the input box.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::controller::Event;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
    Error,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub direction: Direction,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Ordered record of the messages exchanged on the current session.
///
/// Feed it every [`Event`] from the controller; it keeps sent, received and error
/// lines and starts over when the user disconnects.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Sent { text } => self.push(Direction::Sent, text.clone()),
            Event::Received { text } => self.push(Direction::Received, text.clone()),
            Event::Failed { failure } => self.push(Direction::Error, failure.message.clone()),
            Event::Disconnected { requested: true } => self.clear(),
            _ => {}
        }
    }

    pub fn push(&mut self, direction: Direction, text: String) {
        self.entries.push(Entry {
            direction,
            text,
            at: Utc::now(),
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", entry.direction, entry.text)?;
        }
        Ok(())
    }
}
