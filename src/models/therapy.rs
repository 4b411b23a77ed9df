use serde::{Deserialize, Serialize};
use std::fmt;

use super::entry::{Payload, RecordType};

/// A therapy session (physio, talk therapy, pelvic floor, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapySession {
    pub therapy: String,
    pub duration_minutes: u32,
    /// Self-reported mood before the session, 1 through 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_before: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_after: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TherapySession {
    pub fn new(therapy: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            therapy: therapy.into(),
            duration_minutes,
            mood_before: None,
            mood_after: None,
            notes: None,
        }
    }

    pub fn with_mood(mut self, before: Option<u8>, after: Option<u8>) -> Result<Self, String> {
        for mood in [before, after].into_iter().flatten() {
            if !(1..=10).contains(&mood) {
                return Err(format!("Mood must be 1-10, got {}", mood));
            }
        }
        self.mood_before = before;
        self.mood_after = after;
        Ok(self)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Mood change over the session, when both ends were recorded.
    pub fn mood_delta(&self) -> Option<i32> {
        match (self.mood_before, self.mood_after) {
            (Some(before), Some(after)) => Some(after as i32 - before as i32),
            _ => None,
        }
    }
}

impl Payload for TherapySession {
    const RECORD_TYPE: RecordType = RecordType::TherapySession;

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

impl fmt::Display for TherapySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} min", self.therapy, self.duration_minutes)?;
        if let Some(delta) = self.mood_delta() {
            write!(f, " (mood {:+})", delta)?;
        }
        Ok(())
    }
}
