use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entry::{Payload, RecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BathroomKind {
    Urination,
    BowelMovement,
    Both,
}

impl fmt::Display for BathroomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BathroomKind::Urination => write!(f, "urination"),
            BathroomKind::BowelMovement => write!(f, "bowel-movement"),
            BathroomKind::Both => write!(f, "both"),
        }
    }
}

impl FromStr for BathroomKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "urination" | "pee" => Ok(BathroomKind::Urination),
            "bowel-movement" | "bm" | "poop" => Ok(BathroomKind::BowelMovement),
            "both" => Ok(BathroomKind::Both),
            _ => Err(format!(
                "Invalid bathroom kind '{}'. Valid options: urination, bowel-movement, both",
                s
            )),
        }
    }
}

/// A bathroom visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BathroomEvent {
    pub kind: BathroomKind,
    /// Bristol stool scale, 1 through 7.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BathroomEvent {
    pub fn new(kind: BathroomKind) -> Self {
        Self {
            kind,
            consistency: None,
            notes: None,
        }
    }

    /// Sets the Bristol scale value. Values outside 1..=7 are rejected.
    pub fn with_consistency(mut self, bristol: u8) -> Result<Self, String> {
        if !(1..=7).contains(&bristol) {
            return Err(format!("Bristol scale must be 1-7, got {}", bristol));
        }
        self.consistency = Some(bristol);
        Ok(self)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn involves_bowel_movement(&self) -> bool {
        matches!(self.kind, BathroomKind::BowelMovement | BathroomKind::Both)
    }
}

impl Payload for BathroomEvent {
    const RECORD_TYPE: RecordType = RecordType::BathroomEvent;

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

impl fmt::Display for BathroomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(bristol) = self.consistency {
            write!(f, " (bristol {})", bristol)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_range() {
        assert!(BathroomEvent::new(BathroomKind::BowelMovement)
            .with_consistency(4)
            .is_ok());
        assert!(BathroomEvent::new(BathroomKind::BowelMovement)
            .with_consistency(0)
            .is_err());
        assert!(BathroomEvent::new(BathroomKind::BowelMovement)
            .with_consistency(8)
            .is_err());
    }

    #[test]
    fn test_bathroom_kind_json() {
        let json = serde_json::to_string(&BathroomKind::BowelMovement).unwrap();
        assert_eq!(json, "\"bowel-movement\"");
        assert_eq!(
            BathroomKind::from_str("bm").unwrap(),
            BathroomKind::BowelMovement
        );
    }

    #[test]
    fn test_involves_bowel_movement() {
        assert!(BathroomEvent::new(BathroomKind::Both).involves_bowel_movement());
        assert!(!BathroomEvent::new(BathroomKind::Urination).involves_bowel_movement());
    }
}
