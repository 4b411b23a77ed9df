use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entry::{Payload, RecordType};

/// Volume units a water intake can be logged in. Fluid ounces are the reference unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VolumeUnit {
    #[default]
    #[serde(rename = "oz")]
    FlOz,
    #[serde(rename = "ml")]
    Ml,
    #[serde(rename = "l")]
    L,
    #[serde(rename = "cup")]
    Cup,
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeUnit::FlOz => write!(f, "oz"),
            VolumeUnit::Ml => write!(f, "ml"),
            VolumeUnit::L => write!(f, "l"),
            VolumeUnit::Cup => write!(f, "cup"),
        }
    }
}

impl FromStr for VolumeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oz" | "floz" | "fl oz" | "ounce" | "ounces" => Ok(VolumeUnit::FlOz),
            "ml" | "milliliter" | "milliliters" => Ok(VolumeUnit::Ml),
            "l" | "liter" | "liters" => Ok(VolumeUnit::L),
            "cup" | "cups" => Ok(VolumeUnit::Cup),
            _ => Err(format!(
                "Invalid volume unit '{}'. Valid options: oz, ml, l, cup",
                s
            )),
        }
    }
}

/// A glass of water (or any drink counted toward hydration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterIntake {
    pub amount: f64,
    pub unit: VolumeUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WaterIntake {
    pub fn new(amount: f64, unit: VolumeUnit) -> Self {
        Self {
            amount,
            unit,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Payload for WaterIntake {
    const RECORD_TYPE: RecordType = RecordType::WaterIntake;

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

impl fmt::Display for WaterIntake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)?;
        if let Some(notes) = &self.notes {
            write!(f, " ({})", notes)?;
        }
        Ok(())
    }
}
