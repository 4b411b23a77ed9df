use serde::{Deserialize, Serialize};
use std::fmt;

use super::entry::{Payload, RecordType};
use super::meal_type::MealType;

/// Something eaten, with its nutrition facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub name: String,
    pub meal: MealType,
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl FoodEntry {
    pub fn new(name: impl Into<String>, meal: MealType, calories: f64) -> Self {
        Self {
            name: name.into(),
            meal,
            calories,
            protein_g: 0.0,
            carbs_g: 0.0,
            fat_g: 0.0,
            notes: None,
        }
    }

    pub fn with_macros(mut self, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        self.protein_g = protein_g;
        self.carbs_g = carbs_g;
        self.fat_g = fat_g;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Payload for FoodEntry {
    const RECORD_TYPE: RecordType = RecordType::FoodEntry;

    fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

impl fmt::Display for FoodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} kcal (P {}g / C {}g / F {}g)",
            self.name, self.meal, self.calories, self.protein_g, self.carbs_g, self.fat_g
        )
    }
}
