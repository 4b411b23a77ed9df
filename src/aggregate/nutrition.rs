use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::{entries_in_window, sum_in_window, DayWindow};
use crate::models::{Entry, FoodEntry, MealType};

/// Summed nutrition facts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub items: usize,
}

impl NutritionTotals {
    pub fn add(&mut self, food: &FoodEntry) {
        self.calories += food.calories;
        self.protein_g += food.protein_g;
        self.carbs_g += food.carbs_g;
        self.fat_g += food.fat_g;
        self.items += 1;
    }
}

impl fmt::Display for NutritionTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0} kcal, P {:.1}g / C {:.1}g / F {:.1}g ({} item(s))",
            self.calories, self.protein_g, self.carbs_g, self.fat_g, self.items
        )
    }
}

pub fn calories_in_window(entries: &[Entry<FoodEntry>], window: DayWindow) -> f64 {
    sum_in_window(entries, window, |food| food.calories)
}

pub fn daily_nutrition(entries: &[Entry<FoodEntry>], window: DayWindow) -> NutritionTotals {
    let mut totals = NutritionTotals::default();
    for entry in entries_in_window(entries, window) {
        totals.add(&entry.payload);
    }
    totals
}

/// Totals bucketed by meal. Meals with no entries are absent.
pub fn by_meal(
    entries: &[Entry<FoodEntry>],
    window: DayWindow,
) -> BTreeMap<MealType, NutritionTotals> {
    let mut meals: BTreeMap<MealType, NutritionTotals> = BTreeMap::new();
    for entry in entries_in_window(entries, window) {
        meals.entry(entry.payload.meal).or_default().add(&entry.payload);
    }
    meals
}
