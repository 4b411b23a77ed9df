use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which meal a food entry belongs to. Ordered through the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }

    /// Guesses the meal from the local hour an entry was logged at.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            4..=10 => MealType::Breakfast,
            11..=15 => MealType::Lunch,
            16..=21 => MealType::Dinner,
            _ => MealType::Snack,
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|meal| meal.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "Unknown meal '{}'; expected breakfast, lunch, dinner or snack",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matches_display() {
        for meal in MealType::ALL {
            assert_eq!(meal.to_string().parse::<MealType>().unwrap(), meal);
        }
        assert_eq!(" Lunch ".parse::<MealType>().unwrap(), MealType::Lunch);
        assert!("brunch".parse::<MealType>().is_err());
        assert!("".parse::<MealType>().is_err());
    }

    #[test]
    fn test_from_hour() {
        assert_eq!(MealType::from_hour(7), MealType::Breakfast);
        assert_eq!(MealType::from_hour(12), MealType::Lunch);
        assert_eq!(MealType::from_hour(19), MealType::Dinner);
        assert_eq!(MealType::from_hour(23), MealType::Snack);
        assert_eq!(MealType::from_hour(2), MealType::Snack);
    }

    #[test]
    fn test_ordering_follows_day() {
        let mut meals = vec![MealType::Snack, MealType::Dinner, MealType::Breakfast];
        meals.sort();
        assert_eq!(
            meals,
            vec![MealType::Breakfast, MealType::Dinner, MealType::Snack]
        );
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MealType::Dinner).unwrap(),
            "\"dinner\""
        );
    }
}
