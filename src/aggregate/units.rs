//! Volume conversions. Fluid ounces are the reference unit.

use super::{sum_in_window, DayWindow};
use crate::models::{Entry, VolumeUnit, WaterIntake};

/// Millilitres in one US fluid ounce.
pub const ML_PER_OZ: f64 = 29.5735295625;

/// Fluid ounces in one `unit`.
pub fn oz_per_unit(unit: VolumeUnit) -> f64 {
    match unit {
        VolumeUnit::FlOz => 1.0,
        VolumeUnit::Ml => 1.0 / ML_PER_OZ,
        VolumeUnit::L => 1000.0 / ML_PER_OZ,
        VolumeUnit::Cup => 8.0,
    }
}

pub fn to_oz(amount: f64, unit: VolumeUnit) -> f64 {
    amount * oz_per_unit(unit)
}

pub fn from_oz(oz: f64, unit: VolumeUnit) -> f64 {
    oz / oz_per_unit(unit)
}

pub fn convert(amount: f64, from: VolumeUnit, to: VolumeUnit) -> f64 {
    if from == to {
        return amount;
    }
    from_oz(to_oz(amount, from), to)
}

/// Water drunk inside the window, expressed in `unit`.
pub fn water_total(
    entries: &[Entry<WaterIntake>],
    window: DayWindow,
    unit: VolumeUnit,
) -> f64 {
    let oz = sum_in_window(entries, window, |water| to_oz(water.amount, water.unit));
    from_oz(oz, unit)
}

/// Fraction of a goal reached, clamped to `0.0..=1.0`. A non-positive goal counts as unmet.
pub fn goal_progress(total: f64, goal: f64) -> f64 {
    if goal <= 0.0 {
        return 0.0;
    }
    (total / goal).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryId, OwnerId, Payload};

    const EPSILON: f64 = 1e-9;

    fn water(timestamp: i64, amount: f64, unit: VolumeUnit) -> Entry<WaterIntake> {
        Entry {
            id: EntryId::durable(format!("w{}", timestamp)),
            owner_id: OwnerId::new("user1"),
            timestamp,
            record_type: WaterIntake::RECORD_TYPE,
            payload: WaterIntake::new(amount, unit),
        }
    }

    #[test]
    fn test_round_trip_through_reference_unit() {
        for unit in [VolumeUnit::FlOz, VolumeUnit::Ml, VolumeUnit::L, VolumeUnit::Cup] {
            let back = from_oz(to_oz(250.0, unit), unit);
            assert!((back - 250.0).abs() < EPSILON, "{} -> {}", unit, back);
        }
    }

    #[test]
    fn test_known_conversions() {
        assert!((to_oz(1.0, VolumeUnit::Cup) - 8.0).abs() < EPSILON);
        assert!((convert(1.0, VolumeUnit::L, VolumeUnit::Ml) - 1000.0).abs() < EPSILON);
        assert!((to_oz(ML_PER_OZ, VolumeUnit::Ml) - 1.0).abs() < EPSILON);
        assert_eq!(convert(16.0, VolumeUnit::FlOz, VolumeUnit::FlOz), 16.0);
    }

    #[test]
    fn test_water_total_mixes_units() {
        let window = DayWindow::starting_at(0);
        let entries = vec![
            water(1, 8.0, VolumeUnit::FlOz),
            water(2, 1.0, VolumeUnit::Cup),
            water(3, ML_PER_OZ * 4.0, VolumeUnit::Ml),
            water(window.end_ms, 100.0, VolumeUnit::FlOz),
        ];

        let total = water_total(&entries, window, VolumeUnit::FlOz);
        assert!((total - 20.0).abs() < EPSILON);

        let in_cups = water_total(&entries, window, VolumeUnit::Cup);
        assert!((in_cups - 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_goal_progress() {
        assert_eq!(goal_progress(32.0, 64.0), 0.5);
        assert_eq!(goal_progress(100.0, 64.0), 1.0);
        assert_eq!(goal_progress(10.0, 0.0), 0.0);
    }
}
