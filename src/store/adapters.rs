//! Record-type specific views over the generic store.

use std::collections::BTreeMap;

use super::EntryStore;
use crate::aggregate::{
    bathroom_counts, by_meal, calories_in_window, daily_nutrition, therapy_minutes, water_total,
    DayWindow, NutritionTotals,
};
use crate::gateway::RemoteGateway;
use crate::models::{
    BathroomEvent, BathroomKind, FoodEntry, MealType, TherapySession, VolumeUnit, WaterIntake,
};

pub type WaterStore<G> = EntryStore<WaterIntake, G>;
pub type FoodStore<G> = EntryStore<FoodEntry, G>;
pub type BathroomStore<G> = EntryStore<BathroomEvent, G>;
pub type TherapyStore<G> = EntryStore<TherapySession, G>;

impl<G: RemoteGateway<WaterIntake>> EntryStore<WaterIntake, G> {
    /// Water drunk in `window`, pending entries included.
    pub fn total_in(&self, window: DayWindow, unit: VolumeUnit) -> f64 {
        self.with_entries(|entries| water_total(entries, window, unit))
    }

    pub fn today_total(&self, unit: VolumeUnit) -> f64 {
        self.total_in(DayWindow::today(), unit)
    }
}

impl<G: RemoteGateway<FoodEntry>> EntryStore<FoodEntry, G> {
    pub fn today_calories(&self) -> f64 {
        self.with_entries(|entries| calories_in_window(entries, DayWindow::today()))
    }

    pub fn nutrition_in(&self, window: DayWindow) -> NutritionTotals {
        self.with_entries(|entries| daily_nutrition(entries, window))
    }

    pub fn today_by_meal(&self) -> BTreeMap<MealType, NutritionTotals> {
        self.with_entries(|entries| by_meal(entries, DayWindow::today()))
    }
}

impl<G: RemoteGateway<BathroomEvent>> EntryStore<BathroomEvent, G> {
    pub fn counts_in(&self, window: DayWindow) -> BTreeMap<BathroomKind, usize> {
        self.with_entries(|entries| bathroom_counts(entries, window))
    }
}

impl<G: RemoteGateway<TherapySession>> EntryStore<TherapySession, G> {
    pub fn minutes_in(&self, window: DayWindow) -> u32 {
        self.with_entries(|entries| therapy_minutes(entries, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use crate::models::{now_millis, Draft, OwnerId};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_water_total_counts_pending_entries() {
        let gateway = Arc::new(ScriptedGateway::<WaterIntake>::new());
        let owner = OwnerId::new("user1");
        gateway.seed(&owner, now_millis(), WaterIntake::new(8.0, VolumeUnit::FlOz));

        let store: WaterStore<_> = EntryStore::new(Arc::clone(&gateway));
        store.load(&owner).await.unwrap();
        gateway.hold_creates(true);

        let _pending = store.create(Draft::new(WaterIntake::new(1.0, VolumeUnit::Cup)));

        assert_eq!(store.today_total(VolumeUnit::FlOz), 16.0);
    }

    #[tokio::test]
    async fn test_water_total_after_failed_create() {
        let gateway = Arc::new(ScriptedGateway::<WaterIntake>::new());
        let owner = OwnerId::new("user1");
        let store: WaterStore<_> = EntryStore::new(Arc::clone(&gateway));
        store.load(&owner).await.unwrap();
        gateway.fail_create(true);

        let result = store
            .create(Draft::new(WaterIntake::new(16.0, VolumeUnit::FlOz)))
            .await;

        assert!(result.is_err());
        assert_eq!(store.today_total(VolumeUnit::FlOz), 0.0);
    }

    #[tokio::test]
    async fn test_food_views() {
        let gateway = Arc::new(ScriptedGateway::<FoodEntry>::new());
        let owner = OwnerId::new("user1");
        let now = now_millis();
        gateway.seed(&owner, now, FoodEntry::new("Toast", MealType::Breakfast, 180.0));
        gateway.seed(&owner, now, FoodEntry::new("Soup", MealType::Lunch, 250.0));

        let store: FoodStore<_> = EntryStore::new(Arc::clone(&gateway));
        store.load(&owner).await.unwrap();

        assert_eq!(store.today_calories(), 430.0);
        assert_eq!(store.nutrition_in(DayWindow::today()).items, 2);
        assert_eq!(store.today_by_meal().len(), 2);
    }

    #[tokio::test]
    async fn test_bathroom_and_therapy_views() {
        let owner = OwnerId::new("user1");
        let window = DayWindow::starting_at(0);

        let bathroom = Arc::new(ScriptedGateway::<BathroomEvent>::new());
        bathroom.seed(&owner, 10, BathroomEvent::new(BathroomKind::Urination));
        let bathroom_store: BathroomStore<_> = EntryStore::new(Arc::clone(&bathroom));
        bathroom_store.load(&owner).await.unwrap();
        assert_eq!(
            bathroom_store.counts_in(window).get(&BathroomKind::Urination),
            Some(&1)
        );

        let therapy = Arc::new(ScriptedGateway::<TherapySession>::new());
        therapy.seed(&owner, 10, TherapySession::new("physio", 40));
        therapy.seed(&owner, 20, TherapySession::new("walk", 20));
        let therapy_store: TherapyStore<_> = EntryStore::new(Arc::clone(&therapy));
        therapy_store.load(&owner).await.unwrap();
        assert_eq!(therapy_store.minutes_in(window), 60);
    }
}
