//! Habit Sync
//!
//! Optimistic client sync core for a health-habit tracker: bathroom events,
//! water intake, food entries and therapy sessions, each kept in an
//! [`EntryStore`] that applies writes locally first and converges on the
//! remote store's authoritative collection.

pub mod aggregate;
pub mod gateway;
pub mod models;
pub mod store;

pub use gateway::{
    check_server, ChangeFeed, ChangeNotice, GatewayError, HttpGateway, MemoryGateway,
    RemoteGateway,
};
pub use models::{
    BathroomEvent, BathroomKind, Draft, Entry, EntryId, EntryState, FoodEntry, MealType, NewEntry,
    OwnerId, Payload, RecordType, TherapySession, VolumeUnit, WaterIntake,
};
pub use store::{
    BathroomStore, EntryStore, FoodStore, LiveStore, RealtimeInvalidator, RollbackPolicy,
    StoreError, StoreState, TherapyStore, WaterStore,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
