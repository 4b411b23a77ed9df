mod bathroom;
mod entry;
mod food;
mod meal_type;
mod therapy;
mod water;

pub use bathroom::{BathroomEvent, BathroomKind};
pub use entry::{
    now_millis, Draft, Entry, EntryId, EntryState, NewEntry, OwnerId, Payload, RecordType,
    TRANSIENT_PREFIX,
};
pub use food::FoodEntry;
pub use meal_type::MealType;
pub use therapy::TherapySession;
pub use water::{VolumeUnit, WaterIntake};
