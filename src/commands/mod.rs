mod bathroom;
mod config_cmd;
mod entries;
mod food;
mod session;
pub mod status;
mod therapy;
mod water;
mod watch;

pub use bathroom::BathroomCommand;
pub use config_cmd::ConfigCommand;
pub use food::FoodCommand;
pub use session::Session;
pub use therapy::TherapyCommand;
pub use water::WaterCommand;
pub use watch::WatchCommand;
