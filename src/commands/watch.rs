use clap::Args;

use habit_sync::{
    BathroomEvent, FoodEntry, LiveStore, Payload, RecordType, TherapySession, WaterIntake,
};

use super::entries::{self, OutputFormat};
use super::session::Session;

/// Follow one collection live, reprinting it after every change
#[derive(Args)]
pub struct WatchCommand {
    /// Record type (bathroom, water, food, therapy)
    record_type: RecordType,
}

impl WatchCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        match self.record_type {
            RecordType::BathroomEvent => watch::<BathroomEvent>(session).await,
            RecordType::WaterIntake => watch::<WaterIntake>(session).await,
            RecordType::FoodEntry => watch::<FoodEntry>(session).await,
            RecordType::TherapySession => watch::<TherapySession>(session).await,
        }
    }
}

async fn watch<P: Payload>(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let live = LiveStore::open(session.store::<P>(), session.owner.clone()).await;
    if !live.is_live() {
        eprintln!("Live updates unavailable; showing a single snapshot.");
    }

    let mut changes = live.store().watch();
    let initial = changes.borrow_and_update().clone();
    if let Some(error) = &initial.error {
        return Err(error.clone().into());
    }
    entries::print_entries(&initial.entries, &OutputFormat::Text)?;
    if !live.is_live() {
        return Ok(());
    }

    println!("-- watching {} for {} (Ctrl-C to stop)", P::RECORD_TYPE, live.owner());
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                if state.loading {
                    continue;
                }
                if let Some(error) = &state.error {
                    eprintln!("Reload failed, showing last known entries: {}", error);
                }
                println!();
                entries::print_entries(&state.entries, &OutputFormat::Text)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    live.close();
    Ok(())
}
