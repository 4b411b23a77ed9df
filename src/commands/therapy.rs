use clap::{Args, Subcommand};

use habit_sync::aggregate::{average_mood_delta, DayWindow};
use habit_sync::TherapySession;

use super::entries::{self, OutputFormat};
use super::session::Session;

#[derive(Args)]
pub struct TherapyCommand {
    #[command(subcommand)]
    pub command: TherapySubcommand,
}

#[derive(Subcommand)]
pub enum TherapySubcommand {
    /// Log a therapy session
    Add {
        /// Kind of therapy (e.g. physio, talk)
        therapy: String,

        /// Duration in minutes
        #[arg(long, short = 'd')]
        minutes: u32,

        /// Mood before the session (1-10)
        #[arg(long)]
        mood_before: Option<u8>,

        /// Mood after the session (1-10)
        #[arg(long)]
        mood_after: Option<u8>,

        /// When it started (YYYY-MM-DD HH:MM or HH:MM), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List therapy sessions
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show today's minutes and mood change
    Today,

    /// Show daily minutes
    History {
        /// Number of days, today included
        #[arg(long, short, default_value_t = 7)]
        days: u32,
    },

    /// Delete a therapy session by ID
    Delete { id: String },
}

impl TherapyCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let store = session.loaded_store::<TherapySession>().await?;

        match &self.command {
            TherapySubcommand::Add {
                therapy,
                minutes,
                mood_before,
                mood_after,
                at,
                notes,
            } => {
                if *minutes == 0 {
                    return Err("Duration must be at least one minute".into());
                }
                let mut session_entry = TherapySession::new(therapy.as_str(), *minutes)
                    .with_mood(*mood_before, *mood_after)?;
                if let Some(notes) = notes {
                    session_entry = session_entry.with_notes(notes);
                }
                let draft = entries::draft_at(session_entry, at.as_deref())?;
                entries::add_entry(&store, draft).await?;
            }
            TherapySubcommand::List { format } => {
                entries::print_entries(&store.entries(), format)?;
            }
            TherapySubcommand::Today => {
                let window = DayWindow::today();
                println!("Today: {} min", store.minutes_in(window));
                let average = store.with_entries(|list| average_mood_delta(list, window));
                if let Some(average) = average {
                    println!("Average mood change: {:+.1}", average);
                }
            }
            TherapySubcommand::History { days } => {
                store.with_entries(|list| {
                    entries::print_history(list, *days, "min", |session| {
                        f64::from(session.duration_minutes)
                    })
                });
            }
            TherapySubcommand::Delete { id } => {
                entries::delete_entry(&store, id).await?;
            }
        }

        Ok(())
    }
}
