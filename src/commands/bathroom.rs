use clap::{Args, Subcommand};

use habit_sync::aggregate::DayWindow;
use habit_sync::{BathroomEvent, BathroomKind};

use super::entries::{self, OutputFormat};
use super::session::Session;

#[derive(Args)]
pub struct BathroomCommand {
    #[command(subcommand)]
    pub command: BathroomSubcommand,
}

#[derive(Subcommand)]
pub enum BathroomSubcommand {
    /// Log a bathroom visit
    Add {
        /// Kind (urination, bowel-movement, both)
        kind: BathroomKind,

        /// Bristol stool scale (1-7)
        #[arg(long, short = 'b')]
        consistency: Option<u8>,

        /// When it happened (YYYY-MM-DD HH:MM or HH:MM), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List bathroom events
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show today's counts by kind
    Today,

    /// Show daily visit counts
    History {
        /// Number of days, today included
        #[arg(long, short, default_value_t = 7)]
        days: u32,
    },

    /// Delete a bathroom event by ID
    Delete { id: String },
}

impl BathroomCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let store = session.loaded_store::<BathroomEvent>().await?;

        match &self.command {
            BathroomSubcommand::Add {
                kind,
                consistency,
                at,
                notes,
            } => {
                let mut event = BathroomEvent::new(*kind);
                if let Some(bristol) = consistency {
                    event = event.with_consistency(*bristol)?;
                }
                if let Some(notes) = notes {
                    event = event.with_notes(notes);
                }
                let draft = entries::draft_at(event, at.as_deref())?;
                entries::add_entry(&store, draft).await?;
            }
            BathroomSubcommand::List { format } => {
                entries::print_entries(&store.entries(), format)?;
            }
            BathroomSubcommand::Today => {
                let counts = store.counts_in(DayWindow::today());
                if counts.is_empty() {
                    println!("Nothing logged today.");
                }
                for (kind, count) in counts {
                    println!("{:<15} {}", kind.to_string(), count);
                }
            }
            BathroomSubcommand::History { days } => {
                store.with_entries(|list| {
                    entries::print_history(list, *days, "visit(s)", |_| 1.0)
                });
            }
            BathroomSubcommand::Delete { id } => {
                entries::delete_entry(&store, id).await?;
            }
        }

        Ok(())
    }
}
