use clap::{Args, Subcommand};

use habit_sync::aggregate::{convert, goal_progress};
use habit_sync::{VolumeUnit, WaterIntake};

use super::entries::{self, OutputFormat};
use super::session::Session;
use crate::config::Config;

#[derive(Args)]
pub struct WaterCommand {
    #[command(subcommand)]
    pub command: WaterSubcommand,
}

#[derive(Subcommand)]
pub enum WaterSubcommand {
    /// Log water intake
    Add {
        /// Amount, in --unit or the configured unit
        amount: f64,

        /// Unit (oz, ml, l, cup)
        #[arg(long, short)]
        unit: Option<VolumeUnit>,

        /// When it was drunk (YYYY-MM-DD HH:MM or HH:MM), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List water entries
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show today's total against the daily goal
    Today,

    /// Show daily totals
    History {
        /// Number of days, today included
        #[arg(long, short, default_value_t = 7)]
        days: u32,
    },

    /// Delete a water entry by ID
    Delete { id: String },
}

impl WaterCommand {
    pub async fn run(
        &self,
        session: &Session,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let store = session.loaded_store::<WaterIntake>().await?;
        let display_unit = config.volume_unit.value;

        match &self.command {
            WaterSubcommand::Add {
                amount,
                unit,
                at,
                notes,
            } => {
                if *amount <= 0.0 {
                    return Err("Amount must be greater than zero".into());
                }
                let mut water = WaterIntake::new(*amount, unit.unwrap_or(display_unit));
                if let Some(notes) = notes {
                    water = water.with_notes(notes);
                }
                let draft = entries::draft_at(water, at.as_deref())?;
                entries::add_entry(&store, draft).await?;
                print_progress(store.today_total(display_unit), config);
            }
            WaterSubcommand::List { format } => {
                entries::print_entries(&store.entries(), format)?;
            }
            WaterSubcommand::Today => {
                print_progress(store.today_total(display_unit), config);
            }
            WaterSubcommand::History { days } => {
                let label = display_unit.to_string();
                store.with_entries(|list| {
                    entries::print_history(list, *days, &label, |water| {
                        convert(water.amount, water.unit, display_unit)
                    })
                });
            }
            WaterSubcommand::Delete { id } => {
                entries::delete_entry(&store, id).await?;
            }
        }

        Ok(())
    }
}

fn print_progress(total: f64, config: &Config) {
    let goal = config.water_goal.value;
    println!(
        "Today: {:.1} of {:.1} {} ({:.0}%)",
        total,
        goal,
        config.volume_unit.value,
        goal_progress(total, goal) * 100.0
    );
}
