use chrono::{Local, Timelike};
use clap::{Args, Subcommand};

use habit_sync::{FoodEntry, MealType};

use super::entries::{self, OutputFormat};
use super::session::Session;

#[derive(Args)]
pub struct FoodCommand {
    #[command(subcommand)]
    pub command: FoodSubcommand,
}

#[derive(Subcommand)]
pub enum FoodSubcommand {
    /// Log something eaten
    Add {
        /// What was eaten
        name: String,

        #[arg(long, short = 'k')]
        calories: f64,

        /// Meal type (breakfast, lunch, dinner, snack), defaults by time of day
        #[arg(long = "meal", short = 'm', value_name = "MEAL")]
        meal: Option<MealType>,

        /// Protein in grams
        #[arg(long, default_value_t = 0.0)]
        protein: f64,

        /// Carbohydrates in grams
        #[arg(long, default_value_t = 0.0)]
        carbs: f64,

        /// Fat in grams
        #[arg(long, default_value_t = 0.0)]
        fat: f64,

        /// When it was eaten (YYYY-MM-DD HH:MM or HH:MM), defaults to now
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List food entries
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show today's nutrition, per meal
    Today,

    /// Show daily calories
    History {
        /// Number of days, today included
        #[arg(long, short, default_value_t = 7)]
        days: u32,
    },

    /// Delete a food entry by ID
    Delete { id: String },
}

impl FoodCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let store = session.loaded_store::<FoodEntry>().await?;

        match &self.command {
            FoodSubcommand::Add {
                name,
                calories,
                meal,
                protein,
                carbs,
                fat,
                at,
                notes,
            } => {
                if *calories < 0.0 {
                    return Err("Calories cannot be negative".into());
                }
                let meal = meal.unwrap_or_else(|| MealType::from_hour(Local::now().hour()));
                let mut food = FoodEntry::new(name.as_str(), meal, *calories)
                    .with_macros(*protein, *carbs, *fat);
                if let Some(notes) = notes {
                    food = food.with_notes(notes);
                }
                let draft = entries::draft_at(food, at.as_deref())?;
                entries::add_entry(&store, draft).await?;
                println!("Today: {:.0} kcal", store.today_calories());
            }
            FoodSubcommand::List { format } => {
                entries::print_entries(&store.entries(), format)?;
            }
            FoodSubcommand::Today => {
                let meals = store.today_by_meal();
                if meals.is_empty() {
                    println!("Nothing logged today.");
                    return Ok(());
                }
                for (meal, totals) in &meals {
                    println!("{:<10} {}", meal.to_string(), totals);
                }
                println!();
                println!(
                    "{:<10} {}",
                    "total",
                    store.nutrition_in(habit_sync::aggregate::DayWindow::today())
                );
            }
            FoodSubcommand::History { days } => {
                store.with_entries(|list| {
                    entries::print_history(list, *days, "kcal", |food| food.calories)
                });
            }
            FoodSubcommand::Delete { id } => {
                entries::delete_entry(&store, id).await?;
            }
        }

        Ok(())
    }
}
