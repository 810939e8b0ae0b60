//! Statistics reporting commands.

use clap::Subcommand;
use floato_core::storage::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today / trailing week / trailing month / all-time totals
    Summary {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Today's completions per half-hour slot
    Today,
    /// Today's completions per category
    Categories,
    /// Per-day counts for a trailing window
    Heatmap {
        /// Number of days, ending today
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Drop all statistics counters
    Reset,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    let stats = db.load_statistics()?;

    match action {
        StatsAction::Summary { json } => {
            let summary = stats.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("today:      {}", summary.today);
                println!("this week:  {}", summary.this_week);
                println!("this month: {}", summary.this_month);
                println!("total:      {}", summary.total);
            }
        }
        StatsAction::Today => {
            let slots = stats.half_hourly_today();
            if slots.is_empty() {
                println!("No completions today");
            }
            for (slot, count) in slots {
                let hour = u32::from(slot) / 2;
                let minute = if slot % 2 == 0 { 0 } else { 30 };
                println!("{hour:02}:{minute:02}  {count}");
            }
        }
        StatsAction::Categories => {
            let breakdown = stats.category_breakdown_today();
            if breakdown.is_empty() {
                println!("No completions today");
            }
            for (category, count) in breakdown {
                println!("{category:<10} {count}");
            }
        }
        StatsAction::Heatmap { days } => {
            for (day, count) in stats.heatmap_series(days) {
                println!("{day}  {count}");
            }
        }
        StatsAction::Reset => {
            db.clear_statistics()?;
            println!("Statistics cleared");
        }
    }
    Ok(())
}
