//! Task management commands.

use clap::Subcommand;
use floato_core::storage::Database;
use floato_core::task::{TaskCategory, TaskList};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Target number of pomodoro intervals (default: 1)
        #[arg(long, default_value = "1")]
        pomos: u32,
        /// Category: work, study, personal, health, hobby (default: work)
        #[arg(long, default_value = "work")]
        category: String,
    },
    /// List tasks in order
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete a task by its list position (as shown by `task list`)
    Delete {
        /// Zero-based position
        index: usize,
    },
    /// Delete all tasks
    Reset,
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    let mut list = TaskList::from_tasks(db.load_tasks()?);

    match action {
        TaskAction::Add {
            title,
            pomos,
            category,
        } => {
            let category = category.parse::<TaskCategory>()?;
            let task = list.add(&title, pomos, category)?.clone();
            db.save_tasks(list.tasks())?;
            println!("Added '{}' ({} pomos, {})", task.title, task.target_intervals, task.category);
        }
        TaskAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(list.tasks())?);
            } else if list.is_empty() {
                println!("No tasks. Add one with `floato task add <title>`.");
            } else {
                let active = list.active_index();
                for (i, task) in list.tasks().iter().enumerate() {
                    let marker = if task.is_done {
                        'x'
                    } else if active == Some(i) {
                        '>'
                    } else {
                        ' '
                    };
                    println!(
                        "{marker} {i:>2}  {}/{}  [{}]  {}",
                        task.finished_intervals, task.target_intervals, task.category, task.title
                    );
                }
            }
        }
        TaskAction::Delete { index } => match list.delete_at(index) {
            Some(task) => {
                db.save_tasks(list.tasks())?;
                println!("Deleted '{}'", task.title);
            }
            None => println!("No task at index {index}"),
        },
        TaskAction::Reset => {
            list.reset_all();
            db.save_tasks(list.tasks())?;
            println!("All tasks deleted");
        }
    }
    Ok(())
}
