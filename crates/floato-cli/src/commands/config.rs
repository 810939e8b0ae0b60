//! Configuration commands.

use clap::Subcommand;
use floato_core::storage::{Config, NotificationSound};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Read one value
    Get {
        /// One of: timer.work_minutes, notifications.enabled,
        /// notifications.sound, notifications.haptics
        key: String,
    },
    /// Set one value
    Set {
        key: String,
        value: String,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Get { key } => {
            let config = Config::load_or_default();
            let value = match key.as_str() {
                "timer.work_minutes" => config.timer.work_minutes.to_string(),
                "notifications.enabled" => config.notifications.enabled.to_string(),
                "notifications.sound" => config.notifications.sound.to_string(),
                "notifications.haptics" => config.notifications.haptics.to_string(),
                other => return Err(format!("unknown config key: {other}").into()),
            };
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_or_default();
            match key.as_str() {
                "timer.work_minutes" => config.set_work_minutes(value.parse()?)?,
                "notifications.enabled" => config.notifications.enabled = value.parse()?,
                "notifications.sound" => {
                    config.notifications.sound = value.parse::<NotificationSound>()?;
                }
                "notifications.haptics" => config.notifications.haptics = value.parse()?,
                other => return Err(format!("unknown config key: {other}").into()),
            }
            config.save()?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}
