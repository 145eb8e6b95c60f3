use clap::Subcommand;
use primepath_core::TimerConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the full configuration as TOML
    Show,
    /// Get a value by dot-separated key
    Get { key: String },
    /// Set a value by dot-separated key and persist
    Set { key: String, value: String },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let cfg = TimerConfig::load_or_default();
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }
        ConfigAction::Get { key } => {
            let cfg = TimerConfig::load_or_default();
            match cfg.get(&key) {
                Some(value) => {
                    println!("{value}");
                    Ok(())
                }
                None => Err(format!("unknown config key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut cfg = TimerConfig::load_or_default();
            cfg.set(&key, &value)?;
            println!("Updated {key} = {value}");
            Ok(())
        }
    }
}
