//! Config CLI commands.
//!
//! Reads and edits `~/.livetransit/config.ini`. Every edit is validated as a
//! whole before it is written, so a bad value never reaches the file.

use std::fmt::Write as _;
use std::path::Path;

use clap::Subcommand;
use livetransit::config::{config_file_path, ConfigKey, LiveConfig};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting (e.g., poll.interval_ms)
    Get { key: String },

    /// Change one setting
    Set { key: String, value: String },

    /// Restore one setting to its default
    Reset { key: String },

    /// Print every setting, grouped by section
    List,

    /// Print the config file location
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let output = run_at(command, &config_file_path())?;
    print!("{}", output);
    Ok(())
}

/// Execute `command` against the config file at `path`, returning what to print.
fn run_at(command: ConfigCommands, path: &Path) -> Result<String, CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = lookup(&key)?;
            Ok(format!("{}\n", shown(&key.get(&LiveConfig::load_from(path)?))))
        }
        ConfigCommands::Set { key, value } => {
            let key = lookup(&key)?;
            edit(path, |config| key.set(config, &value).map_err(CliError::from))?;
            Ok(format!("{} = {}\n", key, value.trim()))
        }
        ConfigCommands::Reset { key } => {
            let key = lookup(&key)?;
            let default = key.get(&LiveConfig::default());
            edit(path, |config| key.set(config, &default).map_err(CliError::from))?;
            Ok(format!("{} = {} (default)\n", key, default))
        }
        ConfigCommands::List => Ok(render_list(&LiveConfig::load_from(path)?)),
        ConfigCommands::Path => Ok(format!("{}\n", path.display())),
    }
}

fn lookup(name: &str) -> Result<ConfigKey, CliError> {
    name.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown key '{}'. Run 'livetransit config list' for the available keys.",
            name
        ))
    })
}

/// Load, apply `change`, validate, then write back.
fn edit<F>(path: &Path, change: F) -> Result<(), CliError>
where
    F: FnOnce(&mut LiveConfig) -> Result<(), CliError>,
{
    let mut config = LiveConfig::load_from(path)?;
    change(&mut config)?;
    config.validate()?;
    config.save_to(path)?;
    Ok(())
}

fn shown(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// INI-shaped listing of every key with its current value.
fn render_list(config: &LiveConfig) -> String {
    let mut out = String::new();
    let mut section = None;

    for key in ConfigKey::all() {
        if section != Some(key.section()) {
            if section.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}]", key.section());
            section = Some(key.section());
        }
        let _ = writeln!(out, "{:<24} = {}", key.key_name(), shown(&key.get(config)));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(path: &Path, key: &str, value: &str) -> Result<String, CliError> {
        run_at(
            ConfigCommands::Set {
                key: key.to_string(),
                value: value.to_string(),
            },
            path,
        )
    }

    fn get(path: &Path, key: &str) -> String {
        run_at(ConfigCommands::Get { key: key.to_string() }, path).unwrap()
    }

    #[test]
    fn test_set_then_get_reads_back_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        assert_eq!(
            set(&path, "poll.interval_ms", " 5000 ").unwrap(),
            "poll.interval_ms = 5000\n"
        );
        assert!(path.exists());
        assert_eq!(get(&path, "poll.interval_ms"), "5000\n");
    }

    #[test]
    fn test_invalid_value_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        assert!(set(&path, "poll.api_url", "ftp://feed").is_err());
        assert!(!path.exists());

        set(&path, "poll.interval_ms", "4000").unwrap();
        assert!(set(&path, "poll.interval_ms", "0").is_err());
        assert_eq!(get(&path, "poll.interval_ms"), "4000\n");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        let result = run_at(ConfigCommands::Get { key: "poll.colour".to_string() }, &path);
        assert!(matches!(result, Err(CliError::Config(message)) if message.contains("poll.colour")));
    }

    #[test]
    fn test_reset_restores_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        let default = ConfigKey::AnimationZoom.get(&LiveConfig::default());

        set(&path, "animation.zoom", "15").unwrap();
        run_at(ConfigCommands::Reset { key: "animation.zoom".to_string() }, &path).unwrap();

        assert_eq!(get(&path, "animation.zoom"), format!("{}\n", default));
    }

    #[test]
    fn test_list_groups_keys_by_section() {
        let listing = render_list(&LiveConfig::default());
        let headers: Vec<&str> = listing.lines().filter(|l| l.starts_with('[')).collect();

        assert_eq!(headers, ["[poll]", "[animation]", "[bearing]", "[storage]"]);
        assert_eq!(
            listing.lines().filter(|l| l.contains(" = ")).count(),
            ConfigKey::all().len()
        );
    }

    #[test]
    fn test_path_reports_given_location() {
        let path = Path::new("/tmp/livetransit/config.ini");
        assert_eq!(
            run_at(ConfigCommands::Path, path).unwrap(),
            "/tmp/livetransit/config.ini\n"
        );
    }
}
