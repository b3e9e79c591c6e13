//! Selection CLI commands.
//!
//! Edits the persisted line/category filter that `livetransit run` applies.
//! Changes are written immediately, so a running tracker picks them up on
//! its next start.

use std::sync::Arc;

use clap::Subcommand;
use livetransit::category::CategoryToken;
use livetransit::config::LiveConfig;
use livetransit::persistence::JsonFileSelectionPersistence;
use livetransit::selection::{SelectionMode, SelectionStore, MODE_GROUPS};

use crate::error::CliError;

/// Select subcommands.
#[derive(Debug, Subcommand)]
pub enum SelectCommands {
    /// Show the current selection and the available groups
    Show,

    /// Show every vehicle
    All,

    /// Hide every vehicle
    None,

    /// Add or remove a line (e.g., 14, 43X)
    ToggleLine {
        /// Line designation
        line: String,
    },

    /// Add or remove a bus or boat category (e.g., __BUS_BLUE__)
    ToggleCategory {
        /// Category token
        token: String,
    },

    /// Replace the selection with a comma-separated list of lines
    Set {
        /// Lines, e.g. "14, 17, 43X"
        lines: String,
    },
}

/// Run a select subcommand.
pub fn run(command: SelectCommands, config: &LiveConfig) -> Result<(), CliError> {
    let mut store = open_store(config);

    match command {
        SelectCommands::Show => {
            print_selection(&store);
            return Ok(());
        }
        SelectCommands::All => store.show_all(),
        SelectCommands::None => store.show_none(),
        SelectCommands::ToggleLine { line } => {
            if line.trim().is_empty() {
                return Err(CliError::Config("Line must not be empty".to_string()));
            }
            store.toggle_line(&line);
        }
        SelectCommands::ToggleCategory { token } => {
            let category = parse_category(&token)?;
            store.toggle_category(category);
        }
        SelectCommands::Set { lines } => {
            if !store.set_from_text(&lines) {
                return Err(CliError::Config(format!(
                    "No line designations found in '{}'",
                    lines
                )));
            }
        }
    }

    println!("Selection: {}", store.state());
    Ok(())
}

fn open_store(config: &LiveConfig) -> SelectionStore {
    let persistence = JsonFileSelectionPersistence::new(&config.storage.selection_file);
    SelectionStore::load(Arc::new(persistence))
}

fn parse_category(token: &str) -> Result<CategoryToken, CliError> {
    token.trim().parse().map_err(|_| {
        let known: Vec<&str> = CategoryToken::BUS
            .iter()
            .chain(CategoryToken::BOAT.iter())
            .map(|t| t.as_str())
            .collect();
        CliError::Config(format!(
            "Unknown category '{}'. Known categories: {}",
            token,
            known.join(", ")
        ))
    })
}

fn print_selection(store: &SelectionStore) {
    let state = store.state();

    match state.mode() {
        SelectionMode::All => println!("Selection: all vehicles"),
        SelectionMode::None => println!("Selection: no vehicles"),
        SelectionMode::Partial => println!("Selection: {}", state),
    }
    println!();

    for group in MODE_GROUPS {
        let marker = if group.is_active(state, false) { "*" } else { " " };
        println!("{} {:<14} {}", marker, group.key, group.label);

        if !group.lines.is_empty() {
            let lines: Vec<String> = group
                .lines
                .iter()
                .map(|line| {
                    if state.is_line_selected(line) {
                        format!("[{}]", line)
                    } else {
                        line.to_string()
                    }
                })
                .collect();
            println!("    lines: {}", lines.join(" "));
        }

        for category in group.categories() {
            let marker = if state.has_category(*category) { "x" } else { " " };
            println!("    [{}] {:<16} {}", marker, category.label(), category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> LiveConfig {
        let mut config = LiveConfig::default();
        config.storage.selection_file = temp.path().join("selected_lines.v7.json");
        config
    }

    #[test]
    fn test_toggle_commands_persist() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        run(
            SelectCommands::ToggleLine {
                line: "43x".to_string(),
            },
            &config,
        )
        .unwrap();
        run(
            SelectCommands::ToggleCategory {
                token: "__BUS_BLUE__".to_string(),
            },
            &config,
        )
        .unwrap();

        let store = open_store(&config);
        assert!(store.state().contains("43X"));
        assert!(store.state().has_category(CategoryToken::BusBlue));
    }

    #[test]
    fn test_none_then_all() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        run(SelectCommands::None, &config).unwrap();
        assert_eq!(open_store(&config).mode(), SelectionMode::None);

        run(SelectCommands::All, &config).unwrap();
        assert_eq!(open_store(&config).mode(), SelectionMode::All);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let result = run(
            SelectCommands::ToggleCategory {
                token: "__TRAM__".to_string(),
            },
            &config,
        );
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_set_without_lines_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let result = run(
            SelectCommands::Set {
                lines: " , ,".to_string(),
            },
            &config,
        );
        assert!(result.is_err());
        assert_eq!(open_store(&config).mode(), SelectionMode::All);
    }
}
