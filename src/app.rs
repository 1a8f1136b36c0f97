//! Command-line parsing and command routing.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// Live microphone meters and screen recording in the terminal
#[derive(Parser)]
#[command(name = "micscope")]
#[command(version)]
#[command(about = "Live microphone volume and spectrum meters with screen recording")]
#[command(long_about = "Live microphone volume and spectrum meters with screen recording.\n\nDEFAULT COMMAND:\n    If no command is given, 'monitor' opens the interactive page.\n\nPAGE KEYS:\n    v        start visualization      V / x    stop visualization\n    r        start recording          R / s    stop recording\n    d        save last recording      p        play last recording\n    q / Esc  quit\n\nSIGNALS:\n    SIGUSR1 toggles recording, SIGUSR2 toggles visualization, e.g.\n    $ pkill -USR1 micscope")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/micscope/micscope.toml\n    Logs:               ~/.local/state/micscope/micscope.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Open the interactive monitor page (default)
    #[command(visible_alias = "m")]
    Monitor,

    /// List available audio input devices
    ///
    /// Shows the IDs and names accepted by `[audio] device` in micscope.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show the last 50 lines of the most recent log file
    Logs,

    /// Open the configuration file in your preferred editor
    ///
    /// Uses $EDITOR, falling back to nano or vi.
    #[command(visible_alias = "c")]
    Config,

    /// Generate a shell completion script
    ///
    /// Examples:
    ///   micscope completions bash > micscope.bash
    ///   micscope completions zsh > _micscope
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the command named on the command line.
///
/// # Errors
/// - If logging cannot be initialized
/// - If the command fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // commands that print to the terminal run without file logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "micscope", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return exit_on_error(commands::handle_list_devices()),
        Some(Commands::Logs) => return exit_on_error(commands::handle_logs()),
        _ => {}
    }

    logging::init_logging()?;
    tracing::info!("micscope {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None | Some(Commands::Monitor) => commands::handle_monitor().await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }
    Ok(())
}

fn exit_on_error(result: anyhow::Result<()>) -> anyhow::Result<()> {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_defaults_to_monitor() {
        let cli = Cli::try_parse_from(["micscope"]).unwrap();
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from(["micscope", "m"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Monitor));
    }

    #[test]
    fn test_list_devices_name() {
        let cli = Cli::try_parse_from(["micscope", "list-devices"]).unwrap();
        assert_eq!(cli.command, Some(Commands::ListDevices));
    }
}
