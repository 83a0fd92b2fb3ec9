//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand, ValueEnum};

/// UKG Reasoner - recursive persona-agent reasoning over knowledge items
///
/// Runs persona agents against knowledge items, escalating domain gaps to
/// peers and scheduling ensemble, validation and research tasks on a
/// bounded worker pool.
#[derive(Parser, Debug)]
#[command(name = "ukg-reasoner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario of tasks and print the final task snapshots
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "UKG_CONFIG")]
        config: Option<String>,

        /// Scenario JSON file (items, findings, tasks); defaults to the bundled demo
        #[arg(short, long)]
        scenario: Option<String>,

        /// Override the number of worker slots
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        output: OutputFormat,
    },

    /// List the configured persona agents
    Agents {
        /// Path to configuration file
        #[arg(short, long, env = "UKG_CONFIG")]
        config: Option<String>,
    },

    /// List the registered algorithms and their axes
    Algorithms,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Full task snapshots as JSON
    Json,
    /// One line per task
    Summary,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a commented default configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["ukg-reasoner", "run"]);
        match cli.command {
            Commands::Run {
                scenario,
                max_concurrent,
                output,
                ..
            } => {
                assert!(scenario.is_none());
                assert!(max_concurrent.is_none());
                assert_eq!(output, OutputFormat::Summary);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::parse_from([
            "ukg-reasoner",
            "run",
            "--scenario",
            "tasks.json",
            "--max-concurrent",
            "2",
            "--output",
            "json",
        ]);
        match cli.command {
            Commands::Run {
                scenario,
                max_concurrent,
                output,
                ..
            } => {
                assert_eq!(scenario.as_deref(), Some("tasks.json"));
                assert_eq!(max_concurrent, Some(2));
                assert_eq!(output, OutputFormat::Json);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_verbose_and_quiet_flags() {
        let cli = Cli::parse_from(["ukg-reasoner", "-vv", "algorithms"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);

        let cli = Cli::parse_from(["ukg-reasoner", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["ukg-reasoner", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
