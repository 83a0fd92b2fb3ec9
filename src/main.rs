//! UKG Reasoner - command line entry point

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ukg_reasoner::algorithm::AlgorithmRegistry;
use ukg_reasoner::cli::{Cli, Commands, ConfigSubcommand, OutputFormat};
use ukg_reasoner::config::{self, ReasonerConfig};
use ukg_reasoner::executor::{Task, TaskResult};
use ukg_reasoner::logging;
use ukg_reasoner::scenario::Scenario;
use ukg_reasoner::version::{self, BuildInfo};
use ukg_reasoner::{Error, Orchestrator};

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run_command(cli) {
        let code = match err.downcast_ref::<Error>() {
            Some(e) => {
                if err.to_string() != e.to_string() {
                    eprintln!("{}", err);
                }
                eprint!("{}", e.format_for_terminal());
                e.exit_code()
            }
            None => {
                eprintln!("Error: {:#}", err);
                1
            }
        };
        std::process::exit(code);
    }
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)?;
        }
        Commands::Algorithms => {
            print_algorithms();
        }
        Commands::Agents { config } => {
            let config = ReasonerConfig::load(config.as_deref())?;
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;
            print_agents(&config)?;
        }
        Commands::Run {
            config,
            scenario,
            max_concurrent,
            output,
        } => {
            let mut config = ReasonerConfig::load(config.as_deref())?;
            if let Some(n) = max_concurrent {
                config.tasks.max_concurrent = n;
                config.validate()?;
            }
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

            let scenario = match scenario {
                Some(path) => Scenario::from_file(&path).with_context(|| format!("Loading scenario {}", path))?,
                None => Scenario::demo()?,
            };
            run_scenario(&config, &scenario, output)?;
        }
    }

    Ok(())
}

fn run_scenario(config: &ReasonerConfig, scenario: &Scenario, output: OutputFormat) -> anyhow::Result<()> {
    let build = BuildInfo::current();
    info!(
        version = %build.full_version(),
        max_concurrent = config.tasks.max_concurrent,
        "Starting UKG reasoner"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().clamp(1, config.tasks.max_concurrent.max(1)))
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    let orchestrator = Orchestrator::from_config(config)?;
    let tasks = runtime.block_on(scenario.run(&orchestrator))?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Summary => {
            for task in &tasks {
                println!("{}", summarize(task));
            }
            let failed = tasks.iter().filter(|t| t.error.is_some()).count();
            println!("{} tasks, {} completed, {} failed", tasks.len(), tasks.len() - failed, failed);
        }
    }
    Ok(())
}

/// One line per task: id prefix, type, item, status and a result digest
fn summarize(task: &Task) -> String {
    let id = task.id.to_string();
    let digest = match (&task.result, &task.error) {
        (_, Some(error)) => error.clone(),
        (Some(TaskResult::Ensemble(e)), None) => format!(
            "consensus={} agreement={:.2} members={}/{}",
            fmt_score(e.consensus),
            e.metrics.agreement_score,
            e.succeeded,
            e.individual_results.len()
        ),
        (Some(TaskResult::Validation(v)), None) => format!(
            "overall={} checks={}/{}",
            fmt_score(v.overall_score),
            v.completed().count(),
            v.validations.len()
        ),
        (Some(TaskResult::Research(r)), None) => format!(
            "findings={} added_axes=[{}]",
            r.findings.len(),
            r.enrichment
                .as_ref()
                .map(|e| e.added_axes.join(","))
                .unwrap_or_default()
        ),
        (Some(TaskResult::Analysis(p)), None) => format!(
            "value={} confidence={:.2} agent={}",
            fmt_score(p.value),
            p.confidence,
            p.agent_name
        ),
        (None, None) => String::new(),
    };

    format!(
        "{:.8}  {:<10} {:<18} {:<9} {}",
        id,
        task.task_type.as_str(),
        task.item_ref,
        task.status.to_string(),
        digest
    )
}

fn fmt_score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_algorithms() {
    for d in AlgorithmRegistry::with_builtin().descriptors() {
        println!("{}  ({})", d.id, d.name);
        println!("    required: {}", list_or_dash(&d.required_axes));
        println!("    optional: {}", list_or_dash(&d.optional_axes));
    }
}

fn print_agents(config: &ReasonerConfig) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    for agent in orchestrator.agents() {
        let coverage: Vec<String> = agent.domain_coverage().iter().cloned().collect();
        println!("{}", agent.name());
        if !agent.description().is_empty() {
            println!("    {}", agent.description());
        }
        println!("    domains:    {}", list_or_dash(&coverage));
        println!("    algorithms: {}", list_or_dash(agent.algorithms_available()));
    }
    Ok(())
}

fn list_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn handle_config_command(subcommand: ConfigSubcommand) -> anyhow::Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = ReasonerConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg).map_err(Error::from)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            ReasonerConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
