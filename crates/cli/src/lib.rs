pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use cobuy_core::config::{ConfigOverrides, LoadOptions, LogFormat, PipelineConfig};

use crate::commands::score::Stage;
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "cobuy",
    about = "Cobuy recommendation pipeline CLI",
    long_about = "Build item-to-item recommendation tables from transactions and fuse them into one hybrid ranking.",
    after_help = "Examples:\n  cobuy run\n  cobuy cooccurrence --output-dir data/recs\n  cobuy hybrid --k 5\n  cobuy config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file (defaults to cobuy.toml or config/cobuy.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory holding the input tables")]
    input_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory recommendation tables are written to")]
    output_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "compact|pretty|json")]
    log_format: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Score basket co-occurrence neighbors and write the wide table")]
    Cooccurrence,
    #[command(about = "Mine pairwise association rules and write the wide table")]
    Rules,
    #[command(about = "Match items within brand and category and write the wide table")]
    Brand,
    #[command(about = "Rank similarity-collaborator neighbors and write the wide table")]
    Embedding,
    #[command(about = "Fuse previously written source tables into the hybrid ranking")]
    Hybrid {
        #[arg(long, help = "Neighbors kept per item in the fused output")]
        k: Option<usize>,
    },
    #[command(about = "Run every enabled source and the fuser in one pass")]
    Run,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Cooccurrence => "cooccurrence",
            Self::Rules => "rules",
            Self::Brand => "brand",
            Self::Embedding => "embedding",
            Self::Hybrid { .. } => "hybrid",
            Self::Run => "run",
            Self::Config => "config",
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn execute(cli: Cli) -> CommandResult {
    let command_name = cli.command.name();
    let options = match load_options(&cli.global, &cli.command) {
        Ok(options) => options,
        Err(error) => return CommandResult::from_error(command_name, &error),
    };

    match cli.command {
        Command::Cooccurrence => with_config(command_name, options, |config| {
            commands::score::run(config, Stage::Cooccurrence)
        }),
        Command::Rules => {
            with_config(command_name, options, |config| commands::score::run(config, Stage::Rules))
        }
        Command::Brand => {
            with_config(command_name, options, |config| commands::score::run(config, Stage::Brand))
        }
        Command::Embedding => with_config(command_name, options, |config| {
            commands::score::run(config, Stage::Embedding)
        }),
        Command::Hybrid { .. } => with_config(command_name, options, commands::hybrid::run),
        Command::Run => with_config(command_name, options, commands::pipeline::run),
        Command::Config => CommandResult { exit_code: 0, output: commands::config::run(&options) },
    }
}

fn with_config(
    command_name: &str,
    options: LoadOptions,
    command: impl FnOnce(&PipelineConfig) -> CommandResult,
) -> CommandResult {
    let config = match PipelineConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command_name,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    logging::init_logging(&config.logging);
    command(&config)
}

fn load_options(global: &GlobalArgs, command: &Command) -> anyhow::Result<LoadOptions> {
    let log_format = match global.log_format.as_deref() {
        Some(raw) => Some(raw.parse::<LogFormat>()?),
        None => None,
    };
    let hybrid_k = match command {
        Command::Hybrid { k } => *k,
        _ => None,
    };

    Ok(LoadOptions {
        config_path: global.config.clone(),
        require_file: global.config.is_some(),
        overrides: ConfigOverrides {
            input_dir: global.input_dir.clone(),
            output_dir: global.output_dir.clone(),
            log_level: global.log_level.clone(),
            log_format,
            hybrid_k,
        },
    })
}
