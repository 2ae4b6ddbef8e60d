use crate::config::settings::CompilerSettings;
use crate::core::playground::Playground;
use crate::kernel::signal::SignalHandler;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON). Defaults to ./tribox.json when present
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the Trivil compiler binary
    #[arg(long, global = true, value_name = "PATH")]
    compiler: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceInput {
    /// Read the snippet from a file
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,
    /// Snippet passed inline
    #[arg(long)]
    code: Option<String>,
}

impl SourceInput {
    fn read(&self) -> Result<String> {
        match (&self.code, &self.file) {
            (Some(code), _) => Ok(code.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read source file {}", path.display())),
            (None, None) => Err(anyhow::anyhow!("either --file or --code is required")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a snippet and run the resulting program
    Compile {
        #[command(flatten)]
        input: SourceInput,
    },
    /// Tokenize a snippet for highlighting
    Analyze {
        #[command(flatten)]
        input: SourceInput,
        /// Emit tokens in document order
        #[arg(long)]
        sorted: bool,
    },
    /// Report whether the configured compiler can be used
    CheckCompiler,
}

fn load_settings(cli: &Cli) -> Result<CompilerSettings> {
    let mut settings = match &cli.config {
        Some(path) => CompilerSettings::load_from_file(path)?,
        None => CompilerSettings::load_default()?,
    };
    settings.apply_env_overrides()?;
    if let Some(compiler) = &cli.compiler {
        settings.compiler_path = compiler.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let mut playground = Playground::new(settings)?;

    // Children must not outlive us on Ctrl-C or SIGTERM
    let registry = Arc::clone(playground.registry());
    SignalHandler::init()?.spawn_watcher(move |code| {
        registry.kill_all();
        std::process::exit(code);
    })?;

    if let Commands::CheckCompiler = cli.command {
        let status = playground.check_compiler();
        emit_json(&status)?;
        if !status.is_ready() {
            std::process::exit(1);
        }
        return Ok(());
    }

    // One-shot runs share the compiler with concurrent invocations and a
    // possible long-lived service, so no orphan scan here
    playground.prepare();

    let succeeded = match &cli.command {
        Commands::Compile { input } => {
            let response = playground.compile(&input.read()?);
            emit_json(&response)?;
            response.success
        }
        Commands::Analyze { input, sorted } => {
            let mut response = playground.analyze(&input.read()?);
            if *sorted {
                response = response.sorted();
            }
            emit_json(&response)?;
            response.success
        }
        Commands::CheckCompiler => true,
    };

    playground.stop();
    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
