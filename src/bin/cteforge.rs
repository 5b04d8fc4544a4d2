//! cteforge: the model compiler CLI
//!
//! # Usage
//!
//! ```bash
//! # Compile ./orders.json into ./orders.sql
//! cteforge single --model-name orders --environment prod
//!
//! # Compile every document under a directory
//! cteforge batch --directory models/ --dialect plain --environment dev
//!
//! # Show what a document compiles to, without writing files
//! cteforge explain orders.json --environment dev
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use cteforge::batch::{self, UnitOutcome};
use cteforge::compiler::pipeline::final_columns;
use cteforge::compiler::{self, CompileOptions};
use cteforge::config::Settings;
use cteforge::transpiler::Dialect;
use cteforge::workbook::Workbook;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cteforge")]
#[command(author = "cteforge Contributors")]
#[command(version)]
#[command(about = "Compile warehouse model sheets into CTE pipelines", long_about = None)]
#[command(after_help = "EXAMPLES:
    cteforge single --model-name orders --environment prod
    cteforge batch --directory models/ --dialect plain
    cteforge explain orders.json --environment dev")]
struct Cli {
    /// Output dialect (overrides the config file)
    #[arg(short, long, value_enum, global = true)]
    dialect: Option<DialectArg>,

    /// Environment substituted for {Environment}
    #[arg(short, long, env = "CTEFORGE_ENVIRONMENT", global = true)]
    environment: Option<String>,

    /// Settings file (default: ./cteforge.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Dbt,
    #[value(alias = "snowflake")]
    Plain,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Dbt => Dialect::Dbt,
            DialectArg::Plain => Dialect::Plain,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one model document
    Single {
        /// Model name; reads <name>.json from the working directory
        #[arg(short, long, required_unless_present = "input")]
        model_name: Option<String>,

        /// Explicit document path
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the generated SQL
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Compile every document under a directory
    Batch {
        /// Root directory, searched recursively
        #[arg(long)]
        directory: PathBuf,
    },
    /// Show the compiled plan of a document without writing files
    Explain {
        /// Document path
        document: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = Settings::discover(cli.config.as_deref())
        .context("failed to load settings")
        .and_then(|settings| run(&cli, &settings));

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cteforge=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns `Ok(false)` when some batch unit failed.
fn run(cli: &Cli, settings: &Settings) -> Result<bool> {
    let options = settings.compile_options(cli.dialect.map(Dialect::from), cli.environment.clone())?;

    match &cli.command {
        Commands::Single {
            model_name,
            input,
            output_dir,
        } => {
            let input = match (input, model_name) {
                (Some(path), _) => path.clone(),
                (None, Some(name)) => PathBuf::from(format!("{}.{}", name, settings.batch.extension)),
                (None, None) => bail!("pass --model-name or --input"),
            };
            let output_dir = output_dir
                .clone()
                .or_else(|| settings.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            compile_single(&input, &output_dir, &options, cli.verbose)?;
            Ok(true)
        }
        Commands::Batch { directory } => {
            run_batch(directory, &settings.batch.extension, &options)
        }
        Commands::Explain { document } => {
            explain(document, &options)?;
            Ok(true)
        }
    }
}

fn compile_single(input: &Path, output_dir: &Path, options: &CompileOptions, verbose: bool) -> Result<()> {
    if !input.exists() {
        bail!("model document '{}' does not exist", input.display());
    }
    if verbose {
        println!("{} {}", "Input:".dimmed(), input.display().to_string().yellow());
    }

    let compiled = batch::compile_file(input, options)
        .with_context(|| format!("failed to compile '{}'", input.display()))?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create '{}'", output_dir.display()))?;
    let written = batch::write_output(output_dir, &compiled, options)
        .with_context(|| format!("failed to write output for '{}'", compiled.model_name))?;

    for warning in &compiled.warnings {
        println!("{} {}", "⚠".yellow(), warning.message.yellow());
    }
    println!("{} Wrote {}", "✓".green(), written.display().to_string().cyan());
    Ok(())
}

fn run_batch(directory: &Path, extension: &str, options: &CompileOptions) -> Result<bool> {
    let report = batch::run_batch(directory, extension, options)
        .with_context(|| format!("failed to scan '{}'", directory.display()))?;

    for outcome in &report.outcomes {
        match outcome {
            UnitOutcome::Written {
                input,
                output,
                warnings,
            } => {
                let suffix = if *warnings > 0 {
                    format!(" ({} warning(s))", warnings).yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    "{} {} → {}{}",
                    "✓".green(),
                    input.display(),
                    output.display().to_string().cyan(),
                    suffix
                );
            }
            UnitOutcome::Failed { input, error } => {
                println!("{} {} {}", "✗".red(), input.display(), error.red());
            }
        }
    }

    println!();
    println!(
        "{} compiled, {} failed",
        report.written().to_string().green(),
        report.failed().to_string().red()
    );
    Ok(report.is_success())
}

fn explain(document: &Path, options: &CompileOptions) -> Result<()> {
    let workbook = Workbook::load(document)
        .with_context(|| format!("failed to read '{}'", document.display()))?;
    let config = workbook.to_configuration(options.dialect)?;
    let plan = compiler::plan(&config, &options.environment);

    println!("{}", "cteforge Model Explanation".cyan().bold());
    println!();
    println!("  {} {}", "Model:".dimmed(), plan.model.model_name.white());
    println!("  {} {}", "Zone:".dimmed(), plan.model.zone.to_string().cyan());
    println!("  {} {}", "Primary key:".dimmed(), plan.model.primary_key_name.white());
    println!("  {} {}", "Dialect:".dimmed(), options.dialect.to_string().cyan());

    if !plan.references.tables.is_empty() {
        println!("  {}", "Reference tables:".dimmed());
        for (alias, table) in plan.references.tables.iter() {
            match &table.filter {
                Some(filter) => println!("    • {} ← {} {}", alias.cyan(), table.table_name.white(), filter.dimmed()),
                None => println!("    • {} ← {}", alias.cyan(), table.table_name.white()),
            }
        }
    }

    println!("  {}", "Source CTEs:".dimmed());
    for alias in config.source_aliases() {
        let columns = plan
            .source_cte(alias)
            .and_then(|cte| cte.as_select())
            .map(|select| select.output_names().join(", "))
            .unwrap_or_default();
        println!("    • {} ({})", alias.cyan(), columns.white());
    }

    println!("  {}", "Final columns:".dimmed());
    for column in final_columns(&plan.model.zone, &config.mappings) {
        println!("    {:>5} {}", column.ordinal_position.to_string().dimmed(), column.name.white());
    }

    if !plan.warnings.is_empty() {
        println!();
        println!("{}", "Warnings:".yellow().bold());
        for warning in &plan.warnings {
            println!("  ⚠ {}", warning.message.yellow());
        }
    }
    Ok(())
}
