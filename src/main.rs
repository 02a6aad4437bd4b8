use abilitycash_ledger::{Scope, DEFAULT_SCOPE_FILE};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Convert Ability Cash exports into ledger journals
#[derive(Parser)]
#[command(name = "abilitycash2ledger", version, about)]
struct Cli {
    /// Scope file listing the datafiles and their lookup tables
    #[arg(long, default_value = DEFAULT_SCOPE_FILE)]
    scope: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a source file (XML, CSV directory or .cash database) to the scope
    #[command(alias = "a")]
    Add { path: String },

    /// Read every datafile and fill the lookup tables for manual review
    #[command(alias = "p")]
    Prepare,

    /// Write ledger files for every active datafile
    #[command(alias = "c")]
    Convert,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut scope = Scope::load(&cli.scope)?;

    match cli.command {
        Command::Add { path } => run_add(&mut scope, &cli.scope, &path)?,
        Command::Prepare => run_prepare(&mut scope, &cli.scope)?,
        Command::Convert => run_convert(&scope)?,
    }

    Ok(())
}

fn run_add(scope: &mut Scope, scope_path: &Path, path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        bail!("{} does not exist", path);
    }

    scope.add_file(path)?;
    scope.save(scope_path)?;
    println!("✓ Added {} to {}", path, scope_path.display());

    Ok(())
}

fn run_prepare(scope: &mut Scope, scope_path: &Path) -> Result<()> {
    println!("🔍 Preparing {} datafile(s)...", scope.datafiles.len());

    let prepared = scope.prepare()?;
    for message in &prepared.messages {
        println!("✓ {}", message);
    }

    if !prepared.report.is_empty() {
        println!("\n⚠️  {}", prepared.report.summary());
        for issue in &prepared.report.issues {
            println!("   {}", issue);
        }
    }

    scope.save(scope_path)?;
    println!("\n💾 Lookup tables saved to {}", scope_path.display());

    Ok(())
}

fn run_convert(scope: &Scope) -> Result<()> {
    println!("🔄 Converting...");

    let summaries = scope.export()?;
    for summary in &summaries {
        println!(
            "✓ {}: {} transactions",
            summary.path, summary.transactions
        );
        if !summary.report.is_empty() {
            println!("   {}", summary.report.summary());
        }
    }

    println!("✅ Converted {} datafile(s)", summaries.len());
    Ok(())
}
