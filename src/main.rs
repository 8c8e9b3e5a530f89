use std::fs;

use camino::Utf8PathBuf;
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use bionix::report::{self, Status};
use bionix::{LoadOptions, Tables, convert_batch, load_all};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Convert bioconda recipes to Nix derivations in bulk")]
struct Args {
    /// Directory holding one recipe subdirectory per package.
    recipes: Utf8PathBuf,

    /// Where the generated derivation directories and reports land.
    #[clap(long, default_value = "nixpkgs")]
    outdir: Utf8PathBuf,

    /// Also convert r-* and bioconductor-* recipes.
    #[clap(long)]
    include_r: bool,

    /// Alternate translation table file (YAML). Defaults to the embedded
    /// revision.
    #[clap(long)]
    tables: Option<Utf8PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    eprintln!(
        "Running {} on {}",
        style("bionix").red(),
        style(&args.recipes).blue()
    );

    let tables = match &args.tables {
        Some(path) => Tables::from_path(path)?,
        None => Tables::builtin().clone(),
    };

    let opts = LoadOptions {
        include_r: args.include_r,
        ..Default::default()
    };
    let loaded = load_all(&args.recipes, &opts)?;

    eprintln!(
        "Loaded {} recipes ({} failed to load)",
        style(loaded.recipes.len()).green(),
        style(loaded.failures.len()).yellow(),
    );

    fs::create_dir_all(&args.outdir).map_err(bionix::BionixError::OutputDir)?;

    let outcome = convert_batch(&loaded.recipes, &args.outdir, &tables);

    report::write_all_packages(&args.outdir, &outcome)?;
    report::write_status_report(&args.outdir, &outcome)?;
    report::write_missing_report(&args.outdir, &outcome)?;

    eprintln!();
    eprintln!("Generated nix derivations in {}", style(&args.outdir).blue());
    eprintln!();
    eprintln!(
        "- {} generated OK",
        style(outcome.count(Status::Ok)).green()
    );
    eprintln!(
        "- {} only have an MD5 hash",
        style(outcome.count(Status::Md5Only)).yellow()
    );
    eprintln!(
        "- {} had an error in nix generation",
        style(outcome.count(Status::NixError)).yellow()
    );
    eprintln!(
        "- {} have at least one missing dependency, {} unique missing dependencies in total",
        style(outcome.count(Status::MissingDep)).yellow(),
        style(outcome.missing.len()).yellow(),
    );

    Ok(())
}
