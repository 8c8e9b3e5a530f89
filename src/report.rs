//! Batch classification and the durable run reports.
//!
//! Every loaded recipe is classified by its translation outcome; the batch
//! then emits the importable `all-packages.nix` collection plus two
//! tab-separated reports, the inspectable record of what failed and why.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;

use camino::Utf8Path;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::error::BionixError;
use crate::nix::{generate, unresolved_requirements};
use crate::recipe::Recipe;
use crate::tables::Tables;

/// Translation outcome for one package, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Generated a complete derivation directory.
    Ok,
    /// At least one requirement resolves nowhere, not even to another
    /// package in the same batch.
    MissingDep,
    /// Generation failed and the source block only offered an md5 hash.
    Md5Only,
    /// Any other generation failure.
    NixError,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::MissingDep => "MISSING-DEP",
            Status::Md5Only => "MD5-ONLY",
            Status::NixError => "NIX-ERROR",
        }
    }
}

/// The classified outcome of a whole conversion sweep.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Per-package status, ordered by package name.
    pub status: BTreeMap<String, Status>,
    /// How often each unsatisfiable identifier was requested.
    pub missing: HashMap<String, usize>,
}

impl BatchOutcome {
    pub fn count(&self, status: Status) -> usize {
        self.status.values().filter(|&&s| s == status).count()
    }
}

/// Attempts generation for every loaded recipe and classifies each outcome.
/// One package's failure never aborts the sweep.
pub fn convert_batch(
    recipes: &HashMap<String, Recipe>,
    outdir: &Utf8Path,
    tables: &Tables,
) -> BatchOutcome {
    let bar = ProgressBar::new(recipes.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Error setting progress bar template")
            .progress_chars("#>-"),
    );

    let mut outcome = BatchOutcome::default();

    for (name, recipe) in recipes {
        bar.set_message(name.clone());

        let blocking: Vec<String> = unresolved_requirements(recipe, tables)
            .into_iter()
            .filter(|dep| !recipes.contains_key(dep))
            .collect();

        let status = if !blocking.is_empty() {
            for dep in blocking {
                *outcome.missing.entry(dep).or_insert(0) += 1;
            }
            Status::MissingDep
        } else {
            match generate(recipe, outdir, tables) {
                Ok(_) => Status::Ok,
                Err(err) => {
                    debug!("Generation failed for {name}: {err}");
                    if recipe.md5_only() {
                        Status::Md5Only
                    } else {
                        Status::NixError
                    }
                }
            }
        };

        outcome.status.insert(name.clone(), status);
        bar.inc(1);
    }

    bar.finish_with_message("Generated derivations");
    outcome
}

/// Writes `all-packages.nix`, the importable collection of every package
/// that generated cleanly.
pub fn write_all_packages(outdir: &Utf8Path, outcome: &BatchOutcome) -> Result<(), BionixError> {
    let mut text = String::from("with (import <nixpkgs> {});\n\n{\n");

    for (name, status) in &outcome.status {
        if *status == Status::Ok {
            writeln!(text, "  {name} = pkgs.callPackage ./{name} {{ }};\n")
                .expect("writing to a String cannot fail");
        }
    }
    text.push_str("\n}\n");

    fs::write(outdir.join("all-packages.nix"), text)
        .map_err(|e| BionixError::Report("all-packages.nix".to_string(), e))
}

/// Writes the per-package status report, one row per package.
pub fn write_status_report(outdir: &Utf8Path, outcome: &BatchOutcome) -> Result<(), BionixError> {
    let mut text = String::from("package\tstatus\n");

    for (name, status) in &outcome.status {
        writeln!(text, "{name}\t{}", status.as_str())
            .expect("writing to a String cannot fail");
    }

    fs::write(outdir.join("package-status.tsv"), text)
        .map_err(|e| BionixError::Report("package-status.tsv".to_string(), e))
}

/// Writes the missing-dependency frequency report, most requested first.
pub fn write_missing_report(outdir: &Utf8Path, outcome: &BatchOutcome) -> Result<(), BionixError> {
    let mut rows: Vec<(&String, &usize)> = outcome.missing.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    let mut text = String::from("dependency\tcount\n");
    for (name, count) in rows {
        writeln!(text, "{name}\t{count}").expect("writing to a String cannot fail");
    }

    fs::write(outdir.join("missing-dependencies.tsv"), text)
        .map_err(|e| BionixError::Report("missing-dependencies.tsv".to_string(), e))
}
