//! Loading a tree of bioconda recipes into normalized records.
//!
//! Each recipe directory is an independent unit of work: filter the selector
//! lines, render the template helpers, parse the YAML, normalize. The batch
//! fans out over rayon with no shared mutable state; a recipe that fails to
//! load is attributed to its directory and never aborts the rest.

use std::collections::HashMap;
use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, warn};

use crate::error::{BionixError, LoadError};
use crate::platform::{Platform, filter_line};
use crate::recipe::Recipe;
use crate::template::Helpers;

/// Recipe name prefixes belonging to the R sub-ecosystem, skipped unless
/// explicitly requested.
const SKIP_PREFIXES: &[&str] = &["r-", "bioconductor-"];

/// Options for a load pass.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Also load `r-*` and `bioconductor-*` recipes.
    pub include_r: bool,
    pub platform: Platform,
}

/// The outcome of a load pass: every recipe that parsed, keyed by package
/// name, plus every failure attributed to its directory.
#[derive(Debug, Default)]
pub struct Loaded {
    pub recipes: HashMap<String, Recipe>,
    pub failures: Vec<(Utf8PathBuf, LoadError)>,
}

/// Applies selector filtering to the raw recipe text.
fn filter_selectors(text: &str, platform: &Platform) -> Result<String, LoadError> {
    let mut kept = String::with_capacity(text.len());

    for (index, line) in text.lines().enumerate() {
        match filter_line(line, platform) {
            Ok(Some(content)) => {
                kept.push_str(content);
                kept.push('\n');
            }
            Ok(None) => {}
            Err((expr, reason)) => {
                return Err(LoadError::Selector(index + 1, expr, reason));
            }
        }
    }

    Ok(kept)
}

/// Loads and normalizes a single recipe directory.
pub fn load_recipe(
    dir: &Utf8Path,
    platform: &Platform,
    helpers: &Helpers,
) -> Result<Recipe, LoadError> {
    let raw = fs::read_to_string(dir.join("meta.yaml"))?;
    let filtered = filter_selectors(&raw, platform)?;
    let rendered = helpers.render(&filtered)?;

    let mut recipe: Recipe = serde_yaml::from_str(&rendered)?;
    if recipe.package.name.is_empty() {
        return Err(LoadError::NoName);
    }
    recipe.dir = dir.to_owned();

    Ok(recipe)
}

/// Loads every recipe under `basedir`, one subdirectory per package.
///
/// Directories without a `meta.yaml` are ignored; R-ecosystem prefixes are
/// skipped unless `include_r` is set. Name collisions resolve
/// last-write-wins, which is logged but accepted.
pub fn load_all(basedir: &Utf8Path, opts: &LoadOptions) -> Result<Loaded, BionixError> {
    let s = Instant::now();
    let helpers = Helpers::default();

    let entries = fs::read_dir(basedir)
        .map_err(|e| BionixError::RecipeDir(basedir.to_string(), e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BionixError::RecipeDir(basedir.to_string(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if !opts.include_r && SKIP_PREFIXES.iter().any(|p| name.starts_with(p)) {
            debug!("Skipping R-ecosystem recipe {name}");
            continue;
        }

        let dir = basedir.join(&name);
        if dir.join("meta.yaml").is_file() {
            dirs.push(dir);
        }
    }

    let bar = ProgressBar::new(dirs.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Error setting progress bar template")
            .progress_chars("#>-"),
    );

    let results: Vec<Result<Recipe, (Utf8PathBuf, LoadError)>> = dirs
        .par_iter()
        .map(|dir| {
            let result = load_recipe(dir, &opts.platform, &helpers)
                .map_err(|err| (dir.clone(), err));
            bar.inc(1);
            result
        })
        .collect();

    bar.finish_with_message(format!(
        "Loaded recipes (+{}ms)",
        s.elapsed().as_millis()
    ));

    let mut loaded = Loaded::default();
    for result in results {
        match result {
            Ok(recipe) => {
                let name = recipe.package.name.clone();
                if let Some(previous) = loaded.recipes.insert(name.clone(), recipe) {
                    // Last write wins; see the resolution notes in DESIGN.md.
                    warn!(
                        "Recipe name collision on '{name}': replacing the copy from {}",
                        previous.dir
                    );
                }
            }
            Err((dir, err)) => {
                warn!("Couldn't load recipe {dir}: {err}");
                loaded.failures.push((dir, err));
            }
        }
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_recipe(root: &std::path::Path, name: &str, meta: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("meta.yaml"), meta).unwrap();
    }

    fn utf8(path: &std::path::Path) -> &Utf8Path {
        Utf8Path::from_path(path).unwrap()
    }

    #[test]
    fn test_load_recipe_renders_and_normalizes() {
        let tmp = tempfile::tempdir().unwrap();
        write_recipe(
            tmp.path(),
            "samtools",
            concat!(
                "{% set version = \"1.9\" %}\n",
                "package:\n",
                "  name: samtools\n",
                "  version: {{ version }}\n",
                "requirements:\n",
                "  build:\n",
                "    - {{ compiler('c') }}\n",
                "  host:\n",
                "    - zlib\n",
                "    - gettext  # [osx]\n",
            ),
        );

        let recipe = load_recipe(
            utf8(&tmp.path().join("samtools")),
            &Platform::linux_x86_64(),
            &Helpers::default(),
        )
        .unwrap();

        assert_eq!(recipe.package.name, "samtools");
        assert_eq!(recipe.package.version, "1.9");
        assert_eq!(recipe.requirements.build, vec!["gcc"]);
        assert_eq!(recipe.requirements.host, vec!["zlib"]);
        assert!(recipe.requirements.run.is_empty());
    }

    #[test]
    fn test_malformed_selector_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        write_recipe(
            tmp.path(),
            "broken",
            "package:\n  name: broken\n  version: 1\nbuild:\n  skip: true  # [plan9]\n",
        );

        let err = load_recipe(
            utf8(&tmp.path().join("broken")),
            &Platform::linux_x86_64(),
            &Helpers::default(),
        )
        .unwrap_err();

        assert!(matches!(err, LoadError::Selector(5, _, _)));
    }

    #[test]
    fn test_load_all_skips_r_ecosystem_and_isolates_failures() {
        let tmp = tempfile::tempdir().unwrap();
        write_recipe(
            tmp.path(),
            "seqtk",
            "package:\n  name: seqtk\n  version: 1.3\n",
        );
        write_recipe(
            tmp.path(),
            "r-ggplot2",
            "package:\n  name: r-ggplot2\n  version: 3.0\n",
        );
        write_recipe(tmp.path(), "busted", "package: [not, a, mapping\n");
        fs::create_dir_all(tmp.path().join("no-meta")).unwrap();

        let loaded = load_all(utf8(tmp.path()), &LoadOptions::default()).unwrap();

        assert_eq!(loaded.recipes.len(), 1);
        assert!(loaded.recipes.contains_key("seqtk"));
        assert_eq!(loaded.failures.len(), 1);
        assert!(loaded.failures[0].0.as_str().ends_with("busted"));
    }

    #[test]
    fn test_load_all_include_r() {
        let tmp = tempfile::tempdir().unwrap();
        write_recipe(
            tmp.path(),
            "r-ggplot2",
            "package:\n  name: r-ggplot2\n  version: 3.0\n",
        );

        let opts = LoadOptions {
            include_r: true,
            ..Default::default()
        };
        let loaded = load_all(utf8(tmp.path()), &opts).unwrap();
        assert!(loaded.recipes.contains_key("r-ggplot2"));
    }
}
