//! Translation of one normalized recipe into a Nix derivation directory.
//!
//! Output layout per package: `<outdir>/<name>/default.nix`, a companion
//! `build.sh` when the build needs a standalone script, and any patch files
//! copied from the recipe directory. Everything is rendered from embedded
//! minijinja templates.

use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;
use minijinja::{Environment, context};

use crate::error::GenerateError;
use crate::recipe::{OneOrMany, Recipe};
use crate::tables::{Resolution, Tables, strip_version};

/// Bindings every derivation pulls in regardless of what the recipe itself
/// requires: the base toolchain environment, the nixpkgs library helper, an
/// archive tool and the URL fetcher.
const MANDATORY_INPUTS: &[&str] = &["stdenv", "lib", "unzip", "fetchurl"];

const TEMPLATE_DERIVATION: &str = r#"{ {{ arguments }} }:

stdenv.mkDerivation rec {
  pname = "{{ pname }}";
  version = "{{ version }}";
  buildNumber = "{{ buildnum }}";

{{ src }}
  buildInputs = [ {{ inputs }} ];
  nativeBuildInputs = [ {{ native }} ];
{% if patches %}
  patches = [{% for patch in patches %} ./{{ patch }}{% endfor %} ];
{% endif %}
  checkPhase = ''
  '';

  buildPhase = ''
    bash ${./build.sh}
  '';

  meta = with lib; {
    description = "{{ description }}";
    homepage = "{{ homepage }}";
    platforms = platforms.all;
    maintainers = [ ];
  };
}
"#;

const TEMPLATE_PYTHON: &str = r#"{ {{ arguments }} }:

python3Packages.buildPythonPackage rec {
  pname = "{{ pname }}";
  version = "{{ version }}";

{{ src }}
  propagatedBuildInputs = [ {{ inputs }} ];
  nativeBuildInputs = [ {{ native }} ];

  meta = with lib; {
    description = "{{ description }}";
    homepage = "{{ homepage }}";
    platforms = platforms.all;
    maintainers = [ ];
  };
}
"#;

const TEMPLATE_SRC_URL: &str = r#"  src = fetchurl {
    url = "{{ url }}";
    sha256 = "{{ sha256 }}";
  };
"#;

const TEMPLATE_SRC_GITHUB: &str = r#"  src = fetchFromGitHub {
    owner = "{{ owner }}";
    repo = "{{ repo }}";
    rev = "{{ rev }}";
    sha256 = "{{ sha256 }}";
  };
"#;

/// Preamble prepended to every standalone build script: strict failure
/// mode, the package variables, the stdenv hooks, the output prefix, then
/// unpack the source and enter its root.
const TEMPLATE_BUILD_SH: &str = r#"#!/bin/bash
set -euo pipefail

export PKG_NAME="{{ pname }}"
export PKG_VERSION="{{ version }}"
export PKG_BUILDNUM="{{ buildnum }}"

source $stdenv/setup

export PREFIX="$out"
mkdir -p "$PREFIX/bin"

mkdir -p "$PKG_NAME-src"
cd "$PKG_NAME-src"
tar xaf "$src" --strip-components=1

{{ body }}
"#;

/// Resolved dependency sets for one recipe. Set semantics throughout; the
/// rendered order is sorted but not part of the contract.
#[derive(Debug, Default)]
pub struct DepSets {
    /// Top-level function arguments, mandatory inputs included.
    pub arguments: BTreeSet<String>,
    /// `nativeBuildInputs` (the recipe's build-time list).
    pub native: BTreeSet<String>,
    /// `buildInputs` (the host-time and run-time lists).
    pub inputs: BTreeSet<String>,
    /// Identifiers absent from every translation table. The caller decides
    /// whether these block generation; when generation proceeds, they pass
    /// through verbatim (they are other in-batch packages).
    pub unresolved: Vec<String>,
}

/// Resolves every requirement of the recipe through the translation tables.
pub fn resolve_dependencies(recipe: &Recipe, tables: &Tables) -> DepSets {
    let mut deps = DepSets::default();

    for raw in MANDATORY_INPUTS {
        deps.arguments.insert(raw.to_string());
    }

    let mut resolve = |raw: &str, target: &mut BTreeSet<String>| {
        let name = strip_version(raw);
        match tables.resolve(name) {
            Resolution::Suppressed => {}
            Resolution::Renamed(n) | Resolution::Available(n) => {
                deps.arguments.insert(n.to_string());
                target.insert(n.to_string());
            }
            Resolution::Unknown => {
                deps.unresolved.push(name.to_string());
                deps.arguments.insert(name.to_string());
                target.insert(name.to_string());
            }
        }
    };

    let mut native = BTreeSet::new();
    let mut inputs = BTreeSet::new();

    for raw in &recipe.requirements.build {
        resolve(raw, &mut native);
    }
    for raw in recipe.requirements.host.iter().chain(&recipe.requirements.run) {
        resolve(raw, &mut inputs);
    }

    deps.native = native;
    deps.inputs = inputs;
    deps
}

/// The requirement identifiers of a recipe that no table resolves, one
/// entry per occurrence across the three lists; the frequency report counts
/// every occurrence.
pub fn unresolved_requirements(recipe: &Recipe, tables: &Tables) -> Vec<String> {
    recipe
        .all_requirements()
        .map(strip_version)
        .filter(|name| tables.resolve(name) == Resolution::Unknown)
        .map(str::to_string)
        .collect()
}

/// How the derivation fetches its source.
#[derive(Debug, PartialEq, Eq)]
enum NixSource {
    Url {
        url: String,
        sha256: String,
    },
    GitHub {
        owner: String,
        repo: String,
        rev: String,
        sha256: String,
    },
}

/// Extracts the first source entry of the recipe. The sha256 hash is the
/// one accepted verification algorithm; without it the derivation would be
/// unverifiable, so its absence is a hard failure.
fn extract_source(recipe: &Recipe) -> Result<NixSource, GenerateError> {
    let source = recipe.first_source().ok_or(GenerateError::NoSource)?;
    let sha256 = source.sha256.clone().ok_or(GenerateError::NoHash)?;

    if let Some(git_url) = &source.git_url
        && !source.git_rev.is_empty()
        && let Some((owner, repo)) = parse_github(git_url)
    {
        return Ok(NixSource::GitHub {
            owner,
            repo,
            rev: source.git_rev.clone(),
            sha256,
        });
    }

    let url = source.first_url().ok_or(GenerateError::NoUrl)?;
    Ok(NixSource::Url {
        url: url.to_string(),
        sha256,
    })
}

fn parse_github(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let mut parts = rest.split('/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?.trim_end_matches(".git").to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

/// The build instructions extracted from a recipe.
#[derive(Debug, PartialEq, Eq)]
enum BuildPlan {
    /// A pip install recognized on the inline script; rendered with the
    /// Python package template, no script file written.
    PythonPackage,
    /// Shell script body to write out as `build.sh` (preamble prepended).
    Script(String),
}

/// Prefers an explicit `build.sh` beside the recipe, falls back to the
/// inline script field. Neither is a hard failure.
fn extract_build(recipe: &Recipe) -> Result<BuildPlan, GenerateError> {
    let colocated = recipe.dir.join("build.sh");
    if colocated.is_file() {
        return Ok(BuildPlan::Script(fs::read_to_string(colocated)?));
    }

    match &recipe.build.script {
        Some(OneOrMany::One(line)) => {
            if line.contains("pip install") {
                Ok(BuildPlan::PythonPackage)
            } else {
                Ok(BuildPlan::Script(format!("python {}\n", line.trim())))
            }
        }
        Some(OneOrMany::Many(lines)) => {
            let body = lines.join("\n");
            if body.contains("pip install") {
                Ok(BuildPlan::PythonPackage)
            } else {
                Ok(BuildPlan::Script(body))
            }
        }
        None => Err(GenerateError::NoBuildScript),
    }
}

/// Escapes text for a double-quoted Nix string literal: backslashes,
/// quotes, and the `${` interpolation sigil.
pub fn escape_nix_string(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${")
}

fn render_args(args: &BTreeSet<String>) -> String {
    args.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn render_list(items: &BTreeSet<String>) -> String {
    items.iter().cloned().collect::<Vec<_>>().join(" ")
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_template("default.nix", TEMPLATE_DERIVATION)
        .expect("embedded template must parse");
    env.add_template("python.nix", TEMPLATE_PYTHON)
        .expect("embedded template must parse");
    env.add_template("src-url.nix", TEMPLATE_SRC_URL)
        .expect("embedded template must parse");
    env.add_template("src-github.nix", TEMPLATE_SRC_GITHUB)
        .expect("embedded template must parse");
    env.add_template("build.sh", TEMPLATE_BUILD_SH)
        .expect("embedded template must parse");
    env
}

/// Generates the output directory for one recipe and returns its package
/// name. Unresolved identifiers pass through verbatim; the caller is
/// expected to have classified recipes whose unresolved identifiers are not
/// satisfiable in-batch before calling this.
pub fn generate(
    recipe: &Recipe,
    outdir: &Utf8Path,
    tables: &Tables,
) -> Result<String, GenerateError> {
    let name = &recipe.package.name;
    let version = &recipe.package.version;

    if recipe.about.summary.is_empty() {
        return Err(GenerateError::NoDescription);
    }
    if recipe.about.home.is_empty() {
        return Err(GenerateError::NoHomepage);
    }

    let mut deps = resolve_dependencies(recipe, tables);
    let source = extract_source(recipe)?;
    let plan = extract_build(recipe)?;

    let patches = recipe
        .first_source()
        .map(|src| src.patches.clone())
        .unwrap_or_default();

    // Verify the patch files before writing anything.
    for patch in &patches {
        if !recipe.dir.join(patch).is_file() {
            return Err(GenerateError::MissingPatch(patch.clone()));
        }
    }

    if matches!(source, NixSource::GitHub { .. }) {
        deps.arguments.insert("fetchFromGitHub".to_string());
    }
    if matches!(plan, BuildPlan::PythonPackage) {
        deps.arguments.insert("python3Packages".to_string());
    }

    let env = environment();

    let src = match &source {
        NixSource::Url { url, sha256 } => env.get_template("src-url.nix")?.render(context! {
            url => escape_nix_string(url),
            sha256 => sha256,
        })?,
        NixSource::GitHub {
            owner,
            repo,
            rev,
            sha256,
        } => env.get_template("src-github.nix")?.render(context! {
            owner => owner,
            repo => repo,
            rev => rev,
            sha256 => sha256,
        })?,
    };

    let template = match plan {
        BuildPlan::PythonPackage => "python.nix",
        BuildPlan::Script(_) => "default.nix",
    };

    let derivation = env.get_template(template)?.render(context! {
        arguments => render_args(&deps.arguments),
        pname => name,
        version => version,
        buildnum => recipe.build.number,
        src => src,
        inputs => render_list(&deps.inputs),
        native => render_list(&deps.native),
        patches => patches,
        description => escape_nix_string(&recipe.about.summary),
        homepage => escape_nix_string(&recipe.about.home),
    })?;

    let pkg_dir = outdir.join(name);
    fs::create_dir_all(&pkg_dir)?;
    fs::write(pkg_dir.join("default.nix"), derivation)?;

    if let BuildPlan::Script(body) = &plan {
        let script = env.get_template("build.sh")?.render(context! {
            pname => name,
            version => version,
            buildnum => recipe.build.number,
            body => body,
        })?;
        fs::write(pkg_dir.join("build.sh"), script)?;
    }

    for patch in &patches {
        fs::copy(recipe.dir.join(patch), pkg_dir.join(patch))?;
    }

    Ok(name.clone())
}
