//! The normalized recipe record parsed from a rendered `meta.yaml`.

use camino::Utf8PathBuf;
use serde::{Deserialize, Deserializer};

/// A field that conda recipes write either as a single entry or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Only the first entry is ever used for translation.
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.first(),
        }
    }
}

/// One recipe, parsed and normalized. Immutable after loading.
#[derive(Debug, Clone, Deserialize)]
pub struct Recipe {
    pub package: PackageMeta,

    #[serde(default)]
    pub source: Option<OneOrMany<SourceSpec>>,

    #[serde(default, deserialize_with = "null_default")]
    pub requirements: Requirements,

    #[serde(default, deserialize_with = "null_default")]
    pub build: BuildSpec,

    #[serde(default, deserialize_with = "null_default")]
    pub about: About,

    /// Directory the recipe was loaded from. Needed later to pick up
    /// `build.sh` and patch files. Filled in by the loader.
    #[serde(skip)]
    pub dir: Utf8PathBuf,
}

impl Recipe {
    /// The union of all three requirement lists, raw (version qualifiers
    /// still attached).
    pub fn all_requirements(&self) -> impl Iterator<Item = &str> {
        self.requirements
            .build
            .iter()
            .chain(&self.requirements.host)
            .chain(&self.requirements.run)
            .map(String::as_str)
    }

    /// First source entry, if the recipe has any source block at all.
    pub fn first_source(&self) -> Option<&SourceSpec> {
        self.source.as_ref().and_then(OneOrMany::first)
    }

    /// True when the only content hash the source block offers is md5.
    pub fn md5_only(&self) -> bool {
        match self.first_source() {
            Some(src) => src.sha256.is_none() && src.md5.is_some(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    #[serde(default, deserialize_with = "flexible_string")]
    pub version: String,
}

/// One entry of the recipe's source block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub url: Option<OneOrMany<String>>,
    #[serde(default)]
    pub git_url: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    pub git_rev: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub patches: Vec<String>,
}

impl SourceSpec {
    pub fn first_url(&self) -> Option<&str> {
        self.url.as_ref().and_then(OneOrMany::first).map(|s| s.as_str())
    }
}

/// The three dependency lists. All three are always present after
/// normalization, even when the source recipe declared none of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requirements {
    #[serde(default, deserialize_with = "null_default")]
    pub build: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub host: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub run: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSpec {
    /// Inline build script: a single command or a list of shell lines.
    #[serde(default)]
    pub script: Option<OneOrMany<String>>,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub number: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct About {
    #[serde(default, deserialize_with = "flexible_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "flexible_string")]
    pub home: String,
}

/// Treats an explicit YAML `~` the same as an absent field. Recipes write
/// `requirements:` with nothing under it all the time.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts strings and bare YAML scalars (`version: 1.9` parses as a float).
fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;

    Ok(match value {
        None | Some(serde_yaml::Value::Null) => String::new(),
        Some(serde_yaml::Value::String(s)) => s,
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        Some(serde_yaml::Value::Bool(b)) => b.to_string(),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found {other:?}"
            )));
        }
    })
}

/// Accepts integers and quoted integers (`number: "2"`).
fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;

    Ok(match value {
        None | Some(serde_yaml::Value::Null) => 0,
        Some(serde_yaml::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_yaml::Value::String(s)) => s.parse().map_err(serde::de::Error::custom)?,
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected an integer, found {other:?}"
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Recipe {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_requirements_default_to_empty() {
        let recipe = parse("package:\n  name: samtools\n  version: 1.9\n");
        assert!(recipe.requirements.build.is_empty());
        assert!(recipe.requirements.host.is_empty());
        assert!(recipe.requirements.run.is_empty());
    }

    #[test]
    fn test_null_requirement_lists() {
        let recipe = parse(
            "package:\n  name: samtools\n  version: 1.9\nrequirements:\n  run:\n  host:\n    - zlib\n",
        );
        assert!(recipe.requirements.run.is_empty());
        assert_eq!(recipe.requirements.host, vec!["zlib"]);
    }

    #[test]
    fn test_numeric_version() {
        let recipe = parse("package:\n  name: foo\n  version: 2.1\n");
        assert_eq!(recipe.package.version, "2.1");
    }

    #[test]
    fn test_source_list_takes_first() {
        let recipe = parse(
            "package:\n  name: foo\n  version: 1.0\nsource:\n  - url: https://a.example/foo.tar.gz\n    sha256: abc\n  - url: https://b.example/foo.zip\n    sha256: def\n",
        );
        let src = recipe.first_source().unwrap();
        assert_eq!(src.first_url(), Some("https://a.example/foo.tar.gz"));
        assert_eq!(src.sha256.as_deref(), Some("abc"));
    }

    #[test]
    fn test_url_list_takes_first() {
        let recipe = parse(
            "package:\n  name: foo\n  version: 1.0\nsource:\n  url:\n    - https://a.example/foo.tar.gz\n    - https://mirror.example/foo.tar.gz\n  sha256: abc\n",
        );
        assert_eq!(
            recipe.first_source().unwrap().first_url(),
            Some("https://a.example/foo.tar.gz")
        );
    }

    #[test]
    fn test_md5_only_detection() {
        let recipe = parse(
            "package:\n  name: foo\n  version: 1.0\nsource:\n  url: https://a.example/foo.tar.gz\n  md5: abc\n",
        );
        assert!(recipe.md5_only());

        let recipe = parse(
            "package:\n  name: foo\n  version: 1.0\nsource:\n  url: https://a.example/foo.tar.gz\n  md5: abc\n  sha256: def\n",
        );
        assert!(!recipe.md5_only());
    }

    #[test]
    fn test_inline_script_forms() {
        let recipe = parse(
            "package:\n  name: foo\n  version: 1.0\nbuild:\n  number: 3\n  script: pip install .\n",
        );
        assert_eq!(recipe.build.number, 3);
        assert!(matches!(recipe.build.script, Some(OneOrMany::One(_))));

        let recipe = parse(
            "package:\n  name: foo\n  version: 1.0\nbuild:\n  script:\n    - mkdir -p $PREFIX/bin\n    - cp foo $PREFIX/bin\n",
        );
        assert!(matches!(recipe.build.script, Some(OneOrMany::Many(ref v)) if v.len() == 2));
    }
}
