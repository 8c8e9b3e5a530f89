use thiserror::Error;

/// Top level error for a whole conversion run. Per-recipe failures are
/// carried by [`LoadError`] and [`GenerateError`] and never bubble up here;
/// this type covers the failures that abort the entire batch.
#[derive(Debug, Error)]
pub enum BionixError {
    #[error("Recipe directory '{0}' is not readable:\n{1}")]
    RecipeDir(String, std::io::Error),

    #[error("Couldn't prepare the output directory:\n{0}")]
    OutputDir(std::io::Error),

    #[error("Couldn't write report '{0}':\n{1}")]
    Report(String, std::io::Error),

    #[error("Couldn't load translation tables:\n{0}")]
    Tables(#[from] TablesError),
}

/// Errors local to loading a single recipe. Each one is attributed to the
/// recipe directory by the caller; a failing recipe never aborts the batch.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Couldn't read meta.yaml:\n{0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Line {0}: malformed selector '[{1}]': {2}")]
    Selector(usize, String, String),

    #[error("Template rendering failed:\n{0}")]
    Template(#[from] minijinja::Error),

    #[error("Couldn't parse rendered recipe as YAML:\n{0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Recipe has no package name")]
    NoName,
}

/// Errors local to generating one derivation. Every variant names the
/// specific piece of information the recipe is missing.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("No source entry on the recipe")]
    NoSource,

    #[error("No source URL on the first source entry")]
    NoUrl,

    #[error("No sha256 hash on the first source entry")]
    NoHash,

    #[error("No build.sh and no inline build script")]
    NoBuildScript,

    #[error("No summary in the about block")]
    NoDescription,

    #[error("No homepage in the about block")]
    NoHomepage,

    #[error("Patch file '{0}' is missing from the recipe directory")]
    MissingPatch(String),

    #[error("Couldn't render the derivation template:\n{0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors loading the translation table data file.
#[derive(Debug, Error)]
pub enum TablesError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Couldn't parse table data:\n{0}")]
    Yaml(#[from] serde_yaml::Error),
}
