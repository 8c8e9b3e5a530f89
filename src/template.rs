//! The recipe templating pass.
//!
//! Recipes are Jinja templates over a small closed set of helper functions.
//! The helpers are pure lookups over static tables, injected into a
//! [`minijinja::Environment`] per render so the pass is fully testable in
//! isolation.

use std::collections::{HashMap, HashSet};

use minijinja::value::Rest;
use minijinja::{Environment, ErrorKind, Value, context};

/// Identifiers that `pin_compatible` may be called with. Calling it with
/// anything else is a recipe error, not a silent pass-through.
const PIN_COMPATIBLE: &[&str] = &[
    "llvm-openmp",
    "zlib",
    "xerces-c",
    "boost-cpp",
    "boost",
    "eigen",
    "glpk",
    "hdf5",
    "bzip2",
    "qt",
    "libsvm",
    "coinmp",
    "sqlite",
    "scipy",
    "perl",
    "pysam",
    "h5py",
    "glib",
    "numpy",
    "ldc",
];

/// The helper capability set exposed to recipe templates.
#[derive(Debug, Clone)]
pub struct Helpers {
    /// Logical compiler role to concrete toolchain package.
    compilers: HashMap<String, String>,
    /// Allow-list for `pin_compatible`.
    pin_allowed: HashSet<String>,
}

impl Helpers {
    /// Builds a [`minijinja::Environment`] carrying every helper the recipe
    /// corpus calls: `compiler`, `pin_compatible`, `pin_subpackage`,
    /// `environ` and `cdt`.
    pub fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        let compilers = self.compilers.clone();
        env.add_function(
            "compiler",
            move |role: String| -> Result<String, minijinja::Error> {
                compilers.get(&role).cloned().ok_or_else(|| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("unknown compiler role '{role}'"),
                    )
                })
            },
        );

        let pin_allowed = self.pin_allowed.clone();
        env.add_function(
            "pin_compatible",
            move |name: String, _rest: Rest<Value>| -> Result<String, minijinja::Error> {
                if pin_allowed.contains(&name) {
                    Ok(name)
                } else {
                    Err(minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("pin_compatible called with unsupported package '{name}'"),
                    ))
                }
            },
        );

        env.add_function("pin_subpackage", |name: String, _rest: Rest<Value>| name);

        // Unset variables fall back to the variable name, which is what the
        // recipe corpus expects when rendered outside a conda build.
        env.add_function("environ", |name: String| {
            std::env::var(&name).unwrap_or(name)
        });

        env.add_function("cdt", |name: String| name);

        env
    }

    /// Renders recipe text through the helper environment.
    pub fn render(&self, text: &str) -> Result<String, minijinja::Error> {
        self.environment().render_str(text, context! {})
    }
}

impl Default for Helpers {
    fn default() -> Self {
        let compilers = HashMap::from([
            ("c".to_string(), "gcc".to_string()),
            ("cxx".to_string(), "gcc".to_string()),
        ]);

        let pin_allowed = PIN_COMPATIBLE.iter().map(|s| s.to_string()).collect();

        Self {
            compilers,
            pin_allowed,
        }
    }
}
