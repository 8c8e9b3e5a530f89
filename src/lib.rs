#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod error;

pub mod loader;
pub mod nix;
pub mod platform;
pub mod recipe;
pub mod report;
pub mod tables;
pub mod template;

pub use crate::error::{BionixError, GenerateError, LoadError, TablesError};
pub use crate::loader::{LoadOptions, Loaded, load_all, load_recipe};
pub use crate::nix::generate;
pub use crate::platform::Platform;
pub use crate::recipe::Recipe;
pub use crate::report::{BatchOutcome, Status, convert_batch};
pub use crate::tables::{Resolution, Tables, strip_version};
pub use crate::template::Helpers;
