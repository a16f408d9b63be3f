#![deny(missing_docs)]
//! Descriptor resolution for the function-hosting engine.
//!
//! [`Resolver::resolve`] turns directories of module files into one
//! [`FunctionCatalog`](faas_types::FunctionCatalog):
//!
//! 1. directories are made absolute against the caller's working directory
//! 2. files are discovered recursively in sorted order, skipping the
//!    manifest and anything its `ignore` globs match
//! 3. each file is loaded by the first [`ModuleLoader`](faas_types::ModuleLoader)
//!    that recognizes it, in its own task so a crashing loader only loses
//!    that file
//! 4. object-shaped exports are merged by name, last writer wins
//! 5. the `mambo` placeholder is dropped and the reserved
//!    `functions-health` and `functions-all` entries are added last
//!
//! Load failures are logged and reported in [`Resolution::failures`]; they
//! never abort the scan.

pub mod builtins;
pub mod command;
mod discovery;
pub mod error;
mod html;
pub mod loaders;
pub mod manifest;
mod resolver;

pub use builtins::{CATALOG_FUNCTION, HEALTH_FUNCTION, PLACEHOLDER_FUNCTION};
pub use command::{CommandHandler, CommandSpec};
pub use error::ResolutionError;
pub use loaders::{JsonModuleLoader, TomlModuleLoader, YamlModuleLoader};
pub use manifest::{DEFAULT_IGNORE, IgnoreRules, MANIFEST_FILE};
pub use resolver::{LoadFailure, Resolution, Resolver, ResolverOptions};
