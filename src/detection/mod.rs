//! Detection implementation submodule.
//!
//! Shared building blocks for the strategies:
//!
//! - `find_executable`: PATH-based executable lookup with fallbacks
//! - `is_managed_path`: recognizes paths owned by package/version managers
//! - `probe_version`: runs an agent's version probe through a [`Host`](crate::Host)
//! - `extract_version`: regex-based version extraction from CLI output
//! - package-name recovery from catalog install commands

mod package;
mod parser;
mod path_finder;
mod probe;

pub(crate) use package::{
    brew_package_from_command, npm_package_from_command, pip_package_from_command, BrewPackage,
};
pub(crate) use parser::extract_version;
pub(crate) use path_finder::{find_executable, matching_pattern};
pub use path_finder::{is_managed_path, DEFAULT_MANAGED_PATH_PATTERNS};
pub(crate) use probe::probe_version;
