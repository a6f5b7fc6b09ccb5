//! Operating system identity.

use serde::{Deserialize, Serialize};

/// The closed set of platforms the catalog can target.
///
/// # Example
///
/// ```rust
/// use agent_inventory::Platform;
///
/// let p: Platform = "macos".parse().unwrap();
/// assert_eq!(p, Platform::Darwin);
/// assert_eq!(p.to_string(), "darwin");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Platform {
    #[serde(alias = "macos")]
    #[strum(to_string = "darwin", serialize = "macos")]
    Darwin,
    Linux,
    #[serde(alias = "win32")]
    #[strum(to_string = "windows", serialize = "win32")]
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for.
    ///
    /// Other unix-likes are reported as `Linux`, which is what the
    /// package-manager strategies treat them as.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Darwin
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }
}
