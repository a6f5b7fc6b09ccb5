//! PATH-based executable lookup and package-manager path recognition.

use std::path::{Path, PathBuf};

/// System fallback paths to check if executable not found in PATH.
#[cfg(not(windows))]
const FALLBACK_PATHS: &[&str] = &["/usr/local/bin", "/usr/bin"];
#[cfg(windows)]
const FALLBACK_PATHS: &[&str] = &[];

/// Path fragments that identify a file as owned by a package or version
/// manager rather than a standalone (native) install.
///
/// Matching is case-insensitive on a `/`-normalized path.
pub const DEFAULT_MANAGED_PATH_PATTERNS: &[&str] = &[
    // node
    "node_modules",
    "/.npm",
    "/npm/",
    "npm-global",
    "/.pnpm",
    "/pnpm/",
    "/.yarn",
    "/yarn/",
    "/.bun/",
    "/.nvm/",
    "/.volta/",
    "/fnm/",
    // python
    "site-packages",
    "/pipx/",
    "/.venv/",
    "/venv/",
    "/virtualenvs/",
    "conda/",
    "/miniconda",
    "/anaconda",
    "/.pyenv/",
    "/uv/tools/",
    "/.local/share/uv/",
    // homebrew
    "homebrew",
    "linuxbrew",
    "/cellar/",
    "/caskroom/",
    // go / rust / ruby
    "/go/bin/",
    "/.cargo/",
    "/.gem/",
    "/gems/",
    "/.rbenv/",
    "/.rvm/",
    // generic version managers
    "/.asdf/",
    "/mise/",
    "/.rtx/",
    "/rtx/",
    "/scoop/",
];

/// Find an executable by name.
///
/// This function first tries to find the executable using the system PATH
/// via the `which` crate. If not found, it checks common fallback locations
/// including system directories and user home directories.
///
/// # Arguments
///
/// * `name` - The executable name to search for (e.g., "claude", "npm")
///
/// # Returns
///
/// `Some(PathBuf)` if the executable is found, `None` otherwise.
pub(crate) fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    // Primary: PATH lookup via which crate
    // This handles PATHEXT on Windows and platform differences
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    for dir in FALLBACK_PATHS {
        let path = PathBuf::from(dir).join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    // Home directory locations (common for user-installed tools)
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    let home = PathBuf::from(home);
    [home.join(".local").join("bin"), home.join("bin")]
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Whether `path` lives under a package or version manager's directory.
pub fn is_managed_path<S: AsRef<str>>(path: &Path, patterns: &[S]) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/").to_ascii_lowercase();
    patterns.iter().any(|pattern| {
        let pattern = pattern.as_ref();
        !pattern.is_empty() && normalized.contains(&pattern.to_ascii_lowercase())
    })
}

/// The first pattern that `path` matches, for diagnostics.
pub(crate) fn matching_pattern<'a, S: AsRef<str>>(path: &Path, patterns: &'a [S]) -> Option<&'a str> {
    patterns
        .iter()
        .map(|pattern| pattern.as_ref())
        .find(|pattern| is_managed_path(path, std::slice::from_ref(pattern)))
}
