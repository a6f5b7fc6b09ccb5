//! Package names recovered from catalog install commands.
//!
//! Catalog entries usually declare the package explicitly; these parsers are
//! the fallback when only an install command like
//! `npm install -g @scope/tool@latest` is given.

/// Flags whose next token is a value, not the package.
const PIP_VALUE_FLAGS: &[&str] = &[
    "-p",
    "--python",
    "-i",
    "--index-url",
    "--extra-index-url",
    "--with",
    "--suffix",
    "--pip-args",
    "-c",
    "--constraint",
];

/// Characters that start a version constraint, extras list or marker.
const PIP_SPEC_DELIMITERS: &[char] = &['=', '<', '>', '!', '~', '[', ';', '@', ','];

fn tokens(command: &str) -> Vec<&str> {
    command
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '"' || c == '\''))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Strip a trailing `@version`/`@tag` from an npm package spec.
///
/// Scoped packages keep their leading `@scope/`.
pub(crate) fn strip_npm_version(spec: &str) -> &str {
    let cut = if let Some(rest) = spec.strip_prefix('@') {
        rest.find('@').map(|pos| pos + 1)
    } else {
        spec.find('@')
    };
    match cut {
        Some(pos) => &spec[..pos],
        None => spec,
    }
}

/// `npm install -g @anthropic-ai/claude-code@latest` -> `@anthropic-ai/claude-code`
pub(crate) fn npm_package_from_command(command: &str) -> Option<String> {
    let tokens = tokens(command);
    let flag = tokens
        .iter()
        .position(|t| matches!(*t, "-g" | "--global" | "--location=global"))?;
    let spec = tokens.get(flag + 1).filter(|t| !t.starts_with('-'))?;
    let name = strip_npm_version(spec);
    (!name.is_empty() && name != "@").then(|| name.to_string())
}

/// `pipx install aider-chat==0.50` -> `aider-chat`
pub(crate) fn pip_package_from_command(command: &str) -> Option<String> {
    let tokens = tokens(command);
    let install = tokens.iter().position(|t| *t == "install")?;

    let mut rest = tokens[install + 1..].iter();
    while let Some(token) = rest.next() {
        if PIP_VALUE_FLAGS.contains(token) {
            rest.next();
            continue;
        }
        if token.starts_with('-') {
            continue;
        }
        let name = token
            .split(PIP_SPEC_DELIMITERS)
            .next()
            .unwrap_or_default()
            .trim();
        return (!name.is_empty()).then(|| name.to_string());
    }
    None
}

/// A Homebrew formula or cask named by an install command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BrewPackage {
    pub name: String,
    pub cask: bool,
    /// `user/tap` when the command used a tap-qualified name.
    pub tap: Option<String>,
}

impl BrewPackage {
    /// Split a possibly tap-qualified name (`user/tap/formula`).
    pub(crate) fn from_name(qualified: &str, cask: bool) -> Option<Self> {
        let qualified = qualified.trim();
        let (tap, name) = match qualified.rsplit_once('/') {
            Some((tap, name)) => (Some(tap.to_string()).filter(|t| !t.is_empty()), name),
            None => (None, qualified),
        };
        (!name.is_empty()).then(|| Self {
            name: name.to_string(),
            cask,
            tap,
        })
    }
}

/// `brew install --cask claude-code` -> `claude-code` (cask)
pub(crate) fn brew_package_from_command(command: &str) -> Option<BrewPackage> {
    let tokens = tokens(command);
    let cask = tokens.iter().any(|t| matches!(*t, "--cask" | "cask"));
    let install = tokens
        .iter()
        .position(|t| matches!(*t, "install" | "reinstall"))?;
    let name = tokens[install + 1..]
        .iter()
        .find(|t| !t.starts_with('-') && **t != "cask")?;
    BrewPackage::from_name(name, cask)
}
