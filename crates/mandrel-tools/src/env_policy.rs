//! Environment-variable inheritance policy for spawned child processes.
//!
//! `ExecCommand` (see [`crate::bash`]) builds the child environment through
//! one of three strategies rather than blindly inheriting the parent
//! process's environment. The default `core` strategy walks the parent
//! environment, keeps names on a small safe whitelist, then layers in any
//! explicit vars the caller passed — minus anything whose name ends in a
//! sensitive suffix either way.

use std::collections::HashMap;
use std::ffi::OsString;

/// How a spawned command's environment is assembled from the parent
/// process's environment plus any caller-supplied explicit vars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvInheritPolicy {
    /// Inherit a whitelist of safe names from the parent, plus explicit
    /// vars; sensitive-suffixed names are dropped from both sources.
    #[default]
    Core,
    /// Inherit the entire parent environment, unfiltered, plus explicit
    /// vars.
    All,
    /// Inherit nothing from the parent; only explicit vars are set.
    None,
}

/// Names safe to inherit from the parent process under the `core` policy.
const CORE_WHITELIST: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "SHELL",
    "LANG",
    "LC_ALL",
    "TERM",
    "TMPDIR",
    // Editor / toolchain paths commonly needed by build tools the model invokes.
    "EDITOR",
    "VISUAL",
    "CARGO_HOME",
    "RUSTUP_HOME",
    "GOPATH",
    "GOROOT",
    "JAVA_HOME",
    "NVM_DIR",
    "PYENV_ROOT",
];

/// Name suffixes (case-insensitive, matched on the upper-cased name) that
/// mark a variable as carrying a secret. Any name ending in one of these
/// is dropped under the `core` policy regardless of source.
const SENSITIVE_SUFFIXES: &[&str] = &["_API_KEY", "_SECRET", "_TOKEN", "_PASSWORD", "_CREDENTIAL"];

/// Returns `true` if `name`'s upper-cased form ends with a sensitive
/// suffix.
#[must_use]
pub fn is_sensitive_env_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SENSITIVE_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// Build the environment map for a spawned child process.
///
/// `parent_env` is the iterator of (name, value) pairs from the current
/// process's environment (callers typically pass `std::env::vars()`);
/// `explicit` is the caller-supplied override/addition map.
#[must_use]
pub fn build_child_env(
    policy: EnvInheritPolicy,
    parent_env: impl Iterator<Item = (String, String)>,
    explicit: &HashMap<String, String>,
) -> HashMap<String, String> {
    match policy {
        EnvInheritPolicy::All => {
            let mut env: HashMap<String, String> = parent_env.collect();
            env.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
            env
        }
        EnvInheritPolicy::None => explicit
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        EnvInheritPolicy::Core => {
            let mut env: HashMap<String, String> = parent_env
                .filter(|(name, _)| {
                    CORE_WHITELIST.contains(&name.as_str()) && !is_sensitive_env_name(name)
                })
                .collect();
            for (name, value) in explicit {
                if !is_sensitive_env_name(name) {
                    env.insert(name.clone(), value.clone());
                }
            }
            env
        }
    }
}

/// Convert a built environment map into the `(OsString, OsString)` pairs
/// `tokio::process::Command::envs` expects.
#[must_use]
pub fn to_os_env(env: &HashMap<String, String>) -> Vec<(OsString, OsString)> {
    env.iter()
        .map(|(k, v)| (OsString::from(k), OsString::from(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(vars: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> + '_ {
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string()))
    }

    #[test]
    fn sensitive_suffix_matching_is_case_insensitive() {
        assert!(is_sensitive_env_name("MY_API_KEY"));
        assert!(is_sensitive_env_name("my_api_key"));
        assert!(is_sensitive_env_name("GITHUB_TOKEN"));
        assert!(is_sensitive_env_name("DB_PASSWORD"));
        assert!(is_sensitive_env_name("AWS_CREDENTIAL"));
        assert!(is_sensitive_env_name("SOME_SECRET"));
        assert!(!is_sensitive_env_name("PATH"));
        assert!(!is_sensitive_env_name("LANG"));
    }

    #[test]
    fn core_policy_keeps_whitelist_and_drops_sensitive_explicit() {
        let parent_vars = parent(&[("PATH", "/usr/bin"), ("SOME_RANDOM_VAR", "nope")]);
        let mut explicit = HashMap::new();
        explicit.insert("MY_API_KEY".to_string(), "secret123".to_string());
        explicit.insert("FOO".to_string(), "bar".to_string());

        let env = build_child_env(EnvInheritPolicy::Core, parent_vars, &explicit);

        assert_eq!(env.get("PATH"), Some(&"/usr/bin".to_string()));
        assert!(!env.contains_key("SOME_RANDOM_VAR"));
        assert!(!env.contains_key("MY_API_KEY"));
        assert_eq!(env.get("FOO"), Some(&"bar".to_string()));
    }

    #[test]
    fn all_policy_passes_everything_through() {
        let parent_vars = parent(&[("PATH", "/usr/bin"), ("MY_API_KEY", "secret123")]);
        let explicit = HashMap::new();

        let env = build_child_env(EnvInheritPolicy::All, parent_vars, &explicit);

        assert_eq!(env.get("MY_API_KEY"), Some(&"secret123".to_string()));
    }

    #[test]
    fn none_policy_only_keeps_explicit() {
        let parent_vars = parent(&[("PATH", "/usr/bin")]);
        let mut explicit = HashMap::new();
        explicit.insert("FOO".to_string(), "bar".to_string());

        let env = build_child_env(EnvInheritPolicy::None, parent_vars, &explicit);

        assert!(!env.contains_key("PATH"));
        assert_eq!(env.get("FOO"), Some(&"bar".to_string()));
    }
}
