//! `Options` loading from environment variables (spec §6).
//!
//! CLI surface and environment variables are mostly out of scope for the
//! core engine; the one behavior it depends on is the fallback-base-dir
//! toggle (spec §6: "when the environment variable enabling fallback base
//! directories is set truthy, the Preparer's resolved options include the
//! fallback list and clear the no-fallback flag"). The other `Options`
//! fields are ambient engine configuration, loaded the same tolerant way.
//!
//! Parsing is split from environment access (`Options::from_map`) so tests
//! exercise the parsing logic without touching real process environment
//! state, in the same default-tolerant-on-parse-error spirit as the
//! teacher's config loader.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const ENV_TIMEOUT_MS: &str = "REQTUI_TIMEOUT_MS";
pub const ENV_BASE_DIR: &str = "REQTUI_BASE_DIR";
pub const ENV_FALLBACK_DIRS: &str = "REQTUI_FALLBACK_DIRS";
pub const ENV_ENABLE_FALLBACK_DIRS: &str = "REQTUI_ENABLE_FALLBACK_DIRS";
pub const ENV_TLS_VERIFY: &str = "REQTUI_TLS_VERIFY";
pub const ENV_FOLLOW_REDIRECTS: &str = "REQTUI_FOLLOW_REDIRECTS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_DIR_SEP: char = ':';

/// HTTP/gRPC send options shared by a request unless overridden per-request
/// (spec §3, §4.1, §6). Supplemented (SPEC_FULL §2): `verify_tls` and
/// `follow_redirects` — plain client options, not a MITM feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub timeout: Duration,
    pub base_dir: PathBuf,
    pub fallback_dirs: Vec<PathBuf>,
    pub fallback_enabled: bool,
    pub verify_tls: bool,
    pub follow_redirects: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            base_dir: PathBuf::from("."),
            fallback_dirs: Vec::new(),
            fallback_enabled: false,
            verify_tls: true,
            follow_redirects: true,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Options {
    /// Build `Options` from an arbitrary key-value source, falling back to
    /// defaults on any missing or malformed entry (malformed entries are
    /// logged, never fatal — a send shouldn't fail because of a bad env var
    /// until it actually needs the value it describes).
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        let mut opts = Options::default();

        if let Some(raw) = vars.get(ENV_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => opts.timeout = Duration::from_millis(ms),
                Err(_) => warn!(target: "reqtui::config", raw, "unparsable timeout override, using default"),
            }
        }

        if let Some(raw) = vars.get(ENV_BASE_DIR) {
            opts.base_dir = PathBuf::from(raw);
        }

        if let Some(raw) = vars.get(ENV_ENABLE_FALLBACK_DIRS) {
            if is_truthy(raw) {
                opts.fallback_enabled = true;
                opts.fallback_dirs = vars
                    .get(ENV_FALLBACK_DIRS)
                    .map(|raw| {
                        raw.split(FALLBACK_DIR_SEP)
                            .filter(|s| !s.is_empty())
                            .map(PathBuf::from)
                            .collect()
                    })
                    .unwrap_or_default();
            }
        }

        if let Some(raw) = vars.get(ENV_TLS_VERIFY) {
            opts.verify_tls = is_truthy(raw);
        }

        if let Some(raw) = vars.get(ENV_FOLLOW_REDIRECTS) {
            opts.follow_redirects = is_truthy(raw);
        }

        opts
    }

    /// Load from the real process environment.
    pub fn load() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }
}

/// Best-effort config directory following platform conventions, kept for the
/// external settings-persistence collaborator to discover (spec §1: on-disk
/// settings persistence is out of scope for this engine).
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("reqtui"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_when_no_vars_present() {
        let opts = Options::from_map(&HashMap::new());
        assert_eq!(opts.timeout, DEFAULT_TIMEOUT);
        assert!(!opts.fallback_enabled);
        assert!(opts.fallback_dirs.is_empty());
        assert!(opts.verify_tls);
    }

    #[test]
    fn malformed_timeout_falls_back_to_default() {
        let opts = Options::from_map(&map(&[(ENV_TIMEOUT_MS, "not-a-number")]));
        assert_eq!(opts.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn parses_timeout_override() {
        let opts = Options::from_map(&map(&[(ENV_TIMEOUT_MS, "5000")]));
        assert_eq!(opts.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn fallback_dirs_enabled_truthy_populates_list_and_clears_flag() {
        let opts = Options::from_map(&map(&[
            (ENV_ENABLE_FALLBACK_DIRS, "true"),
            (ENV_FALLBACK_DIRS, "/a:/b:/c"),
        ]));
        assert!(opts.fallback_enabled);
        assert_eq!(
            opts.fallback_dirs,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn fallback_dirs_not_enabled_when_flag_absent() {
        let opts = Options::from_map(&map(&[(ENV_FALLBACK_DIRS, "/a:/b")]));
        assert!(!opts.fallback_enabled);
        assert!(opts.fallback_dirs.is_empty());
    }

    #[test]
    fn tls_verify_can_be_disabled() {
        let opts = Options::from_map(&map(&[(ENV_TLS_VERIFY, "false")]));
        assert!(!opts.verify_tls);
    }

    #[test]
    fn truthy_accepts_common_spellings() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(is_truthy(v), "{v} should be truthy");
        }
        for v in ["0", "false", "no", "off", ""] {
            assert!(!is_truthy(v), "{v} should not be truthy");
        }
    }
}
