//! Runtime configuration.
//!
//! Loaded fresh on every capability invocation and every agent request so
//! that edits to `.runtime-config.json` take effect on the next call without
//! a process restart. File values win over environment variables; both are
//! optional for every key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ─── Defaults ────────────────────────────────────────────────────────────────

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_SEARCH_MAX_RESULTS: u32 = 5;
pub const DEFAULT_MAX_READ_CHARS: usize = 12_000;
pub const DEFAULT_MAX_LIST_ENTRIES: usize = 100;
pub const DEFAULT_MAX_PDF_PAGES: usize = 30;
pub const DEFAULT_MAX_TOOL_STEPS: usize = 3;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

const CONFIG_FILE_NAME: &str = ".runtime-config.json";

// ─── RuntimeConfig ───────────────────────────────────────────────────────────

/// Merged view of the config file and the process environment.
///
/// All values are kept as trimmed strings; numeric interpretation (with
/// clamping) happens at the point of use so a bad value degrades to the
/// default instead of failing the whole call.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    values: HashMap<String, String>,
    /// Whether to fall back to process environment variables on a miss.
    /// Disabled for test-constructed configs to keep tests hermetic.
    use_env: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            use_env: true,
        }
    }
}

impl RuntimeConfig {
    /// Load from `.runtime-config.json` in the current directory (then the
    /// parent directory), merged with environment variables.
    pub fn load() -> Self {
        let mut candidates = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(CONFIG_FILE_NAME));
            candidates.push(cwd.join("..").join(CONFIG_FILE_NAME));
        }
        Self::load_from_candidates(&candidates)
    }

    fn load_from_candidates(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            if let Some(config) = Self::read_json_file(path) {
                if !config.values.is_empty() {
                    return config;
                }
            }
        }
        Self::default()
    }

    fn read_json_file(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                return None;
            }
        };

        let obj = parsed.as_object()?;
        let mut values = HashMap::new();
        for (key, value) in obj {
            let text = match value {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            if !text.is_empty() {
                values.insert(key.clone(), text);
            }
        }
        Some(Self {
            values,
            use_env: true,
        })
    }

    /// Test constructor: build from explicit key/value pairs, no disk or env.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            use_env: false,
        }
    }

    /// Look up a key: file value first, environment fallback.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.values.get(key) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
        if !self.use_env {
            return None;
        }
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Look up a key, or return the given default.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a positive integer, clamping into `[min, max]`.
    ///
    /// Non-numeric or absent values fall back to `fallback` (itself clamped),
    /// matching the contract that a bad limit degrades rather than rejects.
    pub fn get_clamped(&self, key: &str, fallback: u64, min: u64, max: u64) -> u64 {
        let value = self
            .get(key)
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(fallback);
        value.clamp(min, max)
    }

    // ─── Typed accessors ─────────────────────────────────────────────────

    pub fn openai_base_url(&self) -> String {
        self.get_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)
    }

    pub fn openai_model(&self) -> String {
        self.get_or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL)
    }

    pub fn openai_api_key(&self) -> Option<String> {
        self.get("OPENAI_API_KEY")
    }

    pub fn search_provider(&self) -> String {
        self.get_or("SEARCH_PROVIDER", "auto")
    }

    pub fn search_timeout_ms(&self) -> u64 {
        self.get_clamped("SEARCH_TIMEOUT_MS", DEFAULT_SEARCH_TIMEOUT_MS, 1_500, 30_000)
    }

    pub fn search_default_max_results(&self) -> u32 {
        self.get_clamped(
            "SEARCH_DEFAULT_MAX_RESULTS",
            u64::from(DEFAULT_SEARCH_MAX_RESULTS),
            1,
            10,
        ) as u32
    }

    pub fn max_tool_steps(&self) -> usize {
        self.get_clamped("AGENT_MAX_TOOL_STEPS", DEFAULT_MAX_TOOL_STEPS as u64, 1, 20) as usize
    }

    pub fn gateway_call_timeout_ms(&self) -> u64 {
        self.get_clamped(
            "GATEWAY_CALL_TIMEOUT_MS",
            DEFAULT_CALL_TIMEOUT_MS,
            1_000,
            300_000,
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_returns_default_for_missing_key() {
        let config = RuntimeConfig::from_pairs::<_, String, String>([]);
        assert_eq!(config.get_or("NO_SUCH_KEY_XYZ", "fallback"), "fallback");
    }

    #[test]
    fn test_file_value_wins() {
        let config = RuntimeConfig::from_pairs([("OPENAI_MODEL", "gpt-4.1")]);
        assert_eq!(config.openai_model(), "gpt-4.1");
    }

    #[test]
    fn test_clamped_out_of_range_value() {
        let config = RuntimeConfig::from_pairs([("SEARCH_TIMEOUT_MS", "999999")]);
        assert_eq!(config.search_timeout_ms(), 30_000);

        let config = RuntimeConfig::from_pairs([("SEARCH_TIMEOUT_MS", "1")]);
        assert_eq!(config.search_timeout_ms(), 1_500);
    }

    #[test]
    fn test_clamped_non_numeric_falls_back() {
        let config = RuntimeConfig::from_pairs([("SEARCH_TIMEOUT_MS", "soon")]);
        assert_eq!(config.search_timeout_ms(), DEFAULT_SEARCH_TIMEOUT_MS);
    }

    #[test]
    fn test_numeric_json_values_become_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".runtime-config.json");
        std::fs::write(&path, r#"{"SEARCH_TIMEOUT_MS": 4000, "SEARCH_PROVIDER": "tavily"}"#)
            .unwrap();

        let config = RuntimeConfig::load_from_candidates(&[path]);
        assert_eq!(config.search_timeout_ms(), 4_000);
        assert_eq!(config.search_provider(), "tavily");
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".runtime-config.json");
        std::fs::write(&path, "not json at all").unwrap();

        let config = RuntimeConfig::load_from_candidates(&[path]);
        assert_eq!(config.search_provider(), "auto");
    }
}
