//! Configuration loading and provider factory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use studydiag_core::engine::EngineConfig;
use studydiag_core::error::FeedbackError;
use studydiag_core::traits::LlmProvider;
use studydiag_core::trend::DEFAULT_WINDOW;

use crate::gemini::{GeminiProvider, DEFAULT_MODEL};

/// File name searched for in the current directory.
pub const LOCAL_CONFIG_FILE: &str = "studydiag.toml";

/// Environment variables consulted for the Gemini API key, highest priority first.
pub const API_KEY_ENV_VARS: [&str; 2] = ["STUDYDIAG_GEMINI_KEY", "GEMINI_API_KEY"];

/// Gemini connection settings.
///
/// Note: Custom Debug impl masks the API key to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. May reference an environment variable as `${VAR}`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: default_model(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let api_key = if self.api_key.is_empty() { "" } else { "***" };
        f.debug_struct("GeminiConfig")
            .field("api_key", &api_key)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Top-level studydiag configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudydiagConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// Directory holding `study-results.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Generation temperature.
    #[serde(default)]
    pub temperature: f64,
    /// Max output tokens per feedback request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Moving-average window for trend output.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Replaces the built-in marking instructions sent as the system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./studydiag-data")
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_trend_window() -> usize {
    DEFAULT_WINDOW
}

impl Default for StudydiagConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            data_dir: default_data_dir(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            trend_window: default_trend_window(),
            system_prompt: None,
        }
    }
}

impl StudydiagConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model: self.gemini.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt_override: self
                .system_prompt
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = lookup(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `studydiag.toml` in the current directory
/// 2. `~/.config/studydiag/config.toml`
///
/// Environment variable overrides: `STUDYDIAG_GEMINI_KEY`, `GEMINI_API_KEY`.
pub fn load_config() -> Result<StudydiagConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<StudydiagConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<StudydiagConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "config loaded");
            config
        }
        None => StudydiagConfig::default(),
    };

    Ok(resolve(config, &|name| std::env::var(name).ok()))
}

/// Apply environment overrides and expand `${VAR}` references.
fn resolve(mut config: StudydiagConfig, lookup: &impl Fn(&str) -> Option<String>) -> StudydiagConfig {
    if let Some(key) = API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|key| !key.is_empty())
    {
        config.gemini.api_key = key;
    }

    config.gemini.api_key = resolve_env_vars(&config.gemini.api_key, lookup);
    config.gemini.base_url = config
        .gemini
        .base_url
        .as_deref()
        .map(|u| resolve_env_vars(u, lookup));
    config
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("studydiag"))
}

/// Create the configured provider.
///
/// Fails with [`FeedbackError::Configuration`] when no API key is set, so the
/// problem surfaces before any document is read or request sent.
pub fn create_provider(config: &StudydiagConfig) -> Result<Box<dyn LlmProvider>, FeedbackError> {
    let api_key = config.gemini.api_key.trim();
    if api_key.is_empty() {
        return Err(FeedbackError::Configuration(format!(
            "Gemini API key missing; set {} or gemini.api_key in {LOCAL_CONFIG_FILE}",
            API_KEY_ENV_VARS[0]
        )));
    }
    let provider = GeminiProvider::new(api_key, config.gemini.base_url.clone())
        .map_err(|e| FeedbackError::Configuration(format!("{e:#}")))?;
    Ok(Box::new(provider))
}

/// Starter configuration written by `studydiag init`.
pub const SAMPLE_CONFIG: &str = r#"# studydiag configuration

data_dir = "./studydiag-data"
temperature = 0.0
max_tokens = 8192
trend_window = 3
# system_prompt = "Replace the built-in marking instructions"

[gemini]
api_key = "${GEMINI_API_KEY}"
model = "gemini-3-pro-preview"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn resolve_env_vars_basic() {
        let lookup = env(&[("_STUDYDIAG_TEST_VAR", "hello")]);
        assert_eq!(resolve_env_vars("${_STUDYDIAG_TEST_VAR}", &lookup), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_STUDYDIAG_TEST_VAR}_suffix", &lookup),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${UNSET}", &lookup), "");
        assert_eq!(resolve_env_vars("${unterminated", &lookup), "${unterminated");
    }

    #[test]
    fn default_config() {
        let config = StudydiagConfig::default();
        assert_eq!(config.gemini.model, "gemini-3-pro-preview");
        assert_eq!(config.trend_window, 3);
        assert_eq!(config.data_dir, PathBuf::from("./studydiag-data"));
        assert!(config.gemini.api_key.is_empty());
    }

    #[test]
    fn sample_config_parses() {
        let config: StudydiagConfig = toml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.gemini.api_key, "${GEMINI_API_KEY}");
        assert_eq!(config.max_tokens, 8192);

        let resolved = resolve(config, &env(&[("GEMINI_API_KEY", "k-123")]));
        assert_eq!(resolved.gemini.api_key, "k-123");
    }

    #[test]
    fn env_override_priority() {
        let config: StudydiagConfig = toml::from_str(
            r#"
[gemini]
api_key = "from-file"
"#,
        )
        .unwrap();

        let kept = resolve(config.clone(), &env(&[]));
        assert_eq!(kept.gemini.api_key, "from-file");

        let overridden = resolve(
            config.clone(),
            &env(&[("GEMINI_API_KEY", "generic"), ("STUDYDIAG_GEMINI_KEY", "specific")]),
        );
        assert_eq!(overridden.gemini.api_key, "specific");

        let empty_ignored = resolve(config, &env(&[("STUDYDIAG_GEMINI_KEY", "")]));
        assert_eq!(empty_ignored.gemini.api_key, "from-file");
    }

    #[test]
    fn debug_masks_api_key() {
        let mut config = StudydiagConfig::default();
        config.gemini.api_key = "super-secret".into();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = create_provider(&StudydiagConfig::default()).err().expect("expected configuration error");
        assert!(matches!(err, FeedbackError::Configuration(_)));
        assert_eq!(err.kind(), "configuration");

        let mut config = StudydiagConfig::default();
        config.gemini.api_key = "k".into();
        assert_eq!(create_provider(&config).unwrap().name(), "gemini");
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "data_dir = \"/tmp/sd\"\ntrend_window = 5\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sd"));
        assert_eq!(config.trend_window, 5);

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());

        std::fs::write(&path, "trend_window = \"three\"").unwrap();
        assert!(load_config_from(Some(&path)).is_err());
    }

    #[test]
    fn engine_config_follows_settings() {
        let mut config = StudydiagConfig::default();
        config.temperature = 0.4;
        config.gemini.model = "gemini-2.5-flash".into();
        let engine = config.engine_config();
        assert_eq!(engine.model, "gemini-2.5-flash");
        assert_eq!(engine.temperature, 0.4);
        assert_eq!(engine.max_tokens, 8192);
        assert!(engine.system_prompt_override.is_none());
    }

    #[test]
    fn system_prompt_key_overrides_instructions() {
        let config: StudydiagConfig =
            toml::from_str("system_prompt = \"Mark strictly. Reply with JSON.\"\n").unwrap();
        assert_eq!(
            config.engine_config().system_prompt_override.as_deref(),
            Some("Mark strictly. Reply with JSON.")
        );

        let blank: StudydiagConfig = toml::from_str("system_prompt = \"  \"\n").unwrap();
        assert!(blank.engine_config().system_prompt_override.is_none());
    }
}
