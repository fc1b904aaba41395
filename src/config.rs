//! Process configuration read from the environment.
//!
//! Every section also has a plain constructor so callers and tests can build
//! settings without touching environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::action::Product;
use crate::api::credential::DEFAULT_USERNAME;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid {expected}: {value}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Monitoring platform endpoint and app credentials.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Root URL template; `{product}` is replaced per product.
    pub api_root: String,
    pub app_code: String,
    pub app_secret: String,
    pub username: String,
    pub timeout: Duration,
}

impl ApiSettings {
    pub fn new(
        api_root: impl Into<String>,
        app_code: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_root: api_root.into(),
            app_code: app_code.into(),
            app_secret: app_secret.into(),
            username: DEFAULT_USERNAME.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn root_for(&self, product: Product) -> String {
        self.api_root.replace("{product}", product.as_str())
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` when the monitoring platform is not configured.
    pub api: Option<ApiSettings>,
    /// `None` when no language-model key is configured.
    pub llm: Option<LlmSettings>,
    /// Directory all artifacts are written under.
    pub workspace: PathBuf,
    /// Directory holding `<name>.html` report templates.
    pub templates_dir: Option<PathBuf>,
    /// Chart subprocess command line, program first.
    pub visualizer_cmd: Option<Vec<String>>,
}

impl Settings {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            api: None,
            llm: None,
            workspace: workspace.into(),
            templates_dir: None,
            visualizer_cmd: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api = match var("MONITOR_API_ROOT") {
            Some(api_root) => Some(ApiSettings {
                api_root,
                app_code: var("MONITOR_APP_CODE").unwrap_or_default(),
                app_secret: var("MONITOR_APP_SECRET").unwrap_or_default(),
                username: var("MONITOR_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
                timeout: parse_secs("MONITOR_TIMEOUT_SECONDS", var("MONITOR_TIMEOUT_SECONDS"), 30)?,
            }),
            None => None,
        };

        let llm = match var("LLM_API_KEY") {
            Some(api_key) => Some(LlmSettings {
                api_key,
                base_url: var("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
                model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                timeout: parse_secs("LLM_TIMEOUT_SECONDS", var("LLM_TIMEOUT_SECONDS"), 120)?,
            }),
            None => None,
        };

        let visualizer_cmd = var("METRIC_VISUALIZER_CMD").map(|cmd| {
            cmd.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Ok(Self {
            api,
            llm,
            workspace: var("METRIC_WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./workspace")),
            templates_dir: var("METRIC_TEMPLATES_DIR").map(PathBuf::from),
            visualizer_cmd,
        })
    }
}

fn parse_secs(
    var: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(v) => v
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid {
                var,
                expected: "number of seconds",
                value: v,
            }),
    }
}
