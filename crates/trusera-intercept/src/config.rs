//! Guard configuration from `.trusera/guard.toml`.
//!
//! ```toml
//! enforcement = "block"
//! exclude_patterns = ["^https://telemetry\\.internal/"]
//! api_url = "https://api.trusera.dev"
//! api_key_env = "TRUSERA_API_KEY"
//! # or, without an API:
//! policy_file = ".trusera/policy.cedar"
//! refresh_interval_secs = 60
//! stale_ttl_secs = 300
//! event_log = ".trusera/events.jsonl"
//! capture_headers = ["user-agent", "x-agent-id"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trusera_cache::{CacheConfig, FilePolicySource, HttpPolicySource, PolicyCache};
use trusera_events::{EventSink, JsonlSink, QueuedSink};

use crate::enforcement::EnforcementMode;
use crate::error::InterceptorError;
use crate::interceptor::{HeaderCapture, Interceptor};

/// Default location, relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = ".trusera/guard.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// `"block"`, `"warn"` or `"log"` (any case).
    #[serde(default = "default_enforcement")]
    pub enforcement: String,

    /// Regexes; matching URLs are never evaluated.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Platform base URL. Takes precedence over `policy_file`.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Environment variable holding the platform API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Local policy file, used when no `api_url` is set.
    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Zero disables the staleness check.
    #[serde(default = "default_stale_ttl_secs")]
    pub stale_ttl_secs: u64,

    /// Append events as JSON lines here.
    #[serde(default)]
    pub event_log: Option<PathBuf>,

    /// Header names exposed to policy. Absent means all headers.
    #[serde(default)]
    pub capture_headers: Option<Vec<String>>,
}

fn default_enforcement() -> String {
    EnforcementMode::default().as_str().to_string()
}

fn default_api_key_env() -> String {
    "TRUSERA_API_KEY".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_stale_ttl_secs() -> u64 {
    300
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enforcement: default_enforcement(),
            exclude_patterns: Vec::new(),
            api_url: None,
            api_key_env: default_api_key_env(),
            policy_file: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            stale_ttl_secs: default_stale_ttl_secs(),
            event_log: None,
            capture_headers: None,
        }
    }
}

impl GuardConfig {
    pub fn load(path: &Path) -> Result<Self, InterceptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| InterceptorError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| InterceptorError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load, or fall back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, InterceptorError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn enforcement_mode(&self) -> Result<EnforcementMode, InterceptorError> {
        self.enforcement.parse()
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_refresh_interval(Duration::from_secs(self.refresh_interval_secs))
            .with_stale_tolerance(Some(Duration::from_secs(self.stale_ttl_secs)))
    }

    /// Build the policy cache this config describes, if any source is set.
    /// A `policy_file` that does not exist is an error.
    pub fn build_cache(&self) -> Result<Option<PolicyCache>, InterceptorError> {
        if let Some(api_url) = &self.api_url {
            let mut source = HttpPolicySource::new(api_url.as_str());
            match std::env::var(&self.api_key_env) {
                Ok(key) if !key.is_empty() => source = source.with_api_key(key),
                _ => tracing::warn!(env = %self.api_key_env, "no API key set; fetching policies unauthenticated"),
            }
            return Ok(Some(PolicyCache::new(source, self.cache_config())));
        }
        let Some(path) = &self.policy_file else {
            return Ok(None);
        };
        if !path.is_file() {
            return Err(InterceptorError::PolicyFileNotFound { path: path.clone() });
        }
        Ok(Some(PolicyCache::new(
            FilePolicySource::new(path),
            self.cache_config(),
        )))
    }

    /// Assemble cache, event sink and interceptor. The interceptor is not
    /// installed.
    pub fn build(&self) -> Result<Interceptor, InterceptorError> {
        let mut builder = Interceptor::builder(self.enforcement_mode()?)
            .with_exclusions(self.exclude_patterns.iter().cloned());

        if let Some(names) = &self.capture_headers {
            builder = builder.with_header_capture(HeaderCapture::only(names));
        }
        if let Some(path) = &self.event_log {
            let sink: Arc<dyn EventSink> = Arc::new(QueuedSink::new(Arc::new(JsonlSink::new(path))));
            builder = builder.with_sink(sink);
        }
        if let Some(cache) = self.build_cache()? {
            builder = builder.with_cache(Arc::new(cache));
        }

        builder.build()
    }
}
