// source.rs — Where policy text comes from.
//
// A PolicySource returns a bundle of policy entries. The cache concatenates
// the DSL of every enabled entry (newline-joined, in bundle order) and
// hashes the result to detect changes.
//
// Sources are only ever called from the cache's refresh worker thread, so
// blocking I/O is fine here.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Path of the policy endpoint relative to the platform base URL.
pub const POLICY_ENDPOINT_PATH: &str = "/api/v1/policies/cedar";

/// One policy document as served by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyEntry {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub cedar_dsl: String,
}

fn default_enabled() -> bool {
    true
}

/// The full set of policies returned by one fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyBundle {
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
}

impl PolicyBundle {
    /// A bundle with a single enabled entry.
    pub fn from_dsl(dsl: impl Into<String>) -> Self {
        Self {
            policies: vec![PolicyEntry {
                enabled: true,
                cedar_dsl: dsl.into(),
            }],
        }
    }

    /// DSL of every enabled entry, joined with newlines.
    pub fn combined_dsl(&self) -> String {
        self.policies
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.cedar_dsl.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Anything the cache can pull a policy bundle from.
pub trait PolicySource: Send + Sync {
    fn fetch(&self) -> Result<PolicyBundle, CacheError>;

    /// Base URL of the control plane, if this source talks to one. The
    /// interceptor never evaluates requests to this endpoint.
    fn endpoint(&self) -> Option<&str> {
        None
    }
}

/// Adapts a closure into a [`PolicySource`].
pub struct FnSource<F>(pub F);

impl<F> PolicySource for FnSource<F>
where
    F: Fn() -> Result<PolicyBundle, CacheError> + Send + Sync,
{
    fn fetch(&self) -> Result<PolicyBundle, CacheError> {
        (self.0)()
    }
}

/// Fetches `GET {base_url}/api/v1/policies/cedar` with an optional bearer key.
pub struct HttpPolicySource {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    // Built lazily on first fetch so construction stays cheap and the
    // blocking client is created on the refresh worker.
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpPolicySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: None,
            timeout: Duration::from_secs(10),
            client: OnceLock::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the policy endpoint.
    pub fn policy_url(&self) -> String {
        format!("{}{}", self.base_url, POLICY_ENDPOINT_PATH)
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, CacheError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| CacheError::Fetch {
                url: self.policy_url(),
                source,
            })?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl PolicySource for HttpPolicySource {
    fn fetch(&self) -> Result<PolicyBundle, CacheError> {
        let url = self.policy_url();
        let mut request = self.client()?.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let to_error = |source| CacheError::Fetch {
            url: url.clone(),
            source,
        };
        let bundle = request
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(to_error)?
            .json::<PolicyBundle>()
            .map_err(to_error)?;

        tracing::debug!(url = %url, entries = bundle.policies.len(), "fetched policy bundle");
        Ok(bundle)
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}

/// Serves a local `.cedar` file as a one-entry bundle. Re-read on every
/// refresh, so edits are picked up without a restart.
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicySource for FilePolicySource {
    fn fetch(&self) -> Result<PolicyBundle, CacheError> {
        let dsl = std::fs::read_to_string(&self.path).map_err(|source| CacheError::ReadPolicy {
            path: self.path.clone(),
            source,
        })?;
        Ok(PolicyBundle::from_dsl(dsl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_defaults_missing_fields() {
        let bundle: PolicyBundle = serde_json::from_str(
            r#"{"policies": [{"cedar_dsl": "a"}, {"enabled": false, "cedar_dsl": "b"}, {}]}"#,
        )
        .unwrap();
        assert_eq!(bundle.policies.len(), 3);
        assert!(bundle.policies[0].enabled);
        assert!(bundle.policies[2].enabled);
        assert_eq!(bundle.policies[2].cedar_dsl, "");
    }

    #[test]
    fn combined_dsl_joins_enabled_entries_only() {
        let bundle: PolicyBundle = serde_json::from_str(
            r#"{"policies": [
                {"enabled": true, "cedar_dsl": "first"},
                {"enabled": false, "cedar_dsl": "skipped"},
                {"enabled": true, "cedar_dsl": "second"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(bundle.combined_dsl(), "first\nsecond");
    }

    #[test]
    fn empty_document_is_an_empty_bundle() {
        let bundle: PolicyBundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.policies.is_empty());
        assert_eq!(bundle.combined_dsl(), "");
    }

    #[test]
    fn http_source_builds_endpoint_url() {
        let source = HttpPolicySource::new("https://api.trusera.dev/").with_api_key("tsk_test");
        assert_eq!(source.base_url(), "https://api.trusera.dev");
        assert_eq!(
            source.policy_url(),
            "https://api.trusera.dev/api/v1/policies/cedar"
        );
        assert_eq!(source.endpoint(), Some("https://api.trusera.dev"));
    }

    #[test]
    fn file_source_reads_policy_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.cedar");
        std::fs::write(&path, "permit (principal, action, resource) when { request.method == \"GET\" };").unwrap();

        let bundle = FilePolicySource::new(&path).fetch().unwrap();
        assert_eq!(bundle.policies.len(), 1);
        assert!(bundle.combined_dsl().starts_with("permit"));
    }

    #[test]
    fn file_source_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FilePolicySource::new(dir.path().join("nope.cedar"))
            .fetch()
            .unwrap_err();
        assert!(matches!(err, CacheError::ReadPolicy { .. }));
    }

    #[test]
    fn closure_source() {
        let source = FnSource(|| Ok(PolicyBundle::from_dsl("x")));
        assert_eq!(source.fetch().unwrap().combined_dsl(), "x");
        assert_eq!(source.endpoint(), None);
    }
}
