// interceptor.rs — Policy enforcement around outbound transports.
//
// Per request:
//   1. excluded URL?            → forward untouched, no event
//   2. build request subject    → PolicyCache::evaluate
//   3. deny + block             → violation event, Err(Blocked), inner never called
//      deny + warn              → stderr warning + violation event, forward
//      deny + log               → violation event, forward
//   4. forward, time it         → interception event (error-tagged on failure)
//   5. return the inner result unchanged
//
// Evaluation and event emission run inline on the caller's thread or task.
// Neither does I/O as long as the sink is non-blocking (see QueuedSink).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use trusera_cache::PolicyCache;
use trusera_events::{EventSink, EventType, TelemetryEvent};
use trusera_policy::{EvaluationResult, Subject};

use crate::enforcement::EnforcementMode;
use crate::error::{InterceptorError, PolicyViolation, SendError};
use crate::registry::{self, TransportSet};
use crate::transport::{
    pool_url, AsyncTransport, ConnectionPool, HttpRequest, HttpResponse, SyncTransport,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Which request headers become `header_*` subject attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeaderCapture {
    #[default]
    All,
    /// Only these header names (case-insensitive). Empty captures none.
    Only(Vec<String>),
}

impl HeaderCapture {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        HeaderCapture::Only(
            names
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    fn captures(&self, name: &str) -> bool {
        match self {
            HeaderCapture::All => true,
            HeaderCapture::Only(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
        }
    }
}

pub struct InterceptorBuilder {
    mode: EnforcementMode,
    cache: Option<Arc<PolicyCache>>,
    sink: Option<Arc<dyn EventSink>>,
    patterns: Vec<String>,
    headers: HeaderCapture,
}

impl InterceptorBuilder {
    pub fn with_cache(mut self, cache: Arc<PolicyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Skip any URL this regex finds a match in.
    pub fn with_exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_header_capture(mut self, headers: HeaderCapture) -> Self {
        self.headers = headers;
        self
    }

    /// Compile exclusions. URLs starting with the cache's own control-plane
    /// endpoint are always excluded.
    pub fn build(self) -> Result<Interceptor, InterceptorError> {
        let mut exclusions = self
            .patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| InterceptorError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(endpoint) = self.cache.as_ref().and_then(|c| c.source_endpoint()) {
            let escaped = format!("^{}", regex::escape(endpoint));
            exclusions.push(Regex::new(&escaped).map_err(|source| {
                InterceptorError::InvalidPattern {
                    pattern: escaped.clone(),
                    source,
                }
            })?);
        }

        Ok(Interceptor {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            core: Arc::new(Core {
                mode: self.mode,
                cache: self.cache,
                sink: self.sink,
                exclusions,
                headers: self.headers,
                interceptions: AtomicU64::new(0),
            }),
        })
    }
}

struct Core {
    mode: EnforcementMode,
    cache: Option<Arc<PolicyCache>>,
    sink: Option<Arc<dyn EventSink>>,
    exclusions: Vec<Regex>,
    headers: HeaderCapture,
    interceptions: AtomicU64,
}

impl Core {
    fn is_excluded(&self, url: &str) -> bool {
        self.exclusions.iter().any(|re| re.is_match(url))
    }

    fn evaluate(&self, method: &str, url: &str, headers: &[(String, String)]) -> EvaluationResult {
        let Some(cache) = &self.cache else {
            return EvaluationResult::allow("No policy cache configured");
        };
        let selected = headers
            .iter()
            .filter(|(name, _)| self.headers.captures(name))
            .map(|(name, value)| (name.as_str(), value.as_str()));
        cache.evaluate(&Subject::from_request(url, method, selected))
    }

    /// Steps 1-3. `Ok(None)` means excluded; `Ok(Some(allowed))` means
    /// forward.
    fn admit(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Option<bool>, SendError> {
        if self.is_excluded(url) {
            tracing::debug!(%method, %url, "excluded from policy evaluation");
            return Ok(None);
        }

        let result = self.evaluate(method, url, headers);
        if result.is_allowed() {
            return Ok(Some(true));
        }

        let policy_id = result.policy_id().map(str::to_string);
        match self.mode {
            EnforcementMode::Block => {
                tracing::warn!(%method, %url, reason = %result.reason, "request blocked by policy");
                self.emit_violation(method, url, &result.reason, policy_id.clone());
                return Err(SendError::Blocked(PolicyViolation {
                    action: "http".to_string(),
                    target: format!("{} {}", method, url),
                    reason: result.reason,
                    policy_id,
                }));
            }
            EnforcementMode::Warn => {
                tracing::warn!(%method, %url, reason = %result.reason, "policy violation (warn)");
                eprintln!(
                    "Policy violation (warn mode): {} {}\n   Reason: {}",
                    method, url, result.reason
                );
                self.emit_violation(method, url, &result.reason, policy_id);
            }
            EnforcementMode::Log => {
                tracing::info!(%method, %url, reason = %result.reason, "policy violation (log)");
                self.emit_violation(method, url, &result.reason, policy_id);
            }
        }
        Ok(Some(false))
    }

    fn emit_violation(&self, method: &str, url: &str, reason: &str, policy_id: Option<String>) {
        let event = TelemetryEvent::new(
            EventType::PolicyViolation,
            format!("policy_violation_{}", method.to_ascii_lowercase()),
        )
        .with_payload("method", method)
        .with_payload("url", url)
        .with_payload("reason", reason)
        .with_metadata("enforcement", self.mode.as_str())
        .with_metadata("policy_id", policy_id);
        self.track(&event);
    }

    /// Step 4: the interception event for a forwarded request.
    fn record(
        &self,
        method: &str,
        url: &str,
        outcome: &Result<HttpResponse, SendError>,
        elapsed: Duration,
        allowed: bool,
    ) {
        self.interceptions.fetch_add(1, Ordering::Relaxed);
        let duration_ms = (elapsed.as_secs_f64() * 100_000.0).round() / 100.0;
        let status = outcome.as_ref().ok().map(|r| r.status);

        let mut event = TelemetryEvent::new(
            EventType::Interception,
            format!("http_{}", method.to_ascii_lowercase()),
        )
        .with_payload("method", method)
        .with_payload("url", url)
        .with_payload("status_code", status)
        .with_payload("duration_ms", duration_ms)
        .with_metadata("allowed", allowed)
        .with_metadata("enforcement", self.mode.as_str());
        if let Err(e) = outcome {
            event = event.with_metadata("error", e.to_string());
        }
        self.track(&event);
    }

    fn track(&self, event: &TelemetryEvent) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.track(event) {
                tracing::debug!(error = %e, event = %event.name, "failed to track event");
            }
        }
    }
}

/// Enforces policy on every request sent through the transports it wraps.
///
/// Two ways to instrument:
/// - [`install`](Self::install) wraps whatever is in the process-wide
///   [`registry`](crate::registry) until [`uninstall`](Self::uninstall).
/// - [`wrap_sync`](Self::wrap_sync) and friends wrap one transport value
///   directly.
pub struct Interceptor {
    id: u64,
    core: Arc<Core>,
}

impl Interceptor {
    pub fn builder(mode: EnforcementMode) -> InterceptorBuilder {
        InterceptorBuilder {
            mode,
            cache: None,
            sink: None,
            patterns: Vec::new(),
            headers: HeaderCapture::default(),
        }
    }

    pub fn mode(&self) -> EnforcementMode {
        self.core.mode
    }

    pub fn cache(&self) -> Option<&Arc<PolicyCache>> {
        self.core.cache.as_ref()
    }

    /// Number of interception events produced so far.
    pub fn interceptions(&self) -> u64 {
        self.core.interceptions.load(Ordering::Relaxed)
    }

    pub fn is_installed(&self) -> bool {
        registry::is_installed_by(self.id)
    }

    /// Wrap every transport currently in the registry.
    pub fn install(&self) -> Result<(), InterceptorError> {
        let kinds = registry::install(self.id, |originals| self.wrap_set(originals))?;
        tracing::info!(enforcement = %self.core.mode, transports = ?kinds, "interceptor installed");
        Ok(())
    }

    /// Put back exactly the transports captured by [`install`](Self::install).
    pub fn uninstall(&self) -> Result<(), InterceptorError> {
        registry::uninstall(self.id)?;
        tracing::info!(events = self.interceptions(), "interceptor uninstalled");
        Ok(())
    }

    /// Install for the lifetime of the returned guard. The guard uninstalls
    /// on drop, including during unwinding.
    pub fn install_scoped(&self) -> Result<InstallGuard<'_>, InterceptorError> {
        self.install()?;
        Ok(InstallGuard { interceptor: self })
    }

    pub fn wrap_sync(&self, inner: Arc<dyn SyncTransport>) -> Arc<dyn SyncTransport> {
        Arc::new(InterceptedSync {
            core: Arc::clone(&self.core),
            inner,
        })
    }

    pub fn wrap_async(&self, inner: Arc<dyn AsyncTransport>) -> Arc<dyn AsyncTransport> {
        Arc::new(InterceptedAsync {
            core: Arc::clone(&self.core),
            inner,
        })
    }

    pub fn wrap_pool(&self, inner: Arc<dyn ConnectionPool>) -> Arc<dyn ConnectionPool> {
        Arc::new(InterceptedPool {
            core: Arc::clone(&self.core),
            inner,
        })
    }

    fn wrap_set(&self, originals: &TransportSet) -> TransportSet {
        TransportSet {
            sync: originals.sync.clone().map(|t| self.wrap_sync(t)),
            asynchronous: originals.asynchronous.clone().map(|t| self.wrap_async(t)),
            pool: originals.pool.clone().map(|p| self.wrap_pool(p)),
        }
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("enforcement", &self.core.mode)
            .field("installed", &self.is_installed())
            .field("events", &self.interceptions())
            .finish()
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        if self.is_installed() {
            let _ = self.uninstall();
        }
    }
}

pub struct InstallGuard<'a> {
    interceptor: &'a Interceptor,
}

impl InstallGuard<'_> {
    pub fn interceptor(&self) -> &Interceptor {
        self.interceptor
    }
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        if self.interceptor.is_installed() {
            if let Err(e) = self.interceptor.uninstall() {
                tracing::warn!(error = %e, "scoped uninstall failed");
            }
        }
    }
}

struct InterceptedSync {
    core: Arc<Core>,
    inner: Arc<dyn SyncTransport>,
}

impl SyncTransport for InterceptedSync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
        let (method, url) = (request.method.clone(), request.url.clone());
        let Some(allowed) = self.core.admit(&method, &url, &request.headers)? else {
            return self.inner.send(request);
        };

        let start = Instant::now();
        let outcome = self.inner.send(request);
        self.core.record(&method, &url, &outcome, start.elapsed(), allowed);
        outcome
    }
}

struct InterceptedAsync {
    core: Arc<Core>,
    inner: Arc<dyn AsyncTransport>,
}

#[async_trait]
impl AsyncTransport for InterceptedAsync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
        let (method, url) = (request.method.clone(), request.url.clone());
        let Some(allowed) = self.core.admit(&method, &url, &request.headers)? else {
            return self.inner.send(request).await;
        };

        let start = Instant::now();
        let outcome = self.inner.send(request).await;
        self.core.record(&method, &url, &outcome, start.elapsed(), allowed);
        outcome
    }
}

struct InterceptedPool {
    core: Arc<Core>,
    inner: Arc<dyn ConnectionPool>,
}

impl ConnectionPool for InterceptedPool {
    fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    fn host(&self) -> &str {
        self.inner.host()
    }

    fn port(&self) -> Option<u16> {
        self.inner.port()
    }

    fn urlopen(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
        let method = request.method.clone();
        let full_url = pool_url(self.inner.as_ref(), &request.url);
        let Some(allowed) = self.core.admit(&method, &full_url, &request.headers)? else {
            return self.inner.urlopen(request);
        };

        let start = Instant::now();
        let outcome = self.inner.urlopen(request);
        self.core.record(&method, &full_url, &outcome, start.elapsed(), allowed);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use trusera_cache::{CacheConfig, FnSource, PolicyBundle};
    use trusera_events::MemorySink;

    const BLOCK_DEEPSEEK: &str = r#"forbid (principal, action == Action::"http", resource)
        when { request.hostname contains "deepseek.com" };"#;

    /// Counts calls and records the last request it saw.
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        last: Mutex<Option<HttpRequest>>,
        fail: bool,
    }

    impl CountingTransport {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request);
            if self.fail {
                Err(SendError::transport(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )))
            } else {
                Ok(HttpResponse::new(200).with_body("ok"))
            }
        }
    }

    impl SyncTransport for CountingTransport {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
            self.hit(request)
        }
    }

    #[async_trait]
    impl AsyncTransport for CountingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
            self.hit(request)
        }
    }

    impl ConnectionPool for CountingTransport {
        fn scheme(&self) -> &str {
            "https"
        }
        fn host(&self) -> &str {
            "chat.deepseek.com"
        }
        fn port(&self) -> Option<u16> {
            Some(443)
        }
        fn urlopen(&self, request: HttpRequest) -> Result<HttpResponse, SendError> {
            self.hit(request)
        }
    }

    fn cache(dsl: &'static str) -> Arc<PolicyCache> {
        Arc::new(PolicyCache::new(
            FnSource(move || Ok(PolicyBundle::from_dsl(dsl))),
            CacheConfig::default().with_refresh_interval(Duration::from_secs(3600)),
        ))
    }

    fn setup(mode: EnforcementMode) -> (Interceptor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::builder(mode)
            .with_cache(cache(BLOCK_DEEPSEEK))
            .with_sink(sink.clone())
            .build()
            .unwrap();
        (interceptor, sink)
    }

    fn of_type(sink: &MemorySink, event_type: EventType) -> Vec<TelemetryEvent> {
        sink.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    #[test]
    fn block_mode_never_calls_the_transport() {
        let (interceptor, sink) = setup(EnforcementMode::Block);
        let inner = Arc::new(CountingTransport::default());
        let transport = interceptor.wrap_sync(inner.clone());

        let err = transport
            .send(HttpRequest::post("https://deepseek.com/api"))
            .unwrap_err();

        assert_eq!(inner.calls(), 0);
        let violation = err.violation().unwrap();
        assert_eq!(violation.action, "http");
        assert_eq!(violation.target, "POST https://deepseek.com/api");
        assert!(violation.reason.starts_with("Forbidden by policy"));
        assert!(violation.policy_id.as_deref().unwrap().starts_with("forbid"));

        let violations = of_type(&sink, EventType::PolicyViolation);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].name, "policy_violation_post");
        assert_eq!(violations[0].metadata["enforcement"], "block");
        assert!(of_type(&sink, EventType::Interception).is_empty());
        assert_eq!(interceptor.interceptions(), 0);
    }

    #[test]
    fn log_and_warn_modes_forward_once_and_report_once() {
        for mode in [EnforcementMode::Log, EnforcementMode::Warn] {
            let (interceptor, sink) = setup(mode);
            let inner = Arc::new(CountingTransport::default());
            let transport = interceptor.wrap_sync(inner.clone());

            let response = transport
                .send(HttpRequest::post("https://deepseek.com/api"))
                .unwrap();

            assert_eq!(response.status, 200);
            assert_eq!(response.body, b"ok");
            assert_eq!(inner.calls(), 1, "{mode}");

            let violations = of_type(&sink, EventType::PolicyViolation);
            assert_eq!(violations.len(), 1, "{mode}");
            assert_eq!(violations[0].metadata["enforcement"], mode.as_str());
            assert_eq!(violations[0].payload["url"], "https://deepseek.com/api");

            let interceptions = of_type(&sink, EventType::Interception);
            assert_eq!(interceptions.len(), 1);
            assert_eq!(interceptions[0].metadata["allowed"], false);
        }
    }

    #[test]
    fn allowed_request_emits_interception_only() {
        let (interceptor, sink) = setup(EnforcementMode::Block);
        let inner = Arc::new(CountingTransport::default());
        let transport = interceptor.wrap_sync(inner.clone());

        transport
            .send(HttpRequest::get("https://api.openai.com/v1/models"))
            .unwrap();

        assert_eq!(inner.calls(), 1);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, EventType::Interception);
        assert_eq!(event.name, "http_get");
        assert_eq!(event.payload["method"], "GET");
        assert_eq!(event.payload["status_code"], 200);
        assert!(event.payload["duration_ms"].as_f64().unwrap() >= 0.0);
        assert_eq!(event.metadata["allowed"], true);
        assert_eq!(interceptor.interceptions(), 1);
    }

    #[test]
    fn excluded_urls_bypass_evaluation_and_telemetry() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::builder(EnforcementMode::Block)
            .with_cache(cache(BLOCK_DEEPSEEK))
            .with_sink(sink.clone())
            .with_exclusion(r"deepseek\.com/health")
            .build()
            .unwrap();
        let inner = Arc::new(CountingTransport::default());
        let transport = interceptor.wrap_sync(inner.clone());

        // Would be blocked if evaluated.
        let response = transport
            .send(HttpRequest::get("https://deepseek.com/health"))
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(inner.calls(), 1);
        assert!(sink.is_empty());
        assert_eq!(interceptor.interceptions(), 0);
    }

    #[test]
    fn policy_endpoint_is_always_excluded() {
        struct Remote;
        impl trusera_cache::PolicySource for Remote {
            fn fetch(&self) -> Result<PolicyBundle, trusera_cache::CacheError> {
                Ok(PolicyBundle::from_dsl(
                    r#"forbid (principal, action, resource) when { request.hostname contains "trusera" };"#,
                ))
            }
            fn endpoint(&self) -> Option<&str> {
                Some("https://api.trusera.dev")
            }
        }

        let cache = Arc::new(PolicyCache::new(Remote, CacheConfig::default()));
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::builder(EnforcementMode::Block)
            .with_cache(cache)
            .with_sink(sink.clone())
            .build()
            .unwrap();
        let inner = Arc::new(CountingTransport::default());
        let transport = interceptor.wrap_sync(inner.clone());

        transport
            .send(HttpRequest::get("https://api.trusera.dev/api/v1/policies/cedar"))
            .unwrap();
        assert_eq!(inner.calls(), 1);
        assert!(sink.is_empty());

        assert!(transport
            .send(HttpRequest::get("https://other.trusera.io/"))
            .unwrap_err()
            .is_blocked());
        assert!(transport
            .send(HttpRequest::get(
                "https://other.trusera.io/upload?next=https://api.trusera.dev/api/v1/policies/cedar"
            ))
            .unwrap_err()
            .is_blocked());
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn transport_errors_propagate_with_error_event() {
        let (interceptor, sink) = setup(EnforcementMode::Block);
        let inner = Arc::new(CountingTransport::failing());
        let transport = interceptor.wrap_sync(inner.clone());

        let err = transport
            .send(HttpRequest::get("https://api.openai.com/"))
            .unwrap_err();

        assert!(matches!(err, SendError::Transport(_)));
        assert!(err.to_string().contains("connection refused"));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].payload["status_code"].is_null());
        assert!(events[0].metadata["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[test]
    fn no_cache_allows_everything() {
        let interceptor = Interceptor::builder(EnforcementMode::Block).build().unwrap();
        let inner = Arc::new(CountingTransport::default());
        let transport = interceptor.wrap_sync(inner.clone());
        transport
            .send(HttpRequest::post("https://deepseek.com/api"))
            .unwrap();
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn header_capture_controls_header_attributes() {
        const BLOCK_BOT: &str = r#"forbid (principal, action, resource) when { request.header_user_agent contains "bot" };"#;
        let request = || HttpRequest::get("https://example.com/").with_header("User-Agent", "evil-bot/1.0");

        let all = Interceptor::builder(EnforcementMode::Block)
            .with_cache(cache(BLOCK_BOT))
            .build()
            .unwrap();
        let transport = all.wrap_sync(Arc::new(CountingTransport::default()));
        assert!(transport.send(request()).unwrap_err().is_blocked());

        let none = Interceptor::builder(EnforcementMode::Block)
            .with_cache(cache(BLOCK_BOT))
            .with_header_capture(HeaderCapture::only(["authorization"]))
            .build()
            .unwrap();
        let transport = none.wrap_sync(Arc::new(CountingTransport::default()));
        assert!(transport.send(request()).is_ok());
    }

    #[test]
    fn pool_requests_are_evaluated_on_the_full_url() {
        let (interceptor, sink) = setup(EnforcementMode::Block);
        let inner = Arc::new(CountingTransport::default());
        let pool = interceptor.wrap_pool(inner.clone());

        assert_eq!(pool.host(), "chat.deepseek.com");
        let err = pool.urlopen(HttpRequest::get("/v1/chat")).unwrap_err();
        assert_eq!(inner.calls(), 0);
        assert_eq!(
            err.violation().unwrap().target,
            "GET https://chat.deepseek.com/v1/chat"
        );
        assert_eq!(of_type(&sink, EventType::PolicyViolation).len(), 1);
    }

    #[test]
    fn pool_forwards_the_original_relative_url() {
        let (interceptor, sink) = setup(EnforcementMode::Log);
        let inner = Arc::new(CountingTransport::default());
        let pool = interceptor.wrap_pool(inner.clone());

        pool.urlopen(HttpRequest::get("/v1/chat")).unwrap();
        let seen = inner.last.lock().unwrap().clone().unwrap();
        assert_eq!(seen.url, "/v1/chat");

        let interceptions = of_type(&sink, EventType::Interception);
        assert_eq!(interceptions[0].payload["url"], "https://chat.deepseek.com/v1/chat");
    }

    #[tokio::test]
    async fn async_transport_is_enforced() {
        let (interceptor, sink) = setup(EnforcementMode::Block);
        let inner = Arc::new(CountingTransport::default());
        let transport = interceptor.wrap_async(inner.clone());

        let blocked = transport
            .send(HttpRequest::post("https://api.deepseek.com/v1"))
            .await;
        assert!(blocked.unwrap_err().is_blocked());
        assert_eq!(inner.calls(), 0);

        let ok = transport
            .send(HttpRequest::get("https://api.openai.com/v1"))
            .await
            .unwrap();
        assert_eq!(ok.status, 200);
        assert_eq!(inner.calls(), 1);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn invalid_exclusion_pattern_is_rejected() {
        let err = Interceptor::builder(EnforcementMode::Log)
            .with_exclusion("(unclosed")
            .build()
            .unwrap_err();
        assert!(matches!(err, InterceptorError::InvalidPattern { .. }));
    }
}
