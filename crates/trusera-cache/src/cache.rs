// cache.rs — The policy cache and its refresh worker.
//
// Layout:
//
//   PolicyCache ──owns──▶ Worker (thread, command channel, done signal)
//        │                   │
//        └──Arc<Shared>◀─────┘
//              ├─ source: Box<dyn PolicySource>
//              └─ state:  Mutex<Snapshot>   (evaluator, hash, last success)
//
// Every fetch runs on the worker thread: the eager first load, the periodic
// refresh, invalidation and `refresh_now()`. Callers that need a result
// send a command and wait for the reply.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use trusera_policy::{EvaluationResult, Evaluator, Subject};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::hasher::hash_str;
use crate::source::PolicySource;

const NO_POLICIES_REASON: &str = "No policies loaded (fail-open)";

/// What one refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Content hash matched the published one; nothing rebuilt.
    Unchanged,
    /// A new evaluator was built and published.
    Published { rules: usize },
}

/// Diagnostic view of the published snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub loaded: bool,
    pub rules: usize,
    pub content_hash: String,
    pub last_success: Option<DateTime<Utc>>,
    /// Number of evaluators published so far.
    pub generation: u64,
    /// Number of successful refreshes, including unchanged ones.
    pub successful_refreshes: u64,
}

#[derive(Default)]
struct Snapshot {
    evaluator: Option<Arc<Evaluator>>,
    hash: String,
    last_success: Option<(Instant, DateTime<Utc>)>,
    generation: u64,
    successful_refreshes: u64,
}

struct Shared {
    source: Box<dyn PolicySource>,
    state: Mutex<Snapshot>,
}

enum Command {
    Refresh(Option<Sender<Result<RefreshOutcome, CacheError>>>),
    Stop,
}

struct Worker {
    commands: Sender<Command>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe policy cache with background refresh.
pub struct PolicyCache {
    shared: Option<Arc<Shared>>,
    config: CacheConfig,
    endpoint: Option<String>,
    worker: Mutex<Option<Worker>>,
}

impl PolicyCache {
    /// Build a cache over `source`, load it once, and start the refresh
    /// worker. Returns after the first load attempt has finished, whether
    /// or not it succeeded.
    pub fn new(source: impl PolicySource + 'static, config: CacheConfig) -> Self {
        Self::from_boxed(Box::new(source), config)
    }

    pub fn from_boxed(source: Box<dyn PolicySource>, config: CacheConfig) -> Self {
        let endpoint = source.endpoint().map(str::to_string);
        let shared = Arc::new(Shared {
            source,
            state: Mutex::new(Snapshot::default()),
        });

        let (commands, command_rx) = mpsc::channel();
        let (done_tx, done) = mpsc::channel();
        let (loaded_tx, loaded_rx) = mpsc::channel();
        let interval = config.effective_refresh_interval();
        let worker_shared = Arc::clone(&shared);

        let spawned = std::thread::Builder::new()
            .name("trusera-policy-refresh".into())
            .spawn(move || {
                let _ = worker_shared.refresh();
                let _ = loaded_tx.send(());
                run_worker(&worker_shared, command_rx, interval);
                let _ = done_tx.send(());
            });

        let worker = match spawned {
            Ok(handle) => {
                // Eager first load. A closed channel just means the worker
                // died early; the cache stays empty and fails open.
                let _ = loaded_rx.recv();
                Some(Worker {
                    commands,
                    done,
                    handle,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn policy refresh worker; refreshing inline once");
                let _ = shared.refresh();
                None
            }
        };

        Self {
            shared: Some(shared),
            config,
            endpoint,
            worker: Mutex::new(worker),
        }
    }

    /// A cache with no source. Always empty, so every evaluation allows.
    pub fn disabled() -> Self {
        Self {
            shared: None,
            config: CacheConfig::default(),
            endpoint: None,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Base URL of the policy source's control plane, if any.
    pub fn source_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Evaluate a subject against the published snapshot. Never blocks on
    /// I/O; the snapshot lock is held only to clone two fields.
    pub fn evaluate(&self, subject: &Subject) -> EvaluationResult {
        let Some(shared) = &self.shared else {
            return EvaluationResult::allow(NO_POLICIES_REASON);
        };

        let (evaluator, last_success) = {
            let state = lock(&shared.state);
            (state.evaluator.clone(), state.last_success.map(|(at, _)| at))
        };

        let Some(evaluator) = evaluator else {
            return EvaluationResult::allow(NO_POLICIES_REASON);
        };

        if let (Some(tolerance), Some(at)) = (self.config.effective_stale_tolerance(), last_success)
        {
            let age = at.elapsed();
            if age > tolerance {
                tracing::warn!(age_secs = age.as_secs(), "policy cache stale, failing open");
                return EvaluationResult::allow(format!(
                    "Policy cache stale ({:.0}s > {:.0}s), fail-open",
                    age.as_secs_f64(),
                    tolerance.as_secs_f64()
                ));
            }
        }

        evaluator.evaluate(subject)
    }

    /// Evaluate an outbound HTTP request.
    pub fn evaluate_request<I, K, V>(&self, url: &str, method: &str, headers: I) -> EvaluationResult
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.evaluate(&Subject::from_request(url, method, headers))
    }

    /// Evaluate a non-HTTP action (tool call, LLM call, ...) as the
    /// synthetic request `action://<type>/<target>` with method set to the
    /// upper-cased action type.
    pub fn evaluate_action(&self, action_type: &str, target: &str) -> EvaluationResult {
        let url = format!("action://{}/{}", action_type, target);
        self.evaluate_request(&url, action_type, std::iter::empty::<(&str, &str)>())
    }

    /// The currently published evaluator, if any.
    pub fn current_evaluator(&self) -> Option<Arc<Evaluator>> {
        self.shared
            .as_ref()
            .and_then(|shared| lock(&shared.state).evaluator.clone())
    }

    pub fn status(&self) -> CacheStatus {
        let Some(shared) = &self.shared else {
            return CacheStatus {
                loaded: false,
                rules: 0,
                content_hash: String::new(),
                last_success: None,
                generation: 0,
                successful_refreshes: 0,
            };
        };
        let state = lock(&shared.state);
        CacheStatus {
            loaded: state.evaluator.is_some(),
            rules: state.evaluator.as_ref().map_or(0, |e| e.len()),
            content_hash: state.hash.clone(),
            last_success: state.last_success.map(|(_, at)| at),
            generation: state.generation,
            successful_refreshes: state.successful_refreshes,
        }
    }

    /// Run one refresh on the worker and wait for its outcome.
    pub fn refresh_now(&self) -> Result<RefreshOutcome, CacheError> {
        if self.shared.is_none() {
            return Err(CacheError::NoSource);
        }
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(Command::Refresh(Some(reply_tx)))?;
        reply_rx.recv().map_err(|_| CacheError::Stopped)?
    }

    /// Forget the published hash so the next refresh rebuilds even if the
    /// content is unchanged, and trigger that refresh now (asynchronously).
    pub fn invalidate(&self) {
        let Some(shared) = &self.shared else {
            return;
        };
        lock(&shared.state).hash.clear();
        if let Err(e) = self.send(Command::Refresh(None)) {
            tracing::debug!(error = %e, "invalidate: worker not running");
        }
    }

    /// Stop the refresh worker. Waits at most one refresh interval plus a
    /// second for it to finish. The published snapshot stays readable.
    /// Calling it again is a no-op.
    pub fn stop(&self) {
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        let _ = worker.commands.send(Command::Stop);
        let grace = self.config.effective_refresh_interval() + Duration::from_secs(1);
        match worker.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::warn!("policy refresh worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("policy refresh worker did not stop in time; detaching");
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), CacheError> {
        let worker = lock(&self.worker);
        let worker = worker.as_ref().ok_or(CacheError::Stopped)?;
        worker.commands.send(command).map_err(|_| CacheError::Stopped)
    }
}

impl Drop for PolicyCache {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(shared: &Shared, commands: Receiver<Command>, interval: Duration) {
    let mut next_due = Instant::now() + interval;
    loop {
        let wait = next_due.saturating_duration_since(Instant::now());
        match commands.recv_timeout(wait) {
            Ok(Command::Refresh(reply)) => {
                let outcome = shared.refresh();
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let _ = shared.refresh();
                next_due = Instant::now() + interval;
            }
        }
    }
    tracing::debug!("policy refresh worker exiting");
}

impl Shared {
    /// One fetch, hash and (maybe) publish. Errors are logged here and
    /// leave the snapshot untouched.
    fn refresh(&self) -> Result<RefreshOutcome, CacheError> {
        let result = self.try_refresh();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "policy cache refresh failed");
        }
        result
    }

    fn try_refresh(&self) -> Result<RefreshOutcome, CacheError> {
        let bundle = self.source.fetch()?;
        let combined = bundle.combined_dsl();
        let new_hash = hash_str(&combined);

        let unchanged = lock(&self.state).hash == new_hash;
        if unchanged {
            let mut state = lock(&self.state);
            state.last_success = Some((Instant::now(), Utc::now()));
            state.successful_refreshes += 1;
            return Ok(RefreshOutcome::Unchanged);
        }

        // Parse outside the lock.
        let evaluator = Arc::new(Evaluator::from_text(&combined));
        let rules = evaluator.len();

        {
            let mut state = lock(&self.state);
            state.evaluator = Some(evaluator);
            state.hash = new_hash;
            state.last_success = Some((Instant::now(), Utc::now()));
            state.generation += 1;
            state.successful_refreshes += 1;
        }

        tracing::info!(rules, "policy cache refreshed");
        Ok(RefreshOutcome::Published { rules })
    }
}
