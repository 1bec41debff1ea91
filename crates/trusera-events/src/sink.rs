// sink.rs — Event sinks: where telemetry events go.
//
// The interceptor holds one `Arc<dyn EventSink>` and calls `track` on the
// request path, so sinks that do real I/O should sit behind a `QueuedSink`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::EventError;
use crate::event::TelemetryEvent;

/// Trait for anything that accepts telemetry events.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn track(&self, event: &TelemetryEvent) -> Result<(), EventError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Appends events as JSON lines to a file.
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn track(&self, event: &TelemetryEvent) -> Result<(), EventError> {
        let json = serde_json::to_string(event)?;
        let _guard = lock(&self.write_lock);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| EventError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| EventError::Io {
                path: self.path.clone(),
                source,
            })?;

        writeln!(file, "{}", json).map_err(|source| EventError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(())
    }
}

/// Keeps every event in memory. Useful for tests and for embedding
/// applications that forward events themselves.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything tracked so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        lock(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl EventSink for MemorySink {
    fn track(&self, event: &TelemetryEvent) -> Result<(), EventError> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

enum Message {
    Event(Box<TelemetryEvent>),
    Flush(Sender<()>),
}

/// Non-blocking sink. `track` only enqueues; a background thread delivers
/// events to the inner sink in order. Delivery errors are logged, never
/// surfaced to the caller.
///
/// Dropping the sink drains the queue and joins the worker.
pub struct QueuedSink {
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedSink {
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("trusera-events".into())
            .spawn(move || run_queue(inner, receiver))
            .map_err(|e| tracing::error!(error = %e, "failed to spawn event queue worker"))
            .ok();

        Self {
            sender: worker.as_ref().map(|_| sender),
            worker,
        }
    }

    /// Block until every event queued before this call has been handed to
    /// the inner sink, or until `timeout` elapses. Returns `true` when the
    /// queue drained in time.
    pub fn flush(&self, timeout: Duration) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if sender.send(Message::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

fn run_queue(inner: Arc<dyn EventSink>, receiver: Receiver<Message>) {
    for message in receiver {
        match message {
            Message::Event(event) => {
                if let Err(e) = inner.track(&event) {
                    tracing::warn!(error = %e, event = %event.name, "event delivery failed");
                }
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

impl EventSink for QueuedSink {
    fn track(&self, event: &TelemetryEvent) -> Result<(), EventError> {
        let sender = self.sender.as_ref().ok_or(EventError::Closed)?;
        sender
            .send(Message::Event(Box::new(event.clone())))
            .map_err(|_| EventError::Closed)
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue is empty.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("event queue worker panicked");
            }
        }
    }
}

/// Dispatches events to multiple sinks.
///
/// Errors from individual sinks are logged (via tracing) but don't
/// prevent other sinks from receiving the event.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventDispatcher {
    /// Create a new dispatcher with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Dispatch an event to all sinks.
    pub fn dispatch(&self, event: &TelemetryEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.track(event) {
                tracing::warn!("event sink error: {}", e);
            }
        }
    }
}

impl EventSink for EventDispatcher {
    fn track(&self, event: &TelemetryEvent) -> Result<(), EventError> {
        self.dispatch(event);
        Ok(())
    }
}
