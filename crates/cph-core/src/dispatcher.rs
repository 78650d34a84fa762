//! Frame routing and request/response correlation.
//!
//! The dispatcher registers itself as the transport's receive sink, gathers
//! incoming bytes into a buffer, extracts frames with the stream framer, and
//! routes them: responses resolve the pending command waiter keyed by the
//! command code, notifications fan out to registered callbacks, anything
//! else is logged and dropped.
//!
//! # Invariants
//!
//! - At most one pending waiter per command code; a colliding command evicts
//!   the previous waiter with `Superseded` (CPH frames carry no transaction
//!   id, so correlation is by code and callers issue per-code commands
//!   serially).
//! - Waiter resolution, timeout, and `cleanup` all remove the pending entry;
//!   an abandoned wait leaves the entry until one of those occurs.
//! - Codec failures inside the receive path are local: logged, loop
//!   continues.
//! - Callbacks run as spawned tasks, never under a dispatcher lock and never
//!   blocking the receive path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use cph_proto::frame::{self, ExtractedFrame, FrameType};
use cph_proto::tlv::{self, TlvMap, TlvValue, tags};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ReaderError, Result};
use crate::transport::Transport;

/// Default window a command waits for its response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Receive-buffer size above which a desynchronization warning is logged.
const RX_BUFFER_WARN_THRESHOLD: usize = 4096;

/// Async callback invoked for notification frames.
///
/// Callbacks receive the sender address, the notification code, and the
/// parsed TLV map of the parameter region. Each invocation runs as its own
/// task; implementations must not assume ordering across frames.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Handle one notification frame.
    async fn handle(&self, address: u16, code: u8, params: TlvMap);
}

type PendingSender = oneshot::Sender<Result<TlvMap>>;

struct PendingEntry {
    token: u64,
    tx: PendingSender,
}

#[derive(Default)]
struct Shared {
    rx_buffer: Mutex<BytesMut>,
    pending: Mutex<HashMap<u8, PendingEntry>>,
    subscriptions: Mutex<HashMap<u8, Vec<Arc<dyn NotificationHandler>>>>,
    next_token: AtomicU64,
}

/// Correlates command responses to waiters and fans out notifications.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    response_timeout: Duration,
    send_gate: tokio::sync::Mutex<()>,
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Create a dispatcher bound to `transport` with the default response
    /// timeout. Registers itself as the transport's receive sink.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_timeout(transport, DEFAULT_RESPONSE_TIMEOUT)
    }

    /// Create a dispatcher with an explicit response timeout.
    #[must_use]
    pub fn with_timeout(transport: Arc<dyn Transport>, response_timeout: Duration) -> Self {
        let shared = Arc::new(Shared::default());

        let sink_shared = Arc::clone(&shared);
        transport.register_receive_sink(Arc::new(move |data| {
            let shared = Arc::clone(&sink_shared);
            Box::pin(async move {
                shared.on_bytes(&data);
            })
        }));

        Self { transport, response_timeout, send_gate: tokio::sync::Mutex::new(()), shared }
    }

    /// The configured response timeout.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Encode `params` into a command frame, send it, and wait for the
    /// response with the matching command code.
    ///
    /// Returns the parsed TLV map of the response (status TLV included);
    /// typed decoding happens at the caller.
    ///
    /// # Errors
    ///
    /// - `ReaderError::Connection` if the transport is down
    /// - `ReaderError::Command` for a non-zero reader status
    /// - `ReaderError::Timeout` if no response arrives in time
    /// - `ReaderError::Superseded` if a newer command with the same code
    ///   evicts this wait
    /// - `ReaderError::DispatcherClosed` if `cleanup` runs first
    pub async fn send_command_wait_response(
        &self,
        command_code: u8,
        address: u16,
        params: &[u8],
    ) -> Result<TlvMap> {
        if !self.transport.is_connected() {
            return Err(ReaderError::Connection("cannot send command: not connected".to_string()));
        }

        let wire = frame::build_frame(FrameType::Command, address, command_code, params)?;

        let (tx, rx) = oneshot::channel();
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = lock(&self.shared.pending);
            if let Some(old) = pending.insert(command_code, PendingEntry { token, tx }) {
                warn!(code = command_code, "command collision, evicting previous waiter");
                let _ = old.tx.send(Err(ReaderError::Superseded { code: command_code }));
            }
        }

        debug!(
            code = command_code,
            len = wire.len(),
            "sending command frame"
        );
        {
            // Hold the gate for the whole write so frames are never
            // interleaved on the wire.
            let _gate = self.send_gate.lock().await;
            if let Err(err) = self.transport.send(&wire).await {
                self.shared.remove_pending_if(command_code, token);
                return Err(err);
            }
        }

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ReaderError::DispatcherClosed),
            Err(_) => {
                self.shared.remove_pending_if(command_code, token);
                warn!(
                    code = command_code,
                    timeout_ms = self.response_timeout.as_millis(),
                    "no response within timeout"
                );
                Err(ReaderError::Timeout { code: command_code })
            },
        }
    }

    /// Register `handler` for a notification code. A handler already
    /// registered for that code is not added twice.
    pub fn register_notification_handler(&self, code: u8, handler: Arc<dyn NotificationHandler>) {
        let mut subs = lock(&self.shared.subscriptions);
        let handlers = subs.entry(code).or_default();
        if handlers.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            warn!(code = code, "handler already registered");
            return;
        }
        handlers.push(handler);
    }

    /// Remove one registration of `handler` for `code`.
    pub fn unregister_notification_handler(&self, code: u8, handler: &Arc<dyn NotificationHandler>) {
        let mut subs = lock(&self.shared.subscriptions);
        if let Some(handlers) = subs.get_mut(&code) {
            handlers.retain(|existing| !Arc::ptr_eq(existing, handler));
            if handlers.is_empty() {
                subs.remove(&code);
            }
        }
    }

    /// Remove `handler` from every code it is registered under.
    pub fn unregister_handler_from_all(&self, handler: &Arc<dyn NotificationHandler>) {
        let mut subs = lock(&self.shared.subscriptions);
        subs.retain(|_, handlers| {
            handlers.retain(|existing| !Arc::ptr_eq(existing, handler));
            !handlers.is_empty()
        });
    }

    /// Discard any partially received bytes.
    pub fn clear_buffer(&self) {
        lock(&self.shared.rx_buffer).clear();
    }

    /// Cancel every pending command with `DispatcherClosed` and drop all
    /// subscriptions. Awaiters observe cancellation rather than hanging.
    pub fn cleanup(&self) {
        let drained: Vec<(u8, PendingEntry)> = lock(&self.shared.pending).drain().collect();
        for (code, entry) in drained {
            debug!(code = code, "cancelling pending command");
            let _ = entry.tx.send(Err(ReaderError::DispatcherClosed));
        }
        lock(&self.shared.subscriptions).clear();
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        lock(&self.shared.pending).len()
    }
}

impl Shared {
    /// Receive-sink body: append bytes, then extract and route every
    /// complete frame currently in the buffer.
    fn on_bytes(&self, data: &[u8]) {
        let mut frames = Vec::new();
        {
            let mut buffer = lock(&self.rx_buffer);
            buffer.extend_from_slice(data);
            loop {
                let before = buffer.len();
                match frame::find_and_parse_frame(&mut buffer) {
                    Some(extracted) => frames.push(extracted),
                    // A resync discard shrinks the buffer without yielding a
                    // frame; rescan until nothing moves.
                    None if buffer.len() < before => {},
                    None => break,
                }
            }
            if buffer.len() > RX_BUFFER_WARN_THRESHOLD {
                warn!(
                    buffered = buffer.len(),
                    "receive buffer exceeds threshold without yielding a frame"
                );
            }
        }

        for extracted in frames {
            self.route_frame(&extracted);
        }
    }

    fn route_frame(&self, extracted: &ExtractedFrame) {
        let parsed = if extracted.parameters.is_empty() {
            TlvMap::new()
        } else {
            match tlv::parse_tlv_sequence(&extracted.parameters) {
                Ok(map) => map,
                Err(err) => {
                    // Local failure: drop this frame, keep the loop alive.
                    warn!(
                        code = extracted.frame_code,
                        error = %err,
                        "failed to parse frame parameters"
                    );
                    return;
                },
            }
        };

        match FrameType::from_code(extracted.frame_type) {
            Some(FrameType::Response) => {
                self.handle_response(extracted.frame_code, parsed);
            },
            Some(FrameType::Notification) => {
                self.handle_notification(extracted.address, extracted.frame_code, parsed);
            },
            Some(FrameType::Command) => {
                warn!(
                    code = extracted.frame_code,
                    "received unexpected command frame from peer"
                );
            },
            None => {
                warn!(frame_type = extracted.frame_type, "received unknown frame type");
            },
        }
    }

    fn handle_response(&self, code: u8, parsed: TlvMap) {
        let entry = lock(&self.pending).remove(&code);
        let Some(entry) = entry else {
            warn!(
                code = code,
                "unexpected or late response, discarding"
            );
            return;
        };

        let result = match parsed.get(&tags::STATUS) {
            Some(TlvValue::Status(status)) if *status != 0 => {
                warn!(
                    code = code,
                    status = *status,
                    "reader reported error status"
                );
                Err(ReaderError::from_status(*status))
            },
            _ => Ok(parsed),
        };

        if entry.tx.send(result).is_err() {
            debug!(code = code, "response waiter already gone");
        }
    }

    fn handle_notification(&self, address: u16, code: u8, parsed: TlvMap) {
        let handlers: Vec<Arc<dyn NotificationHandler>> = {
            let subs = lock(&self.subscriptions);
            subs.get(&code).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            debug!(code = code, "no handlers for notification");
            return;
        }

        debug!(
            code = code,
            handlers = handlers.len(),
            "dispatching notification"
        );
        for handler in handlers {
            let params = parsed.clone();
            tokio::spawn(async move {
                handler.handle(address, code, params).await;
            });
        }
    }

    /// Remove the pending entry for `code` only if it is still the one the
    /// caller installed; a superseding command's entry is left alone.
    fn remove_pending_if(&self, code: u8, token: u64) {
        let mut pending = lock(&self.pending);
        if pending.get(&code).is_some_and(|entry| entry.token == token) {
            pending.remove(&code);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
