//! The byte-stream capability consumed by the dispatcher.
//!
//! A transport owns the OS handle (serial port, TCP/UDP socket) and a
//! background reader that delivers received bytes, in arrival order, to the
//! one registered sink. The dispatcher is that sink; it neither knows nor
//! cares which physical channel is underneath.
//!
//! [`MockTransport`] is the queue-backed test seam: `send` records frames
//! for inspection and `inject` plays reader bytes back into the sink.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ReaderError, Result};

/// The one sink a transport delivers received bytes to.
///
/// Invocations are async so the receiver can apply backpressure; the
/// transport awaits each delivery before reading more.
pub type DataSink =
    Arc<dyn Fn(Bytes) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Narrow async byte-stream contract.
///
/// Implementations must deliver bytes to the registered sink in arrival
/// order and stop invoking it once disconnected. A failed read transitions
/// the transport to the disconnected state.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the underlying channel and start the background reader.
    async fn connect(&self) -> Result<()>;

    /// Tear the channel down. Idempotent; stops the background reader and
    /// releases OS handles.
    async fn disconnect(&self) -> Result<()>;

    /// Write all of `data` to the channel.
    ///
    /// # Errors
    ///
    /// - `ReaderError::Write` if the channel is down or the write fails
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Set the sink that receives raw bytes. Replaces any previous sink.
    fn register_receive_sink(&self, sink: DataSink);

    /// Remove the registered sink.
    fn unregister_receive_sink(&self);

    /// Whether the channel is currently up.
    fn is_connected(&self) -> bool;
}

/// In-memory transport for tests and simulation.
///
/// Holds no real channel: [`Transport::send`] appends to an inspectable
/// queue and [`MockTransport::inject`] delivers bytes to the registered sink
/// as if a reader had sent them.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    sink: Mutex<Option<DataSink>>,
    sent: Mutex<VecDeque<Vec<u8>>>,
}

impl MockTransport {
    /// Create a disconnected mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `data` to the registered sink, as the background reader of a
    /// real transport would. Bytes injected while no sink is registered or
    /// while disconnected are dropped.
    pub async fn inject(&self, data: &[u8]) {
        if !self.is_connected() {
            return;
        }
        let sink = {
            let guard = self.sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.clone()
        };
        if let Some(sink) = sink {
            sink(Bytes::copy_from_slice(data)).await;
        }
    }

    /// Pop the oldest frame passed to [`Transport::send`].
    #[must_use]
    pub fn take_sent(&self) -> Option<Vec<u8>> {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front()
    }

    /// All frames passed to [`Transport::send`], clearing the queue.
    #[must_use]
    pub fn take_all_sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).drain(..).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(ReaderError::Write("cannot send: not connected".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(data.to_vec());
        Ok(())
    }

    fn register_receive_sink(&self, sink: DataSink) {
        *self.sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(sink);
    }

    fn unregister_receive_sink(&self) {
        *self.sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test]
    async fn send_requires_connection() {
        let transport = MockTransport::new();
        assert!(matches!(transport.send(&[1, 2, 3]).await, Err(ReaderError::Write(_))));

        transport.connect().await.unwrap();
        transport.send(&[1, 2, 3]).await.unwrap();
        assert_eq!(transport.take_sent(), Some(vec![1, 2, 3]));
        assert_eq!(transport.take_sent(), None);
    }

    #[tokio::test]
    async fn inject_reaches_registered_sink_in_order() {
        let transport = MockTransport::new();
        transport.connect().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_sink = Arc::clone(&seen);
        transport.register_receive_sink(Arc::new(move |data: Bytes| {
            let seen = Arc::clone(&seen_in_sink);
            Box::pin(async move {
                seen.lock().unwrap().push(data.to_vec());
            })
        }));

        transport.inject(&[0x01]).await;
        transport.inject(&[0x02, 0x03]).await;
        assert_eq!(*seen.lock().unwrap(), vec![vec![0x01], vec![0x02, 0x03]]);
    }

    #[tokio::test]
    async fn disconnected_transport_drops_injected_bytes() {
        let transport = MockTransport::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_sink = Arc::clone(&calls);
        transport.register_receive_sink(Arc::new(move |_| {
            calls_in_sink.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }));

        transport.inject(&[0xFF]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        transport.connect().await.unwrap();
        transport.inject(&[0xFF]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        transport.disconnect().await.unwrap();
        transport.inject(&[0xFF]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
