//! Sample writer fan-out.
//!
//! An input pushes each decoded buffer once into an [`IntWriter`] and a
//! [`ByteWriter`]; both forward it to every registered sink in
//! registration order. A failing sink is logged and skipped so that one
//! broken consumer never starves the others.

use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::error::AudioError;
use crate::{AudioResult, SINK_CHANNEL_CAPACITY};

/// A consumer of 16-bit interleaved samples.
pub trait SampleSink: Send + Sync {
    /// Accept one buffer. Must return promptly.
    fn write_samples(&self, samples: &[i16]) -> AudioResult<()>;
}

/// A consumer of raw little-endian PCM bytes.
pub trait ByteSink: Send + Sync {
    /// Accept one buffer. Must return promptly.
    fn write_bytes(&self, bytes: &[u8]) -> AudioResult<()>;
}

fn same_sink<S: ?Sized>(a: &Arc<S>, b: &Arc<S>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

struct SinkList<S: ?Sized> {
    sinks: RwLock<Vec<Arc<S>>>,
}

impl<S: ?Sized> SinkList<S> {
    fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    fn append(&self, sink: Arc<S>) -> bool {
        let mut sinks = self.sinks.write();
        if sinks.iter().any(|s| same_sink(s, &sink)) {
            return false;
        }
        sinks.push(sink);
        true
    }

    fn remove(&self, sink: &Arc<S>) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|s| !same_sink(s, sink));
        sinks.len() != before
    }

    fn contains(&self, sink: &Arc<S>) -> bool {
        self.sinks.read().iter().any(|s| same_sink(s, sink))
    }

    fn len(&self) -> usize {
        self.sinks.read().len()
    }

    fn snapshot(&self) -> Vec<Arc<S>> {
        self.sinks.read().clone()
    }
}

/// Fan-out for sample buffers.
pub struct IntWriter {
    sinks: SinkList<dyn SampleSink>,
}

impl IntWriter {
    pub fn new() -> Self {
        Self {
            sinks: SinkList::new(),
        }
    }

    /// Register an additional sink. Returns false if it was already registered.
    pub fn append_writer(&self, sink: Arc<dyn SampleSink>) -> bool {
        self.sinks.append(sink)
    }

    /// Unregister a sink. Returns false if it was not registered.
    pub fn remove_writer(&self, sink: &Arc<dyn SampleSink>) -> bool {
        self.sinks.remove(sink)
    }

    pub fn contains(&self, sink: &Arc<dyn SampleSink>) -> bool {
        self.sinks.contains(sink)
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write one buffer to every sink. Returns how many sinks accepted it.
    pub fn write(&self, samples: &[i16]) -> usize {
        // Iterate over a snapshot so sinks may register or unregister
        // others without deadlocking.
        let mut delivered = 0;
        for sink in self.sinks.snapshot() {
            match sink.write_samples(samples) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Sample sink write failed: {}", e),
            }
        }
        delivered
    }
}

impl Default for IntWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fan-out for raw PCM byte buffers.
pub struct ByteWriter {
    sinks: SinkList<dyn ByteSink>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self {
            sinks: SinkList::new(),
        }
    }

    /// Register an additional sink. Returns false if it was already registered.
    pub fn append_writer(&self, sink: Arc<dyn ByteSink>) -> bool {
        self.sinks.append(sink)
    }

    /// Unregister a sink. Returns false if it was not registered.
    pub fn remove_writer(&self, sink: &Arc<dyn ByteSink>) -> bool {
        self.sinks.remove(sink)
    }

    pub fn contains(&self, sink: &Arc<dyn ByteSink>) -> bool {
        self.sinks.contains(sink)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write one buffer to every sink. Returns how many sinks accepted it.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut delivered = 0;
        for sink in self.sinks.snapshot() {
            match sink.write_bytes(bytes) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Byte sink write failed: {}", e),
            }
        }
        delivered
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A byte sink that hands buffers to another thread over a bounded channel.
///
/// Buffers are dropped, not queued, when the consumer falls behind.
pub struct ChannelByteSink {
    sender: Sender<Bytes>,
}

impl ChannelByteSink {
    /// Create a sink and the receiver that drains it.
    pub fn new() -> (Self, Receiver<Bytes>) {
        Self::with_capacity(SINK_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Bytes>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl ByteSink for ChannelByteSink {
    fn write_bytes(&self, bytes: &[u8]) -> AudioResult<()> {
        match self.sender.try_send(Bytes::copy_from_slice(bytes)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                trace!("Byte sink channel full, dropping buffer");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(AudioError::SinkWrite("consumer disconnected".to_string()))
            }
        }
    }
}

/// A sample sink that hands buffers to another thread over a bounded channel.
pub struct ChannelSampleSink {
    sender: Sender<Vec<i16>>,
}

impl ChannelSampleSink {
    pub fn new() -> (Self, Receiver<Vec<i16>>) {
        Self::with_capacity(SINK_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Vec<i16>>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl SampleSink for ChannelSampleSink {
    fn write_samples(&self, samples: &[i16]) -> AudioResult<()> {
        match self.sender.try_send(samples.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                trace!("Sample sink channel full, dropping buffer");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(AudioError::SinkWrite("consumer disconnected".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl ByteSink for FailingSink {
        fn write_bytes(&self, _bytes: &[u8]) -> AudioResult<()> {
            Err(AudioError::SinkWrite("always fails".to_string()))
        }
    }

    #[test]
    fn test_byte_writer_fans_out() {
        let writer = ByteWriter::new();
        let (a, a_rx) = ChannelByteSink::new();
        let (b, b_rx) = ChannelByteSink::new();
        writer.append_writer(Arc::new(a));
        writer.append_writer(Arc::new(b));

        assert_eq!(writer.write(&[1, 2, 3, 4]), 2);
        assert_eq!(a_rx.try_recv().unwrap().as_ref(), &[1, 2, 3, 4]);
        assert_eq!(b_rx.try_recv().unwrap().as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let writer = ByteWriter::new();
        let (sink, rx) = ChannelByteSink::new();
        let sink: Arc<dyn ByteSink> = Arc::new(sink);

        assert!(writer.append_writer(Arc::clone(&sink)));
        assert!(!writer.append_writer(Arc::clone(&sink)));
        assert_eq!(writer.len(), 1);

        writer.write(&[9, 9]);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_writer() {
        let writer = IntWriter::new();
        let (sink, rx) = ChannelSampleSink::new();
        let sink: Arc<dyn SampleSink> = Arc::new(sink);

        writer.append_writer(Arc::clone(&sink));
        assert!(writer.remove_writer(&sink));
        assert!(!writer.remove_writer(&sink));
        assert!(writer.is_empty());

        assert_eq!(writer.write(&[1, 2]), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let writer = ByteWriter::new();
        let (good, rx) = ChannelByteSink::new();
        writer.append_writer(Arc::new(FailingSink));
        writer.append_writer(Arc::new(good));

        assert_eq!(writer.write(&[7, 7]), 1);
        assert_eq!(rx.try_recv().unwrap().as_ref(), &[7, 7]);
    }

    #[test]
    fn test_full_channel_drops_buffer() {
        let (sink, rx) = ChannelSampleSink::with_capacity(1);
        assert!(sink.write_samples(&[1]).is_ok());
        assert!(sink.write_samples(&[2]).is_ok());
        assert_eq!(rx.try_recv().unwrap(), vec![1]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_consumer_is_an_error() {
        let (sink, rx) = ChannelByteSink::new();
        drop(rx);
        assert!(matches!(
            sink.write_bytes(&[0]),
            Err(AudioError::SinkWrite(_))
        ));
    }
}
