//! Remote clients attached to the player.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use audiobridge_audio::ByteSink;

use crate::error::PlayerError;
use crate::PlayerResult;

/// Identifies an attached client for the lifetime of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A control parameter broadcast to every attached client.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlParam {
    /// Receiver volume in dB, `-144` for silence and `0` for unity.
    Volume(f64),
    Muted(bool),
    TrackInfo {
        album: String,
        artist: String,
        title: String,
    },
    /// Raw PNG or JPEG bytes.
    AlbumArt(Bytes),
}

impl ControlParam {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Volume(_) => "volume",
            Self::Muted(_) => "muted",
            Self::TrackInfo { .. } => "track_info",
            Self::AlbumArt(_) => "album_art",
        }
    }
}

/// A remote audio and control sink.
///
/// Raw PCM arrives through [`ByteSink`]; control parameters through
/// [`set_param`](Self::set_param). Neither may block on the network.
pub trait PlayerClient: ByteSink {
    fn set_param(&self, param: &ControlParam) -> PlayerResult<()>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

#[derive(Clone)]
pub(crate) struct ClientEntry {
    pub(crate) id: ClientId,
    pub(crate) client: Arc<dyn PlayerClient>,
    pub(crate) sink: Arc<dyn ByteSink>,
}

/// Bounded, ordered set of attached clients.
pub(crate) struct ClientRegistry {
    capacity: usize,
    entries: RwLock<Vec<ClientEntry>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(Vec::with_capacity(capacity)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a client. Existing entries are untouched when full or when
    /// the same instance is already attached.
    pub(crate) fn add<C: PlayerClient + 'static>(&self, client: Arc<C>) -> PlayerResult<ClientEntry> {
        let mut entries = self.entries.write();
        let ptr = Arc::as_ptr(&client) as *const ();
        if let Some(existing) = entries
            .iter()
            .find(|e| std::ptr::eq(Arc::as_ptr(&e.client) as *const (), ptr))
        {
            return Err(PlayerError::ClientAlreadyAttached(existing.id));
        }
        if entries.len() >= self.capacity {
            return Err(PlayerError::ClientCapacityExceeded {
                capacity: self.capacity,
            });
        }

        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let sink: Arc<dyn ByteSink> = client.clone();
        let entry = ClientEntry {
            id,
            client,
            sink,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    pub(crate) fn remove(&self, id: ClientId) -> PlayerResult<ClientEntry> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(PlayerError::UnknownClient(id))?;
        Ok(entries.remove(index))
    }

    /// Clients in registration order.
    pub(crate) fn snapshot(&self) -> Vec<ClientEntry> {
        self.entries.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use audiobridge_audio::{AudioError, AudioResult};
    use parking_lot::Mutex;

    /// Records everything it is sent.
    #[derive(Default)]
    pub(crate) struct RecordingClient {
        pub(crate) label: String,
        pub(crate) params: Mutex<Vec<ControlParam>>,
        pub(crate) bytes: Mutex<Vec<Vec<u8>>>,
        pub(crate) fail: bool,
    }

    impl RecordingClient {
        pub(crate) fn named(label: &str) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                ..Default::default()
            })
        }

        pub(crate) fn failing(label: &str) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                fail: true,
                ..Default::default()
            })
        }
    }

    impl ByteSink for RecordingClient {
        fn write_bytes(&self, bytes: &[u8]) -> AudioResult<()> {
            if self.fail {
                return Err(AudioError::SinkWrite("gone".to_string()));
            }
            self.bytes.lock().push(bytes.to_vec());
            Ok(())
        }
    }

    impl PlayerClient for RecordingClient {
        fn set_param(&self, param: &ControlParam) -> PlayerResult<()> {
            if self.fail {
                return Err(PlayerError::Client("gone".to_string()));
            }
            self.params.lock().push(param.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            &self.label
        }
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let registry = ClientRegistry::new(4);
        let a = registry.add(RecordingClient::named("a")).unwrap();
        let b = registry.add(RecordingClient::named("b")).unwrap();
        assert!(a.id < b.id);

        let names: Vec<_> = registry
            .snapshot()
            .iter()
            .map(|e| e.client.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_capacity_bound() {
        let registry = ClientRegistry::new(2);
        registry.add(RecordingClient::named("a")).unwrap();
        registry.add(RecordingClient::named("b")).unwrap();

        let err = registry.add(RecordingClient::named("c")).err().unwrap();
        assert!(matches!(
            err,
            PlayerError::ClientCapacityExceeded { capacity: 2 }
        ));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.snapshot()[1].client.name(), "b");
    }

    #[test]
    fn test_remove_frees_a_slot() {
        let registry = ClientRegistry::new(1);
        let a = registry.add(RecordingClient::named("a")).unwrap();
        assert!(registry.add(RecordingClient::named("b")).is_err());

        registry.remove(a.id).unwrap();
        assert!(registry.is_empty());

        let b = registry.add(RecordingClient::named("b")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_same_client_twice_is_rejected() {
        let registry = ClientRegistry::new(4);
        let client = RecordingClient::named("a");
        let first = registry.add(Arc::clone(&client)).unwrap();

        assert!(matches!(
            registry.add(Arc::clone(&client)),
            Err(PlayerError::ClientAlreadyAttached(id)) if id == first.id
        ));
        assert_eq!(registry.len(), 1);

        // A different instance with the same label is a different client.
        registry.add(RecordingClient::named("a")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_unknown() {
        let registry = ClientRegistry::new(1);
        let a = registry.add(RecordingClient::named("a")).unwrap();
        registry.remove(a.id).unwrap();
        assert!(matches!(
            registry.remove(a.id),
            Err(PlayerError::UnknownClient(id)) if id == a.id
        ));
    }
}
