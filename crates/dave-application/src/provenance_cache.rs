use dave_core::conversation::MessageId;
use dave_core::generation::GenerationResult;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of replies whose provenance is remembered.
pub const DEFAULT_CAPACITY: usize = 128;

/// A map bounded by insertion order.
///
/// When full, inserting a new key evicts the earliest-inserted key.
/// Overwriting a present key keeps its position; reads never reorder.
#[derive(Debug, Clone)]
pub struct FifoMap<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> FifoMap<K, V> {
    /// Creates an empty map. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Returns
    ///
    /// The evicted entry, if inserting a new key pushed one out.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }

        let evicted = if self.entries.len() == self.capacity {
            self.order
                .pop_front()
                .and_then(|oldest| self.entries.remove_entry(&oldest))
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// The value of the most recently inserted key.
    pub fn most_recent(&self) -> Option<&V> {
        self.order.back().and_then(|key| self.entries.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

}

/// Remembers which generation produced each recently sent reply.
///
/// Keyed on the transport message id of the reply. Eviction happens under
/// the same write lock as the insert, so the capacity bound holds under
/// concurrent writers.
#[derive(Clone)]
pub struct ProvenanceCache {
    inner: Arc<RwLock<FifoMap<MessageId, GenerationResult>>>,
}

impl ProvenanceCache {
    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(FifoMap::new(capacity))),
        }
    }

    /// Records the generation behind reply `message_id`.
    pub async fn put(&self, message_id: MessageId, result: GenerationResult) {
        let mut inner = self.inner.write().await;
        if let Some((evicted, _)) = inner.put(message_id, result) {
            tracing::debug!(evicted, "Provenance entry evicted");
        }
    }

    /// Looks up the generation behind reply `message_id`.
    pub async fn get(&self, message_id: MessageId) -> Option<GenerationResult> {
        self.inner.read().await.get(&message_id).cloned()
    }

    /// The generation behind the most recently recorded reply.
    pub async fn most_recent(&self) -> Option<GenerationResult> {
        self.inner.read().await.most_recent().cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for ProvenanceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
