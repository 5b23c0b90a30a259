//! Collaborators the graph delegates to: where evicted node bodies live and
//! which graph-wide indexes observe property changes.

use std::collections::BTreeSet;

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use super::image::{self, NodeImage};
use super::value::Value;
use crate::types::{NodeId, Result};

/// Persistent home of node bodies that are not resident in memory.
pub trait ExternalStorage: Send + Sync {
    /// Stores the latest image of a node, replacing any previous one.
    fn persist_node(&self, image: &NodeImage) -> Result<()>;

    /// Loads the last persisted image of `id`, if any.
    fn load_node(&self, id: NodeId) -> Result<Option<NodeImage>>;

    /// Forgets everything stored for `id`.
    fn remove_node(&self, id: NodeId) -> Result<()>;
}

/// [`ExternalStorage`] keeping encoded images in a map.
///
/// Images go through [`image::encode`]/[`image::decode`], so a reload
/// exercises the same checksum path a disk-backed store would.
#[derive(Default)]
pub struct MemoryStorage {
    images: Mutex<FxHashMap<NodeId, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images.
    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    /// Whether no image is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an image of `id` is stored.
    pub fn contains(&self, id: NodeId) -> bool {
        self.images.lock().contains_key(&id)
    }

    /// Raw encoded bytes stored for `id`.
    pub fn raw(&self, id: NodeId) -> Option<Vec<u8>> {
        self.images.lock().get(&id).cloned()
    }

    /// Replaces the raw bytes stored for `id`.
    pub fn put_raw(&self, id: NodeId, bytes: Vec<u8>) {
        self.images.lock().insert(id, bytes);
    }
}

impl ExternalStorage for MemoryStorage {
    fn persist_node(&self, image: &NodeImage) -> Result<()> {
        let bytes = image::encode(image);
        self.images.lock().insert(image.id, bytes);
        Ok(())
    }

    fn load_node(&self, id: NodeId) -> Result<Option<NodeImage>> {
        let bytes = self.images.lock().get(&id).cloned();
        bytes.map(|bytes| image::decode(&bytes)).transpose()
    }

    fn remove_node(&self, id: NodeId) -> Result<()> {
        self.images.lock().remove(&id);
        Ok(())
    }
}

/// Graph-wide index notified of node property changes and node removal.
pub trait GraphIndex: Send + Sync {
    /// Records that node property `key` of `node` is now `value`
    /// (`Value::Null` when cleared). Ignored for unindexed keys.
    fn put_if_indexed(&self, key: &str, value: &Value, node: NodeId);

    /// Drops every entry referring to `node`.
    fn remove_element(&self, node: NodeId);
}

/// [`GraphIndex`] that indexes nothing.
#[derive(Debug, Default)]
pub struct NoopIndex;

impl GraphIndex for NoopIndex {
    fn put_if_indexed(&self, _key: &str, _value: &Value, _node: NodeId) {}
    fn remove_element(&self, _node: NodeId) {}
}

#[derive(Default)]
struct PropertyIndexState {
    postings: FxHashMap<(String, Vec<u8>), BTreeSet<NodeId>>,
    current: FxHashMap<(NodeId, String), Vec<u8>>,
}

impl PropertyIndexState {
    fn unlink(&mut self, node: NodeId, key: &str) {
        if let Some(old) = self.current.remove(&(node, key.to_owned())) {
            let posting = (key.to_owned(), old);
            if let Some(nodes) = self.postings.get_mut(&posting) {
                nodes.remove(&node);
                if nodes.is_empty() {
                    self.postings.remove(&posting);
                }
            }
        }
    }
}

/// Exact-match index over a configured set of node property keys.
pub struct PropertyIndex {
    keys: FxHashSet<String>,
    state: RwLock<PropertyIndexState>,
}

impl PropertyIndex {
    /// Indexes the node properties named in `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            state: RwLock::new(PropertyIndexState::default()),
        }
    }

    /// Whether `key` is indexed.
    pub fn is_indexed(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Nodes whose property `key` currently equals `value`, in id order.
    pub fn lookup(&self, key: &str, value: &Value) -> Vec<NodeId> {
        let posting = (key.to_owned(), image::value_key(value));
        self.state
            .read()
            .postings
            .get(&posting)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl GraphIndex for PropertyIndex {
    fn put_if_indexed(&self, key: &str, value: &Value, node: NodeId) {
        if !self.is_indexed(key) {
            return;
        }
        let mut state = self.state.write();
        state.unlink(node, key);
        if value.is_null() {
            return;
        }
        let encoded = image::value_key(value);
        state
            .postings
            .entry((key.to_owned(), encoded.clone()))
            .or_default()
            .insert(node);
        state.current.insert((node, key.to_owned()), encoded);
    }

    fn remove_element(&self, node: NodeId) {
        let mut state = self.state.write();
        let keys: Vec<String> = state
            .current
            .keys()
            .filter(|(id, _)| *id == node)
            .map(|(_, key)| key.clone())
            .collect();
        for key in keys {
            state.unlink(node, &key);
        }
    }
}
