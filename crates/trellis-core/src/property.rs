//! Per-node relationship state and the persistence diff

use crate::error::{Error, Result};
use crate::node::NodeKey;
use crate::relationship::Cardinality;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Resolves a node to the id it has (or will have) in the store
///
/// Valid for one save transaction. Unsaved nodes resolve to a temporary id
/// assigned by the persistence layer.
pub trait IdLookup {
    fn lookup(&self, key: &NodeKey) -> Option<String>;
}

impl IdLookup for HashMap<NodeKey, String> {
    fn lookup(&self, key: &NodeKey) -> Option<String> {
        self.get(key).cloned()
    }
}

impl IdLookup for BTreeMap<NodeKey, String> {
    fn lookup(&self, key: &NodeKey) -> Option<String> {
        self.get(key).cloned()
    }
}

/// One edge endpoint pair, by persisted id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub local: String,
    pub related: String,
}

/// Edges to create and delete for one relationship of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDiff {
    pub edges_to_add: BTreeSet<EdgeRef>,
    pub edges_to_remove: BTreeSet<EdgeRef>,
}

impl RelationshipDiff {
    pub fn is_empty(&self) -> bool {
        self.edges_to_add.is_empty() && self.edges_to_remove.is_empty()
    }

    /// The same edges seen from the related end
    pub fn mirrored(&self) -> Self {
        let swap = |edges: &BTreeSet<EdgeRef>| -> BTreeSet<EdgeRef> {
            edges
                .iter()
                .map(|e| EdgeRef {
                    local: e.related.clone(),
                    related: e.local.clone(),
                })
                .collect()
        };
        Self {
            edges_to_add: swap(&self.edges_to_add),
            edges_to_remove: swap(&self.edges_to_remove),
        }
    }
}

/// Related nodes of one relationship field, as known by the owning node
///
/// `loaded` is the set last observed from the store (None when the field was
/// never queried). `added` and `removed` are local changes since then and are
/// always disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipProperty {
    field: String,
    cardinality: Cardinality,
    loaded: Option<BTreeSet<NodeKey>>,
    /// False when `loaded` only holds back-references pushed from the other
    /// side, not a full query result
    complete: bool,
    added: BTreeSet<NodeKey>,
    removed: BTreeSet<NodeKey>,
}

impl RelationshipProperty {
    pub fn new(field: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            field: field.into(),
            cardinality,
            loaded: None,
            complete: false,
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn loaded(&self) -> Option<&BTreeSet<NodeKey>> {
        self.loaded.as_ref()
    }

    /// True once a full query result has been registered
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some() && self.complete
    }

    pub fn added(&self) -> &BTreeSet<NodeKey> {
        &self.added
    }

    pub fn removed(&self) -> &BTreeSet<NodeKey> {
        &self.removed
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Related nodes as currently seen locally
    pub fn current(&self) -> BTreeSet<NodeKey> {
        let mut current: BTreeSet<NodeKey> = self
            .loaded
            .iter()
            .flatten()
            .filter(|k| !self.removed.contains(*k))
            .copied()
            .collect();
        current.extend(self.added.iter().copied());
        current
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.added.contains(key)
            || (!self.removed.contains(key)
                && self.loaded.as_ref().is_some_and(|l| l.contains(key)))
    }

    /// Relate `key`. Cancels a pending removal of the same node.
    pub fn add(&mut self, key: NodeKey) {
        if self.removed.remove(&key) {
            return;
        }
        if !self.in_loaded(&key) {
            self.added.insert(key);
        }
        self.check_disjoint();
    }

    /// Unrelate `key`. Cancels a pending addition of the same node; removing
    /// a node that is not in the loaded set is a no-op.
    pub fn remove(&mut self, key: NodeKey) {
        if self.added.remove(&key) {
            return;
        }
        if self.in_loaded(&key) {
            self.removed.insert(key);
        }
        self.check_disjoint();
    }

    /// Current value of a to-one relationship
    pub fn get(&self) -> Option<NodeKey> {
        self.current().into_iter().next()
    }

    /// Replace the value of a to-one relationship
    pub fn set(&mut self, value: Option<NodeKey>) {
        for key in self.current() {
            if Some(key) != value {
                self.remove(key);
            }
        }
        if let Some(key) = value {
            self.add(key);
        }
    }

    /// Replace the loaded state with a full query result
    pub fn register_query_result(&mut self, keys: impl IntoIterator<Item = NodeKey>) {
        let loaded: BTreeSet<NodeKey> = keys.into_iter().collect();
        self.added.retain(|k| !loaded.contains(k));
        self.removed.retain(|k| loaded.contains(k));
        self.loaded = Some(loaded);
        self.complete = true;
        self.check_disjoint();
    }

    /// Record `key` as loaded because the other side of the edge was queried
    pub fn register_remote(&mut self, key: NodeKey) {
        self.added.remove(&key);
        match self.cardinality {
            Cardinality::One => {
                // A to-one side can only point at the node that loaded it. A
                // pending local value replaces it rather than joining it.
                let replaced = self.removed.contains(&key) || !self.added.is_empty();
                self.removed.clear();
                if replaced {
                    self.removed.insert(key);
                }
                self.loaded = Some(BTreeSet::from([key]));
                self.complete = true;
            }
            Cardinality::Many => {
                self.loaded.get_or_insert_with(BTreeSet::new).insert(key);
            }
        }
        self.check_disjoint();
    }

    /// Forget `key` because the edge to it was deleted from the other side
    pub fn unregister_remote(&mut self, key: &NodeKey) {
        self.added.remove(key);
        self.removed.remove(key);
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.remove(key);
        }
        if !self.complete && self.loaded.as_ref().is_some_and(BTreeSet::is_empty) {
            self.loaded = None;
        }
    }

    /// Local additions, i.e. nodes a cascading save has to consider
    pub fn related_nodes_to_save(&self) -> Vec<NodeKey> {
        self.added.iter().copied().collect()
    }

    /// Compute the edges to create and delete for `owner`
    ///
    /// Fails without producing anything if the owner or any referenced node
    /// has no id in `lookup`.
    pub fn compute_diff(&self, owner: &NodeKey, lookup: &impl IdLookup) -> Result<RelationshipDiff> {
        if self.cardinality == Cardinality::One {
            let count = self.current().len();
            if count > 1 {
                return Err(Error::CardinalityViolation {
                    field: self.field.clone(),
                    count,
                });
            }
        }

        let resolve = |key: &NodeKey| {
            lookup
                .lookup(key)
                .ok_or_else(|| Error::UnresolvedRelationshipDependency {
                    field: self.field.clone(),
                    node: key.to_string(),
                })
        };

        let local = resolve(owner)?;
        let loaded = self.loaded.iter().flatten();
        let mut ids = HashMap::new();
        for key in loaded.chain(&self.added).chain(&self.removed) {
            ids.insert(*key, resolve(key)?);
        }

        let edge = |key: &NodeKey| EdgeRef {
            local: local.clone(),
            related: ids[key].clone(),
        };

        let edges_to_add = self
            .added
            .iter()
            .filter(|k| !self.in_loaded(k))
            .map(edge)
            .collect();

        let edges_to_remove = self
            .removed
            .iter()
            .filter(|k| self.in_loaded(k))
            .map(edge)
            .collect();

        let diff = RelationshipDiff {
            edges_to_add,
            edges_to_remove,
        };
        tracing::debug!(
            "Diff for {}.{}: +{} -{}",
            local,
            self.field,
            diff.edges_to_add.len(),
            diff.edges_to_remove.len()
        );
        Ok(diff)
    }

    /// Fold local changes into the loaded state after a successful save
    pub fn commit(&mut self) {
        let current = self.current();
        let complete = self.is_loaded();
        self.added.clear();
        self.removed.clear();
        if complete {
            self.loaded = Some(current);
        } else {
            // Still only partially known; keep what we have seen
            self.loaded = (!current.is_empty()).then_some(current);
        }
    }

    fn in_loaded(&self, key: &NodeKey) -> bool {
        self.loaded.as_ref().is_some_and(|l| l.contains(key))
    }

    fn check_disjoint(&self) {
        debug_assert!(
            self.added.is_disjoint(&self.removed),
            "added and removed overlap on {}",
            self.field
        );
    }
}
