//! In-memory graph store

use crate::error::{StorageError, StorageResult};
use crate::eval::Evaluator;
use crate::traits::GraphStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use trellis_core::{
    Cardinality, Condition, Direction, EdgeOperation, EdgeRef, EntityKind, Error as CoreError,
    IdLookup, Node, NodeKey, RelationshipDefinition, RelationshipDiff, Schema, Value, Variable,
};
use ulid::Ulid;

#[derive(Debug, Clone)]
pub(crate) struct StoredNode {
    pub kind: String,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct StoredEdge {
    pub from: String,
    pub label: String,
    pub to: String,
}

/// Nodes by persisted id plus the labelled edges between them
#[derive(Debug, Default)]
pub(crate) struct GraphState {
    pub nodes: BTreeMap<String, StoredNode>,
    pub edges: BTreeSet<StoredEdge>,
}

impl GraphState {
    /// Ids adjacent to `id` through `label`, seen from `id`
    pub fn neighbors(&self, id: &str, label: &str, direction: Direction) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.label == label)
            .filter_map(|e| match direction {
                Direction::Outgoing if e.from == id => Some(e.to.as_str()),
                Direction::Incoming if e.to == id => Some(e.from.as_str()),
                _ => None,
            })
            .collect()
    }

    fn apply(&mut self, operation: &EdgeOperation) {
        match operation {
            EdgeOperation::Create { from, to, label } => {
                self.edges.insert(StoredEdge {
                    from: from.clone(),
                    label: label.clone(),
                    to: to.clone(),
                });
            }
            EdgeOperation::Delete { from, to, label } => {
                self.edges.remove(&StoredEdge {
                    from: from.clone(),
                    label: label.clone(),
                    to: to.clone(),
                });
            }
        }
    }
}

/// Ids valid for one save: the batch being saved, then every node the
/// store has handed out before
struct SaveLookup<'a> {
    batch: &'a HashMap<NodeKey, String>,
    known: &'a HashMap<NodeKey, String>,
}

impl IdLookup for SaveLookup<'_> {
    fn lookup(&self, key: &NodeKey) -> Option<String> {
        self.batch.get(key).or_else(|| self.known.get(key)).cloned()
    }
}

/// In-memory graph store
///
/// Useful for testing and as the reference for other backends. Remembers
/// the id of every node it materializes, so relationship changes can point
/// at loaded nodes that are not part of the batch being saved.
pub struct MemoryStorage {
    schema: Arc<Schema>,
    graph: RwLock<GraphState>,
    keys: RwLock<HashMap<NodeKey, String>>,
}

impl MemoryStorage {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            graph: RwLock::new(GraphState::default()),
            keys: RwLock::new(HashMap::new()),
        }
    }

    fn materialize(&self, id: &str, stored: &StoredNode) -> StorageResult<Node> {
        let kind = self.schema.require_kind(&stored.kind)?;
        let mut node = Node::new(kind).with_id(id);
        for (name, value) in &stored.attributes {
            node.set_attribute(name.clone(), value.clone());
        }
        Ok(node)
    }

    fn remember<'a>(&self, nodes: impl IntoIterator<Item = &'a Node>) -> StorageResult<()> {
        let mut keys = self.keys.write().map_err(lock_error)?;
        for node in nodes {
            if let Some(id) = node.id() {
                keys.insert(node.key(), id.to_string());
            }
        }
        Ok(())
    }

    /// Deletes that keep a to-one mirror pointing at one node when `diff`
    /// relates it from this side
    ///
    /// Adding an issue to a project moves it: the edge from its previous
    /// project goes away.
    fn displaced_edges(
        &self,
        graph: &GraphState,
        definition: &RelationshipDefinition,
        diff: &RelationshipDiff,
    ) -> StorageResult<Vec<EdgeOperation>> {
        let Some(field) = definition.remote_field() else {
            return Ok(Vec::new());
        };
        let remote = self.schema.relationship(definition.related_kind(), field)?;
        if remote.cardinality() != Cardinality::One {
            return Ok(Vec::new());
        }

        let mut displaced = RelationshipDiff::default();
        for edge in diff.mirrored().edges_to_add {
            for previous in graph.neighbors(&edge.local, remote.label(), remote.direction()) {
                let same_kind = graph
                    .nodes
                    .get(previous)
                    .is_some_and(|stored| stored.kind == remote.related_kind());
                if previous != edge.related && same_kind {
                    displaced.edges_to_remove.insert(EdgeRef {
                        local: edge.local.clone(),
                        related: previous.to_string(),
                    });
                }
            }
        }
        Ok(remote.edge_operations(&displaced))
    }

    /// Fail if `operations` would leave a to-one field holding several nodes
    fn check_to_one(
        &self,
        graph: &GraphState,
        batch_kinds: &HashMap<&str, &str>,
        operations: &BTreeSet<EdgeOperation>,
    ) -> StorageResult<()> {
        if !operations.iter().any(|op| matches!(op, EdgeOperation::Create { .. })) {
            return Ok(());
        }
        let kind_of = |id: &str| {
            batch_kinds
                .get(id)
                .copied()
                .or_else(|| graph.nodes.get(id).map(|stored| stored.kind.as_str()))
        };

        let mut projected = GraphState {
            nodes: BTreeMap::new(),
            edges: graph.edges.clone(),
        };
        for operation in write_order(operations) {
            projected.apply(operation);
        }

        for operation in operations {
            let EdgeOperation::Create { from, to, label } = operation else {
                continue;
            };
            for (id, direction) in [(from, Direction::Outgoing), (to, Direction::Incoming)] {
                let Some(kind) = kind_of(id.as_str()) else { continue };
                for definition in self.schema.require_kind(kind)?.relationships() {
                    if definition.cardinality() != Cardinality::One
                        || definition.label() != label
                        || definition.direction() != direction
                    {
                        continue;
                    }
                    let count = projected
                        .neighbors(id, label, direction)
                        .into_iter()
                        .filter(|other| kind_of(*other) == Some(definition.related_kind()))
                        .count();
                    if count > 1 {
                        return Err(CoreError::CardinalityViolation {
                            field: definition.field().to_string(),
                            count,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Bring the relationship fields of saved nodes in line with the edges
    /// written, including fields that mirror another node's change
    fn mirror_into_batch(
        &self,
        graph: &GraphState,
        keys: &HashMap<NodeKey, String>,
        nodes: &mut [Node],
        operations: &BTreeSet<EdgeOperation>,
    ) -> StorageResult<()> {
        let mut by_id: HashMap<String, NodeKey> =
            keys.iter().map(|(key, id)| (id.clone(), *key)).collect();
        for node in nodes.iter() {
            if let Some(id) = node.id() {
                by_id.insert(id.to_string(), node.key());
            }
        }

        for operation in write_order(operations) {
            let (from, to, label, create) = match operation {
                EdgeOperation::Create { from, to, label } => (from, to, label, true),
                EdgeOperation::Delete { from, to, label } => (from, to, label, false),
            };

            for node in nodes.iter_mut() {
                let id = node.id().map(str::to_string);
                let kind = self.schema.require_kind(node.kind())?;
                for (this, other, direction) in
                    [(from, to, Direction::Outgoing), (to, from, Direction::Incoming)]
                {
                    if id.as_deref() != Some(this.as_str()) {
                        continue;
                    }
                    let Some(other_kind) = graph.nodes.get(other).map(|s| s.kind.as_str()) else {
                        continue;
                    };

                    for definition in kind.relationships() {
                        if definition.label() != label
                            || definition.direction() != direction
                            || definition.related_kind() != other_kind
                        {
                            continue;
                        }
                        let property = node.property_mut(definition.field())?;
                        let present: Vec<NodeKey> = property
                            .current()
                            .into_iter()
                            .filter(|key| keys.get(key) == Some(other))
                            .collect();
                        if !create {
                            for key in &present {
                                property.unregister_remote(key);
                            }
                        } else if present.is_empty() {
                            if let Some(key) = by_id.get(other) {
                                property.register_remote(*key);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Deletes before creates, so an edge both removed and added ends up present
fn write_order(operations: &BTreeSet<EdgeOperation>) -> impl Iterator<Item = &EdgeOperation> {
    let (creates, deletes): (Vec<_>, Vec<_>) = operations
        .iter()
        .partition(|op| matches!(op, EdgeOperation::Create { .. }));
    deletes.into_iter().chain(creates)
}

fn lock_error<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Lock(e.to_string())
}

#[async_trait]
impl GraphStore for MemoryStorage {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn query(
        &self,
        kind: &str,
        variable: &Variable,
        condition: &Condition,
    ) -> StorageResult<Vec<Node>> {
        self.schema.require_kind(kind)?;

        let nodes = {
            let graph = self.graph.read().map_err(lock_error)?;
            graph
                .nodes
                .iter()
                .filter(|(_, stored)| stored.kind == kind)
                .filter(|(id, _)| Evaluator::new(&graph, variable, id.as_str()).matches(condition))
                .map(|(id, stored)| self.materialize(id, stored))
                .collect::<StorageResult<Vec<_>>>()?
        };

        tracing::debug!("Query on {} matched {} nodes", kind, nodes.len());
        self.remember(&nodes)?;
        Ok(nodes)
    }

    async fn get(&self, kind: &str, id: &str) -> StorageResult<Option<Node>> {
        let node = {
            let graph = self.graph.read().map_err(lock_error)?;
            match graph.nodes.get(id) {
                Some(stored) if stored.kind != kind => {
                    return Err(StorageError::KindMismatch {
                        id: id.to_string(),
                        expected: kind.to_string(),
                        found: stored.kind.clone(),
                    })
                }
                Some(stored) => Some(self.materialize(id, stored)?),
                None => None,
            }
        };

        self.remember(node.iter())?;
        Ok(node)
    }

    async fn load_relationship(&self, node: &mut Node, field: &str) -> StorageResult<Vec<Node>> {
        let kind = self.schema.require_kind(node.kind())?;
        let definition = kind
            .relationship(field)
            .ok_or_else(|| CoreError::UnknownRelationship {
                kind: kind.name().to_string(),
                field: field.to_string(),
            })?
            .clone();

        let mut related = match node.id() {
            // Never saved, so nothing can point at it yet
            None => Vec::new(),
            Some(id) => {
                let graph = self.graph.read().map_err(lock_error)?;
                if !graph.nodes.contains_key(id) {
                    return Err(StorageError::NodeNotFound(id.to_string()));
                }
                graph
                    .neighbors(id, definition.label(), definition.direction())
                    .into_iter()
                    .filter_map(|rid| graph.nodes.get(rid).map(|stored| (rid, stored)))
                    .filter(|(_, stored)| stored.kind == definition.related_kind())
                    .map(|(rid, stored)| self.materialize(rid, stored))
                    .collect::<StorageResult<Vec<_>>>()?
            }
        };

        definition.register_query_result(node, related.iter_mut())?;
        tracing::debug!(
            "Loaded {} nodes for {}.{}",
            related.len(),
            kind.name(),
            field
        );

        self.remember(std::iter::once(&*node).chain(&related))?;
        Ok(related)
    }

    async fn save(&self, nodes: &mut [Node]) -> StorageResult<Vec<EdgeOperation>> {
        let mut graph = self.graph.write().map_err(lock_error)?;
        let mut keys = self.keys.write().map_err(lock_error)?;

        // Persisted ids for this transaction; new nodes get a fresh one
        let mut batch = HashMap::with_capacity(nodes.len());
        for node in nodes.iter() {
            self.schema.require_kind(node.kind())?;
            let id = match node.id() {
                Some(id) => {
                    if let Some(stored) = graph.nodes.get(id) {
                        if stored.kind != node.kind() {
                            return Err(StorageError::KindMismatch {
                                id: id.to_string(),
                                expected: node.kind().to_string(),
                                found: stored.kind.clone(),
                            });
                        }
                    }
                    id.to_string()
                }
                None => Ulid::new().to_string(),
            };
            batch.insert(node.key(), id);
        }

        let lookup = SaveLookup {
            batch: &batch,
            known: &keys,
        };

        // Everything is computed before the first write, so a failure
        // leaves the graph and the nodes untouched.
        let mut operations = BTreeSet::new();
        for node in nodes.iter() {
            let kind = self.schema.require_kind(node.kind())?;
            for definition in kind.relationships() {
                for related in definition.get_related_nodes_to_save(node)? {
                    if lookup.lookup(&related).is_none() {
                        return Err(CoreError::UnresolvedRelationshipDependency {
                            field: definition.field().to_string(),
                            node: related.to_string(),
                        }
                        .into());
                    }
                }
                let diff = definition.get_relationship_diff(node, &lookup)?;
                operations.extend(definition.edge_operations(&diff));
                operations.extend(self.displaced_edges(&graph, definition, &diff)?);
            }
        }

        let saved: HashSet<&str> = batch.values().map(String::as_str).collect();
        for operation in &operations {
            if let EdgeOperation::Create { from, to, .. } = operation {
                for id in [from, to] {
                    if !saved.contains(id.as_str()) && !graph.nodes.contains_key(id) {
                        return Err(StorageError::NodeNotFound(id.clone()));
                    }
                }
            }
        }

        let batch_kinds: HashMap<&str, &str> = nodes
            .iter()
            .map(|node| (batch[&node.key()].as_str(), node.kind()))
            .collect();
        self.check_to_one(&graph, &batch_kinds, &operations)?;

        for node in nodes.iter() {
            graph.nodes.insert(
                batch[&node.key()].clone(),
                StoredNode {
                    kind: node.kind().to_string(),
                    attributes: node.attributes().clone(),
                },
            );
        }

        for operation in write_order(&operations) {
            graph.apply(operation);
        }

        for node in nodes.iter_mut() {
            let id = batch[&node.key()].clone();
            keys.insert(node.key(), id.clone());
            node.set_id(id);

            let kind: &EntityKind = self.schema.require_kind(node.kind())?;
            for definition in kind.relationships() {
                node.property_mut(definition.field())?.commit();
            }
        }
        self.mirror_into_batch(&graph, &keys, nodes, &operations)?;

        tracing::debug!(
            "Saved {} nodes with {} edge operations",
            nodes.len(),
            operations.len()
        );
        Ok(operations.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{AttributeType, CompareOp, EntityKindDecl};

    fn storage() -> MemoryStorage {
        let schema = Schema::builder()
            .kind(
                EntityKindDecl::new("Project")
                    .attribute("name", AttributeType::String)
                    .many("issues", "Issue", "HAS_ISSUE", Direction::Outgoing),
            )
            .kind(
                EntityKindDecl::new("Issue")
                    .attribute("title", AttributeType::String)
                    .one("project", "Project", "HAS_ISSUE", Direction::Incoming),
            )
            .build()
            .unwrap();
        MemoryStorage::new(Arc::new(schema))
    }

    fn project(storage: &MemoryStorage, name: &str) -> Node {
        Node::new(storage.schema().kind("Project").unwrap()).with_attribute("name", name)
    }

    fn issue(storage: &MemoryStorage, title: &str) -> Node {
        Node::new(storage.schema().kind("Issue").unwrap()).with_attribute("title", title)
    }

    #[tokio::test]
    async fn test_save_assigns_ids_and_creates_edges() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "trellis"), issue(&storage, "first")];
        let issue_key = nodes[1].key();
        nodes[0].property_mut("issues").unwrap().add(issue_key);

        let ops = storage.save(&mut nodes).await.unwrap();

        let (project_id, issue_id) = (nodes[0].id().unwrap(), nodes[1].id().unwrap());
        assert_eq!(
            ops,
            vec![EdgeOperation::Create {
                from: project_id.to_string(),
                to: issue_id.to_string(),
                label: "HAS_ISSUE".to_string(),
            }]
        );
        assert!(!nodes[0].has_changes());
        assert!(nodes[0].property("issues").unwrap().contains(&issue_key));
    }

    #[tokio::test]
    async fn test_mirror_changes_are_deduplicated() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "trellis"), issue(&storage, "first")];
        let (project_key, issue_key) = (nodes[0].key(), nodes[1].key());
        nodes[0].property_mut("issues").unwrap().add(issue_key);
        nodes[1].property_mut("project").unwrap().set(Some(project_key));

        let ops = storage.save(&mut nodes).await.unwrap();
        assert_eq!(ops.len(), 1);
    }

    #[tokio::test]
    async fn test_load_relationship_registers_both_sides() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "trellis"), issue(&storage, "first")];
        let issue_key = nodes[1].key();
        nodes[0].property_mut("issues").unwrap().add(issue_key);
        storage.save(&mut nodes).await.unwrap();

        let id = nodes[0].id().unwrap().to_string();
        let mut loaded = storage.get("Project", &id).await.unwrap().unwrap();
        let issues = storage.load_relationship(&mut loaded, "issues").await.unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].attribute("title"), Some(&Value::from("first")));
        assert!(loaded.property("issues").unwrap().is_loaded());
        assert_eq!(
            issues[0].property("project").unwrap().get(),
            Some(loaded.key())
        );
    }

    #[tokio::test]
    async fn test_remove_loaded_node_deletes_edge() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "trellis"), issue(&storage, "first")];
        let issue_key = nodes[1].key();
        nodes[0].property_mut("issues").unwrap().add(issue_key);
        storage.save(&mut nodes).await.unwrap();

        let id = nodes[0].id().unwrap().to_string();
        let mut loaded = storage.get("Project", &id).await.unwrap().unwrap();
        let issues = storage.load_relationship(&mut loaded, "issues").await.unwrap();

        // The issue is not in the batch; its id is known from the load
        loaded.property_mut("issues").unwrap().remove(issues[0].key());
        let ops = storage.save(std::slice::from_mut(&mut loaded)).await.unwrap();
        assert!(matches!(ops.as_slice(), [EdgeOperation::Delete { .. }]));

        let reloaded = storage.load_relationship(&mut loaded, "issues").await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_reparent_through_many_side() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "first"), issue(&storage, "moved")];
        let issue_key = nodes[1].key();
        nodes[0].property_mut("issues").unwrap().add(issue_key);
        storage.save(&mut nodes).await.unwrap();
        let first_id = nodes[0].id().unwrap().to_string();
        let issue_id = nodes[1].id().unwrap().to_string();

        let mut moved = storage.get("Issue", &issue_id).await.unwrap().unwrap();
        storage.load_relationship(&mut moved, "project").await.unwrap();

        let mut batch = vec![project(&storage, "second"), moved];
        let moved_key = batch[1].key();
        batch[0].property_mut("issues").unwrap().add(moved_key);
        let ops = storage.save(&mut batch).await.unwrap();

        let second_id = batch[0].id().unwrap().to_string();
        assert_eq!(
            ops,
            vec![
                EdgeOperation::Create {
                    from: second_id.clone(),
                    to: issue_id.clone(),
                    label: "HAS_ISSUE".to_string(),
                },
                EdgeOperation::Delete {
                    from: first_id,
                    to: issue_id.clone(),
                    label: "HAS_ISSUE".to_string(),
                },
            ]
        );

        // The in-memory mirror follows the move
        assert_eq!(batch[1].property("project").unwrap().get(), Some(batch[0].key()));
        assert!(!batch[1].has_changes());

        let mut reloaded = storage.get("Issue", &issue_id).await.unwrap().unwrap();
        let projects = storage.load_relationship(&mut reloaded, "project").await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id(), Some(second_id.as_str()));

        batch[1].set_attribute("title", "still moved");
        assert!(storage.save(&mut batch[1..]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mirror_updates_saved_parent() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "first"), issue(&storage, "moved")];
        let issue_key = nodes[1].key();
        nodes[0].property_mut("issues").unwrap().add(issue_key);
        storage.save(&mut nodes).await.unwrap();

        // Both projects in one batch: the old one drops the issue in memory
        let mut second = project(&storage, "second");
        second.property_mut("issues").unwrap().add(issue_key);
        let mut batch = vec![nodes.remove(0), second];
        storage.save(&mut batch).await.unwrap();

        assert!(!batch[0].property("issues").unwrap().contains(&issue_key));
        assert!(batch[1].property("issues").unwrap().contains(&issue_key));
    }

    #[tokio::test]
    async fn test_two_parents_in_one_save_are_rejected() {
        let storage = storage();
        let mut nodes = vec![
            project(&storage, "first"),
            project(&storage, "second"),
            issue(&storage, "contested"),
        ];
        let issue_key = nodes[2].key();
        nodes[0].property_mut("issues").unwrap().add(issue_key);
        nodes[1].property_mut("issues").unwrap().add(issue_key);

        let err = storage.save(&mut nodes).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Core(CoreError::CardinalityViolation { count: 2, .. })
        ));
        assert!(nodes.iter().all(|n| n.id().is_none()));
    }

    #[tokio::test]
    async fn test_unresolved_dependency_aborts_save() {
        let storage = storage();
        let stray = issue(&storage, "stray");
        let mut nodes = vec![project(&storage, "trellis")];
        nodes[0].property_mut("issues").unwrap().add(stray.key());

        let err = storage.save(&mut nodes).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Core(CoreError::UnresolvedRelationshipDependency { .. })
        ));
        assert!(nodes[0].id().is_none());
        assert!(nodes[0].has_changes());

        let all = storage
            .query("Project", &Variable::new("p"), &Condition::True)
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_query_and_kind_mismatch() {
        let storage = storage();
        let mut nodes = vec![project(&storage, "trellis"), project(&storage, "parser")];
        storage.save(&mut nodes).await.unwrap();

        let p = Variable::new("p");
        let condition = Condition::Compare {
            variable: p.clone(),
            attribute: "name".to_string(),
            op: CompareOp::StartsWith,
            value: Value::from("tre"),
        };
        let found = storage.query("Project", &p, &condition).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), nodes[0].id());

        let id = nodes[0].id().unwrap();
        assert!(matches!(
            storage.get("Issue", id).await,
            Err(StorageError::KindMismatch { .. })
        ));
        assert!(storage.get("Project", "missing").await.unwrap().is_none());
    }
}
