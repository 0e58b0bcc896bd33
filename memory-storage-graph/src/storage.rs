use async_trait::async_trait;
use memory_core::storage::{GraphAdapter, HealthStatus, RecordId, ScrollFilter, ScrollPage, StorageAdapter};
use memory_core::{Error, Result};
use parking_lot::RwLock;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

#[derive(Debug, Clone)]
struct NodeData {
    id: RecordId,
    labels: Vec<String>,
    properties: Vec<u8>,
}

#[derive(Debug, Clone)]
struct EdgeData {
    relation: String,
    #[allow(dead_code)]
    properties: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    graph: StableDiGraph<NodeData, EdgeData>,
    index: HashMap<RecordId, NodeIndex>,
}

/// In-process property graph, guarded by a single [`RwLock`].
///
/// `StableDiGraph` is used (rather than `petgraph::Graph`) specifically
/// because node removal must not invalidate other nodes' indices —
/// `delete` removes a node and its incident edges while concurrent
/// readers may hold other node ids looked up moments earlier.
pub struct PetgraphAdapter {
    inner: RwLock<Inner>,
}

impl Default for PetgraphAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PetgraphAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn matches_filter(equals: &HashMap<String, serde_json::Value>, raw: &[u8]) -> bool {
        if equals.is_empty() {
            return true;
        }
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(raw) else {
            return false;
        };
        let serde_json::Value::Object(map) = &value else {
            return false;
        };
        equals.iter().all(|(k, v)| map.get(k).is_some_and(|f| f == v))
    }
}

#[async_trait]
impl StorageAdapter for PetgraphAdapter {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let count = self.inner.read().graph.node_count();
        let _ = count;
        let latency = start.elapsed();
        Ok(if latency.as_millis() < 100 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        })
    }
}

#[async_trait]
impl GraphAdapter for PetgraphAdapter {
    async fn store(&self, node_id: &RecordId, labels: &[String], properties: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        let data = NodeData {
            id: node_id.clone(),
            labels: labels.to_vec(),
            properties: properties.to_vec(),
        };
        if let Some(&idx) = inner.index.get(node_id) {
            if let Some(existing) = inner.graph.node_weight_mut(idx) {
                *existing = data;
            }
        } else {
            let idx = inner.graph.add_node(data);
            inner.index.insert(node_id.clone(), idx);
        }
        Ok(())
    }

    async fn store_batch(&self, nodes: &[(RecordId, Vec<String>, Vec<u8>)]) -> Result<()> {
        for (id, labels, properties) in nodes {
            self.store(id, labels, properties).await?;
        }
        Ok(())
    }

    async fn retrieve(&self, node_id: &RecordId) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read();
        Ok(inner
            .index
            .get(node_id)
            .and_then(|idx| inner.graph.node_weight(*idx))
            .map(|n| n.properties.clone()))
    }

    async fn retrieve_batch(&self, node_ids: &[RecordId]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            out.push(self.retrieve(id).await?);
        }
        Ok(out)
    }

    async fn link(
        &self,
        from: &RecordId,
        to: &RecordId,
        relation: &str,
        properties: &[u8],
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let from_idx = *inner
            .index
            .get(from)
            .ok_or_else(|| Error::not_found(format!("graph node {from}")))?;
        let to_idx = *inner
            .index
            .get(to)
            .ok_or_else(|| Error::not_found(format!("graph node {to}")))?;
        inner.graph.add_edge(
            from_idx,
            to_idx,
            EdgeData {
                relation: relation.to_string(),
                properties: properties.to_vec(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        node_id: &RecordId,
        relation: Option<&str>,
        depth: usize,
    ) -> Result<Vec<RecordId>> {
        let inner = self.inner.read();
        let Some(&start) = inner.index.get(node_id) else {
            return Ok(Vec::new());
        };
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut frontier = VecDeque::new();
        frontier.push_back((start, 0usize));
        visited.insert(start);
        let mut found = Vec::new();

        while let Some((idx, d)) = frontier.pop_front() {
            if d >= depth {
                continue;
            }
            for edge in inner.graph.edges_directed(idx, Direction::Outgoing) {
                if let Some(want) = relation {
                    if edge.weight().relation != want {
                        continue;
                    }
                }
                let target = edge.target();
                if visited.insert(target) {
                    if let Some(data) = inner.graph.node_weight(target) {
                        found.push(data.id.clone());
                    }
                    frontier.push_back((target, d + 1));
                }
            }
        }
        Ok(found)
    }

    async fn scroll(&self, label: &str, filter: &ScrollFilter) -> Result<ScrollPage<RecordId>> {
        let inner = self.inner.read();
        let mut items = Vec::new();
        for node in inner.graph.node_weights() {
            if !node.labels.iter().any(|l| l == label) {
                continue;
            }
            if !Self::matches_filter(&filter.equals, &node.properties) {
                continue;
            }
            items.push(node.id.clone());
            if filter.limit > 0 && items.len() >= filter.limit {
                break;
            }
        }
        Ok(ScrollPage { items, cursor: None })
    }

    async fn delete(&self, node_id: &RecordId) -> Result<bool> {
        let mut inner = self.inner.write();
        let Some(idx) = inner.index.remove(node_id) else {
            return Ok(false);
        };
        inner.graph.remove_node(idx);
        Ok(true)
    }

    async fn delete_batch(&self, node_ids: &[RecordId]) -> Result<usize> {
        let mut count = 0;
        for id in node_ids {
            if self.delete(id).await? {
                count += 1;
            }
        }
        Ok(count)
    }
}
