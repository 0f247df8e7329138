use std::sync::Arc;

use uuid::Uuid;

use crate::domain::models::ContentNode;
use crate::error::{ServiceError, ServiceResult};
use crate::store::StoreGateway;

/// Discovers every descendant of a content node.
///
/// Traversal runs off an explicit worklist rather than the call stack, so
/// deep comment chains cannot overflow, and the depth and node-count guards
/// turn pathological trees into errors instead of unbounded work. Callers
/// cancel mid-traversal by dropping the future (the request deadline does
/// exactly that).
pub struct SubtreeResolver {
    store: Arc<dyn StoreGateway>,
    max_depth: usize,
    max_nodes: usize,
}

impl SubtreeResolver {
    pub fn new(store: Arc<dyn StoreGateway>, max_depth: usize, max_nodes: usize) -> Self {
        Self {
            store,
            max_depth,
            max_nodes,
        }
    }

    /// Every descendant of `root`, excluding the root itself. Each node is
    /// visited exactly once; the parent relation is acyclic by construction
    /// because a parent always exists before its children.
    pub async fn descendants(&self, root: Uuid) -> ServiceResult<Vec<ContentNode>> {
        let mut found = Vec::new();
        let mut worklist = vec![(root, 0usize)];
        while let Some((node_id, depth)) = worklist.pop() {
            let children = self.store.children_of(node_id).await?;
            if !children.is_empty() && depth + 1 > self.max_depth {
                return Err(ServiceError::TraversalLimit {
                    what: "depth",
                    limit: self.max_depth,
                });
            }
            for child in children {
                if found.len() >= self.max_nodes {
                    return Err(ServiceError::TraversalLimit {
                        what: "node count",
                        limit: self.max_nodes,
                    });
                }
                worklist.push((child.id, depth + 1));
                found.push(child);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    async fn chain(store: &MemoryStore, len: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        let mut parent: Option<Uuid> = None;
        for _ in 0..len {
            let id = Uuid::new_v4();
            store
                .insert_node(ContentNode {
                    id,
                    parent_id: parent,
                    author_id: Uuid::new_v4(),
                    created_at: Utc::now(),
                })
                .await;
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    #[tokio::test]
    async fn finds_all_descendants_once() {
        let store = Arc::new(MemoryStore::new());
        let root = Uuid::new_v4();
        store
            .insert_node(ContentNode {
                id: root,
                parent_id: None,
                author_id: Uuid::new_v4(),
                created_at: Utc::now(),
            })
            .await;
        let mut expected = Vec::new();
        for _ in 0..3 {
            let child = Uuid::new_v4();
            store
                .insert_node(ContentNode {
                    id: child,
                    parent_id: Some(root),
                    author_id: Uuid::new_v4(),
                    created_at: Utc::now(),
                })
                .await;
            expected.push(child);
            for _ in 0..2 {
                let grandchild = Uuid::new_v4();
                store
                    .insert_node(ContentNode {
                        id: grandchild,
                        parent_id: Some(child),
                        author_id: Uuid::new_v4(),
                        created_at: Utc::now(),
                    })
                    .await;
                expected.push(grandchild);
            }
        }

        let resolver = SubtreeResolver::new(store, 1024, 100_000);
        let mut found: Vec<Uuid> = resolver
            .descendants(root)
            .await
            .unwrap()
            .into_iter()
            .map(|node| node.id)
            .collect();
        found.sort();
        expected.sort();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn deep_chains_traverse_without_recursion() {
        let store = Arc::new(MemoryStore::new());
        let ids = chain(&store, 500).await;

        let resolver = SubtreeResolver::new(store, 1024, 100_000);
        let found = resolver.descendants(ids[0]).await.unwrap();
        assert_eq!(found.len(), ids.len() - 1);
    }

    #[tokio::test]
    async fn depth_guard_trips() {
        let store = Arc::new(MemoryStore::new());
        let ids = chain(&store, 6).await;

        let resolver = SubtreeResolver::new(store, 3, 100_000);
        let err = resolver.descendants(ids[0]).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::TraversalLimit { what: "depth", .. }
        ));
    }

    #[tokio::test]
    async fn node_count_guard_trips() {
        let store = Arc::new(MemoryStore::new());
        let root = Uuid::new_v4();
        store
            .insert_node(ContentNode {
                id: root,
                parent_id: None,
                author_id: Uuid::new_v4(),
                created_at: Utc::now(),
            })
            .await;
        for _ in 0..10 {
            store
                .insert_node(ContentNode {
                    id: Uuid::new_v4(),
                    parent_id: Some(root),
                    author_id: Uuid::new_v4(),
                    created_at: Utc::now(),
                })
                .await;
        }

        let resolver = SubtreeResolver::new(store, 1024, 5);
        let err = resolver.descendants(root).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::TraversalLimit {
                what: "node count",
                ..
            }
        ));
    }
}
