//! In-memory knowledge graph.

use async_trait::async_trait;
use docent_core::error::StorageError;
use docent_core::storage::{Entity, GraphStore, Relation, Subgraph};
use std::collections::HashSet;
use tokio::sync::RwLock;

#[derive(Default)]
struct Graph {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
}

/// Entities are unique by name (case-insensitive); a later upsert replaces
/// the earlier entity. Relations are unique by `(from, to, label)`.
#[derive(Default)]
pub struct InMemoryGraphStore {
    graph: RwLock<Graph>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert_entities(&self, entities: Vec<Entity>) -> Result<(), StorageError> {
        let mut graph = self.graph.write().await;
        for entity in entities {
            let key = entity.name.to_lowercase();
            match graph.entities.iter_mut().find(|e| e.name.to_lowercase() == key) {
                Some(existing) => *existing = entity,
                None => graph.entities.push(entity),
            }
        }
        Ok(())
    }

    async fn upsert_relations(&self, relations: Vec<Relation>) -> Result<(), StorageError> {
        let mut graph = self.graph.write().await;
        for relation in relations {
            if !graph.relations.contains(&relation) {
                graph.relations.push(relation);
            }
        }
        Ok(())
    }

    async fn query(&self, pattern: &str) -> Result<Subgraph, StorageError> {
        let needle = pattern.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Subgraph::default());
        }
        let graph = self.graph.read().await;

        let entities: Vec<Entity> = graph
            .entities
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle) || e.kind.to_lowercase() == needle)
            .cloned()
            .collect();
        let names: HashSet<String> = entities.iter().map(|e| e.name.to_lowercase()).collect();
        let relations = graph
            .relations
            .iter()
            .filter(|r| {
                names.contains(&r.from.to_lowercase()) || names.contains(&r.to.to_lowercase())
            })
            .cloned()
            .collect();

        Ok(Subgraph { entities, relations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, kind: &str) -> Entity {
        Entity { name: name.into(), kind: kind.into(), source_file: None }
    }

    #[tokio::test]
    async fn entities_dedupe_by_name() {
        let graph = InMemoryGraphStore::new();
        graph.upsert_entities(vec![entity("Acme", "company")]).await.unwrap();
        graph.upsert_entities(vec![entity("acme", "customer")]).await.unwrap();

        let found = graph.query("acme").await.unwrap();
        assert_eq!(found.entities.len(), 1);
        assert_eq!(found.entities[0].kind, "customer");
    }

    #[tokio::test]
    async fn query_returns_touching_relations() {
        let graph = InMemoryGraphStore::new();
        graph
            .upsert_entities(vec![entity("Acme", "company"), entity("Widget", "product")])
            .await
            .unwrap();
        let rel = Relation { from: "Acme".into(), to: "Widget".into(), label: "sells".into() };
        graph.upsert_relations(vec![rel.clone(), rel]).await.unwrap();

        let found = graph.query("widget").await.unwrap();
        assert_eq!(found.entities.len(), 1);
        assert_eq!(found.relations.len(), 1);
        assert_eq!(found.relations[0].label, "sells");

        assert!(graph.query("  ").await.unwrap().is_empty());
    }
}
