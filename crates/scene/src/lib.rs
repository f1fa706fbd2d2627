//! Deterministic component store for scene entities.
//!
//! Components are stored in BTreeMap keyed by [`EntityId`], so iteration
//! order (and therefore draw order) does not depend on insertion order.
//!
//! # Invariants
//! - All component mutations produce events.
//! - Iteration order is deterministic (BTreeMap).

pub mod render;

pub use render::{ModelRenderSystem, RenderStats};

use hearth_common::{EntityId, Transform};
use hearth_resources::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Human-readable name component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

/// Draws a model resource at the entity's transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelComponent {
    pub model: ResourceId,
    pub visible: bool,
}

impl ModelComponent {
    pub fn new(model: ResourceId) -> Self {
        Self {
            model,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentEvent {
    NameAdded { entity: EntityId, name: String },
    NameRemoved { entity: EntityId, name: String },
    NameUpdated { entity: EntityId, old: String, new: String },
    TransformSet { entity: EntityId, transform: Transform },
    TransformRemoved { entity: EntityId },
    ModelAdded { entity: EntityId, model: ModelComponent },
    ModelRemoved { entity: EntityId, model: ModelComponent },
    ModelUpdated { entity: EntityId, old: ModelComponent, new: ModelComponent },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentStore {
    names: BTreeMap<EntityId, Name>,
    transforms: BTreeMap<EntityId, Transform>,
    models: BTreeMap<EntityId, ModelComponent>,
    #[serde(skip)]
    events: Vec<ComponentEvent>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity with a name, transform and model in one go.
    pub fn spawn_model(&mut self, name: &str, transform: Transform, model: ResourceId) -> EntityId {
        let entity = EntityId::new();
        self.set_name(entity, name.to_string());
        self.set_transform(entity, transform);
        self.set_model(entity, ModelComponent::new(model));
        tracing::debug!(entity = %entity.short(), name, "model entity spawned");
        entity
    }

    pub fn drain_events(&mut self) -> Vec<ComponentEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[ComponentEvent] {
        &self.events
    }

    pub fn set_name(&mut self, entity: EntityId, name: String) {
        let event = match self.names.get(&entity) {
            Some(old) => ComponentEvent::NameUpdated {
                entity,
                old: old.0.clone(),
                new: name.clone(),
            },
            None => ComponentEvent::NameAdded {
                entity,
                name: name.clone(),
            },
        };
        self.events.push(event);
        self.names.insert(entity, Name(name));
    }

    pub fn remove_name(&mut self, entity: EntityId) -> Option<Name> {
        let removed = self.names.remove(&entity);
        if let Some(n) = &removed {
            self.events.push(ComponentEvent::NameRemoved {
                entity,
                name: n.0.clone(),
            });
        }
        removed
    }

    pub fn name(&self, entity: EntityId) -> Option<&str> {
        self.names.get(&entity).map(|n| n.0.as_str())
    }

    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        self.events.push(ComponentEvent::TransformSet { entity, transform });
        self.transforms.insert(entity, transform);
    }

    pub fn remove_transform(&mut self, entity: EntityId) -> Option<Transform> {
        let removed = self.transforms.remove(&entity);
        if removed.is_some() {
            self.events.push(ComponentEvent::TransformRemoved { entity });
        }
        removed
    }

    pub fn transform(&self, entity: EntityId) -> Option<&Transform> {
        self.transforms.get(&entity)
    }

    pub fn set_model(&mut self, entity: EntityId, model: ModelComponent) {
        let event = match self.models.get(&entity) {
            Some(old) => ComponentEvent::ModelUpdated {
                entity,
                old: *old,
                new: model,
            },
            None => ComponentEvent::ModelAdded { entity, model },
        };
        self.events.push(event);
        self.models.insert(entity, model);
    }

    pub fn remove_model(&mut self, entity: EntityId) -> Option<ModelComponent> {
        let removed = self.models.remove(&entity);
        if let Some(model) = removed {
            self.events.push(ComponentEvent::ModelRemoved { entity, model });
        }
        removed
    }

    pub fn model(&self, entity: EntityId) -> Option<&ModelComponent> {
        self.models.get(&entity)
    }

    pub fn models(&self) -> &BTreeMap<EntityId, ModelComponent> {
        &self.models
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.remove_name(entity);
        self.remove_transform(entity);
        self.remove_model(entity);
    }

    pub fn entity_count(&self) -> usize {
        let mut ids: Vec<&EntityId> = self
            .names
            .keys()
            .chain(self.transforms.keys())
            .chain(self.models.keys())
            .collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    /// Replay a component event without recording it again.
    pub fn apply_event(&mut self, event: &ComponentEvent) {
        match event {
            ComponentEvent::NameAdded { entity, name } => {
                self.names.insert(*entity, Name(name.clone()));
            }
            ComponentEvent::NameUpdated { entity, new, .. } => {
                self.names.insert(*entity, Name(new.clone()));
            }
            ComponentEvent::NameRemoved { entity, .. } => {
                self.names.remove(entity);
            }
            ComponentEvent::TransformSet { entity, transform } => {
                self.transforms.insert(*entity, *transform);
            }
            ComponentEvent::TransformRemoved { entity } => {
                self.transforms.remove(entity);
            }
            ComponentEvent::ModelAdded { entity, model } => {
                self.models.insert(*entity, *model);
            }
            ComponentEvent::ModelUpdated { entity, new, .. } => {
                self.models.insert(*entity, *new);
            }
            ComponentEvent::ModelRemoved { entity, .. } => {
                self.models.remove(entity);
            }
        }
    }
}

pub fn crate_info() -> &'static str {
    "hearth-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use slotmap::SlotMap;

    /// The `n`th id a fresh arena hands out.
    fn key(n: usize) -> ResourceId {
        let mut ids: SlotMap<ResourceId, ()> = SlotMap::with_key();
        let mut last = ids.insert(());
        for _ in 0..n {
            last = ids.insert(());
        }
        last
    }

    #[test]
    fn name_add_update_remove() {
        let mut store = ComponentStore::new();
        let id = EntityId::new();
        store.set_name(id, "Ship".into());
        store.set_name(id, "Escort".into());
        assert_eq!(store.name(id), Some("Escort"));
        assert!(store.remove_name(id).is_some());
        assert!(store.remove_name(id).is_none());
        let events = store.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], ComponentEvent::NameUpdated { .. }));
        assert!(store.events().is_empty());
    }

    #[test]
    fn spawn_model_sets_all_components() {
        let mut store = ComponentStore::new();
        let model = key(0);
        let e = store.spawn_model("ship", Transform::from_position(Vec3::X), model);
        assert_eq!(store.name(e), Some("ship"));
        assert_eq!(store.transform(e).unwrap().position, Vec3::X);
        assert_eq!(store.model(e), Some(&ModelComponent::new(model)));
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.drain_events().len(), 3);
    }

    #[test]
    fn model_update_records_old_value() {
        let mut store = ComponentStore::new();
        let e = EntityId::new();
        let (a, b) = (key(0), key(1));
        store.set_model(e, ModelComponent::new(a));
        store.set_model(e, ModelComponent::new(b));
        let events = store.drain_events();
        assert!(matches!(
            &events[1],
            ComponentEvent::ModelUpdated { old, new, .. } if old.model == a && new.model == b
        ));
    }

    #[test]
    fn replay_rebuilds_store() {
        let mut store = ComponentStore::new();
        let e = store.spawn_model("a", Transform::default(), key(0));
        let f = store.spawn_model("b", Transform::default(), key(0));
        store.remove_entity(f);
        let events = store.drain_events();

        let mut replica = ComponentStore::new();
        for event in &events {
            replica.apply_event(event);
        }
        assert_eq!(replica.models(), store.models());
        assert_eq!(replica.name(e), Some("a"));
        assert_eq!(replica.name(f), None);
        assert!(replica.events().is_empty());
    }
}
