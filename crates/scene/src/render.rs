//! Batches scene entities by model and draws each model once per frame.

use crate::ComponentStore;
use glam::Mat4;
use hearth_render::{GpuDevice, RenderPassEncoder};
use hearth_resources::model::uniforms::MAX_INSTANCES;
use hearth_resources::{ResourceId, ResourceSystem};
use std::collections::BTreeMap;

/// Counts from one [`ModelRenderSystem::render`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Models drawn.
    pub models: usize,
    pub instances: usize,
    /// Entities whose model is not Loaded yet.
    pub pending: usize,
    /// Instances past the per-model capacity.
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct ModelRenderSystem;

impl ModelRenderSystem {
    pub fn new() -> Self {
        Self
    }

    /// World matrices of visible entities, grouped by model, each group in
    /// entity order. Entities without a transform sit at the origin.
    pub fn batches(store: &ComponentStore) -> BTreeMap<ResourceId, Vec<Mat4>> {
        let mut batches: BTreeMap<ResourceId, Vec<Mat4>> = BTreeMap::new();
        for (entity, component) in store.models() {
            if !component.visible {
                continue;
            }
            let world = store
                .transform(*entity)
                .map_or(Mat4::IDENTITY, |t| t.to_matrix());
            batches.entry(component.model).or_default().push(world);
        }
        batches
    }

    /// Issue one instanced render per model. A model's instance buffer is
    /// written once per call, so every entity sharing it must be in the
    /// same batch.
    pub fn render(
        &self,
        store: &ComponentStore,
        resources: &ResourceSystem,
        pass: &mut dyn RenderPassEncoder,
        device: &dyn GpuDevice,
    ) -> RenderStats {
        let mut stats = RenderStats::default();
        for (id, transforms) in Self::batches(store) {
            let Some(model) = resources.model(id) else {
                stats.pending += transforms.len();
                continue;
            };
            if model.state() != hearth_common::ResourceState::Loaded {
                stats.pending += transforms.len();
                continue;
            }
            if transforms.len() > MAX_INSTANCES {
                tracing::warn!(
                    path = %model.path(),
                    instances = transforms.len(),
                    max = MAX_INSTANCES,
                    "model instance capacity exceeded"
                );
                stats.dropped += transforms.len() - MAX_INSTANCES;
            }
            model.render(pass, device, &transforms);
            stats.models += 1;
            stats.instances += transforms.len().min(MAX_INSTANCES);
        }
        stats
    }
}
