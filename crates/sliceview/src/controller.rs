use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::ids::LayerId;
use foundation::vec::Vec3;
use runtime::schedule::UpdateScheduler;
use runtime::signal::Watchable;
use tracing::debug;

use crate::layer::VisibleLayerRecord;
use crate::registry::{RegistryError, SourceRegistry};
use crate::transformed::TransformedSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// Removing a layer that was never added (or already removed): callers
    /// pair each add with exactly one remove.
    UnknownLayer(LayerId),
    Registry(RegistryError),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerError::UnknownLayer(layer) => {
                write!(f, "layer not registered: {layer}")
            }
            ControllerError::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<RegistryError> for ControllerError {
    fn from(err: RegistryError) -> Self {
        ControllerError::Registry(err)
    }
}

/// Maintains the layer → visibility-record mapping on the worker side of
/// the channel.
///
/// Mutation discipline: records change structurally only here; the engine
/// only rewrites `visible_sources`. Invalidation goes through the shared
/// update scheduler, which coalesces and never re-enters a running pass.
#[derive(Debug)]
pub struct LayerController {
    layers: BTreeMap<LayerId, VisibleLayerRecord>,
    update: Rc<UpdateScheduler>,
}

impl LayerController {
    pub fn new(update: Rc<UpdateScheduler>) -> Self {
        Self {
            layers: BTreeMap::new(),
            update,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn record(&self, layer: LayerId) -> Option<&VisibleLayerRecord> {
        self.layers.get(&layer)
    }

    /// Records for one engine pass.
    pub fn records_mut(&mut self) -> &mut BTreeMap<LayerId, VisibleLayerRecord> {
        &mut self.layers
    }

    pub fn update_scheduler(&self) -> &Rc<UpdateScheduler> {
        &self.update
    }

    /// Registers a layer, or replaces its source set if it is already
    /// registered.
    ///
    /// Replacement disposes every previously held transformed source exactly
    /// once and leaves `visible_sources` empty until the next
    /// recomputation. Either branch ends by invalidating visibility.
    pub fn add_visible_layer(
        &mut self,
        layer: LayerId,
        all_sources: Vec<Vec<TransformedSource>>,
        registry: &mut SourceRegistry,
    ) -> Result<(), ControllerError> {
        if let Some(record) = self.layers.get_mut(&layer) {
            for group in record.all_sources.drain(..) {
                for source in &group {
                    source.dispose(registry)?;
                }
            }
            record.all_sources = all_sources;
            record.visible_sources.clear();
            record.display_generation = None;
            record.stale.set(true);
            debug!(%layer, "replaced layer sources");
        } else {
            let stale = Rc::new(Cell::new(true));
            let render_scale_target = Rc::new(RefCell::new(Watchable::new(0.0f64)));
            let local_position = Rc::new(RefCell::new(Watchable::new(Vec3::ZERO)));

            // A coarser/finer render-scale target changes which sources are
            // visible; a moved local position only changes priorities.
            let update = Rc::clone(&self.update);
            let stale_in = Rc::clone(&stale);
            let render_scale_listener = render_scale_target.borrow_mut().changed.connect(move || {
                stale_in.set(true);
                update.request();
            });
            let update = Rc::clone(&self.update);
            let local_position_listener = local_position
                .borrow_mut()
                .changed
                .connect(move || {
                    update.request();
                });

            self.layers.insert(
                layer,
                VisibleLayerRecord {
                    all_sources,
                    visible_sources: Vec::new(),
                    display_generation: None,
                    stale,
                    render_scale_target,
                    local_position,
                    render_scale_listener,
                    local_position_listener,
                },
            );
            debug!(%layer, "added visible layer");
        }
        self.update.request();
        Ok(())
    }

    /// Removes a layer, disposing its sources and disconnecting both change
    /// listeners registered at add time.
    pub fn remove_visible_layer(
        &mut self,
        layer: LayerId,
        registry: &mut SourceRegistry,
    ) -> Result<(), ControllerError> {
        let record = self
            .layers
            .remove(&layer)
            .ok_or(ControllerError::UnknownLayer(layer))?;

        for group in &record.all_sources {
            for source in group {
                source.dispose(registry)?;
            }
        }
        record
            .render_scale_target
            .borrow_mut()
            .changed
            .disconnect(record.render_scale_listener);
        record
            .local_position
            .borrow_mut()
            .changed
            .disconnect(record.local_position_listener);

        self.update.request();
        debug!(%layer, "removed visible layer");
        Ok(())
    }

    /// Tears the controller down: every registered layer is removed first,
    /// so no per-layer listeners or source references survive.
    pub fn dispose(&mut self, registry: &mut SourceRegistry) -> Result<(), ControllerError> {
        let layers: Vec<LayerId> = self.layers.keys().copied().collect();
        for layer in layers {
            self.remove_visible_layer(layer, registry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerError, LayerController};
    use crate::registry::SourceRegistry;
    use crate::source::{ChunkSource, ChunkSourceSpec};
    use crate::transformed::{ChunkTransform, SourceGeometry, TransformedSource};
    use foundation::bounds::Box3;
    use foundation::ids::{LayerId, ObjectId};
    use foundation::vec::Vec3;
    use runtime::schedule::UpdateScheduler;
    use std::rc::Rc;

    fn register_source(registry: &mut SourceRegistry) -> ObjectId {
        registry.register(ChunkSource::new(ChunkSourceSpec::new(
            2,
            Vec3::new(10.0, 10.0, 0.0),
            1,
        )))
    }

    fn transformed(registry: &mut SourceRegistry, id: ObjectId) -> TransformedSource {
        registry.retain(id).unwrap();
        let source = registry.get(id).unwrap();
        TransformedSource::new(
            id,
            source,
            SourceGeometry {
                layout_size: Vec3::new(10.0, 10.0, 0.0),
                layer_rank: 2,
                clip_bounds: Box3::new(Vec3::ZERO, Vec3::new(20.0, 20.0, 0.0)),
                effective_voxel_size: Vec3::splat(1.0),
                display_dimensions: [0, 1, 2],
                transform: ChunkTransform::identity(),
            },
        )
    }

    fn controller() -> LayerController {
        LayerController::new(Rc::new(UpdateScheduler::new()))
    }

    #[test]
    fn add_registers_and_invalidates() {
        let mut registry = SourceRegistry::new();
        let id = register_source(&mut registry);
        let ts = transformed(&mut registry, id);

        let mut c = controller();
        c.add_visible_layer(LayerId(1), vec![vec![ts]], &mut registry)
            .unwrap();

        assert_eq!(c.len(), 1);
        let record = c.record(LayerId(1)).unwrap();
        assert!(record.is_stale());
        assert!(record.visible_sources().is_empty());
        assert!(c.update_scheduler().is_scheduled());
    }

    #[test]
    fn re_add_disposes_prior_sources_exactly_once() {
        let mut registry = SourceRegistry::new();
        let id = register_source(&mut registry);

        let first = transformed(&mut registry, id);
        let second = transformed(&mut registry, id);
        assert_eq!(registry.ref_count(id), Some(3));

        let mut c = controller();
        c.add_visible_layer(LayerId(1), vec![vec![first]], &mut registry)
            .unwrap();
        c.add_visible_layer(LayerId(1), vec![vec![second]], &mut registry)
            .unwrap();

        // The first transformed source released its reference; the second
        // still holds one.
        assert_eq!(registry.ref_count(id), Some(2));
        assert_eq!(c.len(), 1);
        let record = c.record(LayerId(1)).unwrap();
        assert!(record.visible_sources().is_empty());
        assert!(record.is_stale());
        assert!(!record.all_sources()[0][0].is_disposed());
    }

    #[test]
    fn remove_disposes_and_unregisters_listeners() {
        let mut registry = SourceRegistry::new();
        let id = register_source(&mut registry);
        let ts = transformed(&mut registry, id);

        let mut c = controller();
        c.add_visible_layer(LayerId(1), vec![vec![ts]], &mut registry)
            .unwrap();

        let record = c.record(LayerId(1)).unwrap();
        let render_scale = Rc::clone(&record.render_scale_target);
        let local_position = Rc::clone(&record.local_position);
        let update = Rc::clone(c.update_scheduler());

        c.remove_visible_layer(LayerId(1), &mut registry).unwrap();
        assert!(c.is_empty());
        assert_eq!(registry.ref_count(id), Some(1));

        // Mutating the watchables after removal must not schedule anything.
        update.take();
        let seen = update.requests_seen();
        render_scale.borrow_mut().set(5.0);
        local_position.borrow_mut().set(Vec3::splat(9.0));
        assert_eq!(update.requests_seen(), seen);
        assert!(!update.is_scheduled());
    }

    #[test]
    fn removing_twice_is_a_contract_violation() {
        let mut registry = SourceRegistry::new();
        let id = register_source(&mut registry);
        let ts = transformed(&mut registry, id);

        let mut c = controller();
        c.add_visible_layer(LayerId(3), vec![vec![ts]], &mut registry)
            .unwrap();
        c.remove_visible_layer(LayerId(3), &mut registry).unwrap();

        assert_eq!(
            c.remove_visible_layer(LayerId(3), &mut registry),
            Err(ControllerError::UnknownLayer(LayerId(3)))
        );
    }

    #[test]
    fn listeners_invalidate_visibility() {
        let mut registry = SourceRegistry::new();
        let id = register_source(&mut registry);
        let ts = transformed(&mut registry, id);

        let mut c = controller();
        c.add_visible_layer(LayerId(1), vec![vec![ts]], &mut registry)
            .unwrap();
        let update = Rc::clone(c.update_scheduler());
        update.take();

        let record = c.record(LayerId(1)).unwrap();
        record.stale.set(false);

        record.render_scale_target.borrow_mut().set(4.0);
        assert!(c.record(LayerId(1)).unwrap().is_stale());
        assert!(update.is_scheduled());

        update.take();
        c.record(LayerId(1))
            .unwrap()
            .local_position
            .borrow_mut()
            .set(Vec3::new(1.0, 0.0, 0.0));
        assert!(update.is_scheduled());
    }

    #[test]
    fn dispose_removes_every_layer() {
        let mut registry = SourceRegistry::new();
        let id = register_source(&mut registry);
        let a = transformed(&mut registry, id);
        let b = transformed(&mut registry, id);

        let mut c = controller();
        c.add_visible_layer(LayerId(1), vec![vec![a]], &mut registry)
            .unwrap();
        c.add_visible_layer(LayerId(2), vec![vec![b]], &mut registry)
            .unwrap();

        c.dispose(&mut registry).unwrap();
        assert!(c.is_empty());
        assert_eq!(registry.ref_count(id), Some(1));
    }
}
