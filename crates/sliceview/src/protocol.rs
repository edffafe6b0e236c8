//! Wire format for the layer lifecycle events on the controller → worker
//! channel.
//!
//! Two events exist: "add visible layer" carrying a nested sequence of
//! scale descriptors (outer index = scale, coarsest first), and "remove
//! visible layer" carrying only the layer identifier. The channel itself is
//! transport-agnostic; ordering and per-object deduplication are its
//! responsibility, not this module's.

use serde::{Deserialize, Serialize};

use foundation::bounds::Box3;
use foundation::ids::{LayerId, ObjectId};
use foundation::vec::Vec3;

use crate::controller::{ControllerError, LayerController};
use crate::registry::SourceRegistry;
use crate::transformed::{ChunkTransform, SourceGeometry, TransformedSource};

/// Message from the controller side to the worker side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerMessage {
    AddVisibleLayer {
        layer: u64,
        scales: Vec<Vec<ScaleDescriptor>>,
    },
    RemoveVisibleLayer {
        layer: u64,
    },
}

/// Geometry of one (source, scale) binding as sent over the channel.
///
/// `source` references an already-registered chunk source by its opaque
/// shared-object id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleDescriptor {
    pub source: u64,
    pub layer_rank: usize,
    pub layout_size: [f64; 3],
    pub lower_clip_bound: [f64; 3],
    pub upper_clip_bound: [f64; 3],
    pub voxel_size: [f64; 3],
    #[serde(default = "identity_display_dimensions")]
    pub display_dimensions: [usize; 3],
    #[serde(default = "identity_scale")]
    pub transform_scale: [f64; 3],
    #[serde(default)]
    pub transform_offset: [f64; 3],
}

fn identity_display_dimensions() -> [usize; 3] {
    [0, 1, 2]
}

fn identity_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

fn vec3(a: [f64; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A descriptor referenced a source id never registered on this side.
    UnknownSource(ObjectId),
    Controller(ControllerError),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnknownSource(id) => {
                write!(f, "descriptor references unregistered source: {id}")
            }
            ProtocolError::Controller(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<ControllerError> for ProtocolError {
    fn from(err: ControllerError) -> Self {
        ProtocolError::Controller(err)
    }
}

/// Applies one decoded channel message to the receiving-side controller.
///
/// Every descriptor resolves its source id through `registry` and retains
/// it once. Resolution happens for the whole message before anything is
/// retained or the controller is touched, so an unknown id rejects the
/// message without side effects.
pub fn apply_message(
    controller: &mut LayerController,
    registry: &mut SourceRegistry,
    message: &LayerMessage,
) -> Result<(), ProtocolError> {
    match message {
        LayerMessage::AddVisibleLayer { layer, scales } => {
            for descriptor in scales.iter().flatten() {
                let id = ObjectId(descriptor.source);
                registry
                    .get(id)
                    .map_err(|_| ProtocolError::UnknownSource(id))?;
            }

            let mut groups = Vec::with_capacity(scales.len());
            for scale in scales {
                let mut group = Vec::with_capacity(scale.len());
                for descriptor in scale {
                    let id = ObjectId(descriptor.source);
                    let source = registry.get(id).expect("resolved above");
                    registry.retain(id).expect("resolved above");
                    group.push(TransformedSource::new(
                        id,
                        source,
                        SourceGeometry {
                            layout_size: vec3(descriptor.layout_size),
                            layer_rank: descriptor.layer_rank,
                            clip_bounds: Box3::new(
                                vec3(descriptor.lower_clip_bound),
                                vec3(descriptor.upper_clip_bound),
                            ),
                            effective_voxel_size: vec3(descriptor.voxel_size),
                            display_dimensions: descriptor.display_dimensions,
                            transform: ChunkTransform::new(
                                vec3(descriptor.transform_scale),
                                vec3(descriptor.transform_offset),
                            ),
                        },
                    ));
                }
                groups.push(group);
            }
            controller.add_visible_layer(LayerId(*layer), groups, registry)?;
            Ok(())
        }
        LayerMessage::RemoveVisibleLayer { layer } => {
            controller.remove_visible_layer(LayerId(*layer), registry)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_message, LayerMessage, ProtocolError};
    use crate::controller::LayerController;
    use crate::registry::SourceRegistry;
    use crate::source::{ChunkSource, ChunkSourceSpec};
    use foundation::ids::{LayerId, ObjectId};
    use foundation::vec::Vec3;
    use pretty_assertions::assert_eq;
    use runtime::schedule::UpdateScheduler;
    use std::rc::Rc;

    fn worker_side() -> (LayerController, SourceRegistry, ObjectId) {
        let mut registry = SourceRegistry::new();
        let id = registry.register(ChunkSource::new(ChunkSourceSpec::new(
            2,
            Vec3::new(10.0, 10.0, 0.0),
            1,
        )));
        (
            LayerController::new(Rc::new(UpdateScheduler::new())),
            registry,
            id,
        )
    }

    fn add_message(source: u64) -> String {
        format!(
            r#"{{
                "type": "add_visible_layer",
                "layer": 5,
                "scales": [[{{
                    "source": {source},
                    "layer_rank": 2,
                    "layout_size": [10.0, 10.0, 0.0],
                    "lower_clip_bound": [0.0, 0.0, 0.0],
                    "upper_clip_bound": [30.0, 20.0, 0.0],
                    "voxel_size": [1.0, 1.0, 1.0]
                }}]]
            }}"#
        )
    }

    #[test]
    fn add_message_materializes_transformed_sources() {
        let (mut controller, mut registry, id) = worker_side();
        let message: LayerMessage = serde_json::from_str(&add_message(id.0)).unwrap();

        apply_message(&mut controller, &mut registry, &message).unwrap();

        let record = controller.record(LayerId(5)).expect("layer registered");
        assert_eq!(record.all_sources().len(), 1);
        let ts = &record.all_sources()[0][0];
        assert_eq!(ts.source_id(), id);
        assert_eq!(ts.geometry.layout_size, Vec3::new(10.0, 10.0, 0.0));
        // Defaults fill the omitted mapping and transform.
        assert_eq!(ts.geometry.display_dimensions, [0, 1, 2]);
        assert_eq!(ts.geometry.transform.scale, Vec3::splat(1.0));
        assert_eq!(registry.ref_count(id), Some(2));
    }

    #[test]
    fn unknown_source_rejects_without_mutation() {
        let (mut controller, mut registry, _id) = worker_side();
        let message: LayerMessage = serde_json::from_str(&add_message(777)).unwrap();

        let err = apply_message(&mut controller, &mut registry, &message).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownSource(ObjectId(777)));
        assert!(controller.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_round_trip() {
        let (mut controller, mut registry, id) = worker_side();
        let add: LayerMessage = serde_json::from_str(&add_message(id.0)).unwrap();
        apply_message(&mut controller, &mut registry, &add).unwrap();

        let remove = LayerMessage::RemoveVisibleLayer { layer: 5 };
        let encoded = serde_json::to_string(&remove).unwrap();
        assert_eq!(encoded, r#"{"type":"remove_visible_layer","layer":5}"#);

        let decoded: LayerMessage = serde_json::from_str(&encoded).unwrap();
        apply_message(&mut controller, &mut registry, &decoded).unwrap();
        assert!(controller.is_empty());
        assert_eq!(registry.ref_count(id), Some(1));
    }

    #[test]
    fn removing_an_unknown_layer_surfaces_the_violation() {
        let (mut controller, mut registry, _id) = worker_side();
        let message = LayerMessage::RemoveVisibleLayer { layer: 9 };
        let err = apply_message(&mut controller, &mut registry, &message).unwrap_err();
        assert!(matches!(err, ProtocolError::Controller(_)));
    }
}
