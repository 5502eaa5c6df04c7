// src/frame_graph.rs
//! Declarative per-frame stage graph.
//!
//! Each frame runs a fixed sequence of stages with known resource reads and
//! writes. Instead of scattering that knowledge through the orchestrator as
//! implicit recording order, the graph states it once and `validate` checks
//! the invariant the renderer depends on: no stage reads a resource that
//! neither an earlier stage in the same frame nor a persistent producer has
//! written. The orchestrator builds its canonical graph at startup and
//! refuses to run if validation fails, which turns stage-reordering mistakes
//! into an immediate startup error instead of a GPU race.

use crate::error::{Error, Result};

/// Every GPU resource the per-frame stages exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Uniforms,
    Lights,
    Cursor,
    Frustums,
    Depth,
    IndexList,
    Grid,
    Color,
}

impl Resource {
    pub const fn name(self) -> &'static str {
        match self {
            Resource::Uniforms => "uniforms",
            Resource::Lights => "lights",
            Resource::Cursor => "cursor",
            Resource::Frustums => "frustums",
            Resource::Depth => "depth",
            Resource::IndexList => "index_list",
            Resource::Grid => "grid",
            Resource::Color => "color",
        }
    }
}

pub struct Stage {
    pub name: &'static str,
    pub reads: &'static [Resource],
    pub writes: &'static [Resource],
}

pub struct FrameGraph {
    stages: Vec<Stage>,
    /// Resources produced outside the frame loop (startup/resize) that count
    /// as written before the first stage.
    persistent: Vec<Resource>,
}

impl FrameGraph {
    pub fn new(stages: Vec<Stage>, persistent: Vec<Resource>) -> Self {
        Self { stages, persistent }
    }

    /// The canonical forward-plus frame.
    pub fn forward_plus() -> Self {
        use Resource::*;
        Self::new(
            vec![
                Stage {
                    name: "upload",
                    reads: &[],
                    writes: &[Uniforms, Lights, Cursor],
                },
                Stage {
                    name: "depth_prepass",
                    reads: &[Uniforms],
                    writes: &[Depth],
                },
                Stage {
                    name: "light_culling",
                    reads: &[Uniforms, Lights, Frustums, Depth, Cursor],
                    writes: &[IndexList, Grid],
                },
                Stage {
                    name: "forward",
                    reads: &[Uniforms, Lights, IndexList, Grid],
                    writes: &[Color],
                },
                Stage {
                    name: "present",
                    reads: &[Color],
                    writes: &[],
                },
            ],
            vec![Frustums],
        )
    }

    /// Check the frame's ordering contract. Returns the first violation.
    ///
    /// Two rules:
    /// - read-after-write: every read must be preceded by that resource's
    ///   write in the same frame, or by a persistent producer;
    /// - write-after-read: once any stage has read a resource, no later
    ///   stage in the frame may write it. Per-frame resources are
    ///   single-generation (not double-buffered), and the frame's stage
    ///   list repeats in queue order, so this rule is what guarantees the
    ///   previous frame's readers (the forward pass consuming the culling
    ///   outputs) complete before the next frame's writer touches them.
    pub fn validate(&self) -> Result<()> {
        let mut written: Vec<Resource> = self.persistent.clone();
        let mut read: Vec<Resource> = Vec::new();
        for stage in &self.stages {
            for &write in stage.writes {
                if read.contains(&write) {
                    return Err(Error::Hazard {
                        stage: stage.name,
                        resource: write.name(),
                    });
                }
            }
            for &r in stage.reads {
                if !written.contains(&r) {
                    return Err(Error::Ordering {
                        stage: stage.name,
                        resource: r.name(),
                    });
                }
            }
            written.extend_from_slice(stage.writes);
            read.extend_from_slice(stage.reads);
        }
        Ok(())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Resource::*;

    #[test]
    fn canonical_graph_validates() {
        FrameGraph::forward_plus().validate().unwrap();
    }

    #[test]
    fn culling_before_depth_is_rejected() {
        // Swap depth_prepass and light_culling: culling now reads depth
        // before anything wrote it.
        let graph = FrameGraph::new(
            vec![
                Stage {
                    name: "upload",
                    reads: &[],
                    writes: &[Uniforms, Lights, Cursor],
                },
                Stage {
                    name: "light_culling",
                    reads: &[Uniforms, Lights, Frustums, Depth, Cursor],
                    writes: &[IndexList, Grid],
                },
                Stage {
                    name: "depth_prepass",
                    reads: &[Uniforms],
                    writes: &[Depth],
                },
            ],
            vec![Frustums],
        );
        match graph.validate() {
            Err(Error::Ordering { stage, resource }) => {
                assert_eq!(stage, "light_culling");
                assert_eq!(resource, "depth");
            }
            other => panic!("expected ordering error, got {other:?}"),
        }
    }

    #[test]
    fn forward_before_culling_is_rejected() {
        let graph = FrameGraph::new(
            vec![
                Stage {
                    name: "upload",
                    reads: &[],
                    writes: &[Uniforms, Lights, Cursor],
                },
                Stage {
                    name: "forward",
                    reads: &[Uniforms, Lights, IndexList, Grid],
                    writes: &[Color],
                },
            ],
            vec![Frustums],
        );
        assert!(matches!(
            graph.validate(),
            Err(Error::Ordering { stage: "forward", .. })
        ));
    }

    #[test]
    fn rewriting_culling_outputs_after_forward_read_is_rejected() {
        // The culling outputs are single-generation. A second culling
        // dispatch recorded after the forward pass would clobber the lists
        // the previous generation's reader depends on, which is the same
        // hazard the cross-frame write-after-read rule guards against.
        let mut graph = FrameGraph::forward_plus();
        graph.stages.push(Stage {
            name: "light_culling_late",
            reads: &[Uniforms, Lights, Frustums, Depth, Cursor],
            writes: &[IndexList, Grid],
        });
        match graph.validate() {
            Err(Error::Hazard { stage, resource }) => {
                assert_eq!(stage, "light_culling_late");
                assert_eq!(resource, "index_list");
            }
            other => panic!("expected hazard error, got {other:?}"),
        }
    }

    #[test]
    fn frustums_count_as_persistent() {
        // Without the persistent set, culling's frustum read would fail even
        // in the canonical order.
        let mut graph = FrameGraph::forward_plus();
        graph.persistent.clear();
        assert!(matches!(
            graph.validate(),
            Err(Error::Ordering {
                resource: "frustums",
                ..
            })
        ));
    }
}
