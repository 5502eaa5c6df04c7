// src/uniforms.rs
//! Per-frame uniform block shared by the depth pre-pass, the culling compute
//! stage and the forward pass.
//!
//! The original design carried three near-identical per-stage snapshots of
//! this data; one block at one binding replaces them. Field order matters:
//! it must match the WGSL `FrameUniforms` struct in every shader, and the
//! vec4/mat4 members come first so std140-style alignment works out without
//! interior padding surprises.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::camera::FrameContext;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    /// xyz = camera position, w unused.
    pub camera_pos: [f32; 4],
    /// Screen size in pixels.
    pub screen_size: [f32; 2],
    /// Tile grid dimensions (tiles_x, tiles_y).
    pub tile_count: [u32; 2],
    pub light_count: u32,
    /// Seconds since startup; drives the light animation on the GPU debug path
    /// and time-based shading effects.
    pub time: f32,
    /// Fragment debug view selector (0 = shaded, 1 = tile heat map, 2 = depth).
    pub debug_mode: u32,
    pub _pad: u32,
}

impl FrameUniforms {
    pub fn new(
        ctx: &FrameContext,
        screen_size: (u32, u32),
        tile_count: (u32, u32),
        light_count: u32,
    ) -> Self {
        // Precondition: the projection is invertible. A singular matrix yields
        // degenerate frustums downstream and is not detected here.
        let inv_proj = ctx.proj.inverse();
        Self {
            view: ctx.view.to_cols_array_2d(),
            proj: ctx.proj.to_cols_array_2d(),
            inv_proj: inv_proj.to_cols_array_2d(),
            camera_pos: [
                ctx.camera_position.x,
                ctx.camera_position.y,
                ctx.camera_position.z,
                1.0,
            ],
            screen_size: [screen_size.0 as f32, screen_size.1 as f32],
            tile_count: [tile_count.0, tile_count.1],
            light_count,
            time: ctx.time,
            debug_mode: ctx.debug_mode,
            _pad: 0,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub const SIZE: u64 = std::mem::size_of::<FrameUniforms>() as u64;
}

/// WGSL mirror of [`FrameUniforms`], spliced into every shader that binds it.
pub const FRAME_UNIFORMS_WGSL: &str = r#"
struct FrameUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    screen_size: vec2<f32>,
    tile_count: vec2<u32>,
    light_count: u32,
    time: f32,
    debug_mode: u32,
    _pad: u32,
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_size_is_stable() {
        // 3 mat4 + 1 vec4 + vec2f + vec2u + 4 u32/f32 scalars
        assert_eq!(FrameUniforms::SIZE, 3 * 64 + 16 + 8 + 8 + 16);
    }

    #[test]
    fn wgsl_mirror_names_every_field() {
        for field in [
            "view",
            "proj",
            "inv_proj",
            "camera_pos",
            "screen_size",
            "tile_count",
            "light_count",
            "time",
            "debug_mode",
        ] {
            assert!(
                FRAME_UNIFORMS_WGSL.contains(field),
                "missing field {field} in WGSL mirror"
            );
        }
    }
}
