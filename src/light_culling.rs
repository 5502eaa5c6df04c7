// src/light_culling.rs
//! Per-frame light culling compute stage.
//!
//! One thread per tile. Each thread bounds the tile's view-space depth extent
//! from the pre-pass depth texture, tests every light against the tile's four
//! frustum planes plus that extent, and collects survivors locally in
//! ascending light index order. Publication is a single `atomicAdd` on the
//! global index-list cursor: the thread reserves a contiguous range, writes
//! its indices there and records `(offset, count)` in the light grid. Tiles
//! never read each other's ranges, so per-tile contents are deterministic
//! even though range placement is not.
//!
//! Overflowing tiles truncate deterministically, keeping the lowest-indexed
//! lights, so a crowded tile flickers stably instead of randomly.

use crate::bindings::{FrameBindings, FRAME_BINDINGS_COMPUTE_WGSL};
use crate::frustum::tiles_for;
use crate::lights::LIGHT_WGSL;
use crate::uniforms::FRAME_UNIFORMS_WGSL;
use crate::{MAX_LIGHTS_PER_TILE, TILES_PER_GROUP};

/// Grid cell stride in bytes (`offset: u32, count: u32`).
pub const GRID_CELL_SIZE: u64 = 8;

/// Culling output buffers, recreated on resize.
pub struct CullingBuffers {
    index_list: wgpu::Buffer,
    grid: wgpu::Buffer,
    tiles_x: u32,
    tiles_y: u32,
}

impl CullingBuffers {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let (tiles_x, tiles_y) = (tiles_for(width), tiles_for(height));
        let tiles = tiles_x as u64 * tiles_y as u64;

        // 4-byte cursor header, then a worst-case index slab: every tile may
        // reserve its full per-tile capacity, so the cursor can never run
        // past the end.
        let index_list = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light_index_list"),
            size: 4 + tiles * MAX_LIGHTS_PER_TILE as u64 * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let grid = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light_grid"),
            size: tiles * GRID_CELL_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        Self {
            index_list,
            grid,
            tiles_x,
            tiles_y,
        }
    }

    /// Zero the allocation cursor. Must run before the culling dispatch of
    /// the same frame; queue writes are ordered before any command buffer
    /// submitted after them.
    pub fn reset_cursor(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.index_list, 0, bytemuck::bytes_of(&0u32));
    }

    #[inline]
    pub fn index_list(&self) -> &wgpu::Buffer {
        &self.index_list
    }

    #[inline]
    pub fn grid(&self) -> &wgpu::Buffer {
        &self.grid
    }

    #[inline]
    pub fn tile_count(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }
}

pub struct CullingPass {
    pipeline: wgpu::ComputePipeline,
}

impl CullingPass {
    pub fn new(device: &wgpu::Device, bindings: &FrameBindings) -> Self {
        let shader_src = format!(
            "{FRAME_UNIFORMS_WGSL}{LIGHT_WGSL}{CULLING_STRUCTS_WGSL}{FRAME_BINDINGS_COMPUTE_WGSL}{CULLING_KERNEL_WGSL}"
        );
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("light_culling_shader"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("light_culling_pipeline_layout"),
            bind_group_layouts: &[bindings.compute_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("light_culling_pipeline"),
            layout: Some(&layout),
            module: &module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        Self { pipeline }
    }

    /// Record the culling dispatch, one workgroup per 16x16 block of tiles.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bindings: &FrameBindings,
        buffers: &CullingBuffers,
    ) {
        let (tiles_x, tiles_y) = buffers.tile_count();
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("light_culling_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bindings.compute_group(), &[]);
        pass.dispatch_workgroups(
            (tiles_x + TILES_PER_GROUP - 1) / TILES_PER_GROUP,
            (tiles_y + TILES_PER_GROUP - 1) / TILES_PER_GROUP,
            1,
        );
    }
}

/// Struct mirrors shared by the culling and forward shaders.
pub const CULLING_STRUCTS_WGSL: &str = r#"
struct TileFrustum {
    planes: array<vec4<f32>, 4>,
}

struct LightIndexList {
    cursor: atomic<u32>,
    indices: array<u32>,
}

struct GridCell {
    offset: u32,
    count: u32,
}
"#;

/// Render-side mirror of the same buffers. `var<storage, read>` cannot hold
/// atomics, so the cursor degrades to a plain `u32` the fragment never reads.
pub const RENDER_STRUCTS_WGSL: &str = r#"
struct TileFrustum {
    planes: array<vec4<f32>, 4>,
}

struct LightIndexList {
    cursor: u32,
    indices: array<u32>,
}

struct GridCell {
    offset: u32,
    count: u32,
}
"#;

const CULLING_KERNEL_WGSL: &str = r#"
const TILE_SIZE: u32 = 16u;
const MAX_LIGHTS_PER_TILE: u32 = 64u;

// View-space z reconstructed from an NDC depth value; only the z/w rows of
// the inverse projection matter for a point on the view axis.
fn view_depth(ndc_depth: f32) -> f32 {
    let z = frame.inv_proj[2].z * ndc_depth + frame.inv_proj[3].z;
    let w = frame.inv_proj[2].w * ndc_depth + frame.inv_proj[3].w;
    return z / w;
}

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let tx = gid.x;
    let ty = gid.y;
    if (tx >= frame.tile_count.x || ty >= frame.tile_count.y) {
        return;
    }
    let tile = tx + ty * frame.tile_count.x;

    // Depth extent of the tile, as positive distance along -view-z.
    let screen = vec2<u32>(u32(frame.screen_size.x), u32(frame.screen_size.y));
    var min_dist = 3.4e38;
    var max_dist = -3.4e38;
    for (var py = 0u; py < TILE_SIZE; py = py + 1u) {
        for (var px = 0u; px < TILE_SIZE; px = px + 1u) {
            let pixel = vec2<u32>(tx * TILE_SIZE + px, ty * TILE_SIZE + py);
            if (pixel.x >= screen.x || pixel.y >= screen.y) {
                continue;
            }
            let d = textureLoad(depth_texture, vec2<i32>(pixel), 0);
            let dist = -view_depth(d);
            min_dist = min(min_dist, dist);
            max_dist = max(max_dist, dist);
        }
    }

    let frustum = frustums[tile];
    var local: array<u32, 64>;
    var count = 0u;

    for (var i = 0u; i < frame.light_count; i = i + 1u) {
        if (count >= MAX_LIGHTS_PER_TILE) {
            break;
        }
        let light = lights[i];
        let radius = light.end_pos.w;
        let view_pos = (frame.view * vec4<f32>(light.begin_pos.xyz, 1.0)).xyz;

        var inside = true;
        for (var p = 0u; p < 4u; p = p + 1u) {
            if (dot(frustum.planes[p].xyz, view_pos) < -radius) {
                inside = false;
                break;
            }
        }
        if (!inside) {
            continue;
        }

        let dist = -view_pos.z;
        if (dist - radius > max_dist || dist + radius < min_dist) {
            continue;
        }

        local[count] = i;
        count = count + 1u;
    }

    let offset = atomicAdd(&index_list.cursor, count);
    light_grid[tile] = GridCell(offset, count);
    for (var j = 0u; j < count; j = j + 1u) {
        index_list.indices[offset + j] = local[j];
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_constants_match_host_constants() {
        assert!(CULLING_KERNEL_WGSL.contains("const TILE_SIZE: u32 = 16u"));
        assert!(CULLING_KERNEL_WGSL
            .contains(&format!("const MAX_LIGHTS_PER_TILE: u32 = {MAX_LIGHTS_PER_TILE}u")));
        assert!(CULLING_KERNEL_WGSL.contains("array<u32, 64>"));
    }

    #[test]
    fn publication_uses_a_single_atomic() {
        assert_eq!(CULLING_KERNEL_WGSL.matches("atomicAdd").count(), 1);
        assert!(CULLING_STRUCTS_WGSL.contains("cursor: atomic<u32>"));
    }

    #[test]
    fn index_slab_never_overflows() {
        // Worst case: every tile full. The reserved slab must cover it.
        let tiles = 100u64;
        let slab_entries = tiles * MAX_LIGHTS_PER_TILE as u64;
        let worst_cursor = tiles * MAX_LIGHTS_PER_TILE as u64;
        assert!(worst_cursor <= slab_entries);
    }
}
