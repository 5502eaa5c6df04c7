// src/frustum.rs
//! Per-tile view frustums.
//!
//! One frustum per 16x16 pixel tile: four side planes through the view-space
//! origin, extended to infinite depth. The grid is generated by a compute
//! dispatch once at startup and again only when the projection or resolution
//! changes; nothing per-frame depends on re-running it, so the bootstrap is
//! gated by a host-side wait instead of a pipeline dependency.
//!
//! The Rust functions here mirror the WGSL exactly and back both the tests
//! and the CPU culling simulation in `sim`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::buffers::PairedBuffer;
use crate::error::{Error, Result};
use crate::{TILE_SIZE, TILES_PER_GROUP};

/// Four side planes of one tile, each `(normal.xyz, distance)` in view space.
/// All planes pass through the origin, so distance is always zero; only the
/// normal direction distinguishes "inside".
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Frustum {
    pub planes: [[f32; 4]; 4],
}

/// Number of tiles needed to cover `screen` pixels along one axis.
#[inline]
pub fn tiles_for(pixels: u32) -> u32 {
    (pixels + TILE_SIZE - 1) / TILE_SIZE
}

/// Screen pixel -> NDC. Screen y grows downward, NDC y grows upward.
#[inline]
pub fn pixel_to_ndc(pixel: Vec2, screen: Vec2) -> Vec2 {
    Vec2::new(
        2.0 * pixel.x / screen.x - 1.0,
        1.0 - 2.0 * pixel.y / screen.y,
    )
}

/// Unproject an NDC point on the far plane into a view-space ray direction
/// (not normalized; all uses renormalize).
#[inline]
pub fn unproject(inv_proj: &Mat4, ndc: Vec2) -> Vec3 {
    let v = *inv_proj * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
    v.xyz() / v.w
}

/// Plane through the origin containing rays `a` and `b`, oriented so points
/// between the tile's corner rays get a non-negative signed distance.
#[inline]
pub fn plane_through_origin(a: Vec3, b: Vec3) -> Vec4 {
    let n = a.cross(b).normalize();
    Vec4::new(n.x, n.y, n.z, 0.0)
}

/// Build the frustum for tile `(tx, ty)`.
///
/// Corners are taken clockwise in screen space (top-left, top-right,
/// bottom-right, bottom-left); with the NDC y-flip that ordering makes
/// `cross(ray_i, ray_i+1)` point into the tile's volume.
pub fn tile_frustum(inv_proj: &Mat4, tx: u32, ty: u32, screen: Vec2) -> Frustum {
    let ts = TILE_SIZE as f32;
    let x0 = tx as f32 * ts;
    let y0 = ty as f32 * ts;
    let corners = [
        Vec2::new(x0, y0),
        Vec2::new(x0 + ts, y0),
        Vec2::new(x0 + ts, y0 + ts),
        Vec2::new(x0, y0 + ts),
    ];

    let mut rays = [Vec3::ZERO; 4];
    for (ray, corner) in rays.iter_mut().zip(corners) {
        *ray = unproject(inv_proj, pixel_to_ndc(corner, screen));
    }

    let mut planes = [[0.0f32; 4]; 4];
    for i in 0..4 {
        planes[i] = plane_through_origin(rays[i], rays[(i + 1) % 4]).to_array();
    }
    Frustum { planes }
}

/// Conservative sphere test: inside unless fully behind one plane.
#[inline]
pub fn sphere_inside(frustum: &Frustum, center: Vec3, radius: f32) -> bool {
    frustum.planes.iter().all(|p| {
        let d = p[0] * center.x + p[1] * center.y + p[2] * center.z + p[3];
        d >= -radius
    })
}

/// Compute the whole grid on the host. Used by tests and the culling
/// simulation; the renderer itself generates the grid on the GPU.
pub fn grid_on_host(inv_proj: &Mat4, screen: Vec2) -> Vec<Frustum> {
    let (tiles_x, tiles_y) = (tiles_for(screen.x as u32), tiles_for(screen.y as u32));
    let mut out = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            out.push(tile_frustum(inv_proj, tx, ty, screen));
        }
    }
    out
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GenParams {
    inv_proj: [[f32; 4]; 4],
    screen_size: [f32; 2],
    tile_count: [u32; 2],
}

/// GPU frustum grid: the storage buffer the culling stage binds, plus the
/// compute pipeline that fills it.
pub struct FrustumGrid {
    buffer: wgpu::Buffer,
    params: PairedBuffer,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    tiles_x: u32,
    tiles_y: u32,
}

impl FrustumGrid {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        let (tiles_x, tiles_y) = (tiles_for(width), tiles_for(height));
        let buffer = Self::create_storage(device, tiles_x, tiles_y);
        let params = PairedBuffer::uniform(
            device,
            "frustum_gen_params",
            std::mem::size_of::<GenParams>() as u64,
        )?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frustum_grid_cs"),
            source: wgpu::ShaderSource::Wgsl(FRUSTUM_GRID_WGSL.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frustum_grid_bgl"),
                entries: &[
                    // 0: generation params (inverse projection, dimensions)
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // 1: frustum storage, written here, read by culling
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frustum_grid_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("frustum_grid_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let bind_group = Self::create_bind_group(device, &bind_group_layout, &params, &buffer);

        Ok(Self {
            buffer,
            params,
            pipeline,
            bind_group_layout,
            bind_group,
            tiles_x,
            tiles_y,
        })
    }

    fn create_storage(device: &wgpu::Device, tiles_x: u32, tiles_y: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frustum_buffer"),
            size: (tiles_x as u64)
                * (tiles_y as u64)
                * std::mem::size_of::<Frustum>() as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params: &PairedBuffer,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frustum_grid_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Fill the grid for the given projection and submit immediately.
    ///
    /// Blocks the host until the dispatch completes; this runs outside the
    /// frame loop (startup and resize only), so pipelining is irrelevant and
    /// a fence-style wait is the simplest correct gate.
    pub fn generate(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        proj: &Mat4,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let params = GenParams {
            inv_proj: proj.inverse().to_cols_array_2d(),
            screen_size: [width as f32, height as f32],
            tile_count: [self.tiles_x, self.tiles_y],
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frustum_grid_encoder"),
        });
        self.params
            .upload(queue, &mut encoder, bytemuck::bytes_of(&params))
            .map_err(|e| Error::setup("frustum generation params", e))?;
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("frustum_grid_pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, &self.bind_group, &[]);
            let gx = (self.tiles_x + TILES_PER_GROUP - 1) / TILES_PER_GROUP;
            let gy = (self.tiles_y + TILES_PER_GROUP - 1) / TILES_PER_GROUP;
            cpass.dispatch_workgroups(gx, gy, 1);
        }
        queue.submit(Some(encoder.finish()));
        device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    /// Re-size the storage for a new resolution. Caller must `generate`
    /// afterwards and rebuild any bind group referencing the old buffer.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.tiles_x = tiles_for(width);
        self.tiles_y = tiles_for(height);
        self.buffer = Self::create_storage(device, self.tiles_x, self.tiles_y);
        self.bind_group =
            Self::create_bind_group(device, &self.bind_group_layout, &self.params, &self.buffer);
    }

    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    pub fn tile_count(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }
}

/// One thread per tile; mirrors `tile_frustum` above.
pub const FRUSTUM_GRID_WGSL: &str = r#"
struct GenParams {
    inv_proj: mat4x4<f32>,
    screen_size: vec2<f32>,
    tile_count: vec2<u32>,
}

struct TileFrustum {
    planes: array<vec4<f32>, 4>,
}

@group(0) @binding(0) var<uniform> params: GenParams;
@group(0) @binding(1) var<storage, read_write> frustums: array<TileFrustum>;

const TILE_SIZE: f32 = 16.0;

fn pixel_to_ndc(pixel: vec2<f32>) -> vec2<f32> {
    return vec2<f32>(
        2.0 * pixel.x / params.screen_size.x - 1.0,
        1.0 - 2.0 * pixel.y / params.screen_size.y,
    );
}

fn unproject(ndc: vec2<f32>) -> vec3<f32> {
    let v = params.inv_proj * vec4<f32>(ndc, 1.0, 1.0);
    return v.xyz / v.w;
}

fn plane_through_origin(a: vec3<f32>, b: vec3<f32>) -> vec4<f32> {
    let n = normalize(cross(a, b));
    return vec4<f32>(n, 0.0);
}

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let tx = gid.x;
    let ty = gid.y;
    if (tx >= params.tile_count.x || ty >= params.tile_count.y) {
        return;
    }

    let x0 = f32(tx) * TILE_SIZE;
    let y0 = f32(ty) * TILE_SIZE;

    // Clockwise in screen space: TL, TR, BR, BL.
    var rays: array<vec3<f32>, 4>;
    rays[0] = unproject(pixel_to_ndc(vec2<f32>(x0, y0)));
    rays[1] = unproject(pixel_to_ndc(vec2<f32>(x0 + TILE_SIZE, y0)));
    rays[2] = unproject(pixel_to_ndc(vec2<f32>(x0 + TILE_SIZE, y0 + TILE_SIZE)));
    rays[3] = unproject(pixel_to_ndc(vec2<f32>(x0, y0 + TILE_SIZE)));

    let idx = tx + ty * params.tile_count.x;
    frustums[idx].planes[0] = plane_through_origin(rays[0], rays[1]);
    frustums[idx].planes[1] = plane_through_origin(rays[1], rays[2]);
    frustums[idx].planes[2] = plane_through_origin(rays[2], rays[3]);
    frustums[idx].planes[3] = plane_through_origin(rays[3], rays[0]);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_proj() -> Mat4 {
        Mat4::perspective_rh(45f32.to_radians(), 1280.0 / 720.0, 50.0, 3000.0)
    }

    #[test]
    fn center_ray_is_inside_every_tile_frustum() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let screen = Vec2::new(1280.0, 720.0);

        for ty in 0..tiles_for(720) {
            for tx in 0..tiles_for(1280) {
                let frustum = tile_frustum(&inv_proj, tx, ty, screen);
                let center = Vec2::new(
                    (tx as f32 + 0.5) * TILE_SIZE as f32,
                    (ty as f32 + 0.5) * TILE_SIZE as f32,
                );
                let ray = unproject(&inv_proj, pixel_to_ndc(center, screen)).normalize();
                for depth in [0.1f32, 1.0, 100.0, 2999.0] {
                    let point = ray * depth;
                    assert!(
                        sphere_inside(&frustum, point, 0.0),
                        "tile ({tx},{ty}) rejects its own center ray at depth {depth}"
                    );
                }
            }
        }
    }

    #[test]
    fn neighboring_tile_center_is_outside() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let screen = Vec2::new(1280.0, 720.0);

        // Center ray of tile (10, 10) must not be inside tile (20, 10).
        let frustum = tile_frustum(&inv_proj, 20, 10, screen);
        let center = Vec2::new(10.5 * TILE_SIZE as f32, 10.5 * TILE_SIZE as f32);
        let point = unproject(&inv_proj, pixel_to_ndc(center, screen)).normalize() * 500.0;
        assert!(!sphere_inside(&frustum, point, 0.0));
    }

    #[test]
    fn generation_is_idempotent() {
        let proj = test_proj();
        let inv_proj = proj.inverse();
        let screen = Vec2::new(1280.0, 720.0);
        let a = grid_on_host(&inv_proj, screen);
        let b = grid_on_host(&inv_proj, screen);
        assert_eq!(
            bytemuck::cast_slice::<Frustum, u8>(&a),
            bytemuck::cast_slice::<Frustum, u8>(&b),
            "identical inputs must reproduce bit-identical frustums"
        );
    }

    #[test]
    fn planes_pass_through_origin() {
        let proj = test_proj();
        let frustum = tile_frustum(&proj.inverse(), 3, 7, Vec2::new(1280.0, 720.0));
        for p in frustum.planes {
            assert_eq!(p[3], 0.0);
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5, "plane normal not unit length");
        }
    }

    #[test]
    fn wgsl_embeds_host_tile_size() {
        assert!(FRUSTUM_GRID_WGSL.contains("const TILE_SIZE: f32 = 16.0"));
        assert_eq!(TILE_SIZE, 16);
    }
}
