// src/scene.rs
//! Demo scene: interleaved vertex/index buffers plus per-material draw
//! groups.
//!
//! Geometry is procedural (a floor slab and a field of pillars sized to the
//! light distribution) with world positions baked into the vertices, so no
//! per-object model matrix is needed. Draws are grouped by material; every
//! group shares the same frame bind group and therefore the same per-tile
//! light lists.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::texture::Texture;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Contiguous index range drawn with one material.
pub struct DrawGroup {
    pub material: usize,
    pub index_range: std::ops::Range<u32>,
}

pub struct Material {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, texture: Texture) -> Self {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });
        Self {
            texture,
            bind_group,
        }
    }
}

pub struct Scene {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    materials: Vec<Material>,
    draws: Vec<DrawGroup>,
    index_count: u32,
}

struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// One quad with outward normal `n`, corners counter-clockwise seen from
    /// the normal side.
    fn quad(&mut self, corners: [Vec3; 4], n: Vec3, uv_scale: Vec2) {
        let base = self.vertices.len() as u32;
        let uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(uv_scale.x, 0.0),
            Vec2::new(uv_scale.x, uv_scale.y),
            Vec2::new(0.0, uv_scale.y),
        ];
        for (c, uv) in corners.iter().zip(uvs) {
            self.vertices.push(Vertex {
                position: c.to_array(),
                normal: n.to_array(),
                tex_coord: uv.to_array(),
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    fn push_box(&mut self, center: Vec3, half: Vec3) {
        let (c, h) = (center, half);
        let p = |sx: f32, sy: f32, sz: f32| c + Vec3::new(sx * h.x, sy * h.y, sz * h.z);
        // +X, -X, +Y, -Y, +Z, -Z
        self.quad(
            [p(1., -1., 1.), p(1., -1., -1.), p(1., 1., -1.), p(1., 1., 1.)],
            Vec3::X,
            Vec2::ONE,
        );
        self.quad(
            [p(-1., -1., -1.), p(-1., -1., 1.), p(-1., 1., 1.), p(-1., 1., -1.)],
            -Vec3::X,
            Vec2::ONE,
        );
        self.quad(
            [p(-1., 1., 1.), p(1., 1., 1.), p(1., 1., -1.), p(-1., 1., -1.)],
            Vec3::Y,
            Vec2::ONE,
        );
        self.quad(
            [p(-1., -1., -1.), p(1., -1., -1.), p(1., -1., 1.), p(-1., -1., 1.)],
            -Vec3::Y,
            Vec2::ONE,
        );
        self.quad(
            [p(-1., -1., 1.), p(1., -1., 1.), p(1., 1., 1.), p(-1., 1., 1.)],
            Vec3::Z,
            Vec2::ONE,
        );
        self.quad(
            [p(1., -1., -1.), p(-1., -1., -1.), p(-1., 1., -1.), p(1., 1., -1.)],
            -Vec3::Z,
            Vec2::ONE,
        );
    }
}

impl Scene {
    /// Build the demo scene and its materials.
    pub fn demo(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self> {
        let mut builder = MeshBuilder::new();

        // Floor slab spanning the lit volume.
        let floor_start = builder.indices.len() as u32;
        builder.quad(
            [
                Vec3::new(-2600.0, 0.0, -300.0),
                Vec3::new(2600.0, 0.0, -300.0),
                Vec3::new(2600.0, 0.0, 300.0),
                Vec3::new(-2600.0, 0.0, 300.0),
            ],
            Vec3::Y,
            Vec2::new(32.0, 4.0),
        );
        let floor_end = builder.indices.len() as u32;

        // Pillar field down the hall.
        let pillars_start = floor_end;
        for i in 0..24 {
            let x = -2300.0 + i as f32 * 200.0;
            for &z in &[-220.0f32, 220.0] {
                let height = 180.0 + ((i * 7) % 5) as f32 * 60.0;
                builder.push_box(
                    Vec3::new(x, height / 2.0, z),
                    Vec3::new(40.0, height / 2.0, 40.0),
                );
            }
        }
        let pillars_end = builder.indices.len() as u32;

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_vertex_buffer"),
            contents: bytemuck::cast_slice(&builder.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_index_buffer"),
            contents: bytemuck::cast_slice(&builder.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let materials = vec![
            Material::new(
                device,
                material_layout,
                checker_texture(device, queue, "floor_texture")?,
            ),
            Material::new(
                device,
                material_layout,
                Texture::solid(device, queue, "pillar_texture", [168, 158, 146, 255])?,
            ),
        ];

        let draws = vec![
            DrawGroup {
                material: 0,
                index_range: floor_start..floor_end,
            },
            DrawGroup {
                material: 1,
                index_range: pillars_start..pillars_end,
            },
        ];

        Ok(Self {
            index_count: builder.indices.len() as u32,
            vertex_buffer,
            index_buffer,
            materials,
            draws,
        })
    }

    /// Bind geometry and draw every index (depth pre-pass, no materials).
    pub fn draw_depth_only<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Bind geometry and draw each group with its material at group 1.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) -> Result<()> {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for group in &self.draws {
            let material = self
                .materials
                .get(group.material)
                .ok_or_else(|| Error::custom(format!("missing material {}", group.material)))?;
            pass.set_bind_group(1, &material.bind_group, &[]);
            pass.draw_indexed(group.index_range.clone(), 0, 0..1);
        }
        Ok(())
    }
}

fn checker_texture(device: &wgpu::Device, queue: &wgpu::Queue, label: &str) -> Result<Texture> {
    const N: u32 = 64;
    let mut pixels = Vec::with_capacity((N * N * 4) as usize);
    for y in 0..N {
        for x in 0..N {
            let dark = ((x / 8) + (y / 8)) % 2 == 0;
            let v = if dark { 70 } else { 190 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    Texture::from_rgba8(device, queue, label, &pixels, N, N)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn box_builder_emits_closed_mesh() {
        let mut b = MeshBuilder::new();
        b.push_box(Vec3::ZERO, Vec3::ONE);
        assert_eq!(b.vertices.len(), 24);
        assert_eq!(b.indices.len(), 36);
        // Every index in range, every face wound with its own normal.
        assert!(b.indices.iter().all(|&i| (i as usize) < b.vertices.len()));
    }

    #[test]
    fn box_normals_point_away_from_center() {
        let mut b = MeshBuilder::new();
        b.push_box(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE);
        for v in &b.vertices {
            let offset = Vec3::from_array(v.position) - Vec3::new(10.0, 0.0, 0.0);
            let n = Vec3::from_array(v.normal);
            assert!(offset.dot(n) > 0.0, "normal {n} faces inward at {offset}");
        }
    }
}
