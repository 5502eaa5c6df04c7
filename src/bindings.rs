// src/bindings.rs
//! The fixed binding table shared by every pipeline.
//!
//! Group 0 holds the per-frame resources at stable slots:
//!
//! - 0: frame uniforms
//! - 1: light buffer
//! - 2: frustum grid
//! - 3: light index list (cursor + indices)
//! - 4: light grid
//! - 5: depth texture (compute layout only)
//!
//! The render and compute layouts differ in two ways forced by the API: the
//! forward pass cannot bind the depth texture it just wrote as an attachment,
//! and fragment stages see the culling outputs read-only while the compute
//! stage writes them. Group 1 is the per-material group (texture + sampler).

use crate::buffers::PairedBuffer;
use crate::frustum::FrustumGrid;
use crate::lights::LightField;

fn buffer_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    ty: wgpu::BufferBindingType,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Group 0 layouts and the bind groups instantiating them.
pub struct FrameBindings {
    render_layout: wgpu::BindGroupLayout,
    compute_layout: wgpu::BindGroupLayout,
    render_group: wgpu::BindGroup,
    compute_group: wgpu::BindGroup,
}

impl FrameBindings {
    pub fn new(
        device: &wgpu::Device,
        uniforms: &PairedBuffer,
        lights: &LightField,
        frustums: &FrustumGrid,
        index_list: &wgpu::Buffer,
        grid: &wgpu::Buffer,
        depth_view: &wgpu::TextureView,
    ) -> Self {
        let vs_fs = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let cs = wgpu::ShaderStages::COMPUTE;
        let read_only = wgpu::BufferBindingType::Storage { read_only: true };
        let read_write = wgpu::BufferBindingType::Storage { read_only: false };

        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_render_bgl"),
            entries: &[
                buffer_entry(0, vs_fs, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, wgpu::ShaderStages::FRAGMENT, read_only),
                buffer_entry(2, wgpu::ShaderStages::FRAGMENT, read_only),
                buffer_entry(3, wgpu::ShaderStages::FRAGMENT, read_only),
                buffer_entry(4, wgpu::ShaderStages::FRAGMENT, read_only),
            ],
        });

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_compute_bgl"),
            entries: &[
                buffer_entry(0, cs, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, cs, read_only),
                buffer_entry(2, cs, read_only),
                buffer_entry(3, cs, read_write),
                buffer_entry(4, cs, read_write),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: cs,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let (render_group, compute_group) = Self::create_groups(
            device,
            &render_layout,
            &compute_layout,
            uniforms,
            lights,
            frustums,
            index_list,
            grid,
            depth_view,
        );

        Self {
            render_layout,
            compute_layout,
            render_group,
            compute_group,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_groups(
        device: &wgpu::Device,
        render_layout: &wgpu::BindGroupLayout,
        compute_layout: &wgpu::BindGroupLayout,
        uniforms: &PairedBuffer,
        lights: &LightField,
        frustums: &FrustumGrid,
        index_list: &wgpu::Buffer,
        grid: &wgpu::Buffer,
        depth_view: &wgpu::TextureView,
    ) -> (wgpu::BindGroup, wgpu::BindGroup) {
        let render_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_render_bg"),
            layout: render_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.buffer().binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: frustums.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: index_list.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: grid.as_entire_binding(),
                },
            ],
        });

        let compute_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_compute_bg"),
            layout: compute_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.buffer().binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: frustums.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: index_list.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: grid.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
            ],
        });

        (render_group, compute_group)
    }

    /// Rebuild both bind groups after any bound resource was recreated
    /// (resize swaps the depth texture, frustum and culling buffers).
    #[allow(clippy::too_many_arguments)]
    pub fn rebuild(
        &mut self,
        device: &wgpu::Device,
        uniforms: &PairedBuffer,
        lights: &LightField,
        frustums: &FrustumGrid,
        index_list: &wgpu::Buffer,
        grid: &wgpu::Buffer,
        depth_view: &wgpu::TextureView,
    ) {
        let (render_group, compute_group) = Self::create_groups(
            device,
            &self.render_layout,
            &self.compute_layout,
            uniforms,
            lights,
            frustums,
            index_list,
            grid,
            depth_view,
        );
        self.render_group = render_group;
        self.compute_group = compute_group;
    }

    #[inline]
    pub fn render_layout(&self) -> &wgpu::BindGroupLayout {
        &self.render_layout
    }

    #[inline]
    pub fn compute_layout(&self) -> &wgpu::BindGroupLayout {
        &self.compute_layout
    }

    #[inline]
    pub fn render_group(&self) -> &wgpu::BindGroup {
        &self.render_group
    }

    #[inline]
    pub fn compute_group(&self) -> &wgpu::BindGroup {
        &self.compute_group
    }
}

/// Group 1 layout: per-material texture + sampler.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("material_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// WGSL group-0 declarations for render-side shaders (storage all read-only,
/// no depth binding). Spliced after the struct mirrors.
pub const FRAME_BINDINGS_RENDER_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(0) @binding(1) var<storage, read> lights: array<Light>;
@group(0) @binding(2) var<storage, read> frustums: array<TileFrustum>;
@group(0) @binding(3) var<storage, read> index_list: LightIndexList;
@group(0) @binding(4) var<storage, read> light_grid: array<GridCell>;
"#;

/// WGSL group-0 declarations for the culling compute shader.
pub const FRAME_BINDINGS_COMPUTE_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(0) @binding(1) var<storage, read> lights: array<Light>;
@group(0) @binding(2) var<storage, read> frustums: array<TileFrustum>;
@group(0) @binding(3) var<storage, read_write> index_list: LightIndexList;
@group(0) @binding(4) var<storage, read_write> light_grid: array<GridCell>;
@group(0) @binding(5) var depth_texture: texture_depth_2d;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_and_compute_declare_the_same_slots() {
        for binding in 0..=4 {
            let slot = format!("@binding({binding})");
            assert!(FRAME_BINDINGS_RENDER_WGSL.contains(&slot));
            assert!(FRAME_BINDINGS_COMPUTE_WGSL.contains(&slot));
        }
        assert!(!FRAME_BINDINGS_RENDER_WGSL.contains("@binding(5)"));
        assert!(FRAME_BINDINGS_COMPUTE_WGSL.contains("@binding(5)"));
    }

    #[test]
    fn render_side_storage_is_read_only() {
        assert!(!FRAME_BINDINGS_RENDER_WGSL.contains("read_write"));
    }
}
