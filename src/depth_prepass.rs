// src/depth_prepass.rs
//! Depth-only pre-pass.
//!
//! Rasterizes the whole scene into the shared depth texture before culling
//! runs. No color targets and no fragment shader; the only output is the
//! per-pixel depth the culling stage reads to bound each tile's extent.

use crate::bindings::FrameBindings;
use crate::scene::Scene;
use crate::texture::DEPTH_FORMAT;
use crate::uniforms::FRAME_UNIFORMS_WGSL;

pub struct DepthPrepass {
    pipeline: wgpu::RenderPipeline,
}

impl DepthPrepass {
    pub fn new(device: &wgpu::Device, bindings: &FrameBindings) -> Self {
        let shader_src = format!("{FRAME_UNIFORMS_WGSL}{DEPTH_PREPASS_WGSL}");
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth_prepass_shader"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth_prepass_pipeline_layout"),
            bind_group_layouts: &[bindings.render_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("depth_prepass_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[crate::scene::Vertex::layout()],
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline }
    }

    /// Record the pre-pass. Clears depth to the far plane first, so an empty
    /// scene leaves every tile with max depth.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        depth_view: &wgpu::TextureView,
        bindings: &FrameBindings,
        scene: &Scene,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depth_prepass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bindings.render_group(), &[]);
        scene.draw_depth_only(&mut pass);
    }
}

/// Position-only vertex transform. The pipeline still consumes the full
/// 32-byte vertex so the same buffers feed both passes.
const DEPTH_PREPASS_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> frame: FrameUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.proj * frame.view * vec4<f32>(position, 1.0);
}
"#;
