// src/lights.rs
//! Host-owned dynamic point lights.
//!
//! The light array is generated once at startup, animated on the host every
//! frame and uploaded through its buffer pair. No GPU stage ever mutates it;
//! compute and fragment stages bind the device half read-only.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

use crate::buffers::PairedBuffer;
use crate::error::Result;
use crate::MAX_LIGHTS;

/// GPU layout of one point light, 48 bytes, shared with the WGSL `Light`
/// struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz = resting position, w = intensity.
    pub begin_pos: [f32; 4],
    /// xyz = animation target position, w = radius.
    pub end_pos: [f32; 4],
    /// rgb = color, w = animation phase offset.
    pub color: [f32; 4],
}

impl GpuLight {
    pub fn new(position: Vec3, intensity: f32, target: Vec3, radius: f32, color: Vec3, phase: f32) -> Self {
        Self {
            begin_pos: [position.x, position.y, position.z, intensity],
            end_pos: [target.x, target.y, target.z, radius],
            color: [color.x, color.y, color.z, phase],
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.end_pos[3]
    }

    /// World position at `time`, a phase-offset triangle wave between the
    /// resting and target positions. Mirrors the shader-side animation.
    pub fn position_at(&self, time: f32) -> Vec3 {
        let begin = Vec3::new(self.begin_pos[0], self.begin_pos[1], self.begin_pos[2]);
        let end = Vec3::new(self.end_pos[0], self.end_pos[1], self.end_pos[2]);
        let t = ((time + self.color[3]) * 0.25).fract();
        let s = if t < 0.5 { t * 2.0 } else { 2.0 - t * 2.0 };
        begin.lerp(end, s)
    }
}

/// The full light field plus its GPU buffer pair.
pub struct LightField {
    lights: Vec<GpuLight>,
    /// Per-frame animated snapshot actually uploaded to the GPU.
    animated: Vec<GpuLight>,
    buffer: PairedBuffer,
}

impl LightField {
    /// Allocate the storage pair at the compile-time capacity and fill it
    /// with `count` randomized lights (count is fixed afterwards).
    ///
    /// Distribution matches the scene scale: X spread across the full hall,
    /// Y above the floor, modest Z spread, radius up to 200 units.
    pub fn new<R: Rng>(device: &wgpu::Device, count: u32, rng: &mut R) -> Result<Self> {
        let count = count.min(MAX_LIGHTS);
        let (dx, dy, dz, max_radius) = (5000.0f32, 500.0f32, 500.0f32, 200.0f32);

        let mut lights = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let position = Vec3::new(
                rng.gen::<f32>() * dx - dx / 2.0,
                rng.gen::<f32>() * dy + 100.0,
                rng.gen::<f32>() * dz - dz / 2.0,
            );
            let mut target = position;
            target.y = rng.gen::<f32>() * -10.0;
            lights.push(GpuLight::new(
                position,
                rng.gen::<f32>() * 0.010,
                target,
                rng.gen::<f32>() * max_radius,
                Vec3::new(rng.gen(), rng.gen(), rng.gen()),
                rng.gen::<f32>(),
            ));
        }

        let buffer = PairedBuffer::storage(
            device,
            "light_buffer",
            (MAX_LIGHTS as u64) * std::mem::size_of::<GpuLight>() as u64,
        )?;

        Ok(Self {
            animated: lights.clone(),
            lights,
            buffer,
        })
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.lights.len() as u32
    }

    #[inline]
    pub fn lights(&self) -> &[GpuLight] {
        &self.animated
    }

    #[inline]
    pub fn buffer(&self) -> &PairedBuffer {
        &self.buffer
    }

    /// Advance the host-side animation to `time` and stage the result.
    pub fn animate_and_upload(
        &mut self,
        time: f32,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<()> {
        for (out, base) in self.animated.iter_mut().zip(&self.lights) {
            let p = base.position_at(time);
            *out = *base;
            out.begin_pos[0] = p.x;
            out.begin_pos[1] = p.y;
            out.begin_pos[2] = p.z;
        }
        self.buffer
            .upload(queue, encoder, bytemuck::cast_slice(&self.animated))
    }
}

/// WGSL mirror of [`GpuLight`].
pub const LIGHT_WGSL: &str = r#"
struct Light {
    begin_pos: vec4<f32>,
    end_pos: vec4<f32>,
    color: vec4<f32>,
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_light_is_48_bytes() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 48);
    }

    #[test]
    fn animation_stays_on_segment() {
        let light = GpuLight::new(
            Vec3::new(0.0, 100.0, 0.0),
            1.0,
            Vec3::new(0.0, -10.0, 0.0),
            50.0,
            Vec3::ONE,
            0.3,
        );
        for i in 0..64 {
            let p = light.position_at(i as f32 * 0.37);
            assert!(p.y <= 100.0 + 1e-3 && p.y >= -10.0 - 1e-3, "off segment: {p}");
            assert_eq!(p.x, 0.0);
        }
    }

    #[test]
    fn animation_is_deterministic() {
        let light = GpuLight::new(
            Vec3::new(5.0, 3.0, 1.0),
            1.0,
            Vec3::new(5.0, -2.0, 1.0),
            50.0,
            Vec3::ONE,
            0.7,
        );
        assert_eq!(light.position_at(12.5), light.position_at(12.5));
    }
}
