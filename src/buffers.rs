// src/buffers.rs
//! The staging + device buffer pair used for every piece of host data the
//! GPU reads during rendering.
//!
//! Invariant: the two halves always exist together and have the same size.
//! The host writes only the staging half; the pipelines bind only the device
//! half; the recorded staging->device copy is the single path between them
//! and is ordered before any compute/fragment read submitted in the same
//! encoder.

use crate::ensure;
use crate::error::{Error, Result};

/// A host-writable staging buffer paired with its device-local counterpart.
pub struct PairedBuffer {
    staging: wgpu::Buffer,
    device_local: wgpu::Buffer,
    size: u64,
}

impl PairedBuffer {
    /// Create a pair whose device half is bound as a uniform buffer.
    pub fn uniform(device: &wgpu::Device, label: &str, size: u64) -> Result<Self> {
        Self::new(device, label, size, wgpu::BufferUsages::UNIFORM)
    }

    /// Create a pair whose device half is bound as a storage buffer.
    pub fn storage(device: &wgpu::Device, label: &str, size: u64) -> Result<Self> {
        Self::new(device, label, size, wgpu::BufferUsages::STORAGE)
    }

    fn new(
        device: &wgpu::Device,
        label: &str,
        size: u64,
        device_usage: wgpu::BufferUsages,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::setup("buffer pair", format!("{label}: zero size")));
        }
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_staging")),
            size,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let device_local = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: device_usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Self {
            staging,
            device_local,
            size,
        })
    }

    /// Stage `data` and record the copy into the device half.
    ///
    /// The queue write lands in the staging buffer before any command buffer
    /// submitted afterwards executes, and the recorded copy precedes every
    /// pass recorded after it on `encoder`, which is exactly the ordering the
    /// per-frame pipeline needs.
    pub fn upload(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        data: &[u8],
    ) -> Result<()> {
        ensure!(
            data.len() as u64 <= self.size,
            "upload of {} bytes exceeds buffer pair capacity {}",
            data.len(),
            self.size
        );
        queue.write_buffer(&self.staging, 0, data);
        encoder.copy_buffer_to_buffer(&self.staging, 0, &self.device_local, 0, data.len() as u64);
        Ok(())
    }

    /// The device-local half, the only one ever placed in a bind group.
    #[inline]
    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.device_local.as_entire_binding()
    }

    #[inline]
    pub fn device_buffer(&self) -> &wgpu::Buffer {
        &self.device_local
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}
