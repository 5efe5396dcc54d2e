// SPDX-License-Identifier: CEPL-1.0
//! Per-slot sync objects and the image → fence markers.

use crate::error::VkError;
use crate::gpu::Gpu;
use ash::vk;
use tracing::warn;

/// Clamps the configured frames-in-flight into `1..=image_count`.
pub fn clamp_frames_in_flight(requested: usize, image_count: usize) -> usize {
    let clamped = requested.clamp(1, image_count.max(1));
    if clamped != requested {
        warn!(
            "frames_in_flight {} clamped to {} ({} swap images)",
            requested, clamped, image_count
        );
    }
    clamped
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSlot {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signaled so the first wait on each slot returns at once.
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    fn create<G: Gpu + ?Sized>(gpu: &G, slot: usize) -> Result<Self, VkError> {
        let err = |source: vk::Result| VkError::SyncObjects { slot, source };
        let image_available = gpu.create_semaphore().map_err(err)?;
        let render_finished = match gpu.create_semaphore() {
            Ok(s) => s,
            Err(source) => {
                gpu.destroy_semaphore(image_available);
                return Err(err(source));
            }
        };
        match gpu.create_fence(true) {
            Ok(in_flight) => Ok(Self {
                image_available,
                render_finished,
                in_flight,
            }),
            Err(source) => {
                gpu.destroy_semaphore(render_finished);
                gpu.destroy_semaphore(image_available);
                Err(err(source))
            }
        }
    }

    fn destroy<G: Gpu + ?Sized>(&self, gpu: &G) {
        gpu.destroy_fence(self.in_flight);
        gpu.destroy_semaphore(self.render_finished);
        gpu.destroy_semaphore(self.image_available);
    }
}

#[derive(Debug, Default)]
pub struct FrameRing {
    slots: Vec<FrameSlot>,
    current: usize,
    images_in_flight: Vec<Option<vk::Fence>>,
}

impl FrameRing {
    pub fn new<G: Gpu + ?Sized>(gpu: &G, frames: usize, image_count: usize) -> Result<Self, VkError> {
        let mut ring = Self {
            slots: Vec::with_capacity(frames),
            current: 0,
            images_in_flight: vec![None; image_count],
        };
        for slot in 0..frames.max(1) {
            match FrameSlot::create(gpu, slot) {
                Ok(s) => ring.slots.push(s),
                Err(e) => {
                    ring.destroy(gpu);
                    return Err(e);
                }
            }
        }
        Ok(ring)
    }

    /// Slot for the frame about to be drawn.
    pub fn current(&self) -> FrameSlot {
        self.slots[self.current]
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn advance(&mut self) {
        if !self.slots.is_empty() {
            self.current = (self.current + 1) % self.slots.len();
        }
    }

    /// Fence of the frame still using `image`, if any.
    pub fn image_fence(&self, image: u32) -> Option<vk::Fence> {
        self.images_in_flight.get(image as usize).copied().flatten()
    }

    pub fn track_image(&mut self, image: u32, fence: vk::Fence) {
        if let Some(marker) = self.images_in_flight.get_mut(image as usize) {
            *marker = Some(fence);
        }
    }

    pub fn markers(&self) -> &[Option<vk::Fence>] {
        &self.images_in_flight
    }

    /// Forgets every marker and resizes for a new swapchain.
    pub fn reset_markers(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, None);
    }

    /// Swaps the current slot's objects for fresh ones after its submission was
    /// lost. Markers naming the old fence are cleared.
    pub fn rearm<G: Gpu + ?Sized>(&mut self, gpu: &G) -> Result<(), VkError> {
        let index = self.current;
        let old = self.slots[index];
        let fresh = FrameSlot::create(gpu, index)?;
        old.destroy(gpu);
        self.slots[index] = fresh;
        for marker in &mut self.images_in_flight {
            if *marker == Some(old.in_flight) {
                *marker = None;
            }
        }
        Ok(())
    }

    /// Safe to repeat. The device must be idle.
    pub fn destroy<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        for slot in self.slots.drain(..) {
            slot.destroy(gpu);
        }
        self.images_in_flight.clear();
        self.current = 0;
    }
}
