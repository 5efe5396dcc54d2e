// SPDX-License-Identifier: CEPL-1.0
use crate::error::VkError;
use crate::gpu::Gpu;
use crate::vertex::Vertex;
use ash::vk;
use tracing::debug;

/// First memory type allowed by `type_bits` that has every flag in `flags`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0 && props.memory_types[i as usize].property_flags.contains(flags)
    })
}

/// Host-visible vertex storage, written once at upload.
#[derive(Debug)]
pub struct VertexBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    vertex_count: u32,
}

impl Default for VertexBuffer {
    fn default() -> Self {
        Self {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            vertex_count: 0,
        }
    }
}

impl VertexBuffer {
    pub fn upload<G: Gpu + ?Sized>(gpu: &G, vertices: &[Vertex]) -> Result<Self, VkError> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size: bytes.len() as vk::DeviceSize,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let mut out = Self {
            buffer: gpu.create_buffer(&info).map_err(VkError::BufferCreation)?,
            vertex_count: vertices.len() as u32,
            ..Default::default()
        };
        if let Err(err) = out.back_with_memory(gpu, bytes) {
            out.cleanup(gpu);
            return Err(err);
        }
        debug!("uploaded {} vertices ({} bytes)", vertices.len(), bytes.len());
        Ok(out)
    }

    fn back_with_memory<G: Gpu + ?Sized>(&mut self, gpu: &G, bytes: &[u8]) -> Result<(), VkError> {
        let req = gpu.buffer_memory_requirements(self.buffer);
        let type_index = find_memory_type(
            &gpu.memory_properties(),
            req.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .ok_or(VkError::NoMemoryType)?;
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: type_index,
            ..Default::default()
        };
        self.memory = gpu
            .allocate_memory(&alloc)
            .map_err(VkError::MemoryAllocation)?;
        gpu.bind_buffer_memory(self.buffer, self.memory)
            .map_err(VkError::MemoryUpload)?;
        gpu.write_memory(self.memory, bytes)
            .map_err(VkError::MemoryUpload)
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Buffer, then memory. Safe to repeat.
    pub fn cleanup<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        if self.buffer != vk::Buffer::null() {
            gpu.destroy_buffer(self.buffer);
            self.buffer = vk::Buffer::null();
        }
        if self.memory != vk::DeviceMemory::null() {
            gpu.free_memory(self.memory);
            self.memory = vk::DeviceMemory::null();
        }
        self.vertex_count = 0;
    }
}
