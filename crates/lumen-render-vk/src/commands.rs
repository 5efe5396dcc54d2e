// SPDX-License-Identifier: CEPL-1.0
use crate::error::VkError;
use crate::gpu::Gpu;
use ash::vk;

/// Everything one pre-recorded colour pass needs.
pub struct RecordInputs<'a> {
    pub render_pass: vk::RenderPass,
    pub framebuffers: &'a [vk::Framebuffer],
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub vertex_buffer: vk::Buffer,
    pub vertex_count: u32,
    pub clear: [f32; 4],
}

/// Command pool plus one primary buffer per framebuffer.
#[derive(Debug)]
pub struct CommandSet {
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            pool: vk::CommandPool::null(),
            buffers: Vec::new(),
        }
    }
}

impl CommandSet {
    pub fn new<G: Gpu + ?Sized>(gpu: &G, queue_family: u32) -> Result<Self, VkError> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: queue_family,
            ..Default::default()
        };
        let pool = gpu.create_command_pool(&info).map_err(VkError::CommandPool)?;
        Ok(Self {
            pool,
            buffers: Vec::new(),
        })
    }

    pub fn allocate<G: Gpu + ?Sized>(&mut self, gpu: &G, count: usize) -> Result<(), VkError> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        self.buffers = gpu
            .allocate_command_buffers(&info)
            .map_err(VkError::CommandBufferAllocation)?;
        Ok(())
    }

    /// Buffer `i` renders into framebuffer `i`.
    pub fn record<G: Gpu + ?Sized>(&self, gpu: &G, inputs: &RecordInputs<'_>) -> Result<(), VkError> {
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: inputs.clear,
            },
        }];
        for (index, (&cmd, &framebuffer)) in self
            .buffers
            .iter()
            .zip(inputs.framebuffers)
            .enumerate()
        {
            let begin = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                ..Default::default()
            };
            gpu.begin_command_buffer(cmd, &begin)
                .map_err(|source| VkError::CommandRecording { index, source })?;

            let rp_begin = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: inputs.render_pass,
                framebuffer,
                render_area: vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: inputs.extent,
                },
                clear_value_count: clears.len() as u32,
                p_clear_values: clears.as_ptr(),
                ..Default::default()
            };
            gpu.cmd_begin_render_pass(cmd, &rp_begin);
            gpu.cmd_bind_pipeline(cmd, inputs.pipeline);
            gpu.cmd_bind_vertex_buffer(cmd, inputs.vertex_buffer);
            gpu.cmd_draw(cmd, inputs.vertex_count);
            gpu.cmd_end_render_pass(cmd);

            gpu.end_command_buffer(cmd)
                .map_err(|source| VkError::CommandRecording { index, source })?;
        }
        Ok(())
    }

    pub fn buffers(&self) -> &[vk::CommandBuffer] {
        &self.buffers
    }

    pub fn free<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        if !self.buffers.is_empty() {
            gpu.free_command_buffers(self.pool, &self.buffers);
            self.buffers.clear();
        }
    }

    /// Frees the buffers, then the pool. Safe to repeat.
    pub fn destroy<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        self.free(gpu);
        if self.pool != vk::CommandPool::null() {
            gpu.destroy_command_pool(self.pool);
            self.pool = vk::CommandPool::null();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockGpu, Op};
    use ash::vk::Handle;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn framebuffers() -> Vec<vk::Framebuffer> {
        (100..103).map(vk::Framebuffer::from_raw).collect()
    }

    fn inputs(fbs: &[vk::Framebuffer]) -> RecordInputs<'_> {
        RecordInputs {
            render_pass: vk::RenderPass::null(),
            framebuffers: fbs,
            extent: EXTENT,
            pipeline: vk::Pipeline::null(),
            vertex_buffer: vk::Buffer::null(),
            vertex_count: 3,
            clear: [0.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn test_records_one_pass_per_framebuffer() {
        let gpu = MockGpu::new();
        let fbs = framebuffers();
        let mut set = CommandSet::new(&gpu, 0).unwrap();
        set.allocate(&gpu, fbs.len()).unwrap();
        gpu.clear_calls();
        set.record(&gpu, &inputs(&fbs)).unwrap();

        let passes: Vec<_> = gpu
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::BeginRenderPass {
                    cmd,
                    framebuffer,
                    extent,
                } => Some((cmd, framebuffer, extent)),
                _ => None,
            })
            .collect();
        assert_eq!(passes.len(), 3);
        for (i, (cmd, fb, extent)) in passes.into_iter().enumerate() {
            assert_eq!(cmd, set.buffers()[i]);
            assert_eq!(fb, fbs[i]);
            assert_eq!(extent, EXTENT);
        }
        let draws = gpu
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Draw { vertices: 3, .. }))
            .count();
        assert_eq!(draws, 3);
        set.destroy(&gpu);
    }

    #[test]
    fn test_recording_failure_reports_index() {
        let gpu = MockGpu::new();
        let fbs = framebuffers();
        let mut set = CommandSet::new(&gpu, 0).unwrap();
        set.allocate(&gpu, fbs.len()).unwrap();
        gpu.fail(Op::Record, 1, vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let err = set.record(&gpu, &inputs(&fbs)).unwrap_err();
        assert!(matches!(err, VkError::CommandRecording { index: 1, .. }));
        set.destroy(&gpu);
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn test_allocation_failure() {
        let gpu = MockGpu::new();
        let mut set = CommandSet::new(&gpu, 0).unwrap();
        gpu.fail(Op::CommandBuffer, 0, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(matches!(
            set.allocate(&gpu, 3),
            Err(VkError::CommandBufferAllocation(_))
        ));
        assert!(set.buffers().is_empty());
        set.destroy(&gpu);
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn test_free_then_destroy_twice() {
        let gpu = MockGpu::new();
        let mut set = CommandSet::new(&gpu, 0).unwrap();
        set.allocate(&gpu, 2).unwrap();
        set.free(&gpu);
        assert_eq!(gpu.live(Op::CommandBuffer), 0);
        assert_eq!(gpu.live(Op::CommandPool), 1);
        set.destroy(&gpu);
        set.destroy(&gpu);
        assert_eq!(gpu.live_total(), 0);
        assert!(gpu.bad_destroys().is_empty());
    }
}
