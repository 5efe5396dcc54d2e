// SPDX-License-Identifier: CEPL-1.0
use crate::error::VkError;
use crate::gpu::Gpu;
use crate::swapchain::SwapState;
use ash::vk;

pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    }
}

/// Keeps the clear/write from racing the presentation engine still reading the
/// previous contents of the image.
pub fn external_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ..Default::default()
    }
}

/// Render pass plus one framebuffer per swap image.
#[derive(Debug)]
pub struct RenderTargets {
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Default for RenderTargets {
    fn default() -> Self {
        Self {
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
        }
    }
}

impl RenderTargets {
    pub fn init_render_pass<G: Gpu + ?Sized>(
        &mut self,
        gpu: &G,
        format: vk::Format,
    ) -> Result<vk::RenderPass, VkError> {
        let attachment = color_attachment(format);
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        let dependency = external_dependency();
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &attachment,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        self.render_pass = gpu
            .create_render_pass(&info)
            .map_err(VkError::RenderPassCreation)?;
        Ok(self.render_pass)
    }

    /// Stops at the first failure. Framebuffers built before it stay owned here
    /// until [`RenderTargets::cleanup`].
    pub fn init_framebuffers<G: Gpu + ?Sized>(
        &mut self,
        gpu: &G,
        swap: &SwapState,
    ) -> Result<&[vk::Framebuffer], VkError> {
        let extent = swap.extent();
        self.framebuffers.reserve(swap.views().len());
        for (index, view) in swap.views().iter().enumerate() {
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: 1,
                p_attachments: view,
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = gpu
                .create_framebuffer(&info)
                .map_err(|source| VkError::Framebuffer { index, source })?;
            self.framebuffers.push(fb);
        }
        Ok(&self.framebuffers)
    }

    /// Framebuffers, then the render pass. Safe to repeat.
    pub fn cleanup<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        for fb in self.framebuffers.drain(..) {
            if fb != vk::Framebuffer::null() {
                gpu.destroy_framebuffer(fb);
            }
        }
        if self.render_pass != vk::RenderPass::null() {
            gpu.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }
}
