// SPDX-License-Identifier: CEPL-1.0
use crate::device::QueueFamilies;
use crate::error::VkError;
use crate::gpu::Gpu;
use ash::vk;
use lumen_render::{PresentPreference, RenderSize};
use tracing::info;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// BGRA8 sRGB with the sRGB-nonlinear colour space if offered, else whatever the
/// surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    pref: PresentPreference,
) -> vk::PresentModeKHR {
    match pref {
        PresentPreference::Mailbox => [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO]
            .into_iter()
            .find(|m| modes.contains(m))
            .unwrap_or(vk::PresentModeKHR::FIFO),
        // FIFO is the one mode every surface must support.
        PresentPreference::Fifo => vk::PresentModeKHR::FIFO,
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum; a max of 0 means "no limit".
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// Concurrent only when graphics and present live in different families.
pub fn sharing_mode(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    match families {
        QueueFamilies::Found { graphics, present } if graphics != present => {
            (vk::SharingMode::CONCURRENT, vec![graphics, present])
        }
        _ => (vk::SharingMode::EXCLUSIVE, Vec::new()),
    }
}

/// The swapchain, its images (owned by the presentation engine) and the views
/// created for them (owned here).
#[derive(Debug)]
pub struct SwapState {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

impl Default for SwapState {
    fn default() -> Self {
        Self {
            swapchain: vk::SwapchainKHR::null(),
            format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            views: Vec::new(),
        }
    }
}

impl SwapState {
    pub fn create<G: Gpu + ?Sized>(
        gpu: &G,
        want: RenderSize,
        pref: PresentPreference,
    ) -> Result<Self, VkError> {
        let caps = gpu.surface_capabilities().map_err(VkError::SurfaceQuery)?;
        let formats = gpu.surface_formats().map_err(VkError::SurfaceQuery)?;
        let modes = gpu.surface_present_modes().map_err(VkError::SurfaceQuery)?;

        let format = choose_surface_format(&formats).ok_or(VkError::NoSurfaceFormats)?;
        let present_mode = choose_present_mode(&modes, pref);
        let extent = choose_extent(&caps, want);
        if extent.width == 0 || extent.height == 0 {
            return Err(VkError::ZeroExtent {
                width: extent.width,
                height: extent.height,
            });
        }
        let image_count = choose_image_count(&caps);
        let (sharing, family_indices) = sharing_mode(gpu.queue_families());

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            min_image_count: image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing,
            queue_family_index_count: family_indices.len() as u32,
            p_queue_family_indices: family_indices.as_ptr(),
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };
        let swapchain = gpu
            .create_swapchain(&info)
            .map_err(VkError::SwapchainCreation)?;

        let mut state = SwapState {
            swapchain,
            format,
            present_mode,
            extent,
            images: Vec::new(),
            views: Vec::new(),
        };
        if let Err(e) = state.create_views(gpu) {
            state.cleanup(gpu);
            return Err(e);
        }

        info!(
            "swapchain: format {:?} / {:?}, present_mode {:?}, extent {}x{}, images(min={} → requested={} → got={})",
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height,
            caps.min_image_count,
            image_count,
            state.images.len()
        );
        Ok(state)
    }

    fn create_views<G: Gpu + ?Sized>(&mut self, gpu: &G) -> Result<(), VkError> {
        self.images = gpu
            .swapchain_images(self.swapchain)
            .map_err(VkError::SwapchainImages)?;
        self.views.reserve(self.images.len());
        for (index, &image) in self.images.iter().enumerate() {
            let ci = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: self.format.format,
                components: vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                },
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = gpu
                .create_image_view(&ci)
                .map_err(|source| VkError::ImageView { index, source })?;
            self.views.push(view);
        }
        Ok(())
    }

    /// Views first, then the chain. Safe on a default or already-cleaned state.
    pub fn cleanup<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        for view in self.views.drain(..) {
            if view != vk::ImageView::null() {
                gpu.destroy_image_view(view);
            }
        }
        self.images.clear();
        if self.swapchain != vk::SwapchainKHR::null() {
            gpu.destroy_swapchain(self.swapchain);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }

    pub fn is_live(&self) -> bool {
        self.swapchain != vk::SwapchainKHR::null()
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.format.color_space
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
