//! Vulkan graphics binding.
//!
//! With `XR_KHR_vulkan_enable2` the runtime creates the Vulkan instance and
//! device itself, so it can pin the physical device to the one driving the
//! HMD. We load `ash` wrappers over the handles it returns.

use std::ffi::CString;

use anyhow::{bail, ensure, Context, Result};
use ash::vk::{self, Handle};
use log::info;
use openxr as xr;

use crate::graphics::{Format, GraphicsBinding, SwapchainImage};

/// Owns the device-level Vulkan state for one session.
pub struct VulkanBinding {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
}

/// One array slice of a swapchain image, ready to render into.
pub struct VulkanTarget {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub layer: u32,
}

impl VulkanBinding {
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    fn make_targets(
        &self,
        images: &[u64],
        format: u32,
        extent: (u32, u32),
        layer: u32,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Vec<VulkanTarget>> {
        let extent = vk::Extent2D {
            width: extent.0,
            height: extent.1,
        };
        images
            .iter()
            .map(|&raw| {
                let image = vk::Image::from_raw(raw);
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(vk::Format::from_raw(format as i32))
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: aspect,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: layer,
                        layer_count: 1,
                    });
                let view = unsafe { self.device.create_image_view(&create_info, None) }?;
                Ok(VulkanTarget {
                    image,
                    view,
                    extent,
                    layer,
                })
            })
            .collect()
    }
}

impl GraphicsBinding for VulkanBinding {
    type Api = xr::Vulkan;
    type EyeTarget = VulkanTarget;

    fn enable_extensions(
        available: &xr::ExtensionSet,
        enabled: &mut xr::ExtensionSet,
    ) -> Result<()> {
        ensure!(
            available.khr_vulkan_enable2,
            "OpenXR runtime does not offer XR_KHR_vulkan_enable2"
        );
        enabled.khr_vulkan_enable2 = true;
        Ok(())
    }

    fn create_device(instance: &xr::Instance, system: xr::SystemId) -> Result<Self> {
        let vk_target_version = vk::make_api_version(0, 1, 1, 0);
        let xr_target_version = xr::Version::new(1, 1, 0);

        let reqs = instance.graphics_requirements::<xr::Vulkan>(system)?;
        if reqs.min_api_version_supported > xr_target_version {
            bail!(
                "OpenXR runtime requires Vulkan version > {}",
                reqs.min_api_version_supported
            );
        }

        let vk_entry = unsafe { ash::Entry::load() }?;

        let app_name = CString::new(crate::ENGINE_NAME)?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(0)
            .engine_name(&app_name)
            .engine_version(0)
            .api_version(vk_target_version);
        let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);

        let vk_instance = unsafe {
            let raw = instance
                .create_vulkan_instance(
                    system,
                    std::mem::transmute(vk_entry.static_fn().get_instance_proc_addr),
                    &create_info as *const _ as *const _,
                )
                .context("creating Vulkan instance through the runtime")?
                .map_err(vk::Result::from_raw)?;
            ash::Instance::load(
                vk_entry.static_fn(),
                vk::Instance::from_raw(raw as _),
            )
        };

        let physical_device = vk::PhysicalDevice::from_raw(unsafe {
            instance.vulkan_graphics_device(system, vk_instance.handle().as_raw() as _)? as _
        });

        let queue_family_index = unsafe {
            vk_instance
                .get_physical_device_queue_family_properties(physical_device)
                .into_iter()
                .enumerate()
                .find(|(_, info)| info.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(index, _)| index as u32)
                .context("Vulkan device has no graphics queue")?
        };

        let queue_priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)
            .build()];
        let device_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_infos);

        let device = unsafe {
            let raw = instance
                .create_vulkan_device(
                    system,
                    std::mem::transmute(vk_entry.static_fn().get_instance_proc_addr),
                    physical_device.as_raw() as _,
                    &device_info as *const _ as *const _,
                )
                .context("creating Vulkan device through the runtime")?
                .map_err(vk::Result::from_raw)?;
            ash::Device::load(vk_instance.fp_v1_0(), vk::Device::from_raw(raw as _))
        };
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let props = unsafe { vk_instance.get_physical_device_properties(physical_device) };
        info!(
            "using Vulkan device {:?} (queue family {})",
            unsafe { std::ffi::CStr::from_ptr(props.device_name.as_ptr()) },
            queue_family_index
        );

        Ok(Self {
            _entry: vk_entry,
            instance: vk_instance,
            physical_device,
            device,
            queue,
            queue_family_index,
        })
    }

    fn session_create_info(&self) -> xr::vulkan::SessionCreateInfo {
        xr::vulkan::SessionCreateInfo {
            instance: self.instance.handle().as_raw() as _,
            physical_device: self.physical_device.as_raw() as _,
            device: self.device.handle().as_raw() as _,
            queue_family_index: self.queue_family_index,
            queue_index: 0,
        }
    }

    fn preferred_color_formats(&self) -> Vec<Format<Self>> {
        vec![
            vk::Format::R8G8B8A8_SRGB.as_raw() as _,
            vk::Format::B8G8R8A8_SRGB.as_raw() as _,
            vk::Format::R8G8B8A8_UNORM.as_raw() as _,
            vk::Format::B8G8R8A8_UNORM.as_raw() as _,
        ]
    }

    fn preferred_depth_formats(&self) -> Vec<Format<Self>> {
        vec![
            vk::Format::D32_SFLOAT.as_raw() as _,
            vk::Format::D24_UNORM_S8_UINT.as_raw() as _,
            vk::Format::D16_UNORM.as_raw() as _,
        ]
    }

    fn make_color_targets(
        &self,
        images: &[SwapchainImage<Self>],
        format: Format<Self>,
        extent: (u32, u32),
        layer: u32,
    ) -> Result<Vec<VulkanTarget>> {
        self.make_targets(images, format, extent, layer, vk::ImageAspectFlags::COLOR)
    }

    fn make_depth_targets(
        &self,
        images: &[SwapchainImage<Self>],
        format: Format<Self>,
        extent: (u32, u32),
        layer: u32,
    ) -> Result<Vec<VulkanTarget>> {
        self.make_targets(images, format, extent, layer, vk::ImageAspectFlags::DEPTH)
    }
}
