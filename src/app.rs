//! Instance/session ownership and the per-frame protocol.

use anyhow::{anyhow, ensure, Result};
use log::{info, warn};
use openxr as xr;

use crate::graphics::{pick_swapchain_format, GraphicsBinding};
use crate::lifecycle::{SessionCommand, SessionLifecycle};
use crate::paths::StandardPaths;

pub const VIEW_COUNT: u32 = 2;
pub const VIEW_TYPE: xr::ViewConfigurationType = xr::ViewConfigurationType::PRIMARY_STEREO;

/// How long to wait for an acquired swapchain image, in nanoseconds.
/// Bounded so a stalled compositor shows up as an error instead of a hang.
const SWAPCHAIN_IMAGE_TIMEOUT_NS: i64 = 1_000_000_000;

/// Owns the OpenXR instance, session, swapchains, and stage space, and
/// drives the event/frame protocol. `B` supplies everything device-specific.
pub struct XrApp<B: GraphicsBinding> {
    instance: xr::Instance,
    system: xr::SystemId,
    paths: StandardPaths,
    binding: B,
    session: xr::Session<B::Api>,
    frame_wait: xr::FrameWaiter,
    frame_stream: xr::FrameStream<B::Api>,
    stage: xr::Space,
    view_config: Vec<xr::ViewConfigurationView>,
    swapchain: xr::Swapchain<B::Api>,
    depth_swapchain: xr::Swapchain<B::Api>,
    /// Color targets per eye, indexed by the runtime's acquire index.
    eye_targets: [Vec<B::EyeTarget>; 2],
    eye_depth_targets: [Vec<B::EyeTarget>; 2],
    lifecycle: SessionLifecycle,
    event_storage: xr::EventDataBuffer,
    instance_lost: bool,
}

impl<B: GraphicsBinding> XrApp<B> {
    /// Bring up instance, system, device, session, swapchains, and the stage
    /// space. The session still needs a READY event before frames flow.
    pub fn new(application_name: &str) -> Result<Self> {
        let entry = unsafe { xr::Entry::load() }?;

        let available = entry.enumerate_extensions()?;
        let mut enabled = xr::ExtensionSet::default();
        B::enable_extensions(&available, &mut enabled)?;

        // The instance comes first; it has an opinion about device creation.
        let instance = entry.create_instance(
            &xr::ApplicationInfo {
                application_name,
                application_version: 0,
                engine_name: crate::ENGINE_NAME,
                engine_version: 0,
            },
            &enabled,
            &[],
        )?;
        let props = instance.properties()?;
        info!(
            "loaded OpenXR runtime: {} {}",
            props.runtime_name, props.runtime_version
        );

        let system = instance.system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)?;
        let paths = StandardPaths::new(&instance)?;

        let view_config = instance.enumerate_view_configuration_views(system, VIEW_TYPE)?;
        ensure!(
            view_config.len() >= VIEW_COUNT as usize,
            "stereo view configuration reported {} views",
            view_config.len()
        );

        let binding = B::create_device(&instance, system)?;
        let (session, frame_wait, frame_stream) = unsafe {
            instance.create_session::<B::Api>(system, &binding.session_create_info())?
        };

        let extent = (
            view_config[0].recommended_image_rect_width,
            view_config[0].recommended_image_rect_height,
        );

        let supported = session.enumerate_swapchain_formats()?;
        let color_format = pick_swapchain_format(&supported, &binding.preferred_color_formats())
            .ok_or_else(|| anyhow!("no mutually supported color swapchain format"))?;
        let depth_format = pick_swapchain_format(&supported, &binding.preferred_depth_formats())
            .ok_or_else(|| anyhow!("no mutually supported depth swapchain format"))?;

        // One array swapchain with a slice per eye; both eyes share a single
        // acquire/release per frame.
        let swapchain = session.create_swapchain(&xr::SwapchainCreateInfo {
            create_flags: xr::SwapchainCreateFlags::EMPTY,
            usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                | xr::SwapchainUsageFlags::SAMPLED,
            format: color_format,
            sample_count: 1,
            width: extent.0,
            height: extent.1,
            face_count: 1,
            array_size: VIEW_COUNT,
            mip_count: 1,
        })?;
        let depth_swapchain = session.create_swapchain(&xr::SwapchainCreateInfo {
            create_flags: xr::SwapchainCreateFlags::EMPTY,
            usage_flags: xr::SwapchainUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            format: depth_format,
            sample_count: 1,
            width: extent.0,
            height: extent.1,
            face_count: 1,
            array_size: VIEW_COUNT,
            mip_count: 1,
        })?;

        let images = swapchain.enumerate_images()?;
        let depth_images = depth_swapchain.enumerate_images()?;
        let eye_targets = [
            binding.make_color_targets(&images, color_format, extent, 0)?,
            binding.make_color_targets(&images, color_format, extent, 1)?,
        ];
        let eye_depth_targets = [
            binding.make_depth_targets(&depth_images, depth_format, extent, 0)?,
            binding.make_depth_targets(&depth_images, depth_format, extent, 1)?,
        ];

        let stage = session.create_reference_space(xr::ReferenceSpaceType::STAGE, xr::Posef::IDENTITY)?;

        Ok(Self {
            instance,
            system,
            paths,
            binding,
            session,
            frame_wait,
            frame_stream,
            stage,
            view_config,
            swapchain,
            depth_swapchain,
            eye_targets,
            eye_depth_targets,
            lifecycle: SessionLifecycle::new(),
            event_storage: xr::EventDataBuffer::new(),
            instance_lost: false,
        })
    }

    pub fn instance(&self) -> &xr::Instance {
        &self.instance
    }

    pub fn system(&self) -> xr::SystemId {
        self.system
    }

    pub fn paths(&self) -> &StandardPaths {
        &self.paths
    }

    pub fn session(&self) -> &xr::Session<B::Api> {
        &self.session
    }

    pub fn stage(&self) -> &xr::Space {
        &self.stage
    }

    /// The depth swapchain backing the per-eye depth targets. Exposed for
    /// renderers that submit depth composition info themselves.
    pub fn depth_swapchain(&self) -> &xr::Swapchain<B::Api> {
        &self.depth_swapchain
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn session_state(&self) -> xr::SessionState {
        self.lifecycle.state()
    }

    pub fn session_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// True once the runtime has asked the application to shut down.
    pub fn should_exit(&self) -> bool {
        self.instance_lost || self.lifecycle.is_exiting()
    }

    /// Recommended per-eye image size.
    pub fn render_extent(&self) -> (u32, u32) {
        (
            self.view_config[0].recommended_image_rect_width,
            self.view_config[0].recommended_image_rect_height,
        )
    }

    /// Drain the event queue completely, applying session transitions as
    /// they land. Non-blocking.
    pub fn drive_events(&mut self) -> Result<()> {
        while let Some(event) = self.instance.poll_event(&mut self.event_storage)? {
            use xr::Event::*;
            match event {
                SessionStateChanged(e) => {
                    info!("session entered state {:?}", e.state());
                    match self.lifecycle.transition(e.state()) {
                        Some(SessionCommand::Begin) => {
                            self.session.begin(VIEW_TYPE)?;
                        }
                        Some(SessionCommand::End) => {
                            self.session.end()?;
                        }
                        None => {}
                    }
                }
                InstanceLossPending(_) => {
                    warn!("instance loss pending");
                    self.instance_lost = true;
                }
                EventsLost(e) => {
                    warn!("lost {} events", e.lost_event_count());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// One frame tick: drain events, then wait/begin/render/end if the
    /// session state allows. Returns the predicted display time, or zero
    /// when the session isn't far enough along to have frame timing.
    ///
    /// `render_eye` runs once per eye with that eye's view and the acquired
    /// image's color/depth targets; it must not touch swapchain state.
    pub fn run_frame<F>(&mut self, mut render_eye: F) -> Result<xr::Time>
    where
        F: FnMut(&B, &xr::View, &B::EyeTarget, &B::EyeTarget) -> Result<()>,
    {
        self.drive_events()?;

        if !self.lifecycle.should_wait() {
            return Ok(xr::Time::from_nanos(0));
        }

        let frame_state = self.frame_wait.wait()?;
        self.frame_stream.begin()?;
        let display_time = frame_state.predicted_display_time;

        // Past this point end() runs exactly once no matter what the render
        // steps do; an unbalanced begin desynchronizes the runtime.
        let rendered = if frame_state.should_render && self.lifecycle.should_render() {
            self.render_views(display_time, &mut render_eye).map(Some)
        } else {
            Ok(None)
        };

        let rect = self.swapchain_rect();
        let end_result = match &rendered {
            Ok(Some(views)) => self.frame_stream.end(
                display_time,
                xr::EnvironmentBlendMode::OPAQUE,
                &[&xr::CompositionLayerProjection::new()
                    .space(&self.stage)
                    .views(&[
                        xr::CompositionLayerProjectionView::new()
                            .pose(views[0].pose)
                            .fov(views[0].fov)
                            .sub_image(
                                xr::SwapchainSubImage::new()
                                    .swapchain(&self.swapchain)
                                    .image_array_index(0)
                                    .image_rect(rect),
                            ),
                        xr::CompositionLayerProjectionView::new()
                            .pose(views[1].pose)
                            .fov(views[1].fov)
                            .sub_image(
                                xr::SwapchainSubImage::new()
                                    .swapchain(&self.swapchain)
                                    .image_array_index(1)
                                    .image_rect(rect),
                            ),
                    ])],
            ),
            _ => self
                .frame_stream
                .end(display_time, xr::EnvironmentBlendMode::OPAQUE, &[]),
        };

        rendered?;
        end_result?;
        Ok(display_time)
    }

    /// Acquire, render both eyes, release. The acquired image is released
    /// even when a step in between fails.
    fn render_views<F>(&mut self, display_time: xr::Time, render_eye: &mut F) -> Result<[xr::View; 2]>
    where
        F: FnMut(&B, &xr::View, &B::EyeTarget, &B::EyeTarget) -> Result<()>,
    {
        let index = self.swapchain.acquire_image()? as usize;

        let inner = (|| -> Result<[xr::View; 2]> {
            self.swapchain
                .wait_image(xr::Duration::from_nanos(SWAPCHAIN_IMAGE_TIMEOUT_NS))?;

            let (_flags, views) = self.session.locate_views(VIEW_TYPE, display_time, &self.stage)?;
            ensure!(
                views.len() >= VIEW_COUNT as usize,
                "runtime located {} views",
                views.len()
            );

            for (eye, view) in views.iter().enumerate().take(VIEW_COUNT as usize) {
                render_eye(
                    &self.binding,
                    view,
                    &self.eye_targets[eye][index],
                    &self.eye_depth_targets[eye][index],
                )?;
            }
            Ok([views[0], views[1]])
        })();

        let released = self.swapchain.release_image();
        let views = inner?;
        released?;
        Ok(views)
    }

    fn swapchain_rect(&self) -> xr::Rect2Di {
        xr::Rect2Di {
            offset: xr::Offset2Di { x: 0, y: 0 },
            extent: xr::Extent2Di {
                width: self.view_config[0].recommended_image_rect_width as i32,
                height: self.view_config[0].recommended_image_rect_height as i32,
            },
        }
    }
}
