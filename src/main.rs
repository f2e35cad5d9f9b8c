//! Hands demo: tracks both controllers through the action system and clears
//! each eye with a color that reacts to grabbing, pulsing the haptics on
//! every grab. Run with an active OpenXR runtime.

use anyhow::Result;
use ash::vk;
use log::info;
use magnetron::{
    attach_action_sets, launch, suggest_bindings, sync_action_sets, ActionId, ActionKind,
    ActionSet, App, VulkanBinding, VulkanTarget, XrApp,
};
use nalgebra::Point3;
use openxr as xr;

const HAND_COUNT: usize = 2;

struct HandsDemo {
    hands: ActionSet,
    hand_pose: ActionId,
    grab: ActionId,
    haptic: ActionId,
    grabbed: [bool; HAND_COUNT],
    hand_position: [Option<Point3<f32>>; HAND_COUNT],
    clear_color: [f32; 4],
    gpu: ClearRecorder,
}

impl App<VulkanBinding> for HandsDemo {
    const NAME: &'static str = "Magnetron Hands";

    type Args = ();

    fn new(xr: &mut XrApp<VulkanBinding>, _args: Self::Args) -> Result<Self> {
        let left = xr.paths().user_hand_left;
        let right = xr.paths().user_hand_right;

        let mut hands = ActionSet::new("hands", "Hands", 0);

        let hand_pose = hands.add_action("handpose", "Hand Pose", ActionKind::Pose, &[left, right]);
        hands
            .action_mut(hand_pose)
            .add_global_binding(xr.paths().left.grip_pose);
        hands
            .action_mut(hand_pose)
            .add_global_binding(xr.paths().right.grip_pose);

        let grab = hands.add_action("grab", "Grab", ActionKind::Boolean, &[left, right]);
        hands
            .action_mut(grab)
            .add_global_binding(xr.paths().left.trigger);
        hands
            .action_mut(grab)
            .add_global_binding(xr.paths().right.trigger);
        // The simple controller has no trigger; give it select instead.
        let khr_simple = xr.paths().profiles.khr_simple;
        hands
            .action_mut(grab)
            .add_binding(khr_simple, xr.paths().left.select_click);
        hands
            .action_mut(grab)
            .add_binding(khr_simple, xr.paths().right.select_click);

        let haptic = hands.add_action(
            "haptics",
            "Grab Haptics",
            ActionKind::Haptic,
            &[left, right],
        );
        hands
            .action_mut(haptic)
            .add_global_binding(xr.paths().left.haptic);
        hands
            .action_mut(haptic)
            .add_global_binding(xr.paths().right.haptic);

        hands.init(xr.instance())?;

        for profile in [
            xr.paths().profiles.valve_index,
            xr.paths().profiles.oculus_touch,
            xr.paths().profiles.microsoft_motion,
            xr.paths().profiles.htc_vive,
            xr.paths().profiles.khr_simple,
        ] {
            suggest_bindings(xr.instance(), profile, &[&hands])?;
        }

        attach_action_sets(xr.session(), &[&hands])?;
        hands.create_spaces(xr.session())?;

        let gpu = ClearRecorder::new(xr.binding())?;

        Ok(Self {
            hands,
            hand_pose,
            grab,
            haptic,
            grabbed: [false; HAND_COUNT],
            hand_position: [None; HAND_COUNT],
            clear_color: [0.05, 0.05, 0.08, 1.0],
            gpu,
        })
    }

    fn update(
        &mut self,
        xr: &mut XrApp<VulkanBinding>,
        current_time: f64,
        _elapsed_time: f64,
        display_time: xr::Time,
    ) -> Result<()> {
        if !xr.session_running() {
            return Ok(());
        }

        sync_action_sets(xr.session(), &[&self.hands])?;

        let hand_paths = [xr.paths().user_hand_left, xr.paths().user_hand_right];
        for (hand, &path) in hand_paths.iter().enumerate() {
            // Tracking can drop out any time; a failed locate means "not
            // tracked", not a torn-down loop.
            self.hand_position[hand] = if display_time.as_nanos() != 0 {
                match self
                    .hands
                    .action(self.hand_pose)
                    .locate_space(xr.stage(), display_time, path)
                {
                    Ok(location)
                        if location
                            .location_flags
                            .contains(xr::SpaceLocationFlags::POSITION_VALID) =>
                    {
                        let p = location.pose.position;
                        Some(Point3::new(p.x, p.y, p.z))
                    }
                    _ => None,
                }
            } else {
                None
            };

            let was_grabbed = self.grabbed[hand];
            self.grabbed[hand] = self
                .hands
                .action(self.grab)
                .boolean_state(xr.session(), path)?
                .current_state;

            if self.grabbed[hand] && !was_grabbed {
                // Buzz harder the higher the hand is held.
                let amplitude = self.hand_position[hand]
                    .map(|p| (p.y / 2.0).clamp(0.2, 1.0))
                    .unwrap_or(0.5);
                info!(
                    "hand {} grabbed at {:?}, haptic amplitude {:.2}",
                    hand, self.hand_position[hand], amplitude
                );
                self.hands.action(self.haptic).apply_haptic_feedback(
                    xr.session(),
                    path,
                    0.25,
                    60.0,
                    amplitude,
                )?;
            } else if !self.grabbed[hand] && was_grabbed {
                self.hands
                    .action(self.haptic)
                    .stop_haptic_feedback(xr.session(), path)?;
            }
        }

        let pulse = 0.04 * (current_time * 2.0).sin() as f32 + 0.05;
        self.clear_color = [
            if self.grabbed[0] { 0.45 } else { pulse },
            pulse,
            if self.grabbed[1] { 0.45 } else { 0.08 },
            1.0,
        ];
        Ok(())
    }

    fn render_eye(
        &mut self,
        binding: &VulkanBinding,
        _view: &xr::View,
        color: &VulkanTarget,
        _depth: &VulkanTarget,
    ) -> Result<()> {
        self.gpu.clear(binding, color, self.clear_color)
    }
}

/// Owns the one command buffer the demo records. Real renderers bring their
/// own frame synchronization; a clear per eye fits in a single buffer fenced
/// between uses.
struct ClearRecorder {
    /// Pool backing `cmd`; freed with the process.
    _pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

impl ClearRecorder {
    fn new(binding: &VulkanBinding) -> Result<Self> {
        let device = binding.device();
        unsafe {
            let pool = device.create_command_pool(
                &vk::CommandPoolCreateInfo::builder()
                    .queue_family_index(binding.queue_family_index())
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                None,
            )?;
            let cmd = device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_pool(pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?[0];
            let fence = device.create_fence(
                &vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED),
                None,
            )?;
            Ok(Self {
                _pool: pool,
                cmd,
                fence,
            })
        }
    }

    /// Clear one eye's slice of the acquired swapchain image, leaving it in
    /// the layout the compositor expects.
    fn clear(&self, binding: &VulkanBinding, target: &VulkanTarget, color: [f32; 4]) -> Result<()> {
        let device = binding.device();
        let range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: target.layer,
            layer_count: 1,
        };
        unsafe {
            device.wait_for_fences(&[self.fence], true, u64::MAX)?;
            device.reset_fences(&[self.fence])?;

            device.begin_command_buffer(
                self.cmd,
                &vk::CommandBufferBeginInfo::builder()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
            let to_transfer = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(target.image)
                .subresource_range(range)
                .build();
            device.cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );
            device.cmd_clear_color_image(
                self.cmd,
                target.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearColorValue { float32: color },
                &[range],
            );
            let to_attachment = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(target.image)
                .subresource_range(range)
                .build();
            device.cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_attachment],
            );
            device.end_command_buffer(self.cmd)?;

            let command_buffers = [self.cmd];
            let submit = vk::SubmitInfo::builder()
                .command_buffers(&command_buffers)
                .build();
            device.queue_submit(binding.queue(), &[submit], self.fence)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    launch::<VulkanBinding, HandsDemo>(())
}
