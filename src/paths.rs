//! Interned path table for the well-known OpenXR input topology.
//!
//! Paths are instance-scoped atoms, so the table is built once the instance
//! exists and then handed around by reference. Consumers never intern path
//! strings on a hot path.

use anyhow::Result;
use openxr as xr;
use xr::Path;

pub const USER_HAND_LEFT: &str = "/user/hand/left";
pub const USER_HAND_RIGHT: &str = "/user/hand/right";
pub const USER_HEAD: &str = "/user/head";
pub const USER_GAMEPAD: &str = "/user/gamepad";

/// Every path a controller-driven application is likely to bind against,
/// interned up front.
pub struct StandardPaths {
    pub user_hand_left: Path,
    pub user_hand_right: Path,
    pub user_head: Path,
    pub user_gamepad: Path,

    pub profiles: InteractionProfiles,

    pub left: HandPaths,
    pub right: HandPaths,
    pub head: HeadPaths,
    pub gamepad: GamepadPaths,
}

/// Interaction profile paths for the controller families most runtimes ship.
pub struct InteractionProfiles {
    pub khr_simple: Path,
    pub hp_mixed_reality: Path,
    pub htc_vive: Path,
    pub htc_vive_cosmos: Path,
    pub htc_vive_pro: Path,
    pub microsoft_motion: Path,
    pub microsoft_xbox: Path,
    pub oculus_touch: Path,
    pub valve_index: Path,
}

/// Input/output paths under one `/user/hand/{side}` top level.
pub struct HandPaths {
    pub a_click: Path,
    pub a_touch: Path,
    pub aim_pose: Path,
    pub b_click: Path,
    pub b_touch: Path,
    pub back_click: Path,
    pub grip_pose: Path,
    pub menu_click: Path,
    pub select_click: Path,
    pub shoulder_click: Path,
    pub squeeze_click: Path,
    pub squeeze_force: Path,
    pub squeeze_value: Path,
    pub system_click: Path,
    pub system_touch: Path,
    pub thumbrest_touch: Path,
    pub thumbstick: Path,
    pub thumbstick_click: Path,
    pub thumbstick_touch: Path,
    pub thumbstick_x: Path,
    pub thumbstick_y: Path,
    pub trackpad: Path,
    pub trackpad_click: Path,
    pub trackpad_force: Path,
    pub trackpad_touch: Path,
    pub trackpad_x: Path,
    pub trackpad_y: Path,
    pub trigger: Path,
    pub trigger_click: Path,
    pub trigger_touch: Path,
    pub trigger_value: Path,
    pub x_click: Path,
    pub x_touch: Path,
    pub y_click: Path,
    pub y_touch: Path,
    pub haptic: Path,
}

pub struct HeadPaths {
    pub mute_mic_click: Path,
    pub system_click: Path,
    pub volume_down_click: Path,
    pub volume_up_click: Path,
}

pub struct GamepadPaths {
    pub a_click: Path,
    pub b_click: Path,
    pub x_click: Path,
    pub y_click: Path,
    pub menu_click: Path,
    pub view_click: Path,
    pub thumbstick_left: Path,
    pub thumbstick_right: Path,
    pub trigger_left_value: Path,
    pub trigger_right_value: Path,
    pub haptic_left: Path,
    pub haptic_right: Path,
}

impl StandardPaths {
    pub fn new(instance: &xr::Instance) -> Result<Self> {
        Ok(Self {
            user_hand_left: instance.string_to_path(USER_HAND_LEFT)?,
            user_hand_right: instance.string_to_path(USER_HAND_RIGHT)?,
            user_head: instance.string_to_path(USER_HEAD)?,
            user_gamepad: instance.string_to_path(USER_GAMEPAD)?,
            profiles: InteractionProfiles::new(instance)?,
            left: HandPaths::new(instance, "left")?,
            right: HandPaths::new(instance, "right")?,
            head: HeadPaths::new(instance)?,
            gamepad: GamepadPaths::new(instance)?,
        })
    }

    /// The hand table for the given top-level user path, if it is one.
    pub fn hand(&self, user_path: Path) -> Option<&HandPaths> {
        if user_path == self.user_hand_left {
            Some(&self.left)
        } else if user_path == self.user_hand_right {
            Some(&self.right)
        } else {
            None
        }
    }
}

impl InteractionProfiles {
    fn new(instance: &xr::Instance) -> Result<Self> {
        let p = |s: &str| instance.string_to_path(&format!("/interaction_profiles/{}", s));
        Ok(Self {
            khr_simple: p("khr/simple_controller")?,
            hp_mixed_reality: p("hp/mixed_reality_controller")?,
            htc_vive: p("htc/vive_controller")?,
            htc_vive_cosmos: p("htc/vive_cosmos_controller")?,
            htc_vive_pro: p("htc/vive_pro")?,
            microsoft_motion: p("microsoft/motion_controller")?,
            microsoft_xbox: p("microsoft/xbox_controller")?,
            oculus_touch: p("oculus/touch_controller")?,
            valve_index: p("valve/index_controller")?,
        })
    }
}

impl HandPaths {
    fn new(instance: &xr::Instance, side: &str) -> Result<Self> {
        let input = |s: &str| instance.string_to_path(&format!("/user/hand/{}/input/{}", side, s));
        let output = |s: &str| instance.string_to_path(&format!("/user/hand/{}/output/{}", side, s));
        Ok(Self {
            a_click: input("a/click")?,
            a_touch: input("a/touch")?,
            aim_pose: input("aim/pose")?,
            b_click: input("b/click")?,
            b_touch: input("b/touch")?,
            back_click: input("back/click")?,
            grip_pose: input("grip/pose")?,
            menu_click: input("menu/click")?,
            select_click: input("select/click")?,
            shoulder_click: input("shoulder/click")?,
            squeeze_click: input("squeeze/click")?,
            squeeze_force: input("squeeze/force")?,
            squeeze_value: input("squeeze/value")?,
            system_click: input("system/click")?,
            system_touch: input("system/touch")?,
            thumbrest_touch: input("thumbrest/touch")?,
            thumbstick: input("thumbstick")?,
            thumbstick_click: input("thumbstick/click")?,
            thumbstick_touch: input("thumbstick/touch")?,
            thumbstick_x: input("thumbstick/x")?,
            thumbstick_y: input("thumbstick/y")?,
            trackpad: input("trackpad")?,
            trackpad_click: input("trackpad/click")?,
            trackpad_force: input("trackpad/force")?,
            trackpad_touch: input("trackpad/touch")?,
            trackpad_x: input("trackpad/x")?,
            trackpad_y: input("trackpad/y")?,
            trigger: input("trigger")?,
            trigger_click: input("trigger/click")?,
            trigger_touch: input("trigger/touch")?,
            trigger_value: input("trigger/value")?,
            x_click: input("x/click")?,
            x_touch: input("x/touch")?,
            y_click: input("y/click")?,
            y_touch: input("y/touch")?,
            haptic: output("haptic")?,
        })
    }
}

impl HeadPaths {
    fn new(instance: &xr::Instance) -> Result<Self> {
        let input = |s: &str| instance.string_to_path(&format!("/user/head/input/{}", s));
        Ok(Self {
            mute_mic_click: input("mute_mic/click")?,
            system_click: input("system/click")?,
            volume_down_click: input("volume_down/click")?,
            volume_up_click: input("volume_up/click")?,
        })
    }
}

impl GamepadPaths {
    fn new(instance: &xr::Instance) -> Result<Self> {
        let input = |s: &str| instance.string_to_path(&format!("/user/gamepad/input/{}", s));
        let output = |s: &str| instance.string_to_path(&format!("/user/gamepad/output/{}", s));
        Ok(Self {
            a_click: input("a/click")?,
            b_click: input("b/click")?,
            x_click: input("x/click")?,
            y_click: input("y/click")?,
            menu_click: input("menu/click")?,
            view_click: input("view/click")?,
            thumbstick_left: input("thumbstick_left")?,
            thumbstick_right: input("thumbstick_right")?,
            trigger_left_value: input("trigger_left/value")?,
            trigger_right_value: input("trigger_right/value")?,
            haptic_left: output("haptic_left")?,
            haptic_right: output("haptic_right")?,
        })
    }
}
