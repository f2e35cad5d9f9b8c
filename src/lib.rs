//! Magnetron: a small base for OpenXR applications. Handles the input-action
//! binding protocol and the session/frame lifecycle so an app only supplies
//! update and per-eye render callbacks. Graphics devices plug in behind a
//! narrow binding trait; a Vulkan implementation is included.
mod actions;
mod app;
mod graphics;
mod lifecycle;
mod paths;
mod runtime;
mod vulkan;

pub use actions::{
    attach_action_sets, suggest_bindings, sync_action_sets, Action, ActionError, ActionId,
    ActionKind, ActionSet,
};
pub use app::{XrApp, VIEW_COUNT, VIEW_TYPE};
pub use graphics::{pick_swapchain_format, Format, GraphicsBinding, SwapchainImage};
pub use lifecycle::{SessionCommand, SessionLifecycle};
pub use paths::{
    GamepadPaths, HandPaths, HeadPaths, InteractionProfiles, StandardPaths, USER_GAMEPAD,
    USER_HAND_LEFT, USER_HAND_RIGHT, USER_HEAD,
};
pub use runtime::{launch, App};
pub use vulkan::{VulkanBinding, VulkanTarget};

pub(crate) const ENGINE_NAME: &str = "Magnetron";
