//! The seam between the session controller and a concrete graphics API.
//!
//! Each backend is a leaf implementation of [`GraphicsBinding`]; the
//! controller only ever sees this surface. It is consulted twice — once
//! before instance creation (extensions) and once around session creation
//! (device, formats, swapchain image views) — never per frame.

use anyhow::Result;
use openxr as xr;

/// Shorthand for the backend's swapchain format type.
pub type Format<B> = <<B as GraphicsBinding>::Api as xr::Graphics>::Format;
/// Shorthand for the backend's raw swapchain image type.
pub type SwapchainImage<B> = <<B as GraphicsBinding>::Api as xr::Graphics>::SwapchainImage;

/// What the session controller needs from a graphics backend.
pub trait GraphicsBinding: Sized
where
    Format<Self>: Copy + PartialEq,
{
    /// The OpenXR graphics API this backend drives.
    type Api: xr::Graphics;
    /// A renderable view of one array slice of one swapchain image.
    type EyeTarget;

    /// Switch on the instance extensions this backend requires. Errors when
    /// the runtime doesn't offer them; there is no fallback without a
    /// graphics extension.
    fn enable_extensions(
        available: &xr::ExtensionSet,
        enabled: &mut xr::ExtensionSet,
    ) -> Result<()>;

    /// Create the graphics device for `system`. The instance exists by now
    /// and gets a say in device selection.
    fn create_device(instance: &xr::Instance, system: xr::SystemId) -> Result<Self>;

    /// The structure chained into session creation to bind the device.
    fn session_create_info(&self) -> <Self::Api as xr::Graphics>::SessionCreateInfo;

    /// Color formats this backend can render to, most preferred first.
    fn preferred_color_formats(&self) -> Vec<Format<Self>>;

    /// Depth formats, most preferred first.
    fn preferred_depth_formats(&self) -> Vec<Format<Self>>;

    /// Wrap array slice `layer` of every swapchain image in a render target,
    /// indexed identically to the runtime's acquire index.
    fn make_color_targets(
        &self,
        images: &[SwapchainImage<Self>],
        format: Format<Self>,
        extent: (u32, u32),
        layer: u32,
    ) -> Result<Vec<Self::EyeTarget>>;

    /// Depth-stencil counterpart of [`GraphicsBinding::make_color_targets`].
    fn make_depth_targets(
        &self,
        images: &[SwapchainImage<Self>],
        format: Format<Self>,
        extent: (u32, u32),
        layer: u32,
    ) -> Result<Vec<Self::EyeTarget>>;
}

/// First entry of `preferred` that the runtime supports. `None` means the
/// configuration is unusable and session setup must fail.
pub fn pick_swapchain_format<F: Copy + PartialEq>(supported: &[F], preferred: &[F]) -> Option<F> {
    preferred.iter().copied().find(|f| supported.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_order_wins() {
        // supported [A, B, C], preferred [C, A] -> C
        let supported = [1u32, 2, 3];
        let preferred = [3u32, 1];
        assert_eq!(pick_swapchain_format(&supported, &preferred), Some(3));
    }

    #[test]
    fn unsupported_preferences_are_skipped() {
        let supported = [5u32, 7];
        let preferred = [9u32, 7, 5];
        assert_eq!(pick_swapchain_format(&supported, &preferred), Some(7));
    }

    #[test]
    fn no_mutual_format_is_none() {
        let supported = [1u32, 2];
        let preferred = [8u32, 9];
        assert_eq!(pick_swapchain_format(&supported, &preferred), None);
        assert_eq!(pick_swapchain_format(&supported, &[]), None);
        assert_eq!(pick_swapchain_format::<u32>(&[], &preferred), None);
    }
}
