//! The host loop: wires an application's update/render callbacks into the
//! session controller and keeps ticking until the runtime or the user says
//! stop.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{info, warn};
use openxr as xr;

use crate::app::XrApp;
use crate::graphics::GraphicsBinding;

/// An application hosted by [`launch`].
pub trait App<B: GraphicsBinding>: Sized {
    const NAME: &'static str;
    /// Arguments passed into the structure on creation.
    type Args;

    /// Create the app. The session already exists, so this is the place to
    /// build action sets, suggest bindings, and attach them.
    fn new(xr: &mut XrApp<B>, args: Self::Args) -> Result<Self>;

    /// Once per main-loop tick, after the frame. `display_time` is zero when
    /// the session had no frame timing this tick.
    fn update(
        &mut self,
        xr: &mut XrApp<B>,
        current_time: f64,
        elapsed_time: f64,
        display_time: xr::Time,
    ) -> Result<()>;

    /// Twice per rendered frame, once per eye. Must not acquire or release
    /// swapchain images.
    fn render_eye(
        &mut self,
        binding: &B,
        view: &xr::View,
        color: &B::EyeTarget,
        depth: &B::EyeTarget,
    ) -> Result<()>;
}

/// Run an [`App`] against the OpenXR runtime until it exits.
pub fn launch<B: GraphicsBinding, A: App<B>>(args: A::Args) -> Result<()> {
    // Handle interrupts gracefully
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })?;

    let mut xr = XrApp::<B>::new(A::NAME)?;
    let mut app = A::new(&mut xr, args)?;

    let start = Instant::now();
    let mut prev_time = 0.0;

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("requesting exit");
            match xr.session().request_exit() {
                Ok(()) => {}
                Err(xr::sys::Result::ERROR_SESSION_NOT_RUNNING) => break,
                Err(e) => return Err(e.into()),
            }
        }

        let frame = xr.run_frame(|binding, view, color, depth| {
            app.render_eye(binding, view, color, depth)
        });

        if xr.should_exit() {
            info!("runtime requested exit");
            break;
        }

        let display_time = match frame {
            Ok(time) => time,
            Err(e) => {
                // A failed tick is dropped; the next one retries from event
                // draining.
                warn!("frame tick failed: {e:#}");
                std::thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let current_time = start.elapsed().as_secs_f64();
        let elapsed_time = current_time - prev_time;
        prev_time = current_time;
        app.update(&mut xr, current_time, elapsed_time, display_time)?;

        if !xr.session_running() {
            // Don't grind up the CPU while the runtime has us idle
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    Ok(())
}
