pub mod app;
pub mod assets;
pub mod config;
pub mod context;
pub mod error;
pub mod input;
pub mod render;
pub mod scene;
pub mod scroll;
pub mod timing;
pub mod tween;

use winit::event_loop::{ControlFlow, EventLoop};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::app::{ViewerApp, ViewerEvent};
use crate::config::{ViewerConfig, WINDOW_TITLE};

// ======================================
// === MAIN ENTRY POINT ===
// ======================================

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub fn run() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            if console_log::init_with_level(log::Level::Info).is_err() {
                web_sys::console::error_1(&"Couldn't initialize logger".into());
            }
        } else {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        }
    }
    log::info!("Started {WINDOW_TITLE}");

    let event_loop = match EventLoop::<ViewerEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("Couldn't create event loop: {err}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let app = ViewerApp::new(ViewerConfig::default(), event_loop.create_proxy());

    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            use winit::platform::web::EventLoopExtWebSys;
            event_loop.spawn_app(app);
        } else {
            let mut app = app;
            if let Err(err) = event_loop.run_app(&mut app) {
                log::error!("Event loop stopped with an error: {err}");
            }
        }
    }
}
