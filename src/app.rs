use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoopProxy},
    window::{Window, WindowAttributes, WindowId},
};

use crate::assets::{self, AssetEvent};
use crate::config::{ViewerConfig, Viewport};
#[cfg(not(target_arch = "wasm32"))]
use crate::config::{DIMX, DIMY, WINDOW_TITLE};
use crate::context::{DirtyFlags, ViewerContext};
use crate::error::RenderError;
use crate::render::Renderer;
use crate::timing::{Clock, FrameStats};

/// Messages posted back to the event loop from async work.
pub enum ViewerEvent {
    Asset(AssetEvent),
    #[cfg(target_arch = "wasm32")]
    RendererReady(Result<Box<Renderer>, RenderError>),
}

pub struct ViewerApp {
    config: ViewerConfig,
    proxy: EventLoopProxy<ViewerEvent>,
    clock: Clock,
    stats: FrameStats,
    window: Option<Arc<Window>>,
    context: Option<ViewerContext>,
    renderer: Option<Renderer>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig, proxy: EventLoopProxy<ViewerEvent>) -> Self {
        Self {
            config,
            proxy,
            clock: Clock::new(),
            stats: FrameStats::default(),
            window: None,
            context: None,
            renderer: None,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn window_attributes(&self) -> Option<WindowAttributes> {
        Some(
            Window::default_attributes()
                .with_title(WINDOW_TITLE)
                .with_inner_size(PhysicalSize::new(DIMX, DIMY)),
        )
    }

    /// Binds the page's existing canvas. The viewer never creates its own.
    #[cfg(target_arch = "wasm32")]
    fn window_attributes(&self) -> Option<WindowAttributes> {
        use wasm_bindgen::JsCast;
        use winit::platform::web::WindowAttributesExtWebSys;

        let canvas = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(&self.config.canvas_id))
            .and_then(|element| element.dyn_into::<web_sys::HtmlCanvasElement>().ok());
        if canvas.is_none() {
            log::error!("No <canvas id=\"{}\"> on the page", self.config.canvas_id);
        }
        canvas.map(|canvas| Window::default_attributes().with_canvas(Some(canvas)))
    }

    fn spawn_loads(&self) {
        let proxy = self.proxy.clone();
        assets::spawn_startup_loads(
            self.config.environment_url.clone(),
            self.config.model_url.clone(),
            move |event| {
                if proxy.send_event(ViewerEvent::Asset(event)).is_err() {
                    log::debug!("Event loop closed before asset load finished");
                }
            },
        );
    }

    fn install_renderer(&mut self, event_loop: &ActiveEventLoop, result: Result<Renderer, RenderError>) {
        match result {
            Ok(renderer) => {
                if let Some(context) = &mut self.context {
                    // Loads may have landed before the device existed.
                    context.dirty |= DirtyFlags::all();
                }
                self.renderer = Some(renderer);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            Err(err) => {
                log::error!("Couldn't initialize renderer: {err}");
                event_loop.exit();
            }
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        if let Some(context) = &mut self.context {
            context.handle_resize(Viewport::new(size.width, size.height, scale_factor));
        }
    }

    // === FRAME DRIVER ===

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = self.clock.elapsed_seconds();
        let Some(context) = &mut self.context else {
            return;
        };

        #[cfg(target_arch = "wasm32")]
        {
            context.scroll.set_limit(page::scroll_limit());
            context.scroll.sync(page::scroll_y());
        }

        if let Some(offset) = context.advance_frame(now) {
            #[cfg(target_arch = "wasm32")]
            page::scroll_to(offset);
            #[cfg(not(target_arch = "wasm32"))]
            log::trace!("Scroll offset {offset:.1}");
        }

        if let Some(renderer) = &mut self.renderer {
            renderer.sync(context);
            if let Err(err) = renderer.render(context) {
                match err {
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => renderer.reconfigure(),
                    wgpu::SurfaceError::OutOfMemory => {
                        log::error!("Surface out of memory, exiting");
                        event_loop.exit();
                    }
                    other => log::warn!("Render error: {other:?}"),
                }
            }
        }

        if let Some(fps) = self.stats.record(now) {
            log::debug!("FPS: {fps:.1} ({} frames)", self.stats.frame_count);
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let Some(attributes) = self.window_attributes() else {
            event_loop.exit();
            return;
        };
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Couldn't create window: {err}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let viewport = Viewport::new(size.width, size.height, window.scale_factor());
        self.context = Some(ViewerContext::new(self.config.clone(), viewport));
        self.window = Some(window.clone());
        self.spawn_loads();
        window.request_redraw();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = pollster::block_on(Renderer::new(window, viewport, &self.config.render));
            self.install_renderer(event_loop, result);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let settings = self.config.render.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = Renderer::new(window, viewport, &settings).await.map(Box::new);
                if proxy.send_event(ViewerEvent::RendererReady(result)).is_err() {
                    log::debug!("Event loop closed before renderer was ready");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Asset(event) => {
                if let Some(context) = &mut self.context {
                    context.handle_asset(event);
                }
            }
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::RendererReady(result) => self.install_renderer(event_loop, result.map(|renderer| *renderer)),
        }
        #[cfg(not(target_arch = "wasm32"))]
        let _ = event_loop;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let window = match &self.window {
            Some(window) => window.clone(),
            None => return,
        };

        if window.id() != id {
            return;
        }

        let now = self.clock.elapsed_seconds();
        match event {
            WindowEvent::Resized(size) => self.resize(size, window.scale_factor()),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => self.resize(window.inner_size(), scale_factor),
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(context) = &mut self.context {
                    context.handle_pointer_move(position.x, position.y, now);
                }
            }
            WindowEvent::Touch(touch) => {
                if let Some(context) = &mut self.context {
                    context.handle_touch(touch.id, touch.phase, touch.location.x, touch.location.y, now);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(context) = &mut self.context {
                    context.handle_wheel(delta);
                }
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }
}

/// Host page scrolling driven by the smooth scroller.
#[cfg(target_arch = "wasm32")]
mod page {
    pub fn scroll_limit() -> f32 {
        let Some(window) = web_sys::window() else {
            return 0.0;
        };
        let viewport_height = window.inner_height().ok().and_then(|value| value.as_f64()).unwrap_or(0.0);
        let content_height = window
            .document()
            .and_then(|document| document.document_element())
            .map_or(0, |element| element.scroll_height());
        (content_height as f64 - viewport_height).max(0.0) as f32
    }

    pub fn scroll_y() -> f32 {
        web_sys::window()
            .and_then(|window| window.scroll_y().ok())
            .unwrap_or(0.0) as f32
    }

    pub fn scroll_to(offset: f32) {
        if let Some(window) = web_sys::window() {
            window.scroll_to_with_x_and_y(0.0, offset as f64);
        }
    }
}
