//! Application event loop.
//!
//! [`run`] opens a window (the `canvas` element on the web), creates the GPU
//! [`Context`], and drives a [`Showcase`] with winit's [`ApplicationHandler`]:
//!
//! 1. window and device events go to the orbit controls and the pointer
//! 2. the model and the environment load in the background and arrive as
//!    [`SceneEvent`]s through the event loop proxy
//! 3. every redraw advances the showcase by the elapsed time and renders a frame
//!
//! A failed load is logged and leaves the scene as it is.

use std::sync::Arc;

use instant::Instant;

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::SceneConfig,
    context::Context,
    data_structures::{scene_graph::SceneNode, texture::EnvironmentTexture},
    render::SceneRenderer,
    resources::{AssetLoader, load_or_warn},
    showcase::Showcase,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Results of the background loads.
#[derive(Debug)]
pub enum SceneEvent {
    ModelLoaded(SceneNode),
    EnvironmentLoaded(EnvironmentTexture),
}

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized {
        state: AppState,
    },
    Scene(SceneEvent),
    #[allow(dead_code)]
    Exit,
}

impl std::fmt::Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { .. } => f.write_str("Initialized"),
            Self::Scene(event) => f.debug_tuple("Scene").field(event).finish(),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

/// GPU context, renderer and scene state.
#[derive(Debug)]
pub(crate) struct AppState {
    ctx: Context,
    renderer: SceneRenderer,
    showcase: Showcase,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: SceneConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        let [width, height] = ctx.size();
        let mut showcase = Showcase::new(config, width, height);
        showcase.set_pixel_ratio(ctx.window.scale_factor());
        let renderer = SceneRenderer::new(&ctx, &showcase);
        Ok(Self {
            ctx,
            renderer,
            showcase,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.is_surface_configured = true;
            self.showcase.resize(width, height);
            self.renderer.resize(&self.ctx.device, width, height);
        }
    }

    fn handle_scene_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::ModelLoaded(model) => {
                self.showcase.on_model_loaded(model);
            }
            SceneEvent::EnvironmentLoaded(environment) => {
                self.showcase.on_environment_loaded(environment);
            }
        }
        self.ctx.window.request_redraw();
    }

    fn render(&mut self, dt: instant::Duration) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }
        self.showcase.frame(dt);
        self.renderer.render(&self.ctx, &self.showcase)
    }
}

pub(crate) struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    loader: AssetLoader,
    // taken once the window exists
    config: Option<SceneConfig>,
    state: Option<AppState>,
    // scene events that arrive before the context on the web
    pending: Vec<SceneEvent>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            loader: AssetLoader::from_env(),
            config: Some(config),
            state: None,
            pending: Vec::new(),
            last_time: Instant::now(),
        })
    }

    /// Starts loading the model and the environment. Each result is sent to the
    /// event loop on its own, so either can arrive first.
    fn spawn_loads(&self, config: &SceneConfig) {
        let model = {
            let loader = self.loader.clone();
            let proxy = self.proxy.clone();
            let file = config.model_file.clone();
            async move {
                if let Some(model) = load_or_warn(&file, loader.load_model(&file)).await {
                    send(&proxy, FlowEvent::Scene(SceneEvent::ModelLoaded(model)));
                }
            }
        };
        let environment = {
            let loader = self.loader.clone();
            let proxy = self.proxy.clone();
            let file = config.environment_file.clone();
            let mapping = config.environment_mapping;
            async move {
                if let Some(environment) =
                    load_or_warn(&file, loader.load_environment(&file, mapping)).await
                {
                    send(
                        &proxy,
                        FlowEvent::Scene(SceneEvent::EnvironmentLoaded(environment)),
                    );
                }
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.async_runtime.spawn(model);
            self.async_runtime.spawn(environment);
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(model);
            wasm_bindgen_futures::spawn_local(environment);
        }
    }

    fn initialized(&mut self, mut state: AppState) {
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        for event in self.pending.drain(..) {
            state.handle_scene_event(event);
        }
        state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(state);
    }
}

fn send(proxy: &EventLoopProxy<FlowEvent>, event: FlowEvent) {
    if let Err(e) = proxy.send_event(event) {
        log::warn!("event loop closed before a load finished: {e}");
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("mannequin");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the window: {e}");
                event_loop.exit();
                return;
            }
        };

        self.spawn_loads(&config);
        let init_future = AppState::new(window, config);

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(state) => self.initialized(state),
                Err(e) => {
                    log::error!("App initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok(state) => send(&proxy, FlowEvent::Initialized { state }),
                    Err(e) => {
                        log::error!("App initialization failed: {e:#}");
                        send(&proxy, FlowEvent::Exit);
                    }
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized { state } => self.initialized(state),
            FlowEvent::Scene(scene_event) => match &mut self.state {
                Some(state) => state.handle_scene_event(scene_event),
                None => self.pending.push(scene_event),
            },
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            let height = state.showcase.viewport().height;
            state.showcase.controls.handle_mouse_motion(dx, dy, height);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.showcase.controls.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                state.showcase.set_pixel_ratio(scale_factor);
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.showcase.pointer_moved(position.x, position.y);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match state.render(dt) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Opens the window and runs the showcase until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Web entry point: the glass showcase on the page's `canvas`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run(SceneConfig::glass()).map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
