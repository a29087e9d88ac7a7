use anyhow::Context;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::RendererConfig,
    error::RenderError,
    gfx::{backend::wgpu_backend::WgpuBackend, camera::CameraController, Renderer},
    ui::{debug_panel, FrameStats, UiManager},
};

/// Windowed application driving one [`Renderer`]
pub struct App {
    event_loop: EventLoop<()>,
    state: AppState,
}

/// Everything that only exists once the window does
struct Session {
    window: Arc<Window>,
    backend: WgpuBackend,
    renderer: Renderer,
    ui: UiManager,
}

struct AppState {
    config: RendererConfig,
    session: Option<Session>,
    controller: CameraController,
    stats: FrameStats,
    last_frame: Instant,
    /// Set when the loop stops because of an error
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: RendererConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;

        Ok(Self {
            event_loop,
            state: AppState {
                config,
                session: None,
                controller: CameraController::new(),
                stats: FrameStats::new(),
                last_frame: Instant::now(),
                failure: None,
            },
        })
    }

    /// Runs the event loop until the window closes
    pub fn run(self) -> anyhow::Result<()> {
        let Self {
            event_loop,
            mut state,
        } = self;

        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut state)
            .context("event loop terminated abnormally")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn create_session(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Session> {
        let window_config = &self.config.window;
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(window_config.title.as_str())
                    .with_inner_size(LogicalSize::new(window_config.width, window_config.height)),
            )
            .context("failed to create window")?;
        let window = Arc::new(window);

        let (width, height) = window.inner_size().into();
        let mut backend = pollster::block_on(WgpuBackend::new(
            window.clone(),
            width,
            height,
            window_config.vsync,
        ))
        .context("failed to initialise graphics")?;

        let renderer = Renderer::init(&mut backend, &self.config, (width, height));
        let ui = UiManager::new(
            backend.device(),
            backend.queue(),
            backend.surface_format(),
            &window,
        );

        Ok(Session {
            window,
            backend,
            renderer,
            ui,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{:#}", err);
        self.failure = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self) -> Result<(), RenderError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let Session {
            window,
            backend,
            renderer,
            ui,
        } = session;

        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;
        self.stats.record(dt);

        let input = self.controller.take_input();
        renderer.update(backend, &input, dt.min(Duration::from_millis(100)).as_secs_f32());

        let stats = &self.stats;
        ui.update_logic(window, |frame_ui| {
            debug_panel(frame_ui, &mut renderer.settings, stats, backend.adapter_details())
        });

        let frame = renderer.record_frame();
        backend.render_frame(
            &frame,
            Some(
                |device: &wgpu::Device,
                 queue: &wgpu::Queue,
                 encoder: &mut wgpu::CommandEncoder,
                 view: &wgpu::TextureView| {
                    ui.render_display_only(device, queue, encoder, view);
                },
            ),
        )
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }

        match self.create_session(event_loop) {
            Ok(session) => {
                self.last_frame = Instant::now();
                self.session = Some(session);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let ui_event: Event<()> = Event::WindowEvent {
            window_id,
            event: event.clone(),
        };
        if session.ui.handle_input(&session.window, &ui_event) {
            session.window.request_redraw();
            return;
        }

        match event {
            WindowEvent::KeyboardInput { event: key_event, .. } => {
                if is_escape_press(&key_event) {
                    event_loop.exit();
                } else {
                    self.controller.process_keyed_events(&key_event);
                }
            }
            WindowEvent::Focused(false) => self.controller.reset(),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                session.backend.resize(width, height);
                session.renderer.resize(width, height);
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, anyhow::Error::new(err).context("failed to render frame"));
                }
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        if session.ui.wants_input() {
            return;
        }

        self.controller.process_events(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.as_ref() {
            session.window.request_redraw();
        }
    }
}

fn is_escape_press(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
}
