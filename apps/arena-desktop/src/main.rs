use anyhow::{Context, Result};
use arena_input::{Action, InputState, KeyBindings};
use arena_kernel::{World, WorldEvent};
use arena_level::LevelDef;
use arena_persist::{InputLog, SaveStore};
use arena_render::{RenderView, extract_scene};
use arena_render_wgpu::{FirstPersonCamera, WgpuRenderer};
use arena_tools::ArenaInspector;
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec2;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

/// Event lines kept for the HUD.
const RECENT_EVENTS: usize = 8;

#[derive(Parser)]
#[command(name = "arena-desktop", about = "First-person arena")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Level file (.yaml/.yml/.json); the built-in arena when omitted
    #[arg(long)]
    level: Option<PathBuf>,

    /// Simulation seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Save directory
    #[arg(long, default_value = "./arena_save")]
    data_dir: PathBuf,

    /// Key bindings file (YAML map of key name to action)
    #[arg(long)]
    bindings: Option<PathBuf>,
}

/// Everything the game needs between frames, independent of the GPU.
struct AppState {
    world: World,
    bindings: KeyBindings,
    input: InputState,
    log: InputLog,
    data_dir: PathBuf,
    /// True once the save directory holds a snapshot this session's log
    /// continues from.
    snapshot_in_store: bool,
    recent: VecDeque<String>,
    show_hud: bool,
    paused: bool,
    cursor_grabbed: bool,
    last_frame: Instant,
    tick_accumulator: f64,
    tick_dt: f64,
}

impl AppState {
    fn new(world: World, bindings: KeyBindings, data_dir: PathBuf) -> Self {
        let mut input = InputState::default();
        input.set_view(world.player().yaw, world.player().pitch);
        let tick_dt = f64::from(world.config().dt());
        Self {
            world,
            bindings,
            input,
            log: InputLog::new(),
            data_dir,
            snapshot_in_store: false,
            recent: VecDeque::with_capacity(RECENT_EVENTS),
            show_hud: true,
            paused: true,
            cursor_grabbed: false,
            last_frame: Instant::now(),
            tick_accumulator: 0.0,
            tick_dt,
        }
    }

    /// Advance the simulation by whole ticks covered by `dt`.
    fn update(&mut self, dt: f32) {
        if self.paused {
            self.tick_accumulator = 0.0;
            return;
        }

        self.tick_accumulator += f64::from(dt);
        while self.tick_accumulator >= self.tick_dt {
            self.tick_accumulator -= self.tick_dt;
            let input = self.input.to_player_input();
            self.world.step(&input);
            if let Err(e) = self.log.push(self.world.tick(), input) {
                tracing::warn!("input not recorded: {e}");
            }
        }

        for event in self.world.drain_events() {
            match &event {
                WorldEvent::Stepped { .. } => continue,
                WorldEvent::TaskCompleted { .. } | WorldEvent::AllTasksComplete { .. } => {
                    tracing::info!("{}", ArenaInspector::describe_event(&self.world, &event));
                }
                _ => {}
            }
            self.push_line(ArenaInspector::describe_event(&self.world, &event));
        }
    }

    fn push_line(&mut self, line: String) {
        if self.recent.len() == RECENT_EVENTS {
            self.recent.pop_front();
        }
        self.recent.push_back(line);
    }

    /// Map a key to an action and apply it. Returns the action for the
    /// window layer to act on.
    fn handle_key(&mut self, key_name: &str, pressed: bool, repeat: bool) -> Option<Action> {
        let action = self.bindings.action_for(key_name)?;
        if action.is_app_command() {
            if !pressed || repeat {
                return None;
            }
            match action {
                Action::Save => self.save(),
                Action::Load => self.load(),
                Action::ToggleHud => self.show_hud = !self.show_hud,
                Action::Pause => self.set_paused(!self.paused),
                _ => {}
            }
            return Some(action);
        }
        if self.paused {
            return None;
        }
        self.input.apply(action, pressed);
        Some(action)
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.input.release_all();
        }
        tracing::debug!(paused, "pause toggled");
    }

    fn save(&mut self) {
        let mut store = match SaveStore::open(&self.data_dir) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!("failed to open save store: {e}");
                return;
            }
        };

        let result = if self.snapshot_in_store {
            store.append_inputs(self.log.frames())
        } else {
            store.take_snapshot(&self.world).map(|_| ())
        };
        match result {
            Ok(()) => {
                self.log.clear();
                self.snapshot_in_store = true;
                self.push_line(format!("[{}] saved", self.world.tick()));
                tracing::info!(tick = self.world.tick(), dir = %self.data_dir.display(), "game saved");
            }
            Err(e) => tracing::error!("failed to save: {e}"),
        }
    }

    fn load(&mut self) {
        let loaded = SaveStore::open(&self.data_dir).and_then(|store| store.load_latest());
        match loaded {
            Ok(world) => {
                self.input.release_all();
                self.input.set_view(world.player().yaw, world.player().pitch);
                self.world = world;
                self.log.clear();
                self.snapshot_in_store = true;
                self.tick_accumulator = 0.0;
                self.tick_dt = f64::from(self.world.config().dt());
                self.push_line(format!("[{}] loaded", self.world.tick()));
                tracing::info!(tick = self.world.tick(), "game loaded");
            }
            Err(e) => {
                self.push_line(format!("load failed: {e}"));
                tracing::error!("failed to load: {e}");
            }
        }
    }

    /// Floor grid half-width covering the world's bounds, in meters.
    fn grid_half_extent(&self) -> i32 {
        let b = self.world.bounds();
        b.min
            .x
            .abs()
            .max(b.max.x.abs())
            .max(b.min.z.abs())
            .max(b.max.z.abs())
            .ceil() as i32
    }

    /// The view to draw. Uses the live look angles so the camera turns
    /// between ticks.
    fn render_view(&self) -> RenderView {
        RenderView {
            yaw: self.input.yaw(),
            pitch: self.input.pitch(),
            ..RenderView::from_world(&self.world)
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        let center = ctx.screen_rect().center();
        ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("crosshair"),
        ))
        .circle_filled(center, 2.5, egui::Color32::WHITE);

        if self.paused {
            egui::Area::new(egui::Id::new("paused"))
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, -40.0))
                .show(ctx, |ui| {
                    ui.heading("Paused");
                    ui.label("Click to play, Escape to pause");
                });
        }

        if !self.show_hud {
            return;
        }

        let summary = ArenaInspector::summary(&self.world);
        let mut save = false;
        let mut load = false;

        egui::SidePanel::left("hud")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Arena");
                ui.separator();
                ui.label(format!("Tick: {}  Seed: {}", summary.tick, summary.seed));
                let p = summary.player_position;
                ui.label(format!("Position: ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z));
                ui.label(if summary.grounded { "On the ground" } else { "Airborne" });
                ui.label(format!(
                    "NPCs: {} wandering, {} idle, {} watching",
                    summary.npcs_wandering, summary.npcs_idle, summary.npcs_observing
                ));
                ui.separator();

                ui.heading("Tasks");
                let progress = if summary.tasks_total == 0 {
                    1.0
                } else {
                    summary.tasks_done as f32 / summary.tasks_total as f32
                };
                ui.add(
                    egui::ProgressBar::new(progress)
                        .text(format!("{}/{}", summary.tasks_done, summary.tasks_total)),
                );
                for task in ArenaInspector::task_list(&self.world) {
                    ui.label(task.to_string());
                }
                ui.separator();

                ui.heading("Events");
                for line in &self.recent {
                    ui.small(line.as_str());
                }
                ui.separator();

                ui.horizontal(|ui| {
                    save = ui.button("Save (F5)").clicked();
                    load = ui.button("Load (F9)").clicked();
                });
                ui.small("WASD: Move | Space: Jump | E: Interact | F1: HUD | Esc: Pause");
            });

        if save {
            self.save();
        }
        if load {
            self.load();
        }
    }
}

/// Window and GPU resources, created once the event loop resumes.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(
        event_loop: &ActiveEventLoop,
        egui_ctx: &EguiContext,
        grid_half_extent: i32,
    ) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Arena")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("arena_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(
            &device,
            format,
            config.width,
            config.height,
            grid_half_extent,
        );
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer
            .resize(&self.device, self.config.width, self.config.height);
    }

    fn set_cursor_grab(&self, grab: bool) {
        let result = if grab {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = result {
            tracing::warn!("cursor grab failed: {e}");
        }
        self.window.set_cursor_visible(!grab);
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            gpu: None,
            egui_ctx: EguiContext::default(),
        }
    }

    /// Keep the cursor grab in step with the pause state.
    fn sync_cursor(&mut self) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        let want = !self.state.paused;
        if want != self.state.cursor_grabbed {
            gpu.set_cursor_grab(want);
            self.state.cursor_grabbed = want;
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
        self.state.last_frame = now;
        self.state.update(dt);

        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let grid = self.state.grid_half_extent();
        if gpu.renderer.grid_half_extent() != grid {
            gpu.renderer.set_grid(&gpu.device, grid);
        }

        let camera = FirstPersonCamera::new(
            self.state.render_view(),
            gpu.config.width,
            gpu.config.height,
        );
        let boxes = extract_scene(&self.state.world);
        gpu.renderer
            .render(&gpu.device, &gpu.queue, &view, &camera, &boxes);

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let state = &mut self.state;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            state.draw_ui(ctx);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &self.egui_ctx, self.state.grid_half_extent()) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                tracing::error!("failed to initialize graphics: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // The HUD only takes input while the cursor is free.
        if let Some(gpu) = &mut self.gpu {
            if !self.state.cursor_grabbed {
                let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
                if response.consumed {
                    return;
                }
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                tracing::info!(tick = self.state.world.tick(), "closing");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size);
                }
            }
            WindowEvent::Focused(false) => {
                self.state.set_paused(true);
                self.sync_cursor();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => {
                let name = format!("{key:?}");
                let pressed = key_state == ElementState::Pressed;
                if self.state.handle_key(&name, pressed, repeat).is_some() {
                    self.sync_cursor();
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                if self.state.paused {
                    self.state.set_paused(false);
                    self.sync_cursor();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.cursor_grabbed {
                let delta = Vec2::new(delta.0 as f32, delta.1 as f32);
                self.state.input.apply(Action::Look(delta), true);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("arena-desktop starting");

    let level = match &cli.level {
        Some(path) => LevelDef::load(path)
            .with_context(|| format!("loading level {}", path.display()))?,
        None => LevelDef::default_arena(),
    };
    let world = level.build(cli.seed)?;
    tracing::info!(
        level = %level.name,
        seed = cli.seed,
        npcs = world.npcs().len(),
        tasks = world.tasks().len(),
        "level built"
    );

    let bindings = match &cli.bindings {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading bindings {}", path.display()))?;
            serde_yaml::from_str(&text)?
        }
        None => KeyBindings::default(),
    };

    let state = AppState::new(world, bindings, cli.data_dir);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    Ok(())
}
