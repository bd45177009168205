use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{debug, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use meshview::render::programs::BUILTIN_PROGRAMS;
use meshview::viewer::describe_objects;
use meshview::{
    CliOptions, CursorMode, CursorRequest, HeadlessBackend, InputState, KeyCode, MouseButton,
    NamedKey, RenderStats, SceneDescription, SceneRegistry, ShaderProgramRef, ViewerConfig,
    ViewerState, WgpuBackend,
};

/// Simulated frame length in summary mode.
const FRAME_TIME: f32 = 1.0 / 60.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let scene = match &options.scene {
        Some(path) => SceneDescription::from_path(path)?,
        None => SceneDescription::builtin(options.import.as_deref()),
    };
    let config = ViewerConfig::default().with_window(&scene.window);

    println!(
        "Loaded scene with {} objects ({} meshes, {} textures)",
        scene.objects.len(),
        scene.meshes.len(),
        scene.textures.len()
    );

    if options.summary_only {
        return run_headless(&scene, config, options.frames);
    }

    match run_interactive(&scene, config.clone()) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!("{err}. Falling back to --summary-only mode.");
            run_headless(&scene, config, options.frames)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(scene: &SceneDescription, config: ViewerConfig, frames: u32) -> Result<()> {
    let mut gpu = HeadlessBackend::new();
    let mut registry = SceneRegistry::new();
    let programs: Vec<ShaderProgramRef> = BUILTIN_PROGRAMS
        .iter()
        .map(|spec| {
            let program = gpu.register_program(spec);
            registry.register_shader_program(spec.name, program);
            program
        })
        .collect();

    scene.populate(&mut registry, &mut gpu)?;

    let input = InputState::new();
    let mut viewer = ViewerState::new(config, registry.light());
    let mut totals = RenderStats::default();
    let mut time = 0.0;
    for frame in 0..frames {
        time = frame as f32 * FRAME_TIME;
        gpu.clear_draws();
        let context = viewer.step(&mut registry, &input, time);
        let stats = registry.render(&mut gpu, &context);
        totals.drawn += stats.drawn;
        totals.skipped += stats.skipped;
        totals.program_switches += stats.program_switches;
    }

    println!(
        "Simulated {frames} frame(s): {} draws, {} skipped, {} program switches",
        totals.drawn, totals.skipped, totals.program_switches
    );
    print!("{}", describe_objects(&registry, time));

    registry.shutdown(&mut gpu);
    for program in programs {
        gpu.delete_program(program);
    }
    Ok(())
}

fn run_interactive(scene: &SceneDescription, config: ViewerConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(scene.clone(), config);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    app.shutdown();
    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct ViewerApp {
    scene: SceneDescription,
    config: ViewerConfig,
    input: InputState,
    registry: SceneRegistry<WgpuBackend>,
    backend: Option<WgpuBackend>,
    viewer: Option<ViewerState>,
    programs: Vec<ShaderProgramRef>,
    start: Instant,
    last_time: f32,
    last_error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(scene: SceneDescription, config: ViewerConfig) -> Self {
        Self {
            scene,
            config,
            input: InputState::new(),
            registry: SceneRegistry::new(),
            backend: None,
            viewer: None,
            programs: Vec::new(),
            start: Instant::now(),
            last_time: 0.0,
            last_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title(self.config.title.clone())
                        .with_inner_size(LogicalSize::new(self.config.width, self.config.height)),
                )
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let mut backend = block_on(WgpuBackend::new(Arc::clone(&window)))
            .map_err(|err| WindowInitError::from_error("renderer", format!("{err:#}")))?;

        for spec in &BUILTIN_PROGRAMS {
            let program = backend.create_program(spec)?;
            self.registry.register_shader_program(spec.name, program);
            self.programs.push(program);
        }
        self.scene.populate(&mut self.registry, &mut backend)?;

        let mut viewer = ViewerState::new(self.config.clone(), self.registry.light());
        let size = window.inner_size();
        viewer.camera.resize(size.width, size.height);

        info!("window ready ({}x{})", size.width, size.height);
        self.viewer = Some(viewer);
        self.backend = Some(backend);
        self.start = Instant::now();
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(backend), Some(viewer)) = (self.backend.as_mut(), self.viewer.as_mut()) else {
            return Ok(());
        };

        self.last_time = self.start.elapsed().as_secs_f32();
        let frame = viewer.step(&mut self.registry, &self.input, self.last_time);
        apply_cursor_requests(backend.window(), self.input.take_cursor_requests());

        backend.begin_frame();
        self.registry.render(backend, &frame);
        match backend.end_frame() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => backend.reconfigure(),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(anyhow!("GPU is out of memory")),
            Err(wgpu::SurfaceError::Timeout) => info!("Surface timeout; retrying next frame"),
            Err(err) => warn!("failed to present frame: {err}"),
        }
        Ok(())
    }

    fn handle_keyboard(&self, key: PhysicalKey, state: ElementState) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }

    fn handle_mouse_button(&self, state: ElementState, button: WinitMouseButton) {
        let index = match button {
            WinitMouseButton::Left => 0,
            WinitMouseButton::Right => 1,
            WinitMouseButton::Middle => 2,
            WinitMouseButton::Back => 3,
            WinitMouseButton::Forward => 4,
            WinitMouseButton::Other(value) => value.min(u8::MAX as u16) as u8,
        };
        let button = MouseButton::new(index);
        match state {
            ElementState::Pressed => self.input.set_mouse_button_down(button),
            ElementState::Released => self.input.set_mouse_button_up(button),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn shutdown(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            println!("{}", describe_objects(&self.registry, self.last_time).trim_end());
            self.registry.shutdown(backend);
            for program in self.programs.drain(..) {
                backend.delete_program(program);
            }
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.backend.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if window_id != backend.window_id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                backend.resize(size);
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.camera.resize(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(WinitKeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                self.handle_keyboard(event.physical_key, event.state);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(state, button);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(backend) = self.backend.as_ref() {
            backend.window().request_redraw();
        }
    }
}

fn apply_cursor_requests(window: &Window, requests: Vec<CursorRequest>) {
    for request in requests {
        match request {
            CursorRequest::Warp(position) => {
                let target = PhysicalPosition::new(position.x as f64, position.y as f64);
                if let Err(err) = window.set_cursor_position(target) {
                    debug!("cursor warp unsupported: {err}");
                }
            }
            CursorRequest::Mode(CursorMode::Hidden) => {
                window.set_cursor_visible(false);
                let grabbed = window
                    .set_cursor_grab(CursorGrabMode::Confined)
                    .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
                if let Err(err) = grabbed {
                    debug!("cursor grab unsupported: {err}");
                }
            }
            CursorRequest::Mode(CursorMode::Normal) => {
                window.set_cursor_visible(true);
                if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
                    debug!("cursor release failed: {err}");
                }
            }
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_keycode(code: WinitKeyCode) -> Option<KeyCode> {
    use WinitKeyCode as Key;
    Some(match code {
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Enter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Backspace => KeyCode::Named(NamedKey::Backspace),
        Key::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        Key::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        Key::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        Key::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        Key::AltLeft => KeyCode::Named(NamedKey::LeftAlt),
        Key::AltRight => KeyCode::Named(NamedKey::RightAlt),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        Key::F5 => KeyCode::Function(5),
        Key::F6 => KeyCode::Function(6),
        Key::F7 => KeyCode::Function(7),
        Key::F8 => KeyCode::Function(8),
        Key::F9 => KeyCode::Function(9),
        Key::F10 => KeyCode::Function(10),
        Key::F11 => KeyCode::Function(11),
        Key::F12 => KeyCode::Function(12),
        _ => return None,
    })
}
