use ab_glyph::FontArc;
use anyhow::{Context, Result};
use avsync_core::{ParticipantRecord, PointerPosition, SessionStage, TrialResult};
use avsync_experiment::{ExperimentConfig, JsonFileSink, OfflineSink, SessionSummary, StimulusClock};
use avsync_render::{Scene, SkiaRenderer, load_font, load_stimulus};
use avsync_timing::{HighPrecisionTimer, Timer};
use crate::audio::ToneEmitter;
use crate::cli::Args;
use crate::output::ScreenOutput;
use crate::sink::SessionSink;
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiny_skia::Pixmap;
use tracing::{error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

type Clock = StimulusClock<HighPrecisionTimer, ThreadRng, ScreenOutput, SessionSink>;

/// Deadlines closer than this are slept out on the timer instead of left to
/// the event loop's wakeup.
const SLEEP_WINDOW: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pacing {
    Idle,
    WakeIn(Duration),
    SleepFor(Duration),
}

fn pacing(until_deadline: Option<Duration>) -> Pacing {
    match until_deadline {
        None => Pacing::Idle,
        Some(wait) if wait <= SLEEP_WINDOW => Pacing::SleepFor(wait),
        Some(wait) => Pacing::WakeIn(wait - SLEEP_WINDOW),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile<'a> {
    participant: &'a ParticipantRecord,
    questionnaire: &'a [i32],
    summary: &'a SessionSummary,
    trials: &'a [TrialResult],
}

pub struct App {
    args: Args,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    experiment: Clock,
    renderer: Option<SkiaRenderer>,
    stimulus: Pixmap,
    font: Option<FontArc>,
    cursor: Option<PointerPosition>,
    refresh_rate: Option<f64>,

    saved: bool,
    should_exit: bool,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = ExperimentConfig::load_or_default(&args.config)
            .with_context(|| format!("loading config {}", args.config.display()))?;
        // fail before any window opens
        args.questionnaire().context("questionnaire answers")?;
        let stimulus = load_stimulus(&config.stimulus).context("loading stimulus")?;
        let font = args.font.as_ref().map(load_font).transpose()?;

        let tone = if args.no_audio {
            ToneEmitter::silent()
        } else {
            ToneEmitter::open_or_silent()
        };
        let sink = if args.offline {
            SessionSink::Offline(OfflineSink)
        } else {
            SessionSink::File(
                JsonFileSink::new(&args.output)
                    .with_context(|| format!("opening output dir {}", args.output.display()))?,
            )
        };

        let experiment = StimulusClock::new(
            config,
            HighPrecisionTimer::new(),
            rand::rng(),
            ScreenOutput::new(tone),
            sink,
        )?;

        let mut app = Self {
            args,
            window: None,
            pixels: None,
            experiment,
            renderer: None,
            stimulus,
            font,
            cursor: None,
            refresh_rate: None,
            saved: false,
            should_exit: false,
        };
        app.begin_session()?;
        Ok(app)
    }

    /// Enrollment and questionnaire come from the command line.
    fn begin_session(&mut self) -> Result<()> {
        let id = self.experiment.enroll(self.args.participant())?;
        self.experiment
            .submit_questionnaire(self.args.questionnaire()?)?;
        self.saved = false;
        info!("Participant {id} ready; {} trials", self.experiment.config().trial_count());
        Ok(())
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
        info!("Press SPACE to start or ESC to exit");
        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("AV Synchrony")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();

        info!(
            "Display: {}x{} @ scale {:.2}{}",
            physical_size.width,
            physical_size.height,
            window.scale_factor(),
            self.refresh_rate
                .map(|hz| format!(", {hz:.1} Hz"))
                .unwrap_or_default()
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(
            Pixels::new(physical_size.width, physical_size.height, surface_texture)
                .context("creating pixel surface")?,
        );
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            self.stimulus.clone(),
            self.font.clone(),
        )?);

        self.experiment.output_mut().attach(window.clone());
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let clock = &self.experiment;
        let visible = clock.output().visible();
        let hovered = self
            .cursor
            .filter(|_| visible.response_controls)
            .and_then(|pos| renderer.layout().hit(pos));
        let scene = Scene {
            stage: clock.stage(),
            visible,
            progress: clock.progress(),
            summary: clock.summary(),
            hovered,
        };

        let stats = renderer.render_frame(&scene, pixels.frame_mut(), clock.timer())?;
        let t = clock.timer().now();
        pixels.render().context("presenting frame")?;
        trace!(
            "present {:.3}ms, clear {:.3}ms, draw {:.3}ms, copy {:.3}ms, total {:.3}ms, dirty {}",
            clock.timer().elapsed(t).as_secs_f64() * 1e3,
            stats.clear.as_secs_f64() * 1e3,
            stats.draw.as_secs_f64() * 1e3,
            stats.copy.as_secs_f64() * 1e3,
            stats.total.as_secs_f64() * 1e3,
            stats.dirty_count,
        );
        self.experiment.timer_mut().record_frame(stats.total);
        Ok(())
    }

    /// Fires due callbacks and saves the session file once it completes.
    fn update(&mut self) {
        self.experiment.poll();
        if self.experiment.stage().is_complete() && !self.saved {
            self.saved = true;
            match self.write_session_file() {
                Ok(path) => info!("Session written to {}", path.display()),
                Err(e) => warn!("Session file not written: {e:#}"),
            }
        }
    }

    fn write_session_file(&self) -> Result<PathBuf> {
        let clock = &self.experiment;
        let (Some(participant), Some(summary)) = (clock.participant(), clock.summary()) else {
            anyhow::bail!("session has no participant or summary");
        };
        let file = SessionFile {
            participant,
            questionnaire: &self.args.answers,
            summary,
            trials: clock.results(),
        };
        std::fs::create_dir_all(&self.args.output)?;
        let path = self
            .args
            .output
            .join(format!("session-{}.json", participant.participant_id));
        let json = serde_json::to_vec_pretty(&file)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    fn handle_input(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(k) = key else {
            return;
        };
        match k {
            KeyCode::Space if self.experiment.stage() == SessionStage::Instructions => {
                if let Err(e) = self.experiment.start() {
                    error!("Cannot start trials: {e}");
                }
            }
            KeyCode::KeyR if self.experiment.stage().is_complete() => {
                self.experiment.restart();
                if let Err(e) = self.begin_session() {
                    error!("Cannot begin a new session: {e:#}");
                    self.cleanup_and_exit(event_loop);
                }
            }
            KeyCode::Escape => self.cleanup_and_exit(event_loop),
            _ => {}
        }
    }

    fn handle_click(&mut self) {
        let (Some(pos), Some(renderer)) = (self.cursor, self.renderer.as_ref()) else {
            return;
        };
        if !self.experiment.output().visible().response_controls {
            return;
        }
        if let Some(response) = renderer.layout().hit(pos) {
            self.experiment.respond(response, Some(pos));
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                warn!("Failed to resize renderer: {e:#}");
            }
        }
        info!("Display resized to {}x{}", new_size.width, new_size.height);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        let frames = self.experiment.timer().frame_stats();
        info!(
            "Exiting after {} of {} trials; {} frames, mean render {:.3}ms, jitter {:.3}ms",
            self.experiment.results().len(),
            self.experiment.config().trial_count(),
            frames.frames,
            frames.average_frame_time_ns / 1e6,
            frames.jitter_ns / 1e6,
        );
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("Failed to create window and surface: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                self.update();
                if let Err(e) = self.render() {
                    error!("Render failed: {e:#}");
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pos = PointerPosition::new(position.x, position.y);
                self.cursor = Some(pos);
                self.experiment.record_pointer(pos);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_input(event.physical_key, event_loop);
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.update();
        if self.should_exit {
            event_loop.exit();
            return;
        }
        let flow = match pacing(self.experiment.time_to_next_deadline()) {
            Pacing::SleepFor(wait) => {
                self.experiment.timer().sleep(wait);
                self.update();
                ControlFlow::Poll
            }
            Pacing::WakeIn(wait) => ControlFlow::WaitUntil(Instant::now() + wait),
            Pacing::Idle => ControlFlow::Wait,
        };
        event_loop.set_control_flow(flow);
    }
}
