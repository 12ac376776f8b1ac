use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::clock::{FrameClock, FrameTick};
use crate::contract::PreparedPrograms;
use crate::gpu::GpuState;
use crate::ledger::ResourceLedger;
use crate::lifecycle::{CloseReason, Lifecycle};
use crate::runtime::{time_source_for, BoxedTimeSource};
use crate::types::{RendererConfig, RunLimits};

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Frames that reached the screen.
    pub frames: u64,
    /// Cumulative mean of every per-frame rate.
    pub average_fps: f64,
    pub reason: CloseReason,
}

/// What happened to one frame's surface texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Presented,
    /// The surface was lost or outdated and must be reconfigured.
    Reconfigure,
    Skipped,
    Fatal,
}

impl FrameOutcome {
    fn of(result: &Result<(), wgpu::SurfaceError>) -> Self {
        match result {
            Ok(()) => FrameOutcome::Presented,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                FrameOutcome::Reconfigure
            }
            Err(wgpu::SurfaceError::Timeout) => FrameOutcome::Skipped,
            Err(_) => FrameOutcome::Fatal,
        }
    }
}

/// Per-second frame counter for the `render stats` debug line.
struct StatsWindow {
    last_report: Instant,
    frames_since_report: u64,
}

impl StatsWindow {
    fn new(now: Instant) -> Self {
        Self {
            last_report: now,
            frames_since_report: 0,
        }
    }

    fn record(&mut self, tick: &FrameTick, time: f64, now: Instant) {
        self.frames_since_report += 1;
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < STATS_INTERVAL {
            return;
        }
        let fps = self.frames_since_report as f64 / elapsed.as_secs_f64();
        debug!(
            fps = fps.round(),
            average_fps = tick.average,
            frame = tick.frame,
            time,
            "render stats"
        );
        self.frames_since_report = 0;
        self.last_report = now;
    }
}

/// Drives the window: advances the clock, renders, and tracks the close lifecycle.
pub(crate) struct RenderLoop {
    // Declared before `window` so the surface is released first.
    gpu: Option<GpuState>,
    window: Window,
    lifecycle: Lifecycle,
    clock: FrameClock,
    time_source: BoxedTimeSource,
    limits: RunLimits,
    presented: u64,
    started: Instant,
    stats: StatsWindow,
    fatal: Option<anyhow::Error>,
}

impl RenderLoop {
    fn new(
        window: Window,
        config: &RendererConfig,
        programs: PreparedPrograms,
        ledger: ResourceLedger,
    ) -> Result<Self> {
        let gpu = GpuState::new(&window, config, programs, ledger)?;
        let now = Instant::now();
        Ok(Self {
            gpu: Some(gpu),
            window,
            lifecycle: Lifecycle::new(),
            clock: FrameClock::new(),
            time_source: time_source_for(config),
            limits: config.limits,
            presented: 0,
            started: now,
            stats: StatsWindow::new(now),
            fatal: None,
        })
    }

    /// Restarts shader time and the limit clocks once set-up is done.
    fn start(&mut self) {
        self.time_source.reset();
        let now = Instant::now();
        self.started = now;
        self.stats = StatsWindow::new(now);
    }

    fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.lifecycle.request_close(CloseReason::WindowClosed);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if is_escape_press(&event) {
                    self.lifecycle.request_close(CloseReason::EscapePressed);
                }
            }
            WindowEvent::Resized(new_size) => self.resize(new_size),
            WindowEvent::RedrawRequested => self.iterate(),
            _ => {}
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(new_size);
        }
    }

    /// One loop iteration. A pending close request is honored here, before any
    /// work for the frame is recorded.
    fn iterate(&mut self) {
        if !self.lifecycle.begin_iteration() {
            return;
        }
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let sample = self.time_source.sample();
        let tick = self.clock.tick(sample.seconds);

        let result = gpu.render_frame(sample.seconds, sample.frame_index);
        match FrameOutcome::of(&result) {
            FrameOutcome::Presented => self.presented += 1,
            FrameOutcome::Reconfigure => {
                debug!("surface lost or outdated; reconfiguring");
                gpu.reconfigure_surface();
            }
            FrameOutcome::Skipped => {
                warn!(frame = tick.frame, "surface timeout; skipping frame");
            }
            FrameOutcome::Fatal => {
                let err = result.err().map(|err| err.to_string()).unwrap_or_default();
                error!(error = %err, frame = tick.frame, "fatal surface error");
                self.fatal = Some(anyhow!("surface error on frame {}: {err}", tick.frame));
                self.lifecycle.request_close(CloseReason::Fatal);
                return;
            }
        }

        let now = Instant::now();
        self.stats.record(&tick, sample.seconds, now);
        if let Some(reason) = self
            .limits
            .reached(self.presented, now.saturating_duration_since(self.started))
        {
            self.lifecycle.request_close(reason);
        }
    }

    /// Releases GPU resources and completes the lifecycle.
    fn shutdown(mut self) -> Result<RunSummary> {
        // The loop may also end without a request (platform shutdown).
        self.lifecycle.request_close(CloseReason::WindowClosed);
        self.lifecycle.begin_iteration();

        if let Some(gpu) = self.gpu.take() {
            let ledger = gpu.teardown();
            for (kind, live) in ledger.unbalanced() {
                warn!(%kind, live, "GPU resource not released at teardown");
            }
        }
        self.lifecycle.mark_terminated();

        let reason = self
            .lifecycle
            .reason()
            .unwrap_or(CloseReason::WindowClosed);
        let summary = RunSummary {
            frames: self.presented,
            average_fps: self.clock.final_average(),
            reason,
        };
        info!(
            frames = summary.frames,
            average_fps = format_args!("{:.2}", summary.average_fps),
            reason = %summary.reason,
            "render loop terminated"
        );

        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

fn is_escape_press(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && !event.repeat
        && matches!(event.logical_key, Key::Named(NamedKey::Escape))
}

/// Opens the window, runs the loop on the calling thread and tears down.
pub(crate) fn run_window(
    config: &RendererConfig,
    programs: PreparedPrograms,
    ledger: ResourceLedger,
) -> Result<RunSummary> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(
            config.surface_size.0,
            config.surface_size.1,
        ))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window_id = window.id();

    let mut render_loop = RenderLoop::new(window, config, programs, ledger)?;
    info!(
        width = config.surface_size.0,
        height = config.surface_size.1,
        workgroup = %config.workgroup,
        "render loop started"
    );
    render_loop.start();
    render_loop.window.request_redraw();

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent {
            window_id: id,
            event,
        } if id == window_id => render_loop.handle_window_event(event),
        Event::AboutToWait => {
            if render_loop.lifecycle.begin_iteration() {
                render_loop.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else {
                elwt.exit();
            }
        }
        _ => {}
    });

    let summary = render_loop.shutdown();
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_successful_frames_count_as_presented() {
        assert_eq!(FrameOutcome::of(&Ok(())), FrameOutcome::Presented);
        assert_eq!(
            FrameOutcome::of(&Err(wgpu::SurfaceError::Lost)),
            FrameOutcome::Reconfigure
        );
        assert_eq!(
            FrameOutcome::of(&Err(wgpu::SurfaceError::Outdated)),
            FrameOutcome::Reconfigure
        );
        assert_eq!(
            FrameOutcome::of(&Err(wgpu::SurfaceError::Timeout)),
            FrameOutcome::Skipped
        );
        assert_eq!(
            FrameOutcome::of(&Err(wgpu::SurfaceError::OutOfMemory)),
            FrameOutcome::Fatal
        );
    }
}
