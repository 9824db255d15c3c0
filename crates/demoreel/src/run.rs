use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use renderer::{DemoRenderer, DirSource, PipelineConfig, ReloadPolicy};
use timeline::Timeline;
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, WindowBuilder};

use crate::cli::Cli;
use crate::clock::PlaybackClock;
use crate::config::DemoConfig;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let config = DemoConfig::load(&cli.config)?;
    let root = cli.root.clone().unwrap_or_else(|| {
        cli.config
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let (width, height) = cli.size.unwrap_or((config.width, config.height));
    let policy = cli.on_reload_error.unwrap_or(if cfg!(debug_assertions) {
        ReloadPolicy::Degrade
    } else {
        ReloadPolicy::Abort
    });

    let timeline = Timeline::from_path(root.join(&config.tracks))
        .with_context(|| format!("failed to load tracks {}", config.tracks.display()))?;
    tracing::info!(
        "loaded {} timeline tracks from {}",
        timeline.len(),
        config.tracks.display()
    );

    let event_loop = EventLoop::new().context("failed to create event loop")?;

    let window_builder = WindowBuilder::new()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(width, height));
    let template = ConfigTemplateBuilder::new().with_depth_size(0);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |mut configs| {
            configs.next().expect("no GL configs offered")
        })
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = window.ok_or_else(|| anyhow!("no window was created"))?;

    if !cli.windowed && !cfg!(debug_assertions) {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        window.set_cursor_visible(false);
    }

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));
    let not_current = unsafe { gl_display.create_context(&gl_config, &context_attributes) }
        .context("failed to create GL context")?;

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_window_handle,
        NonZeroU32::new(size.width.max(1)).unwrap(),
        NonZeroU32::new(size.height.max(1)).unwrap(),
    );
    let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &attrs) }
        .context("failed to create GL surface")?;
    let gl_context = not_current
        .make_current(&gl_surface)
        .context("failed to make GL context current")?;
    gl_surface
        .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::new(1).unwrap()))
        .ok();

    let gl = Arc::new(unsafe {
        glow::Context::from_loader_function(|name| {
            gl_display.get_proc_address(&CString::new(name).unwrap()) as *const _
        })
    });

    let mut renderer = DemoRenderer::new(
        gl,
        Box::new(DirSource::new(&root)),
        PipelineConfig {
            width: width as i32,
            height: height as i32,
            shader_dir: config.shader_dir.clone(),
            policy,
        },
    )?;
    let inner = window.inner_size();
    renderer.resize(inner.width as i32, inner.height as i32);

    let row_rate = config.row_rate();
    let mut clock = PlaybackClock::new();
    clock.set_paused(false);

    let mut frames: u32 = 0;
    let mut last_report = Instant::now();
    let mut last_frame = Instant::now();
    let mut max_frame = Duration::ZERO;

    event_loop.run(move |event, target| {
        target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => target.exit(),

                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state.is_pressed() && !event.repeat {
                        match event.physical_key {
                            PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ) => target.exit(),
                            PhysicalKey::Code(KeyCode::KeyR) => match renderer.reload() {
                                Ok(()) => tracing::info!("shaders reloaded"),
                                Err(err) => {
                                    tracing::error!("reload failed: {err}");
                                    target.exit();
                                }
                            },
                            PhysicalKey::Code(KeyCode::Space) => {
                                let paused = !clock.is_paused();
                                clock.set_paused(paused);
                                tracing::info!(
                                    "{} at row {:.2}",
                                    if paused { "paused" } else { "resumed" },
                                    clock.seconds() * row_rate
                                );
                            }
                            _ => {}
                        }
                    }
                }

                WindowEvent::Resized(new_size) => {
                    let w = new_size.width.max(1);
                    let h = new_size.height.max(1);
                    gl_surface.resize(
                        &gl_context,
                        NonZeroU32::new(w).unwrap(),
                        NonZeroU32::new(h).unwrap(),
                    );
                    renderer.resize(w as i32, h as i32);
                    window.request_redraw();
                }

                WindowEvent::RedrawRequested => {
                    let row = clock.seconds() * row_rate;
                    renderer.render(&timeline, row);
                    if let Err(err) = gl_surface.swap_buffers(&gl_context) {
                        tracing::error!("swap_buffers failed: {err}");
                        target.exit();
                    }

                    let now = Instant::now();
                    let frame_time = now - last_frame;
                    last_frame = now;
                    max_frame = max_frame.max(frame_time);
                    frames += 1;
                    let elapsed = now.duration_since(last_report);
                    if elapsed >= Duration::from_secs(5) {
                        tracing::info!(
                            "fps {:.1}, max frametime {} ms",
                            f64::from(frames) / elapsed.as_secs_f64(),
                            max_frame.as_millis()
                        );
                        frames = 0;
                        max_frame = Duration::ZERO;
                        last_report = now;
                    }
                }

                _ => {}
            },

            Event::AboutToWait => window.request_redraw(),

            Event::LoopExiting => renderer.destroy(),

            _ => {}
        }
    })?;

    Ok(())
}
