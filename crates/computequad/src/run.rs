use anyhow::Result;
use renderer::{check_shaders, Renderer, RendererConfig, StartupError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{build_renderer_config, load_config, locate_config};
use crate::cli::Args;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: Args) -> Result<()> {
    let paths = match AppPaths::discover() {
        Ok(paths) => {
            debug!(config = %paths.config_dir().display(), "resolved computequad paths");
            Some(paths)
        }
        Err(err) => {
            warn!(error = %err, "user config directory unavailable; skipping config lookup");
            None
        }
    };

    let file = match locate_config(&args, paths.as_ref()) {
        Some(path) => {
            let config = load_config(&path)?;
            info!(path = %path.display(), "loaded configuration");
            Some(config)
        }
        None => None,
    };
    let config = build_renderer_config(file.as_ref(), &args)?;

    if args.check {
        return run_check(&config);
    }

    info!(
        width = config.surface_size.0,
        height = config.surface_size.1,
        image = ?config.image_sizing,
        vsync = ?config.vsync,
        "starting computequad"
    );
    let mut renderer = Renderer::new(config);
    let summary = renderer.run()?;
    info!(
        frames = summary.frames,
        average_fps = format_args!("{:.2}", summary.average_fps),
        reason = %summary.reason,
        "run complete"
    );
    Ok(())
}

fn run_check(config: &RendererConfig) -> Result<()> {
    let programs = check_shaders(config)?;
    info!(
        program = programs.display.label(),
        bindings = programs.display.reflection().bindings.len(),
        "display program ok"
    );
    info!(
        program = programs.compute.label(),
        workgroup = %config.workgroup,
        bindings = programs.compute.reflection().bindings.len(),
        "compute program ok"
    );
    Ok(())
}

/// Logs a failed run, naming the start-up phase when one applies.
pub fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<StartupError>() {
        Some(startup) => error!(phase = startup.phase(), "{startup}"),
        None => error!("{err:#}"),
    }
}
