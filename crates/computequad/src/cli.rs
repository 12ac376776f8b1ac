use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use quadconfig::{ImageSize, PowerSetting};
use renderer::WorkgroupSize;

#[derive(Parser, Debug)]
#[command(
    name = "computequad",
    author,
    version,
    about = "Render a compute-shader image onto a full-screen quad"
)]
pub struct Args {
    /// Configuration file; defaults to `computequad.toml` in the user config directory.
    #[arg(long, value_name = "PATH", env = "COMPUTEQUAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Window title.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Screen image resolution: `follow` the window or a fixed `WIDTHxHEIGHT`.
    #[arg(long, value_name = "SIZE", value_parser = parse_image_size)]
    pub image_size: Option<ImageSize>,

    /// Compute workgroup size; must match the shader's `local_size` (e.g. `8x8`).
    #[arg(long, value_name = "XxY", value_parser = parse_workgroup)]
    pub workgroup: Option<WorkgroupSize>,

    /// Vertex shader for the display quad.
    #[arg(long, value_name = "PATH")]
    pub vertex: Option<PathBuf>,

    /// Fragment shader for the display quad.
    #[arg(long, value_name = "PATH")]
    pub fragment: Option<PathBuf>,

    /// Compute shader that writes the screen image.
    #[arg(long, value_name = "PATH")]
    pub compute: Option<PathBuf>,

    /// Image bound to the compute program as `channel0`.
    #[arg(long, value_name = "PATH")]
    pub channel: Option<PathBuf>,

    /// Close after this many frames.
    #[arg(long, value_name = "COUNT", value_parser = parse_frames)]
    pub frames: Option<u64>,

    /// Close after this much wall-clock time (e.g. `30s`, `2m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Advance shader time by a fixed step per frame (e.g. `16ms`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub fixed_step: Option<Duration>,

    /// Present as fast as possible instead of waiting for vertical blank.
    #[arg(long)]
    pub no_vsync: bool,

    /// GPU power preference: `low` or `high`.
    #[arg(long, value_name = "PREFERENCE", value_parser = parse_power)]
    pub power: Option<PowerSetting>,

    /// Compile and check every shader on the CPU, then exit without opening a window.
    #[arg(long)]
    pub check: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    quadconfig::parse_dimensions(value)
}

pub fn parse_image_size(value: &str) -> Result<ImageSize, String> {
    quadconfig::parse_image_size(value)
}

pub fn parse_workgroup(value: &str) -> Result<WorkgroupSize, String> {
    value.parse().map_err(|err: renderer::WorkgroupError| err.to_string())
}

pub fn parse_frames(value: &str) -> Result<u64, String> {
    let frames: u64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame count '{}'", value.trim()))?;
    if frames == 0 {
        return Err("frame limit must be greater than zero".to_string());
    }
    Ok(frames)
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    let duration = match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Duration::from_secs_f64(seconds),
        Ok(_) => return Err(format!("invalid duration '{trimmed}'")),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?,
    };
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

pub fn parse_power(value: &str) -> Result<PowerSetting, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "low" | "low-power" | "integrated" => Ok(PowerSetting::Low),
        "high" | "high-performance" | "discrete" => Ok(PowerSetting::High),
        other => Err(format!(
            "unknown power preference '{other}'; expected low or high"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let args = Args::try_parse_from([
            "computequad",
            "--size",
            "1000x857",
            "--image-size",
            "320x200",
            "--workgroup",
            "16x8",
            "--compute",
            "demo.comp",
            "--frames",
            "120",
            "--duration",
            "1m",
            "--no-vsync",
            "--power",
            "low",
            "--check",
        ])
        .expect("parse args");

        assert_eq!(args.size, Some((1000, 857)));
        assert_eq!(args.image_size, Some(ImageSize::Fixed(320, 200)));
        assert_eq!(args.workgroup.map(|wg| (wg.x(), wg.y())), Some((16, 8)));
        assert_eq!(args.compute, Some(PathBuf::from("demo.comp")));
        assert_eq!(args.frames, Some(120));
        assert_eq!(args.duration, Some(Duration::from_secs(60)));
        assert!(args.no_vsync);
        assert_eq!(args.power, Some(PowerSetting::Low));
        assert!(args.check);
    }

    #[test]
    fn defaults_leave_overrides_unset() {
        let args = Args::try_parse_from(["computequad"]).expect("parse args");
        assert!(args.size.is_none());
        assert!(args.workgroup.is_none());
        assert!(!args.no_vsync);
        assert!(!args.check);
    }

    #[test]
    fn rejects_zero_workgroup() {
        assert!(parse_workgroup("0x8").is_err());
        assert!(parse_workgroup("eight").is_err());
        assert!(Args::try_parse_from(["computequad", "--workgroup", "8x0"]).is_err());
    }

    #[test]
    fn durations_accept_seconds_and_humantime() {
        assert_eq!(parse_duration("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_duration("16ms"), Ok(Duration::from_millis(16)));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn frame_limit_must_be_positive() {
        assert_eq!(parse_frames("30"), Ok(30));
        assert!(parse_frames("0").is_err());
    }

    #[test]
    fn power_accepts_aliases() {
        assert_eq!(parse_power("Discrete"), Ok(PowerSetting::High));
        assert_eq!(parse_power("integrated"), Ok(PowerSetting::Low));
        assert!(parse_power("max").is_err());
    }
}
