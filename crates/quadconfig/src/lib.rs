//! TOML configuration for computequad.
//!
//! Every key is optional except `version`; anything left out falls back to
//! the renderer defaults once the binary merges the file with its CLI flags.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    High,
}

/// Screen image resolution: track the window or use a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Follow,
    Fixed(u32, u32),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuadConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub image: ImageSection,
    #[serde(default)]
    pub shaders: ShaderSection,
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_dimensions_opt")]
    pub size: Option<(u32, u32)>,
    pub vsync: Option<bool>,
    pub power: Option<PowerSetting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSection {
    #[serde(default, deserialize_with = "deserialize_image_size_opt")]
    pub size: Option<ImageSize>,
    #[serde(default, deserialize_with = "deserialize_dimensions_opt")]
    pub workgroup: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShaderSection {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
    pub compute: Option<PathBuf>,
    pub channel: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub frames: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub duration: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub fixed_step: Option<Duration>,
}

/// Parses `WIDTHxHEIGHT` (also `X`), rejecting zero on either axis.
pub fn parse_dimensions(raw: &str) -> Result<(u32, u32), String> {
    let trimmed = raw.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH format, e.g. 1280x720 (got '{trimmed}')"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err(format!("dimensions must be greater than zero (got '{trimmed}')"));
    }
    Ok((width, height))
}

/// Parses an image size: `follow` (or `window`/`surface`) or `WIDTHxHEIGHT`.
pub fn parse_image_size(raw: &str) -> Result<ImageSize, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "follow" | "window" | "surface" => Ok(ImageSize::Follow),
        _ => parse_dimensions(&normalized).map(|(w, h)| ImageSize::Fixed(w, h)),
    }
}

fn deserialize_dimensions_opt<'de, D>(deserializer: D) -> Result<Option<(u32, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_dimensions(&value).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_image_size_opt<'de, D>(deserializer: D) -> Result<Option<ImageSize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_image_size(&value).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl QuadConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: QuadConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`; relative shader and channel paths are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.shaders.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if let Some(title) = &self.window.title {
            if title.trim().is_empty() {
                return Err(ConfigError::Invalid("window.title must not be empty".into()));
            }
        }

        for (key, path) in self.shaders.entries() {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "shaders.{key} must not be an empty path"
                    )));
                }
            }
        }

        if self.run.frames == Some(0) {
            return Err(ConfigError::Invalid("run.frames must be greater than zero".into()));
        }

        if let Some(duration) = self.run.duration {
            if duration.is_zero() {
                return Err(ConfigError::Invalid(
                    "run.duration must be greater than zero".into(),
                ));
            }
        }

        if let Some(step) = self.run.fixed_step {
            if step.is_zero() {
                return Err(ConfigError::Invalid(
                    "run.fixed_step must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

impl ShaderSection {
    fn entries(&self) -> [(&'static str, Option<&PathBuf>); 4] {
        [
            ("vertex", self.vertex.as_ref()),
            ("fragment", self.fragment.as_ref()),
            ("compute", self.compute.as_ref()),
            ("channel", self.channel.as_ref()),
        ]
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.vertex,
            &mut self.fragment,
            &mut self.compute,
            &mut self.channel,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
