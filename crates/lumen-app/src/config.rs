// SPDX-License-Identifier: CEPL-1.0
use lumen_render::{PresentPreference, RenderSettings, ShaderFormat, DEFAULT_FRAMES_IN_FLIGHT};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "lumen.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub shaders: ShaderCfg,
    pub device: DeviceCfg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "lumen".to_owned(),
            width: 1000,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    pub present_mode: PresentModeCfg,
    /// Absent means wait forever.
    pub fence_timeout_ms: Option<u64>,
    pub rebuild_pipeline_on_resize: bool,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            present_mode: PresentModeCfg::default(),
            fence_timeout_ms: None,
            rebuild_pipeline_on_resize: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Mailbox,
    Fifo,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ShaderCfg {
    /// Absent means the bundled shader.
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
    pub format: ShaderFormatCfg,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShaderFormatCfg {
    #[default]
    Spirv,
    Glsl,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DeviceCfg {
    pub validation: bool,
}

/// A missing file yields the defaults; an unreadable or malformed one is an error.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse(&text, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("{} not found, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn parse(text: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl AppConfig {
    /// `validation_flag` comes from the command line and can only turn validation on.
    pub fn render_settings(&self, validation_flag: bool) -> RenderSettings {
        RenderSettings {
            app_name: self.window.title.clone(),
            validation: self.device.validation || validation_flag,
            frames_in_flight: self.render.frames_in_flight,
            present: match self.render.present_mode {
                PresentModeCfg::Mailbox => PresentPreference::Mailbox,
                PresentModeCfg::Fifo => PresentPreference::Fifo,
            },
            clear_color: self.render.clear_color,
            fence_timeout_ns: self
                .render
                .fence_timeout_ms
                .map_or(u64::MAX, |ms| ms.saturating_mul(1_000_000)),
            rebuild_pipeline_on_resize: self.render.rebuild_pipeline_on_resize,
            vertex_shader: self.shaders.vertex.clone().unwrap_or_default(),
            fragment_shader: self.shaders.fragment.clone().unwrap_or_default(),
            shader_format: match self.shaders.format {
                ShaderFormatCfg::Spirv => ShaderFormat::SpirV,
                ShaderFormatCfg::Glsl => ShaderFormat::Glsl,
            },
        }
    }
}
