// Library exports for vegachart

pub mod address;
pub mod cache;
pub mod catalog;
pub mod codec;
pub mod controller;
pub mod data;
pub mod error;
pub mod graph;
pub mod model;
pub mod render;
pub mod spec;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub use controller::ChartController;
pub use model::{Axis, AxisType, ChartConfig, ColumnRef, MarkerType, ViewState};
pub use render::{ChartRenderer, EmbedOptions};
pub use spec::{build_render_spec, RenderSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "json")]
    #[default]
    Json,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "png")]
    Png,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_tooltip")]
    pub tooltip: bool,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_theme() -> String { "quartz".to_string() }
fn default_tooltip() -> bool { true }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: OutputFormat::Json,
            theme: default_theme(),
            tooltip: default_tooltip(),
        }
    }
}

impl RenderOptions {
    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid options file {}", path.display()))
    }

    pub fn embed_options(&self) -> EmbedOptions {
        EmbedOptions {
            theme: self.theme.clone(),
            tooltip: self.tooltip,
        }
    }
}
