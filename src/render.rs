// Chart renderers: consumers of a RenderSpec

use crate::spec::RenderSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Options handed to the renderer alongside the spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedOptions {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_tooltip")]
    pub tooltip: bool,
}

fn default_theme() -> String {
    "quartz".to_string()
}

fn default_tooltip() -> bool {
    true
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            tooltip: default_tooltip(),
        }
    }
}

/// Draws a declarative chart specification onto the surface it owns
pub trait ChartRenderer {
    fn render(&mut self, spec: &RenderSpec, options: &EmbedOptions) -> Result<()>;
}

impl<R: ChartRenderer + ?Sized> ChartRenderer for &mut R {
    fn render(&mut self, spec: &RenderSpec, options: &EmbedOptions) -> Result<()> {
        (**self).render(spec, options)
    }
}

#[derive(Serialize)]
struct Embedded<'a> {
    spec: &'a RenderSpec,
    options: &'a EmbedOptions,
}

/// Writes `{ "spec": ..., "options": ... }` as pretty JSON
#[derive(Debug, Default)]
pub struct JsonRenderer {
    surface: Option<Vec<u8>>,
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of the most recent render
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.surface.take()
    }
}

impl ChartRenderer for JsonRenderer {
    fn render(&mut self, spec: &RenderSpec, options: &EmbedOptions) -> Result<()> {
        let json = serde_json::to_vec_pretty(&Embedded { spec, options })
            .context("Failed to serialize render spec")?;
        self.surface = Some(json);
        Ok(())
    }
}

const HTML_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
</head>
<body>
  <div style="overflow: auto">
    <div id="vis" style="width: 100%"></div>
  </div>
  <script>
    vegaEmbed("#vis", {spec}, {options});
  </script>
</body>
</html>
"##;

/// Standalone page that hands the spec to vega-embed
#[derive(Debug)]
pub struct HtmlRenderer {
    title: String,
    surface: Option<Vec<u8>>,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new("Chart")
    }
}

impl HtmlRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            surface: None,
        }
    }

    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.surface.take()
    }
}

/// Keep `</script>` and friends from closing the inline script early
fn script_safe(json: String) -> String {
    json.replace("</", "<\\/")
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl ChartRenderer for HtmlRenderer {
    fn render(&mut self, spec: &RenderSpec, options: &EmbedOptions) -> Result<()> {
        let spec_json = serde_json::to_string(spec).context("Failed to serialize render spec")?;
        let options_json =
            serde_json::to_string(options).context("Failed to serialize embed options")?;
        let page = HTML_TEMPLATE
            .replace("{title}", &html_escape(&self.title))
            .replace("{spec}", &script_safe(spec_json))
            .replace("{options}", &script_safe(options_json));
        self.surface = Some(page.into_bytes());
        Ok(())
    }
}
