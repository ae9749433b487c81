use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::warn;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
#[cfg(feature = "http")]
use std::time::Duration;
use vegachart::address::{AddressFormat, AddressStore, MemoryAddressStore};
use vegachart::cache::{CachedRowSource, DiskCache};
use vegachart::codec::{self, table::Coded};
use vegachart::data::{AnySource, FileRowSource, RowSource, StaticRowSource};
use vegachart::graph::PngRenderer;
use vegachart::render::{HtmlRenderer, JsonRenderer};
use vegachart::{ChartController, ChartRenderer, EmbedOptions, MarkerType, OutputFormat, RenderOptions, RenderSpec};

const DEFAULT_SOURCE: &str =
    "https://fivethirtyeight.datasettes.com/fivethirtyeight/nba-elo~2Fnbaallelo.json";

#[derive(Parser, Debug)]
#[command(name = "vegachart")]
#[command(about = "Build Vega-Lite charts from a compact chart address", long_about = None)]
struct Args {
    /// Chart address (e.g. '?m=b&x=2&xt=c&y=11' or '#m=l&x=0&y=3')
    #[arg(default_value = "")]
    address: String,

    /// Source URL used when the address names none
    #[arg(long, env = "VEGACHART_URL", default_value = DEFAULT_SOURCE)]
    url: String,

    /// Read rows from a JSON/CSV file instead of the source URL ('-' for stdin)
    #[arg(long)]
    rows: Option<String>,

    /// Output format (overrides the options file)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Marker type, by label or code (Bar/b, Line/l, Scatter/s)
    #[arg(long)]
    mark: Option<String>,

    /// Swap the X and Y axes
    #[arg(long)]
    swap: bool,

    /// Renderer theme
    #[arg(long, env = "VEGACHART_THEME")]
    theme: Option<String>,

    /// Disable tooltips
    #[arg(long)]
    no_tooltip: bool,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// JSON file with render options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Directory for cached rows
    #[arg(long, env = "VEGACHART_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Seconds to wait for an HTTP row fetch
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Do not cache fetched rows on disk
    #[arg(long)]
    no_cache: bool,

    /// Print the column catalog and exit
    #[arg(long)]
    list_columns: bool,
}

/// The renderer picked by the output format
enum OutputRenderer {
    Json(JsonRenderer),
    Html(HtmlRenderer),
    Png(PngRenderer<Rc<dyn RowSource>>),
}

impl OutputRenderer {
    fn take_output(&mut self) -> Option<Vec<u8>> {
        match self {
            OutputRenderer::Json(r) => r.take_output(),
            OutputRenderer::Html(r) => r.take_output(),
            OutputRenderer::Png(r) => r.take_output(),
        }
    }
}

impl ChartRenderer for OutputRenderer {
    fn render(&mut self, spec: &RenderSpec, options: &EmbedOptions) -> Result<()> {
        match self {
            OutputRenderer::Json(r) => r.render(spec, options),
            OutputRenderer::Html(r) => r.render(spec, options),
            OutputRenderer::Png(r) => r.render(spec, options),
        }
    }
}

fn render_options(args: &Args) -> Result<RenderOptions> {
    let mut options = match &args.options {
        Some(path) => RenderOptions::from_file(path)?,
        None => RenderOptions::default(),
    };
    if let Some(format) = args.format {
        options.format = format;
    }
    if let Some(theme) = &args.theme {
        options.theme = theme.clone();
    }
    if args.no_tooltip {
        options.tooltip = false;
    }
    if let Some(width) = args.width {
        options.width = width;
    }
    if let Some(height) = args.height {
        options.height = height;
    }
    Ok(options)
}

fn row_source(args: &Args, source_url: &str) -> Result<Rc<dyn RowSource>> {
    if let Some(path) = &args.rows {
        let rows = FileRowSource
            .fetch_rows(path)
            .with_context(|| format!("Failed to read rows from {}", path))?;
        return Ok(Rc::new(StaticRowSource::new(source_url, rows)));
    }

    #[cfg(feature = "http")]
    let any = AnySource::with_http_timeout(Duration::from_secs(args.timeout));
    #[cfg(not(feature = "http"))]
    let any = AnySource::default();
    let mut source = CachedRowSource::new(any);
    if !args.no_cache {
        let disk = match &args.cache_dir {
            Some(dir) => Some(DiskCache::with_dir(dir)),
            None => DiskCache::new("vegachart")
                .map_err(|e| warn!("Row cache disabled: {:#}", e))
                .ok(),
        };
        if let Some(disk) = disk {
            source = source.with_disk_cache(disk);
        }
    }
    Ok(Rc::new(source))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let options = render_options(&args)?;

    let decoded = codec::decode(&args.address);
    let source_url = if decoded.source_url.is_empty() {
        args.url.clone()
    } else {
        decoded.source_url
    };
    let source = row_source(&args, &source_url)?;

    let renderer = match options.format {
        OutputFormat::Json => OutputRenderer::Json(JsonRenderer::new()),
        OutputFormat::Html => OutputRenderer::Html(HtmlRenderer::new(source_url.clone())),
        OutputFormat::Png => {
            OutputRenderer::Png(PngRenderer::new(source.clone(), options.width, options.height))
        }
    };
    let format = if args.address.starts_with('#') {
        AddressFormat::Fragment
    } else {
        AddressFormat::Query
    };

    let mut controller = ChartController::new(MemoryAddressStore::new(&args.address), renderer)
        .with_format(format)
        .with_options(options.embed_options())
        .with_default_source(&args.url);

    if let Some(mark) = &args.mark {
        let marker_type = MarkerType::parse_loose(mark)
            .ok_or_else(|| anyhow!("Unknown mark '{}' (expected Bar, Line or Scatter)", mark))?;
        controller.set_marker_type(marker_type);
    }

    if !controller.load(&*source) {
        bail!("Could not load a dataset from {}", source_url);
    }

    if args.list_columns {
        let catalog = controller
            .catalog()
            .ok_or_else(|| anyhow!("No columns loaded from {}", source_url))?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for (index, name) in catalog.columns().iter().enumerate() {
            writeln!(handle, "{}\t{}", index, name).context("Failed to write columns")?;
        }
        return Ok(());
    }

    if args.swap {
        controller.swap_xy();
    }

    eprintln!("{}", controller.address().read());

    if let Some(failure) = controller.render_failure() {
        bail!("Failed to render chart: {}", failure);
    }
    if controller.render_spec().is_none() {
        bail!("No chart: X and Y must both name columns of {}", source_url);
    }

    let bytes = controller
        .renderer_mut()
        .take_output()
        .context("Renderer produced no output")?;

    match &args.output {
        Some(path) => std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&bytes)
                .context("Failed to write output to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
