//! CLI binary for pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionOptions` and prints one output per line.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2img::{
    ConversionOptions, ConversionProgressCallback, JpegSettings, OutputFormat, OutputMode,
    PageSelector, Pdf2Img, PngFilters, PngSettings, ProgressCallback, ViewportScale,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the page total.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(ProgressStyle::default_spinner());
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style =
            ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} pages  ETA {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!("Rendering {total_pages} pages…"));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, output: &str) {
        let elapsed_ms = self.elapsed_ms(page_num);
        // Data URLs are far too long to echo.
        let shown = if output.starts_with("data:") {
            format!("{} chars", output.len())
        } else {
            output.to_string()
        };

        self.bar.println(format!(
            "  {} Page {page_num:>3}/{total:<3}  {shown}  {:.1}s",
            green("✓"),
            elapsed_ms as f64 / 1000.0,
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(page_num);
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {page_num:>3}/{total:<3}  {}  {:.1}s",
            red("✗"),
            red(&msg),
            elapsed_ms as f64 / 1000.0,
        ));
        self.bar.abandon();
    }

    fn on_conversion_complete(&self, _total_pages: usize, written: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {written} pages rendered", green("✔"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as PNG into the current directory
  pdf2img document.pdf

  # Pages 3 to 7 as JPEG at quality 0.6 into out/
  pdf2img --pages 3-7 --format jpeg --quality 0.6 -o out document.pdf

  # Twice the default resolution
  pdf2img --scale 3.0 document.pdf

  # Every page exactly 1200 px wide
  pdf2img --fit-width 1200 document.pdf

  # Data URLs on stdout, nothing written to disk
  pdf2img --data-url --pages 1 document.pdf

  # Page count only
  pdf2img --inspect-only document.pdf

PAGE SELECTION:
  all        every page (default)
  5          a single page
  3-7, 7,3   an inclusive range, bounds in either order
  Out-of-range bounds are clipped; zero, negative or malformed
  selections fall back to every page.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   libpdfium file, or the directory holding it
  RUST_LOG          tracing filter, overrides --verbose / --quiet
  PDF2IMG_*         defaults for the flags above (e.g. PDF2IMG_FORMAT=jpeg)
"#;

/// Render PDF pages to PNG or JPEG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Render PDF pages to PNG or JPEG files or data URLs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Directory receiving page-<N>.<ext> files. Must already exist.
    #[arg(short, long = "out-dir", env = "PDF2IMG_OUT_DIR", default_value = "./")]
    out_dir: PathBuf,

    /// Page selection: all, 5, 3-7.
    #[arg(long, env = "PDF2IMG_PAGES", default_value = "all")]
    pages: String,

    /// Viewport scale; 1.0 is one pixel per PDF point. Default: 1.5.
    #[arg(long, env = "PDF2IMG_SCALE", conflicts_with_all = ["fit_width", "fit_height"])]
    scale: Option<f32>,

    /// Scale every page to this many pixels wide.
    #[arg(long, env = "PDF2IMG_FIT_WIDTH", conflicts_with = "fit_height")]
    fit_width: Option<f32>,

    /// Scale every page to this many pixels tall.
    #[arg(long, env = "PDF2IMG_FIT_HEIGHT")]
    fit_height: Option<f32>,

    /// Output image format.
    #[arg(short, long, env = "PDF2IMG_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Print data URLs instead of writing files.
    #[arg(long, env = "PDF2IMG_DATA_URL")]
    data_url: bool,

    /// PNG zlib compression level (0–9).
    #[arg(long, env = "PDF2IMG_COMPRESSION_LEVEL", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=9))]
    compression_level: u8,

    /// PNG row filter.
    #[arg(long, env = "PDF2IMG_PNG_FILTER", value_enum, default_value = "all")]
    png_filter: FilterArg,

    /// PNG palette as comma-separated #RRGGBB or #RRGGBBAA colours.
    #[arg(long, env = "PDF2IMG_PALETTE", value_delimiter = ',', value_parser = parse_colour)]
    palette: Vec<[u8; 4]>,

    /// PNG background colour as an index into --palette.
    #[arg(long, env = "PDF2IMG_BACKGROUND_INDEX", default_value_t = 0)]
    background_index: u8,

    /// PNG resolution in pixels per inch, stored in the pHYs chunk.
    #[arg(long, env = "PDF2IMG_RESOLUTION")]
    resolution: Option<u32>,

    /// JPEG quality (0.0–1.0).
    #[arg(long, env = "PDF2IMG_QUALITY", default_value_t = 0.8)]
    quality: f32,

    /// Progressive JPEG.
    #[arg(long, env = "PDF2IMG_PROGRESSIVE")]
    progressive: bool,

    /// Disable 4:2:0 chroma subsampling (use 4:4:4).
    #[arg(long, env = "PDF2IMG_NO_CHROMA_SUBSAMPLING")]
    no_chroma_subsampling: bool,

    /// Output a JSON report instead of one line per page.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Print the page count only, no rendering.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    All,
    None,
    Sub,
    Up,
    Avg,
    Paeth,
}

impl From<FilterArg> for PngFilters {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::All => PngFilters::All,
            FilterArg::None => PngFilters::None,
            FilterArg::Sub => PngFilters::Sub,
            FilterArg::Up => PngFilters::Up,
            FilterArg::Avg => PngFilters::Avg,
            FilterArg::Paeth => PngFilters::Paeth,
        }
    }
}

/// `--json` output.
#[derive(Serialize)]
struct Report<'a> {
    input: &'a Path,
    mode: OutputMode,
    format: &'a OutputFormat,
    outputs: &'a [String],
    duration_ms: u64,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    input: &'a Path,
    bytes: usize,
    pages: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let pdf = Pdf2Img::new(cli.input.as_path())
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let pages = pdf.page_count().await.context("Failed to inspect PDF")?;
        if cli.json {
            let report = InspectReport {
                input: &cli.input,
                bytes: pdf.source().bytes().len(),
                pages,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            println!("File:   {}", cli.input.display());
            println!("Size:   {} bytes", pdf.source().bytes().len());
            println!("Pages:  {}", pages);
        }
        return Ok(());
    }

    // ── Build options ────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let options = build_options(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let start = Instant::now();
    let outputs = pdf.convert(&options).await.context("Conversion failed")?;
    let duration_ms = start.elapsed().as_millis() as u64;

    if cli.json {
        let report = Report {
            input: &cli.input,
            mode: options.mode,
            format: &options.format,
            outputs: &outputs,
            duration_ms,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for output in &outputs {
            writeln!(handle, "{output}").context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet && !show_progress && !cli.json {
        eprintln!("Rendered {} pages in {}ms", outputs.len(), duration_ms);
    }

    Ok(())
}

/// Map CLI args to `ConversionOptions`.
fn build_options(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionOptions> {
    let format = match cli.format {
        FormatArg::Png => OutputFormat::Png(PngSettings {
            compression_level: cli.compression_level,
            filters: cli.png_filter.into(),
            palette: (!cli.palette.is_empty()).then(|| cli.palette.clone()),
            background_index: cli.background_index,
            resolution: cli.resolution,
        }),
        FormatArg::Jpeg => OutputFormat::Jpeg(JpegSettings {
            quality: cli.quality,
            progressive: cli.progressive,
            chroma_subsampling: !cli.no_chroma_subsampling,
        }),
    };

    let mut builder = ConversionOptions::builder()
        .pages(PageSelector::from(cli.pages.as_str()))
        .format(format)
        .data_url(cli.data_url)
        .output_dir(&cli.out_dir);

    if let Some(scale) = cli.scale {
        builder = builder.viewport_scale(scale);
    } else if let Some(width) = cli.fit_width {
        builder = builder.viewport_scale(ViewportScale::fit_width(width));
    } else if let Some(height) = cli.fit_height {
        builder = builder.viewport_scale(ViewportScale::fit_height(height));
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
fn parse_colour(s: &str) -> Result<[u8; 4], String> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
        return Err(format!("expected #RRGGBB or #RRGGBBAA, got '{s}'"));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("invalid hex colour '{s}'"))
    };
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok([channel(0)?, channel(2)?, channel(4)?, alpha])
}
