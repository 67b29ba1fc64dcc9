use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use image_to_pattern::render::{encode_png, render_pattern};
use image_to_pattern::{ColorSpace, PatternOptions, convert_with_options};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ColorSpaceArg {
    Rgb,
    Lab,
}

impl From<ColorSpaceArg> for ColorSpace {
    fn from(arg: ColorSpaceArg) -> Self {
        match arg {
            ColorSpaceArg::Rgb => Self::Rgb,
            ColorSpaceArg::Lab => Self::Lab,
        }
    }
}

/// Turn images into stitch patterns: a small color palette plus a grid of
/// palette indices, written as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Pattern width in cells [default: 50]
    #[arg(short, long)]
    width: Option<u32>,

    /// Number of palette colors [default: 5]
    #[arg(short = 'k', long)]
    n_colors: Option<usize>,

    /// Seed for the k-means initialization [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// Number of k-means restarts [default: 10]
    #[arg(long)]
    restarts: Option<u32>,

    /// Color space to cluster in [default: rgb]
    #[arg(long, value_enum)]
    color_space: Option<ColorSpaceArg>,

    /// JSON file with pattern options; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write a PNG chart with square cells of this many pixels
    #[arg(long, value_name = "CELL")]
    preview: Option<u32>,

    /// Output directory
    #[arg(short = 'd', long)]
    out_dir: Option<PathBuf>,

    /// Output filename prefix (ignored when --out-dir supplied)
    #[arg(short = 'p', long, default_value = "pattern_")]
    prefix: String,

    /// Log pipeline stages
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> Result<PatternOptions> {
        let mut opts = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => PatternOptions::default(),
        };
        if let Some(width) = self.width {
            opts.width = width;
        }
        if let Some(n) = self.n_colors {
            opts.num_colors = n;
        }
        if let Some(seed) = self.seed {
            opts.seed = seed;
        }
        if let Some(restarts) = self.restarts {
            opts.restarts = restarts;
        }
        if let Some(space) = self.color_space {
            opts.color_space = space.into();
        }
        Ok(opts)
    }

    fn output_path(&self, input: &Path, extension: &str) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .with_context(|| format!("{} has no file name", input.display()))?
            .to_string_lossy();
        Ok(match &self.out_dir {
            Some(dir) => dir.join(format!("{stem}.{extension}")),
            None => PathBuf::from(format!("{}{stem}.{extension}", self.prefix)),
        })
    }
}

fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    println!("Saved → {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "image_to_pattern=debug"
    } else {
        "image_to_pattern=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let opts = args.options()?;

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let pattern = convert_with_options(&bytes, &opts)
            .with_context(|| format!("converting {}", input.display()))?;

        let json = serde_json::to_vec_pretty(&pattern)?;
        write_output(&args.output_path(input, "json")?, &json)?;

        if let Some(cell) = args.preview {
            let chart = render_pattern(&pattern, cell)?;
            write_output(&args.output_path(input, "png")?, &encode_png(&chart)?)?;
        }
    }

    Ok(())
}
