//! `colorize` CLI - colorize grayscale photos with a pretrained network.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use colorize::{
    output_paths, Config, FileDetails, ModelPaths, OutputFormat, Pipeline, SampleImage, Source,
};

/// Colorize grayscale photos with a pretrained Lab colorization network.
#[derive(Parser, Debug)]
#[command(name = "colorize")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image paths. Use `-` to read one upload from stdin.
    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Bundled sample to colorize (portrait, landscape, street). Repeatable.
    #[arg(long, value_name = "NAME")]
    sample: Vec<SampleImage>,

    /// Directory the results are written to.
    #[arg(short, long, default_value = "colorized", value_name = "DIR")]
    output_dir: PathBuf,

    /// Directory holding colorization.onnx, its weights, and pts_in_hull.npy.
    #[arg(long, default_value = ModelPaths::DEFAULT_DIR, value_name = "DIR")]
    models: PathBuf,

    /// Directory holding the bundled samples.
    #[arg(long, default_value = "samples", value_name = "DIR")]
    samples_dir: PathBuf,

    /// Write original and colorized images side by side.
    #[arg(long)]
    side_by_side: bool,

    /// Only print upload details (name, type, size) for each input.
    #[arg(long)]
    details: bool,

    /// Output encoding (png or jpg).
    #[arg(short, long, default_value = "png", value_name = "FORMAT")]
    format: OutputFormat,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Inference threads. Defaults to the engine's choice.
    #[arg(long, value_name = "INT")]
    threads: Option<usize>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("colorize={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let sources = collect_sources(args)?;
    if sources.is_empty() {
        anyhow::bail!("Nothing to do: pass an INPUT path, `-`, or --sample");
    }

    if args.details {
        for source in &sources {
            println!("{}", describe(source, &args.samples_dir)?);
        }
        return Ok(());
    }

    let config = Config {
        models: ModelPaths::in_dir(&args.models),
        samples_dir: args.samples_dir.clone(),
        upload_dir: None,
        intra_threads: args.threads,
        output_format: args.format,
        output_quality: args.quality,
    };

    // Load up front so a missing model fails before any input is touched
    let mut pipeline = Pipeline::load(config).context("Failed to initialize pipeline")?;

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory {}", args.output_dir.display())
    })?;

    let pb = if sources.len() > 1 {
        let pb = ProgressBar::new(sources.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Colorizing [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let quality = pipeline.config().output_quality;
    let outputs = output_paths(&args.output_dir, &sources, pipeline.config().output_format);

    for (source, output) in sources.iter().zip(&outputs) {
        let comparison = pipeline
            .colorize_source(source)
            .with_context(|| format!("Failed to colorize {}", source.name()))?;

        if args.side_by_side {
            colorize::image::save_rgb(comparison.side_by_side(), output, quality)?;
        } else {
            colorize::image::save_image(&comparison.colorized, output, quality)?;
        }

        pb.println(format!("{} -> {}", source.name(), output.display()));
        pb.inc(1);
    }

    pb.finish_and_clear();
    println!(
        "Successfully colorized {} image(s) into {}",
        sources.len(),
        args.output_dir.display()
    );

    Ok(())
}

fn collect_sources(args: &Args) -> Result<Vec<Source>> {
    let mut sources = Vec::with_capacity(args.inputs.len() + args.sample.len());

    for input in &args.inputs {
        if input.as_os_str() == "-" {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read upload from stdin")?;
            sources.push(Source::Upload {
                name: "stdin".to_string(),
                bytes,
            });
        } else {
            if !input.exists() {
                anyhow::bail!("Input file does not exist: {}", input.display());
            }
            sources.push(Source::Path(input.clone()));
        }
    }

    sources.extend(args.sample.iter().copied().map(Source::Sample));
    Ok(sources)
}

fn describe(source: &Source, samples_dir: &Path) -> Result<FileDetails> {
    let details = match source {
        Source::Upload { name, bytes } => FileDetails::inspect(name, bytes)?,
        Source::Path(path) => inspect_file(path)?,
        Source::Sample(sample) => inspect_file(&sample.path(samples_dir))?,
    };
    Ok(details)
}

fn inspect_file(path: &Path) -> Result<FileDetails> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(FileDetails::inspect(&name, &bytes)?)
}
