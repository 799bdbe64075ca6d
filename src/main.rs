use clap::{Parser, Subcommand};
use imgfit::imaging::{OutputFormat, ResampleFilter, ResizePolicy, Rounding, RustBackend};
use imgfit::process::{self, ProcessConfig};
use imgfit::{config, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Conversion flags shared by `convert` and `plan`. Each overrides its
/// `config.toml` counterpart when given.
#[derive(clap::Args, Clone, Default)]
struct FitArgs {
    /// Which edge the pixel bound applies to
    #[arg(long, value_enum)]
    policy: Option<ResizePolicy>,

    /// Pixel bound for the governing edge
    #[arg(long)]
    max_px: Option<u32>,

    /// Never enlarge images already within the bound
    #[arg(long, overrides_with = "no_only_shrink")]
    only_shrink: bool,

    /// Enlarge small images to the bound even if config.toml says otherwise
    #[arg(long, overrides_with = "only_shrink")]
    no_only_shrink: bool,

    /// Rounding of the scaled edge
    #[arg(long, value_enum)]
    rounding: Option<Rounding>,

    /// Resampling filter
    #[arg(long, value_enum)]
    filter: Option<ResampleFilter>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Byte budget per output file, in MB (1 MB = 1024 KiB)
    #[arg(long)]
    max_size_mb: Option<f64>,
}

impl FitArgs {
    /// Explicit `--only-shrink` / `--no-only-shrink` choice; the last one wins.
    fn only_shrink(&self) -> Option<bool> {
        match (self.only_shrink, self.no_only_shrink) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }

    fn apply(&self, config: &mut config::FitConfig) {
        if let Some(policy) = self.policy {
            config.resize.policy = policy;
        }
        if let Some(max_px) = self.max_px {
            config.resize.max_px = max_px;
        }
        if let Some(only_shrink) = self.only_shrink() {
            config.resize.only_shrink = only_shrink;
        }
        if let Some(rounding) = self.rounding {
            config.resize.rounding = rounding;
        }
        if let Some(filter) = self.filter {
            config.resize.filter = filter;
        }
        if let Some(format) = self.format {
            config.encoding.format = format;
        }
        if let Some(mb) = self.max_size_mb {
            config.encoding.max_size_mb = mb;
        }
    }
}

fn version_string() -> &'static str {
    let on_tag = env!("IMGFIT_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("IMGFIT_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgfit")]
#[command(about = "Batch-resize images and encode each under a byte budget")]
#[command(long_about = "\
Batch-resize images and encode each under a byte budget

Every image under the source directory is scaled so its governing edge
matches the pixel bound, then encoded at decreasing quality until the file
fits the byte budget. The source tree is mirrored into the output directory:

  input/                     output/
  ├── config.toml            (optional settings, see gen-config)
  ├── 001.png           →    ├── 001.jpg
  └── portraits/        →    └── portraits/
      └── a.webp        →        └── a.jpg

Images that cannot be decoded or cannot meet the budget are reported and
skipped; the rest of the batch continues. The exit status is non-zero when
any image failed.

Set RUST_LOG=info (or debug) for detailed logs on stderr.

Run 'imgfit gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Source image directory
    #[arg(long, default_value = "input", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "output", global = true)]
    output: PathBuf,

    /// Config file (default: <source>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize and encode every image in the source tree
    Convert {
        #[command(flatten)]
        fit: FitArgs,

        /// Leave images whose output already exists untouched
        #[arg(long)]
        skip_existing: bool,

        /// Delete each source file after its output is written
        #[arg(long)]
        delete_input: bool,

        /// Write a JSON report of every image to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show the planned dimensions for every image without encoding
    Plan(FitArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            fit,
            skip_existing,
            delete_input,
            report,
        } => {
            let mut fit_config = load_config(&cli.source, cli.config.as_deref())?;
            fit.apply(&mut fit_config);
            if skip_existing {
                fit_config.batch.skip_existing = true;
            }
            if delete_input {
                fit_config.batch.delete_input = true;
            }
            fit_config.validate()?;

            init_thread_pool(&fit_config.batch);
            let process_config = ProcessConfig::from_config(&fit_config);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::process(&cli.source, &cli.output, &process_config, Some(tx));
            printer.join().ok();
            let batch = result?;

            output::print_summary(&batch);
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&batch)?;
                std::fs::write(&path, json)?;
                tracing::info!(report = %path.display(), "wrote report");
            }

            if batch.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Plan(fit) => {
            let mut fit_config = load_config(&cli.source, cli.config.as_deref())?;
            fit.apply(&mut fit_config);
            fit_config.validate()?;

            init_thread_pool(&fit_config.batch);
            let process_config = ProcessConfig::from_config(&fit_config);
            let entries = process::plan_batch(
                &RustBackend::new(),
                &cli.source,
                &cli.output,
                &process_config,
            )?;
            output::print_plan(&entries);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Load the explicit config file, or `config.toml` from the source directory.
///
/// An explicit path must exist; the implicit one is optional.
fn load_config(
    source: &Path,
    explicit: Option<&Path>,
) -> Result<config::FitConfig, config::ConfigError> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(config::ConfigError::Validation(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            config::load_config_file(path)
        }
        None => config::load_config(source),
    }
}

/// Initialize the rayon thread pool based on batch config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(batch: &config::BatchConfig) {
    let threads = config::effective_threads(batch);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
