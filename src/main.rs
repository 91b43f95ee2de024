use clap::{Parser, Subcommand};
use log::{LevelFilter, debug, info};
use mdoc_hugo::{compile, config, output};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "mdoc-hugo")]
#[command(about = "Compiles Markdoc content into Hugo-ready Markdown")]
#[command(long_about = "\
Compiles Markdoc content into Hugo-ready Markdown

Each page is parsed, its partials resolved, its front matter validated, and
its page filters joined against the option catalog of its language. The
result is written as Markdown with a pre-rendered HTML body.

Site structure:

  site/
  ├── markdoc.toml                       # Site config (env, img_url)
  ├── content/
  │   ├── en/
  │   │   ├── primary_colors.mdoc        # Page
  │   │   └── guides/painting.mdoc       # Nested page
  │   └── ja/
  ├── partials/
  │   └── header.mdoc                    # {% partial file=\"header.mdoc\" /%}
  └── preferences_config/options/
      └── en/
          ├── allowlist.yaml             # Permitted filter and option ids
          └── color_options.yaml         # Option sets

Run 'mdoc-hugo gen-config' to generate a documented markdoc.toml.")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    site_dir: PathBuf,

    /// Output directory for compiled pages
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every page and report problems without writing output
    Check,
    /// Compile every page and write the results
    Build {
        /// Also fail when pages have markup or filter errors
        #[arg(long)]
        strict: bool,
    },
    /// Show the filter manifest of a single page
    Manifest {
        /// Path to a .mdoc file inside a language content directory
        file: PathBuf,
    },
    /// Print a stock markdoc.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level);
    debug!(cli:?; "Parsed arguments");

    match cli.command {
        Command::Check => {
            let site_config = config::load_config(&cli.site_dir)?;
            init_thread_pool(&site_config.processing);
            println!("==> Checking {}", cli.site_dir.display());
            let report = compile::compile_site(&cli.site_dir, &site_config)?;
            output::print_compile_output(&report, &cli.site_dir);
            if !report.is_clean() {
                std::process::exit(1);
            }
            println!("==> Content is valid");
        }
        Command::Build { strict } => {
            let site_config = config::load_config(&cli.site_dir)?;
            init_thread_pool(&site_config.processing);

            println!("==> Compiling {}", cli.site_dir.display());
            let report = compile::compile_site(&cli.site_dir, &site_config)?;
            output::print_compile_output(&report, &cli.site_dir);

            println!("==> Writing → {}", cli.output.display());
            let written = compile::write_pages(&report, &cli.output)?;
            output::print_write_output(&written, &cli.output);

            if !report.failures.is_empty() || (strict && !report.is_clean()) {
                std::process::exit(1);
            }
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Manifest { file } => {
            let site_config = config::load_config(&cli.site_dir)?;
            let inspection = compile::inspect_page(&cli.site_dir, &site_config, &file)?;
            output::print_manifest_output(&inspection);
            println!(
                "{}",
                serde_json::to_string_pretty(&inspection.manifest.minified())?
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the logger from the `--log-level` flag.
fn init_logger(level: &str) {
    let log_level = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {level}. Using 'warn' instead.");
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    info!(log_level:?; "Starting mdoc-hugo");
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
