use clap::{Parser, Subcommand};
use crunch::aggregate::BuildReport;
use crunch::alias::AliasResolver;
use crunch::config::{self, SiteConfig};
use crunch::imaging::RustBackend;
use crunch::ingest::Ingestor;
use crunch::media::MediaPipeline;
use crunch::output;
use crunch::site::{Published, Site};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crunch")]
#[command(about = "Incremental static blog builder with mail-in posting")]
#[command(long_about = "\
Incremental static blog builder with mail-in posting

Plain-text posts go in, a static site comes out. Publishing one post only
rewrites its own page and the indexes, home page and feed it appears on.

Site layout:

  site/
  ├── crunch.toml                  # Site config (optional, see gen-config)
  ├── posts/YYYY/MM/<slug>.md      # Posts: header block, blank line, body
  ├── pages/<name>.md              # Static pages → build/<name>.htm
  ├── galleries/<name>/meta.md     # Gallery description + image files
  ├── images/posts/                # Media store for mailed-in images
  ├── public/                      # Copied into build/ when it is created
  └── build/                       # Output

Post header:

  title: Hello & World
  date: 1700000000                 # epoch seconds, RFC 3339 or RFC 2822
  short: x1y                       # optional short alias

Run 'crunch gen-config' to print a documented crunch.toml.")]
#[command(version)]
struct Cli {
    /// Site root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Never contact external services; short aliases stay empty
    #[arg(long, global = true)]
    no_http: bool,

    /// Debug logging and one line per written artifact
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build everything: error pages, static pages, posts, indexes, home, feed, galleries
    Build,
    /// Build every post page
    Posts,
    /// Build the static pages
    Pages,
    /// Build every year and month index and the archive
    Indexes,
    /// Build the home page
    Home,
    /// Build the RSS feed
    Feed,
    /// Build the error pages
    Errors,
    /// Build every gallery
    Galleries,
    /// Publish one post: its page plus the indexes, home and feed it appears on
    Publish {
        /// Post source file, or - for stdin
        file: PathBuf,
    },
    /// Read an email message from stdin and publish it as a post
    Ingest,
    /// Remove the build directory
    Clean,
    /// Validate config and content without building
    Check,
    /// Print a stock crunch.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
        Command::Check => check(&cli),
        Command::Clean => clean(&cli),
        command => build(&cli, command),
    }
}

fn build(cli: &Cli, command: &Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(&cli.root)?;
    init_thread_pool(&config.processing);
    let site = open_site(cli, &config);
    let backend = RustBackend::new();

    // Ingest creates the tree itself, once the message has been accepted.
    if !matches!(command, Command::Build | Command::Ingest) && site.ensure_build_tree()? {
        println!("==> Created {}", site.paths().build.display());
    }

    let report = match command {
        Command::Build => site.build_all(&backend)?,
        Command::Posts => site.build_posts()?,
        Command::Pages => site.build_pages()?,
        Command::Indexes => site.aggregates().rebuild_indexes()?,
        Command::Home => site.aggregates().rebuild_home(),
        Command::Feed => site.aggregates().rebuild_feed(),
        Command::Errors => site.build_errors(),
        Command::Galleries => site.build_galleries(&backend)?,
        Command::Publish { file } => {
            let published = publish(&site, file)?;
            output::print_published(&published, &cli.root);
            published.report
        }
        Command::Ingest => {
            let mut raw = Vec::new();
            std::io::stdin().read_to_end(&mut raw)?;
            let media = MediaPipeline::new(&backend, &config, site.paths());
            let ingestor = Ingestor::new(&config, site.store(), media)?;
            let (outcome, report) = site.ingest(&ingestor, &raw)?;
            output::print_ingest_outcome(&outcome, &cli.root);
            report
        }
        Command::Clean | Command::Check | Command::GenConfig => BuildReport::default(),
    };

    output::print_build_report(&report, &site.paths().build, &cli.root, cli.verbose);
    if report.is_clean() {
        Ok(())
    } else {
        Err("build finished with errors".into())
    }
}

fn check(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(&cli.root)?;
    println!("==> Config is valid");
    let site = open_site(cli, &config);
    let store = site.store();
    let years = store
        .years()?
        .iter()
        .map(|year| store.load_year(year))
        .collect::<Vec<_>>();
    output::print_check(&years, &cli.root);
    if years.iter().any(|y| y.failures().next().is_some()) {
        return Err("content has problems".into());
    }
    println!("==> Content is valid");
    Ok(())
}

fn clean(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(&cli.root)?;
    let site = open_site(cli, &config);
    if site.clean()? {
        println!("==> Removed {}", site.paths().build.display());
    } else {
        println!("==> Nothing to clean");
    }
    Ok(())
}

/// Site at `--root`, with alias lookups unless `--no-http`.
fn open_site<'a>(cli: &Cli, config: &'a SiteConfig) -> Site<'a> {
    let aliases = AliasResolver::from_config(&config.alias, !cli.no_http);
    Site::new(config, &cli.root, Arc::new(aliases))
}

/// Store and publish a post source from a file or stdin.
fn publish(site: &Site<'_>, file: &Path) -> Result<Published, Box<dyn std::error::Error>> {
    if file.as_os_str() != "-" {
        return Ok(site.publish_file(file)?);
    }
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(site.publish_source(&text)?)
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "crunch=debug" } else { "crunch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
