use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use ec2_pricing::{
    parse::{self, Parser},
    Config, Fetcher,
};
use std::{io::Write, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Build a normalized EC2 price table from the vendor JSON files.
#[derive(ClapParser, Debug)]
#[command(version)]
struct Args {
    /// YAML file merged over the built-in configuration
    #[arg(long, env = "EC2_PRICING_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh stale cached price files
    Fetch {
        /// Ignore file age and download everything
        #[arg(long)]
        force: bool,
    },
    /// Build the price table from the cached files
    Parse {
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Fetch, then parse
    Run {
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        out: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Also write the table here; `-` prints it to stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip the parsed-table cache
    #[arg(long)]
    rebuild: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    info!(
        files = config.fetch.files.len(),
        cache_dir = %config.fetch.cache_dir.display(),
        "configuration loaded"
    );

    match args.command {
        Command::Fetch { force } => fetch(&config, force).await,
        Command::Parse { out } => build(config, out),
        Command::Run { force, out } => {
            fetch(&config, force).await?;
            build(config, out)
        }
    }
}

async fn fetch(config: &Config, force: bool) -> Result<()> {
    let report = Fetcher::new(config)?.start(force).await?;
    if report.attempted > 0 && report.written == 0 {
        warn!(attempted = report.attempted, "no file could be refreshed, using cached copies");
    }
    info!(attempted = report.attempted, written = report.written, "fetch finished");
    Ok(())
}

fn build(config: Config, out: OutputArgs) -> Result<()> {
    let parser = Parser::new(config)?;
    let output = if out.rebuild {
        let output = parser.rebuild()?;
        parser.store(&output)?;
        output
    } else {
        parser.get()?
    };

    match out.output {
        Some(path) if path.as_os_str() == "-" => {
            let json = serde_json::to_string_pretty(&output)?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).context("writing to stdout")?;
        }
        Some(path) => parse::write_output(&path, &output)?,
        None => {}
    }
    Ok(())
}
