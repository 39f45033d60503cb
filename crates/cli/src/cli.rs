use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use untrack_client::{Resolver, TrackerRegistry};
use untrack_core::{AppConfig, ConfigError, ShopRegistry};

/// Command line of the untrack-url binary.
#[derive(Debug, Parser)]
#[command(name = "untrack-url", version)]
#[command(about = "Resolve affiliate/tracking links to clean shop URLs", long_about = None)]
pub struct Cli {
    /// Print only: don't open URL in browser.
    #[arg(short, long)]
    pub print_only: bool,

    /// Debug: log every hop to stderr, implies -p.
    #[arg(short, long)]
    pub debug: bool,

    /// Fail when the destination host has no cleanup rule.
    #[arg(short, long)]
    pub strict: bool,

    /// Dirty URL to resolve; the scheme may be omitted.
    pub url: String,
}

impl Cli {
    /// Parse arguments; help output lists the built-in hosts.
    pub fn parse_with_hosts() -> Self {
        let matches = Self::command().after_help(known_hosts()).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    fn prints_only(&self) -> bool {
        self.print_only || self.debug
    }
}

const PROJECT_HOME: &str = "https://github.com/vbauerster/untrack-url";

fn known_hosts() -> String {
    let mut help = String::from("Known trackers:\n");
    for host in TrackerRegistry::builtin().hosts() {
        help.push_str(&format!("\t{host}\n"));
    }
    help.push_str("\nKnown shops:\n");
    for host in ShopRegistry::builtin().hosts() {
        help.push_str(&format!("\t{host}\n"));
    }
    help.push_str(&format!("\nproject home: {PROJECT_HOME}\n"));
    help
}

fn init_logging(debug: bool) {
    let env_filter = if debug {
        EnvFilter::new("warn,untrack_core=debug,untrack_client=debug,untrack_url=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse_with_hosts();
    init_logging(cli.debug);

    match untrack(&cli).await {
        Ok(clean) => {
            emit(&cli, &clean);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let report = Report::classify(&err);
            eprintln!("{report}");
            ExitCode::from(report.exit_status())
        }
    }
}

async fn untrack(cli: &Cli) -> Result<String> {
    let mut config = AppConfig::load().context("failed to load configuration")?;
    if cli.strict {
        config.strict = true;
    }
    tracing::debug!("loaded config: {:?}", config);

    let resolver = Resolver::new(&config)?;
    let clean = resolver.untrack(&cli.url).await?;
    Ok(clean)
}

fn emit(cli: &Cli, clean: &str) {
    if cli.prints_only() {
        println!("{clean}");
        return;
    }

    if let Err(e) = open::that(clean) {
        tracing::warn!("failed to open browser: {}", e);
        println!("{clean}");
    }
}

/// What a failed run prints on stderr.
#[derive(Debug)]
enum Report {
    /// Bad input, network trouble or invalid config: one clean line.
    Expected(String),
    /// Anything else, with the full chain and a hint to file a bug.
    Unexpected(String),
}

impl Report {
    fn classify(err: &anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<untrack_core::Error>()
            && e.is_domain()
        {
            return Report::Expected(format!("untrack-url: {e}"));
        }

        if let Some(e) = err.root_cause().downcast_ref::<ConfigError>() {
            return Report::Expected(format!("untrack-url: {e}"));
        }

        Report::Unexpected(format!(
            "untrack-url: unexpected error: {err:#}\n{err:?}\nplease report this issue along with the output of `untrack-url -d <URL>`"
        ))
    }

    fn exit_status(&self) -> u8 {
        1
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Report::Expected(message) | Report::Unexpected(message) => f.write_str(message),
        }
    }
}
