use clap::Parser;
use memc_load::{Config, Loader, Result, selftest};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Load gzip-compressed installed-apps logs into memcached
#[derive(Debug, Parser)]
#[command(name = "memc-load", version, about)]
struct Args {
    /// Run the built-in parse/serialize self-test and exit
    #[arg(short, long)]
    test: bool,

    /// Write logs to FILE instead of stderr
    #[arg(short, long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Log intended writes instead of performing them
    #[arg(long)]
    dry: bool,

    /// Glob selecting input files [default: /data/appsinstalled/*.tsv.gz]
    #[arg(long)]
    pattern: Option<String>,

    /// Endpoint for idfa devices [default: 127.0.0.1:33013]
    #[arg(long, value_name = "ADDR")]
    idfa: Option<String>,

    /// Endpoint for gaid devices [default: 127.0.0.1:33014]
    #[arg(long, value_name = "ADDR")]
    gaid: Option<String>,

    /// Endpoint for adid devices [default: 127.0.0.1:33015]
    #[arg(long, value_name = "ADDR")]
    adid: Option<String>,

    /// Endpoint for dvid devices [default: 127.0.0.1:33016]
    #[arg(long, value_name = "ADDR")]
    dvid: Option<String>,

    /// Concurrent workers per file [default: 8]
    #[arg(long)]
    workers: Option<usize>,

    /// Error rate at which a file load is rejected [default: 0.01]
    #[arg(long)]
    max_error_rate: Option<f64>,

    /// Lines buffered between the reader and the workers [default: 10000]
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Extra or replacement route, repeatable
    #[arg(long = "route", value_name = "TYPE=ADDR", value_parser = parse_route)]
    routes: Vec<(String, String)>,

    /// Read the whole configuration from a JSON file (--dry and --log still apply)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => self.flag_config(),
        };
        config.dry_run |= self.dry;
        if self.log.is_some() {
            config.log_file.clone_from(&self.log);
        }
        Ok(config)
    }

    fn flag_config(&self) -> Config {
        let mut config = Config::default();
        if let Some(pattern) = &self.pattern {
            config.pattern.clone_from(pattern);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(rate) = self.max_error_rate {
            config.max_error_rate = rate;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }

        let named = [
            ("idfa", &self.idfa),
            ("gaid", &self.gaid),
            ("adid", &self.adid),
            ("dvid", &self.dvid),
        ];
        for (device_type, address) in named {
            if let Some(address) = address {
                config.routes.insert(device_type.to_string(), address.clone());
            }
        }
        for (device_type, address) in &self.routes {
            config.routes.insert(device_type.clone(), address.clone());
        }
        config
    }
}

fn parse_route(value: &str) -> std::result::Result<(String, String), String> {
    let (device_type, address) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=ADDR, got '{value}'"))?;
    let (device_type, address) = (device_type.trim(), address.trim());
    if device_type.is_empty() || address.is_empty() {
        return Err(format!("expected TYPE=ADDR, got '{value}'"));
    }
    Ok((device_type.to_string(), address.to_string()))
}

fn init_tracing(config: &Config) -> std::io::Result<()> {
    let default_level = if config.dry_run { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing::subscriber::set_global_default(
                builder.with_ansi(false).with_writer(Mutex::new(file)).finish(),
            )
        }
        None => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).finish(),
        ),
    };
    if installed.is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&config) {
        eprintln!("Cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        pattern = %config.pattern,
        workers = config.workers,
        dry_run = config.dry_run,
        max_error_rate = config.max_error_rate,
        routes = ?config.routes,
        "Memc loader started"
    );

    if args.test {
        return match selftest::run() {
            Ok(checked) => {
                info!(checked, "Self-test passed");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Self-test failed");
                ExitCode::FAILURE
            }
        };
    }

    let started = Instant::now();
    let result = match Loader::with_memcache(config) {
        Ok(loader) => loader.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => {
            println!(
                "Execution time: {} seconds",
                started.elapsed().as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Unexpected error");
            ExitCode::FAILURE
        }
    }
}
