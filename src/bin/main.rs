use clap::{CommandFactory, Parser};
use framebench::error::EXIT_FAILURE;
use framebench::{Config, ReorderPolicy, UnmatchedPolicy};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "framebench")]
#[command(about = "Raw Ethernet frame round-trip benchmark", long_about = None)]
#[command(version)]
struct Cli {
    /// Network interface to send and receive on
    #[arg(short, long)]
    interface: Option<String>,

    /// Do not compare returned payloads with the frames that were sent
    #[arg(short = 'c', long)]
    no_content_check: bool,

    /// Log every frame sent and received
    #[arg(short, long)]
    verbose: bool,

    /// Stop after sending this many frames (0 means no limit)
    #[arg(short = 'l', long = "limit")]
    limit: Option<u32>,

    /// Stop after this many seconds
    #[arg(short = 't', long)]
    time_limit: Option<u64>,

    /// Frames sent before pacing switches to one-in-one-out
    #[arg(short = 'p', long, default_value_t = framebench::config::DEFAULT_WINDOW)]
    prefill_count: u32,

    /// Write per-second bit rates to this CSV file
    #[arg(short = 'o', long)]
    stat_file: Option<PathBuf>,

    /// Only count received frames; send nothing
    #[arg(short = 'r', long)]
    receive_only: bool,

    /// Warn about frames with no frame in flight instead of stopping
    #[arg(long)]
    ignore_unmatched: bool,

    /// Never move the loss cursor backwards on reordered frames
    #[arg(long)]
    monotonic_cursor: bool,

    /// Output in JSON format
    #[arg(short = 'J', long)]
    json: bool,
}

impl Cli {
    fn into_config(self, interface: String) -> Config {
        let mut config = Config::new(interface)
            .with_check_content(!self.no_content_check)
            .with_verbose(self.verbose)
            .with_receive_only(self.receive_only)
            .with_window(self.prefill_count)
            .with_json(self.json);

        if let Some(limit) = self.limit {
            config = config.with_sequence_limit(limit);
        }
        if let Some(secs) = self.time_limit {
            config = config.with_time_limit(Duration::from_secs(secs));
        }
        if let Some(path) = self.stat_file {
            config = config.with_stat_file(path);
        }
        if self.ignore_unmatched {
            config = config.with_unmatched_policy(UnmatchedPolicy::Ignore);
        }
        if self.monotonic_cursor {
            config = config.with_reorder_policy(ReorderPolicy::Monotonic);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let Some(interface) = cli.interface.clone() else {
        eprintln!("error: an interface is required (-i <INTERFACE>)\n");
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(EXIT_FAILURE);
    };

    match run(cli.into_config(interface)).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(target_os = "linux")]
async fn run(config: Config) -> anyhow::Result<u8> {
    use anyhow::Context;
    use framebench::benchmark::{exit_code, print_summary};
    use framebench::{Benchmark, RawSocket};
    use log::info;

    config.validate()?;
    let socket = RawSocket::open(&config.interface)
        .with_context(|| format!("failed to open raw socket on {}", config.interface))?;
    info!(
        "Benchmarking on {} (interface index {})",
        socket.interface(),
        socket.index()
    );
    let json = config.json;
    let bench = Benchmark::new(config, socket)?;

    let token = bench.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = bench.run().await;
    let code = exit_code(&result);
    let summary = result?;
    print_summary(&summary, json)?;
    Ok(code)
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: Config) -> anyhow::Result<u8> {
    Err(framebench::Error::Config("raw sockets are only supported on Linux".into()).into())
}
