#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rotoproxy::server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rotoproxy", about = "A rotating forward HTTP/HTTPS proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the rotating proxy server.
    Run {
        /// Path to a TOML/JSON config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Proxy source: a local file path or a remote feed URL.
        #[arg(short, long)]
        source: Option<String>,

        /// Listen address for the proxy frontend.
        #[arg(short, long)]
        listen: Option<String>,

        /// Listen address for the admin/metrics frontend.
        #[arg(long)]
        admin_listen: Option<String>,

        /// Serialize all forwarding through a single global lock.
        #[arg(long)]
        sync: bool,

        /// Rotation policy: every_request, every_n, or random.
        #[arg(long)]
        rotate: Option<String>,

        /// N when --rotate=every_n.
        #[arg(long)]
        rotate_n: Option<u64>,

        /// Require "user:password" Basic auth on inbound CONNECT.
        #[arg(long)]
        auth: Option<String>,

        /// Per-upstream request timeout, in seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Persisted MITM CA certificate (PEM).
        #[arg(long)]
        ca_cert: Option<PathBuf>,

        /// Persisted MITM CA private key (PEM).
        #[arg(long)]
        ca_key: Option<PathBuf>,

        /// Log verbosely (debug-level retry/rotation detail).
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check liveness of every proxy in a source and report the live ones.
    Check {
        /// Proxy source: a local file path or a remote feed URL.
        #[arg(short, long)]
        source: String,

        /// Max concurrent liveness probes.
        #[arg(short = 'g', long)]
        goroutine: Option<usize>,

        /// Per-probe timeout, in seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Append live proxies to this file as they're confirmed.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log verbosely (include dead upstreams).
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let worker_threads = server::runtime::get_container_cpu_limit();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    rt.block_on(server::bootstrap::run(cli.command.into()))
}

impl From<Command> for server::bootstrap::BootstrapArgs {
    fn from(command: Command) -> Self {
        match command {
            Command::Run {
                config,
                source,
                listen,
                admin_listen,
                sync,
                rotate,
                rotate_n,
                auth,
                timeout,
                ca_cert,
                ca_key,
                verbose,
            } => server::bootstrap::BootstrapArgs::Serve {
                config_path: config,
                source,
                listen,
                admin_listen,
                sync,
                rotate,
                rotate_n,
                auth,
                timeout,
                ca_cert,
                ca_key,
                verbose,
            },
            Command::Check {
                source,
                goroutine,
                timeout,
                output,
                verbose,
            } => server::bootstrap::BootstrapArgs::Check {
                source,
                goroutine,
                timeout,
                output,
                verbose,
            },
        }
    }
}
