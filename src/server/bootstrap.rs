use crate::checker;
use crate::config::{Options, PoolSource, RotatePolicy};
use crate::metrics::Metrics;
use crate::mitm::{default_ca_paths, Ca};
use crate::pool::ProxyPool;
use crate::server::{self, state::AppState};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments forwarded from `main()`, one variant per subcommand.
pub enum BootstrapArgs {
    Serve {
        config_path: Option<PathBuf>,
        source: Option<String>,
        listen: Option<String>,
        admin_listen: Option<String>,
        sync: bool,
        rotate: Option<String>,
        rotate_n: Option<u64>,
        auth: Option<String>,
        timeout: Option<f64>,
        ca_cert: Option<PathBuf>,
        ca_key: Option<PathBuf>,
        verbose: bool,
    },
    Check {
        source: String,
        goroutine: Option<usize>,
        timeout: Option<f64>,
        output: Option<PathBuf>,
        verbose: bool,
    },
}

/// Top-level lifecycle: init → resolve pool → (serve | check) → shutdown.
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();

    match args {
        BootstrapArgs::Serve { .. } => run_serve(args).await,
        BootstrapArgs::Check { .. } => run_check(args).await,
    }
}

async fn run_serve(args: BootstrapArgs) -> Result<()> {
    let BootstrapArgs::Serve {
        config_path,
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
    } = args
    else {
        unreachable!("run_serve called with non-Serve args");
    };

    let mut options = Options::load(config_path.as_deref())?;
    options.apply_env_overrides();

    if let Some(listen) = listen {
        options.listen_addr = listen;
    }
    if let Some(admin_listen) = admin_listen {
        options.admin_listen = Some(admin_listen);
    }
    if sync {
        options.sync = true;
    }
    if let Some(policy) = rotate {
        options.rotate = parse_rotate_policy(&policy, rotate_n)?;
    }
    if let Some(auth) = auth {
        options.auth = Some(auth);
    }
    if let Some(timeout) = timeout {
        options.timeout = Duration::from_secs_f64(timeout);
    }
    if let Some(ca_cert) = ca_cert {
        options.ca_cert_path = Some(ca_cert);
    }
    if let Some(ca_key) = ca_key {
        options.ca_key_path = Some(ca_key);
    }
    if verbose {
        options.verbose = true;
    }
    options.validate()?;

    let source = source
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--source is required to build the proxy pool"))?;
    let pool_source = PoolSource::detect(source);

    let fetch_client = crate::transport::build_client(None, options.timeout)?;
    let pool = ProxyPool::load(pool_source, &fetch_client).await?;
    tracing::info!("pool: loaded {} upstream proxies", pool.len());

    let (ca_cert_path, ca_key_path) = match (&options.ca_cert_path, &options.ca_key_path) {
        (Some(cert), Some(key)) => (cert.clone(), key.clone()),
        _ => default_ca_paths(),
    };
    let ca = Ca::load_or_generate(Some(&ca_cert_path), Some(&ca_key_path))?;

    let metrics = Metrics::install();
    let state = AppState::new(pool, options.clone(), ca, metrics);

    let shutdown = Arc::new(Notify::new());

    let proxy_handle = tokio::spawn({
        let listen = state.options.listen_addr.clone();
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { server::run_proxy_server(&listen, state, shutdown).await }
    });

    let admin_handle = state.options.admin_listen.clone().map(|admin_listen| {
        let state = state.clone();
        tokio::spawn(async move { server::run_admin_server(&admin_listen, state).await })
    });

    tracing::info!(
        "server: starting rotoproxy, listen={}",
        state.options.listen_addr
    );

    wait_for_shutdown(&shutdown).await;

    if let Err(e) = proxy_handle.await {
        tracing::error!("server: proxy task error: {}", e);
    }
    if let Some(handle) = admin_handle {
        handle.abort();
    }

    tracing::info!("server: shutdown complete");
    Ok(())
}

async fn run_check(args: BootstrapArgs) -> Result<()> {
    let BootstrapArgs::Check {
        source,
        goroutine,
        timeout,
        output,
        verbose,
    } = args
    else {
        unreachable!("run_check called with non-Check args");
    };

    let mut options = Options::default();
    if let Some(goroutine) = goroutine {
        options.max_parallelism = goroutine;
    }
    if let Some(timeout) = timeout {
        options.timeout = Duration::from_secs_f64(timeout);
    }
    options.output_path = output;
    options.verbose = verbose;
    options.validate()?;

    let pool_source = PoolSource::detect(&source);
    let fetch_client = crate::transport::build_client(None, options.timeout)?;
    let pool = ProxyPool::load(pool_source, &fetch_client).await?;
    tracing::info!("checker: checking {} upstream proxies", pool.len());

    let report = checker::run_checks(&pool, &options).await;
    tracing::info!(
        "checker: done, live={}, dead={}",
        report.live_count(),
        report.dead_count()
    );

    Ok(())
}

fn parse_rotate_policy(policy: &str, n: Option<u64>) -> Result<RotatePolicy> {
    match policy {
        "every_request" => Ok(RotatePolicy::EveryRequest),
        "random" => Ok(RotatePolicy::Random),
        "every_n" => {
            let n = n.ok_or_else(|| anyhow::anyhow!("--rotate=every_n requires --rotate-n"))?;
            Ok(RotatePolicy::EveryN { n })
        }
        other => anyhow::bail!("unknown rotate policy: {other}"),
    }
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received ctrl-c"),
        _ = terminate => tracing::info!("server: received SIGTERM"),
    }

    shutdown.notify_waiters();
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}
