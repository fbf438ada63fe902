//! passgate - HTTP Server Entry Point
//!
//! Opens the password store named by `PASSWORD_STORE_DIR` and serves it.

use passgate::{api, config::Config, logging};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

fn main() -> anyhow::Result<()> {
    // Requests only interleave at I/O suspension points; one thread is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Load configuration first so LOG_LEVEL applies to the subscriber
    let config = Config::from_env()?;

    // A bad LOG_DIR is fatal before anything is served
    let (files, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let (writers, guard) = logging::open_log_dir(dir)?;
            (Some(writers), Some(guard))
        }
        None => (None, None),
    };
    let server_file = files
        .as_ref()
        .map(|w| fmt::layer().with_ansi(false).with_writer(w.server.clone()));
    let error_file = files.map(|w| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(w.error)
            .with_filter(LevelFilter::ERROR)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.filter_directives().into()),
        )
        .with(fmt::layer())
        .with(server_file)
        .with(error_file)
        .init();

    info!(
        "Loaded configuration: store={}, gpg={}",
        config.store_dir.display(),
        config.gpg.binary.display()
    );
    if let Some(dir) = &config.log_dir {
        info!("Writing logs to {}", dir.display());
    }

    info!("Starting server on {}", config.addr());
    api::serve(config).await?;

    Ok(())
}
