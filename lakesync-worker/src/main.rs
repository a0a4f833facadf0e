use lakesync_telemetry::init_tracing;
use lakesync_worker::config::{WorkerServiceConfig, load_worker_config};
use lakesync_worker::core::start_worker;
use tracing::error;

fn main() -> anyhow::Result<()> {
    // Load worker config
    let worker_config = load_worker_config()?;

    // Initialize tracing
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(worker_config))?;

    Ok(())
}

async fn async_main(worker_config: WorkerServiceConfig) -> anyhow::Result<()> {
    // We start the worker and catch any errors.
    if let Err(err) = start_worker(worker_config).await {
        error!("an error occurred in the worker: {err}");

        return Err(err);
    }

    Ok(())
}
