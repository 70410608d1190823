//! cfkv Server Binary
//!
//! Starts the storage and serves the Raw API over TCP.

use std::io::BufRead;
use std::sync::Arc;

use cfkv::config::WalSyncStrategy;
use cfkv::network::{Server, ShutdownHandle};
use cfkv::{Config, StandaloneStorage, Storage};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// cfkv Server
#[derive(Parser, Debug)]
#[command(name = "cfkv-server")]
#[command(about = "Single-node key-value store with column families")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./cfkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:20160")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// MemTable size limit in MB before flush
    #[arg(short = 'M', long, default_value = "64")]
    memtable_mb: usize,

    /// fsync the WAL after every batch instead of every N batches
    #[arg(long)]
    sync_every_write: bool,

    /// Connection idle timeout in milliseconds (0 = none)
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cfkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("cfkv server v{}", cfkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .read_timeout_ms(args.timeout_ms)
        .write_timeout_ms(args.timeout_ms);
    if args.sync_every_write {
        builder = builder.wal_sync_strategy(WalSyncStrategy::EveryWrite);
    }
    let config = builder.build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let storage = Arc::new(StandaloneStorage::new(config.clone()));
    if let Err(e) = storage.start() {
        tracing::error!("Failed to start storage: {}", e);
        std::process::exit(1);
    }

    let server = match Server::bind(config, Arc::clone(&storage)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            let _ = storage.stop();
            std::process::exit(1);
        }
    };

    watch_stdin(server.shutdown_handle());

    let served = server.run();

    if let Err(e) = storage.stop() {
        tracing::error!("Failed to stop storage cleanly: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Shut down when `quit` or `exit` is typed on stdin
fn watch_stdin(handle: ShutdownHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line.as_deref().map(str::trim) {
                Ok("quit") | Ok("exit") => {
                    tracing::info!("Shutdown requested from console");
                    handle.shutdown();
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    });
}
