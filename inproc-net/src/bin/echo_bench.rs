//! Load generator for the virtual network.
//!
//! Runs an echo server and keeps a fixed number of requests in flight
//! against it, printing successes and failures per second. Pass `--real`
//! to run the same workload over loopback TCP for comparison.

use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use inproc_net::{NetworkProvider, TcpListenerTrait, TokioNetworkProvider, VirtualNetwork};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Requests slower than this count as failures.
const SLOW_REQUEST: Duration = Duration::from_millis(200);

const STATS_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "inproc-echo-bench", about = "Echo throughput over an in-process network")]
struct Args {
    /// Requests kept in flight
    #[arg(long, default_value_t = 64)]
    concurrency: u64,

    /// How long to run
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// Bytes sent (and echoed) per request
    #[arg(long, default_value_t = 2)]
    payload: usize,

    /// Capacity of each virtual pipe
    #[arg(long, default_value_t = inproc_net::DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Use loopback TCP instead of the virtual network
    #[arg(long)]
    real: bool,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn running(&self) -> u64 {
        let done = self.succeeded.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        self.started.load(Ordering::Relaxed).saturating_sub(done)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let result = if args.real {
        run(TokioNetworkProvider::new(), &args).await
    } else {
        run(VirtualNetwork::with_buffer_size(args.buffer_size), &args).await
    };

    if let Err(err) = result {
        eprintln!("ERROR: {err}");
        process::exit(1);
    }
}

async fn run<P: NetworkProvider>(provider: P, args: &Args) -> std::io::Result<()> {
    let listener = provider
        .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await?;
    let target = listener.local_addr()?;
    tokio::spawn(serve(listener));

    let counters = Arc::new(Counters::default());
    let stats = tokio::spawn(print_stats(counters.clone()));

    let payload: Arc<[u8]> = (0..args.payload).map(|i| i as u8).collect();
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    while Instant::now() < deadline {
        if counters.running() < args.concurrency {
            counters.started.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(request(
                provider.clone(),
                target,
                payload.clone(),
                counters.clone(),
            ));
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    stats.abort();
    eprintln!(
        "total: {} succeeded, {} failed",
        counters.succeeded.load(Ordering::Relaxed),
        counters.failed.load(Ordering::Relaxed)
    );
    Ok(())
}

async fn serve<L: TcpListenerTrait + 'static>(listener: L) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(async move {
                    let (mut reader, mut writer) = tokio::io::split(stream);
                    if let Err(err) = tokio::io::copy(&mut reader, &mut writer).await {
                        tracing::debug!(%err, "echo failed");
                        return;
                    }
                    let _ = writer.shutdown().await;
                });
            }
            Err(err) => {
                tracing::info!(%err, "listener stopped");
                return;
            }
        }
    }
}

async fn request<P: NetworkProvider>(
    provider: P,
    target: SocketAddr,
    payload: Arc<[u8]>,
    counters: Arc<Counters>,
) {
    let start = Instant::now();
    match echo_once(&provider, target, &payload).await {
        Ok(()) if start.elapsed() < SLOW_REQUEST => {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        Ok(()) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => {
            tracing::debug!(%err, "request failed");
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn echo_once<P: NetworkProvider>(
    provider: &P,
    target: SocketAddr,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut stream = provider.connect(target).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;

    let mut echoed = Vec::with_capacity(payload.len());
    stream.read_to_end(&mut echoed).await?;
    if echoed != payload {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "echo mismatch",
        ));
    }
    Ok(())
}

async fn print_stats(counters: Arc<Counters>) {
    let mut last_succeeded = counters.succeeded.load(Ordering::Relaxed);
    let mut last_failed = counters.failed.load(Ordering::Relaxed);
    let mut last_time = Instant::now();

    loop {
        tokio::time::sleep(STATS_INTERVAL).await;

        let succeeded = counters.succeeded.load(Ordering::Relaxed);
        let failed = counters.failed.load(Ordering::Relaxed);
        let now = Instant::now();

        let elapsed = now.duration_since(last_time).as_secs_f64();
        println!(
            "{:8.2} success/sec {:8.2} fail/sec",
            (succeeded - last_succeeded) as f64 / elapsed,
            (failed - last_failed) as f64 / elapsed
        );

        last_succeeded = succeeded;
        last_failed = failed;
        last_time = now;
    }
}
