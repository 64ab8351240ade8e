//! Churn demo
//!
//! Inserts one key per second into an expiry queue with a one second TTL and
//! a one second sweep interval, logging how many entries are held after each
//! insert. The count should hover around one or two: each entry outlives at
//! most a tick before the sweeper pops it.
//!
//! Run with `cargo run --example churn`. Set `RUST_LOG=ttlstore=trace` to
//! watch the sweeper.

use std::time::Duration;

use tokio::signal;
use tokio::time::{interval, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;
use ttlstore::{ExpiryQueue, Ttl};

const ROUNDS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let queue: ExpiryQueue<String, u32> =
        ExpiryQueue::new(Duration::from_secs(1), Duration::from_secs(1))?;
    queue.on_evicted(|key, value| info!(key = %key, value, "Evicted"));

    let mut ticker = interval(Duration::from_secs(1));
    ticker.tick().await;

    let churn = async {
        for i in 0..ROUNDS {
            ticker.tick().await;
            if let Err(err) = queue.add(i.to_string(), i, Ttl::Default) {
                info!(error = %err, "Insert rejected");
            }
            info!(held = queue.len(), "Inserted {}", i);
        }

        // Let the last entries expire and be swept
        sleep(Duration::from_secs(3)).await;
    };

    tokio::select! {
        _ = churn => {}
        _ = signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    let stats = queue.stats();
    info!(
        held = stats.entries,
        sets = stats.sets,
        expired = stats.expired,
        "Done"
    );

    queue.stop_sweeper();
    Ok(())
}
