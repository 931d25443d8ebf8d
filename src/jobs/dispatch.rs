use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::seeder::MetaTileRequest;

/// Fans metatiles out to a pool of workers.
///
/// - one bounded channel per worker, so a slow pool applies backpressure
///   to the dispatcher
/// - round-robin assignment
///
/// Dropping the broker closes every channel, which lets workers drain and exit.
pub struct MetaTileBroker {
    worker_channels: Vec<mpsc::Sender<MetaTileRequest>>,
    next_worker: AtomicUsize,
}

impl MetaTileBroker {
    /// Returns the broker and one receiver per worker.
    pub fn new(
        num_workers: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<MetaTileRequest>>) {
        let num_workers = num_workers.max(1);
        let channel_size = channel_size.max(1);
        info!(num_workers, channel_size, "Creating metatile worker channels");

        let (worker_channels, worker_receivers): (Vec<_>, Vec<_>) = (0..num_workers)
            .map(|worker_id| {
                debug!(worker_id, "Created worker channel");
                mpsc::channel(channel_size)
            })
            .unzip();

        let broker = Self {
            worker_channels,
            next_worker: AtomicUsize::new(0),
        };
        (broker, worker_receivers)
    }

    /// Sends to the next worker, waiting while its channel is full.
    /// Returns false when that worker is gone.
    pub async fn dispatch(&self, request: MetaTileRequest) -> bool {
        let worker_idx =
            self.next_worker.fetch_add(1, Ordering::Relaxed) % self.worker_channels.len();
        let seq = request.seq;

        match self.worker_channels[worker_idx].send(request).await {
            Ok(()) => {
                debug!(seq, worker_idx, "Metatile sent to worker");
                true
            }
            Err(_) => {
                warn!(seq, worker_idx, "Worker channel closed, metatile not delivered");
                false
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// True while every worker is still receiving.
    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
