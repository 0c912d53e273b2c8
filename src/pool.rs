//! A pool of consumer loops, one per server slot.

use std::sync::Arc;

use bon::bon;
use tracing::{debug, info};

use crate::{
    clock::{Clock, TokioClock},
    metrics::MetricsSink,
    sampler::ProcessingSampler,
    transport::OrderStream,
    variate::VariateGenerator,
    worker::{StopSignal, WorkerHandle},
};

/// Runs `server_count` consumer loops over a shared [`OrderStream`].
///
/// Each loop takes one order at a time, so at most `server_count` orders are in service at once.
/// Orders left in the stream are queueing. Every loop owns its own [`ProcessingSampler`].
#[derive(Debug)]
pub struct ServerPool {
    server_count: usize,
    stream: OrderStream,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
}

#[bon]
impl ServerPool {
    #[builder]
    pub fn new(
        /// Clamped to at least 1.
        #[builder(default = 1)]
        server_count: usize,
        stream: OrderStream,
        metrics: Arc<dyn MetricsSink>,
        /// Defaults to a [`TokioClock`].
        clock: Option<Arc<dyn Clock>>,
        /// Master seed. Consumer `i` uses stream `i + 1`.
        seed: Option<u64>,
    ) -> Self {
        Self {
            server_count: server_count.max(1),
            stream,
            metrics,
            clock: clock.unwrap_or_else(|| Arc::new(TokioClock::new())),
            seed,
        }
    }

    pub fn server_count(&self) -> usize {
        self.server_count
    }

    /// Spawn the consumer loops.
    ///
    /// The concurrency gauge is set to `server_count` once the loops are running.
    pub fn spawn(self) -> WorkerHandle {
        let (mut handle, stop) = WorkerHandle::new("servers");

        for server in 0..self.server_count {
            let sampler = ProcessingSampler::new(
                VariateGenerator::for_stream(self.seed, server as u64 + 1),
                self.clock.clone(),
                self.metrics.clone(),
            );

            handle.push(tokio::spawn(consume(
                server,
                sampler,
                self.stream.clone(),
                stop.clone(),
            )));
        }

        self.metrics.set_concurrency(self.server_count);
        info!(server_count = self.server_count, "Server pool started");

        handle
    }
}

async fn consume(
    server: usize,
    mut sampler: ProcessingSampler,
    stream: OrderStream,
    mut stop: StopSignal,
) {
    while !stop.is_stopped() {
        let order = tokio::select! {
            biased;

            _ = stop.stopped() => break,

            order = stream.recv() => match order {
                Some(order) => order,
                None => {
                    debug!(server, "Order stream closed");
                    break;
                }
            },
        };

        sampler.process(order).await;
    }

    debug!(server, "Server stopped");
}
