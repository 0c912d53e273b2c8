//! The boundary with the message substrate that carries orders from producer to consumers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::{error::PublishError, OrderRecord};

/// Hands orders to whatever delivers them to consumers.
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Publish one order.
    async fn publish(&self, order: OrderRecord) -> Result<(), PublishError>;
}

#[async_trait]
impl<S: OrderSink + ?Sized> OrderSink for Arc<S> {
    async fn publish(&self, order: OrderRecord) -> Result<(), PublishError> {
        (**self).publish(order).await
    }
}

/// Create an in-memory substrate holding up to `capacity` undelivered orders.
pub fn channel(capacity: usize) -> (ChannelSink, OrderStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    (
        ChannelSink { tx },
        OrderStream {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// The sending half of an in-memory substrate. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OrderRecord>,
}

#[async_trait]
impl OrderSink for ChannelSink {
    async fn publish(&self, order: OrderRecord) -> Result<(), PublishError> {
        self.tx.send(order).await.map_err(|_| PublishError::Closed)
    }
}

/// The receiving half of an in-memory substrate.
///
/// Clones compete for orders: each order goes to exactly one receiver.
#[derive(Debug, Clone)]
pub struct OrderStream {
    rx: Arc<Mutex<mpsc::Receiver<OrderRecord>>>,
}

impl OrderStream {
    /// Wait for the next order. `None` once every sink is gone and the backlog is drained.
    pub async fn recv(&self) -> Option<OrderRecord> {
        self.rx.lock().await.recv().await
    }

    /// Number of orders waiting to be picked up.
    pub async fn backlog(&self) -> usize {
        self.rx.lock().await.len()
    }
}
