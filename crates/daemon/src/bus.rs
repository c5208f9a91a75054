// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change bus: coarse-grained events fanned out to subscribers.
//!
//! The WS relay (out of tree) drains subscriber channels; the bus itself
//! only routes. Sends are non-blocking: a full subscriber drops the event,
//! a closed subscriber is removed from the set.

use dbx_core::ChangeEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const SUBSCRIBER_CAPACITY: usize = 50;

#[derive(Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("change bus subscriber full; dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Forward an inlet channel onto the bus until cancelled.
    pub async fn run(
        self: std::sync::Arc<Self>,
        mut inlet: mpsc::Receiver<ChangeEvent>,
        stop: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                event = inlet.recv() => match event {
                    Some(event) => self.publish(event),
                    None => break,
                },
            }
        }
        tracing::debug!("change bus stopped");
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
