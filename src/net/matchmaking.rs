//! Matchmaking broker: pairs two waiting players by exchanging addresses.
//!
//! The broker only hands out a peer address and says which side dials. Roles
//! still come from the connection itself: whoever dials hosts.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_more::{Display, Error};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// `initiate` tells this side to dial `peer_address`; otherwise wait
    /// for the peer's inbound connection.
    Matched { peer_address: String, initiate: bool },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BrokerError {
    #[display("{address} is already waiting for a match")]
    AlreadyQueued { address: String },
    #[display("matchmaking was cancelled")]
    Cancelled,
}

pub trait MatchmakingBroker: Send + Sync {
    /// Wait up to `timeout` for a partner.
    fn enqueue(
        &self,
        local_address: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<MatchOutcome, BrokerError>> + Send;

    /// Withdraw from the queue; a pending `enqueue` for this address fails
    /// with `Cancelled`.
    fn dequeue(&self, local_address: &str);
}

struct Waiting {
    address: String,
    notify: oneshot::Sender<String>,
}

/// First-come pairing inside one process.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queue: Arc<Mutex<VecDeque<Waiting>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Waiting>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, address: &str) -> bool {
        let mut queue = self.lock();
        let before = queue.len();
        queue.retain(|w| w.address != address);
        queue.len() != before
    }
}

impl MatchmakingBroker for InMemoryBroker {
    async fn enqueue(&self, local_address: &str, timeout: Duration) -> Result<MatchOutcome, BrokerError> {
        let mut rx = {
            let mut queue = self.lock();
            queue.retain(|w| !w.notify.is_closed());
            while let Some(pos) = queue.iter().position(|w| w.address != local_address) {
                let Some(partner) = queue.remove(pos) else { break };
                if partner.notify.send(local_address.to_string()).is_ok() {
                    tracing::info!(local_address, peer_address = %partner.address, "matched with waiting player");
                    return Ok(MatchOutcome::Matched { peer_address: partner.address, initiate: true });
                }
            }
            if queue.iter().any(|w| w.address == local_address) {
                return Err(BrokerError::AlreadyQueued { address: local_address.to_string() });
            }
            let (tx, rx) = oneshot::channel();
            queue.push_back(Waiting { address: local_address.to_string(), notify: tx });
            tracing::debug!(local_address, "waiting for a match");
            rx
        };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(peer_address)) => Ok(MatchOutcome::Matched { peer_address, initiate: false }),
            Ok(Err(_)) => Err(BrokerError::Cancelled),
            Err(_) => {
                if self.remove(local_address) {
                    tracing::info!(local_address, "matchmaking timed out");
                    return Ok(MatchOutcome::TimedOut);
                }
                // Claimed between the deadline and the removal.
                match rx.try_recv() {
                    Ok(peer_address) => Ok(MatchOutcome::Matched { peer_address, initiate: false }),
                    Err(_) => Ok(MatchOutcome::TimedOut),
                }
            }
        }
    }

    fn dequeue(&self, local_address: &str) {
        if self.remove(local_address) {
            tracing::debug!(local_address, "left the matchmaking queue");
        }
    }
}
