//! Vault actor and its handle

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;
use tranchevault_vault::{
    handle, query, Envelope, Handled, Query, QueryResponse, VaultConfig, VaultState,
};

use crate::error::BusError;

const MAILBOX_CAPACITY: usize = 256;

enum Command {
    Submit {
        envelope: Envelope,
        reply: oneshot::Sender<Handled>,
    },
    Query {
        query: Query,
        at: DateTime<Utc>,
        reply: oneshot::Sender<QueryResponse>,
    },
    Snapshot {
        reply: oneshot::Sender<VaultState>,
    },
}

/// Cloneable address of a running vault actor
#[derive(Clone)]
pub struct VaultHandle {
    mailbox: mpsc::Sender<Command>,
}

impl VaultHandle {
    /// Submit an envelope and wait for its result
    pub async fn submit(&self, envelope: Envelope) -> Result<Handled, BusError> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Command::Submit { envelope, reply })
            .await
            .map_err(|_| BusError::MailboxClosed)?;
        rx.await.map_err(|_| BusError::ReplyDropped)
    }

    /// Run a read-only query at `at`
    pub async fn query(&self, at: DateTime<Utc>, query: Query) -> Result<QueryResponse, BusError> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Command::Query { query, at, reply })
            .await
            .map_err(|_| BusError::MailboxClosed)?;
        rx.await.map_err(|_| BusError::ReplyDropped)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> Result<VaultState, BusError> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| BusError::MailboxClosed)?;
        rx.await.map_err(|_| BusError::ReplyDropped)
    }
}

/// Owner of the vault state
pub struct VaultActor {
    state: VaultState,
    config: VaultConfig,
    mailbox: mpsc::Receiver<Command>,
}

impl VaultActor {
    /// Spawn the actor task.
    ///
    /// The task ends when every handle is dropped and returns the final state.
    pub fn spawn(state: VaultState, config: VaultConfig) -> (VaultHandle, JoinHandle<VaultState>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);

        let actor = VaultActor {
            state,
            config,
            mailbox: rx,
        };
        let task = tokio::spawn(actor.run());

        (VaultHandle { mailbox: tx }, task)
    }

    async fn run(mut self) -> VaultState {
        info!("vault actor started");

        while let Some(command) = self.mailbox.recv().await {
            match command {
                Command::Submit { envelope, reply } => {
                    let handled = handle(&mut self.state, &self.config, &envelope);
                    let _ = reply.send(handled);
                }
                Command::Query { query: q, at, reply } => {
                    let _ = reply.send(query(&self.state, at, &q));
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.state.clone());
                }
            }
        }

        info!("vault actor stopped");
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tranchevault_core::{Amount, TrancheId};
    use tranchevault_vault::{Operation, Outbound, Reply};

    fn spawn() -> (VaultHandle, JoinHandle<VaultState>) {
        let config = VaultConfig::default();
        let state = VaultState::new(&config).unwrap();
        VaultActor::spawn(state, config)
    }

    #[tokio::test]
    async fn test_submit_and_query() {
        let (handle, task) = spawn();
        let now = Utc::now();

        let handled = handle
            .submit(Envelope::new(
                "alice",
                now,
                Operation::Deposit {
                    tranche: TrancheId::Mezz,
                    amount: Amount::from_units(10),
                },
            ))
            .await
            .unwrap();
        assert!(matches!(handled.result, Ok(Reply::Deposited { .. })));

        let capital = handle.query(now, Query::TotalCapital).await.unwrap();
        assert_eq!(capital, QueryResponse::Amount(Amount::from_units(10)));

        drop(handle);
        let state = task.await.unwrap();
        assert_eq!(state.total_capital(), Amount::from_units(10));
    }

    #[tokio::test]
    async fn test_outbound_returned_with_result() {
        let (handle, _task) = spawn();

        let handled = handle
            .submit(Envelope::new("admin", Utc::now(), Operation::Pause))
            .await
            .unwrap();

        assert!(matches!(
            handled.outbound.as_slice(),
            [Outbound::PauseChanged { paused: true, .. }]
        ));
    }
}
