//! Application context - wires everything together

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tranchevault_bus::{BusError, Collaborator, VaultActor, VaultHandle};
use tranchevault_events::{EventError, EventReader, EventStore};
use tranchevault_vault::{
    handle, Envelope, Outbound, Query, QueryResponse, Reply, VaultConfig, VaultError, VaultState,
};

/// Application context - the running vault plus its journal
pub struct AppContext {
    pub config: VaultConfig,
    vault: VaultHandle,
    task: JoinHandle<VaultState>,
    event_store: EventStore,
    journal_path: PathBuf,
    collaborators: Vec<Arc<dyn Collaborator>>,
}

/// An accepted operation
#[derive(Debug)]
pub struct Committed {
    pub reply: Reply,
    pub outbound: Vec<Outbound>,
    /// Journal position; `None` for read-only operations
    pub sequence: Option<u64>,
    /// Envelopes collaborators sent in response, in commit order
    pub follow_ups: Vec<Committed>,
}

impl AppContext {
    /// Open the data directory and rebuild state by replaying the journal
    pub async fn new(data_path: impl AsRef<Path>, config: VaultConfig) -> Result<Self, anyhow::Error> {
        let journal_path = data_path.as_ref().join("journal");
        std::fs::create_dir_all(&journal_path)?;

        let records = EventReader::from_directory(&journal_path)?.read_all()?;
        let mut state = VaultState::new(&config)?;
        for record in &records {
            if let Err(e) = handle(&mut state, &config, &record.envelope).result {
                anyhow::bail!(
                    "replay diverged at sequence {} ({}): {}",
                    record.sequence,
                    record.envelope.op.name(),
                    e
                );
            }
        }
        info!(records = records.len(), "journal replayed");

        let event_store = EventStore::open(&journal_path)?;
        let (vault, task) = VaultActor::spawn(state, config.clone());

        Ok(Self {
            config,
            vault,
            task,
            event_store,
            journal_path,
            collaborators: Vec::new(),
        })
    }

    /// Hand outbound messages addressed to `collaborator` over to it
    pub fn register(&mut self, collaborator: Arc<dyn Collaborator>) {
        info!(collaborator = collaborator.name(), address = %collaborator.address(), "collaborator registered");
        self.collaborators.push(collaborator);
    }

    /// Submit an envelope; accepted mutations are appended to the journal.
    ///
    /// Outbound messages for registered collaborators are relayed to them,
    /// and their answers are committed the same way, journal included.
    /// A rejected answer is logged and does not fail the original commit.
    ///
    /// Flow: Dispatch → Append → Relay
    pub async fn commit(&mut self, envelope: Envelope) -> Result<Committed, CommitError> {
        let mut committed = self.commit_one(envelope.clone()).await?;
        if self.collaborators.is_empty() {
            return Ok(committed);
        }

        let collaborators = self.collaborators.clone();
        let mut queue: VecDeque<(DateTime<Utc>, Outbound)> = committed
            .outbound
            .iter()
            .map(|message| (envelope.at, message.clone()))
            .collect();

        while let Some((at, message)) = queue.pop_front() {
            for collaborator in collaborators.iter().filter(|c| c.address() == message.recipient()) {
                let answers = match collaborator.on_message(at, &message).await {
                    Ok(answers) => answers,
                    Err(e) => {
                        warn!(collaborator = collaborator.name(), error = %e, "collaborator failed");
                        continue;
                    }
                };
                for answer in answers {
                    let answered_at = answer.at;
                    match self.commit_one(answer).await {
                        Ok(follow_up) => {
                            queue.extend(follow_up.outbound.iter().map(|m| (answered_at, m.clone())));
                            committed.follow_ups.push(follow_up);
                        }
                        Err(CommitError::Vault(e)) => {
                            warn!(collaborator = collaborator.name(), code = e.code(), "collaborator answer rejected");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(committed)
    }

    async fn commit_one(&mut self, envelope: Envelope) -> Result<Committed, CommitError> {
        let handled = self.vault.submit(envelope.clone()).await?;
        let reply = handled.result?;

        let sequence = if envelope.op.is_mutating() {
            Some(self.event_store.append(&envelope)?.sequence)
        } else {
            None
        };

        Ok(Committed {
            reply,
            outbound: handled.outbound,
            sequence,
            follow_ups: Vec::new(),
        })
    }

    pub async fn query(&self, at: DateTime<Utc>, query: Query) -> Result<QueryResponse, BusError> {
        self.vault.query(at, query).await
    }

    /// Handle for collaborators
    pub fn vault(&self) -> &VaultHandle {
        &self.vault
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn last_sequence(&self) -> u64 {
        self.event_store.last_sequence()
    }

    /// Stop the actor and return the final state
    pub async fn shutdown(self) -> Result<VaultState, anyhow::Error> {
        let Self { vault, task, .. } = self;
        drop(vault);
        Ok(task.await?)
    }
}

/// Errors during commit
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("Vault rejected operation [{code}]: {inner}", code = .0.code(), inner = .0)]
    Vault(#[from] VaultError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Journal error: {0}")]
    Event(#[from] EventError),
}
