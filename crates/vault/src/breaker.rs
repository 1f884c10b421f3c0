//! Circuit breaker - rolling-window loss cap
//!
//! `check` is pure: it projects the window after a proposed loss and
//! either returns the projection or rejects. Only `commit` mutates, so a
//! rejected operation leaves the window exactly as it was.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tranchevault_core::Amount;

use crate::error::VaultError;

/// Loss accumulator over a rolling time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    window_start: Option<DateTime<Utc>>,
    window_losses: Amount,
    window_duration_secs: u64,
    loss_cap: Amount,
}

/// Window state after an accepted loss, ready to commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerProjection {
    pub window_start: DateTime<Utc>,
    pub window_losses: Amount,
}

impl CircuitBreaker {
    pub fn new(window_duration_secs: u64, loss_cap: Amount) -> Self {
        Self {
            window_start: None,
            window_losses: Amount::ZERO,
            window_duration_secs,
            loss_cap,
        }
    }

    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_start
    }

    pub fn window_losses(&self) -> Amount {
        self.window_losses
    }

    pub fn loss_cap(&self) -> Amount {
        self.loss_cap
    }

    fn window_duration(&self) -> Duration {
        i64::try_from(self.window_duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Window start and losses as they stand at `now`
    fn current_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, Amount) {
        match self.window_start {
            Some(start) if now - start <= self.window_duration() => (start, self.window_losses),
            _ => (now, Amount::ZERO),
        }
    }

    /// Loss still absorbable in the window at `now`
    pub fn remaining_capacity(&self, now: DateTime<Utc>) -> Amount {
        let (_, losses) = self.current_window(now);
        self.loss_cap.saturating_sub(&losses)
    }

    /// Project a proposed loss onto the window
    pub fn check(&self, now: DateTime<Utc>, proposed: Amount) -> Result<BreakerProjection, VaultError> {
        let (window_start, losses) = self.current_window(now);
        let projected = losses
            .checked_add(&proposed)
            .ok_or(VaultError::Overflow("circuit breaker window"))?;

        if projected > self.loss_cap {
            warn!(
                %projected,
                cap = %self.loss_cap,
                "circuit breaker tripped"
            );
            return Err(VaultError::CircuitBreakerTriggered {
                projected,
                cap: self.loss_cap,
            });
        }

        Ok(BreakerProjection {
            window_start,
            window_losses: projected,
        })
    }

    pub(crate) fn commit(&mut self, projection: BreakerProjection) {
        self.window_start = Some(projection.window_start);
        self.window_losses = projection.window_losses;
    }
}
