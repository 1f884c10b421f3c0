//! Reentrancy guard as a scoped region
//!
//! `GuardedState::acquire` sets the flag and hands out the state; dropping
//! the guard clears it. The flag is therefore released on every exit path
//! of a handler, including early `?` returns and unwinding.

use std::ops::{Deref, DerefMut};
use tracing::warn;

use crate::error::VaultError;
use crate::state::VaultState;

/// Exclusive, guard-holding view of the vault state
pub struct GuardedState<'a> {
    state: &'a mut VaultState,
}

impl<'a> GuardedState<'a> {
    /// Enter the guarded region.
    ///
    /// Fails with `ReentrancyDetected` if the flag is already held; the
    /// holder's flag is left untouched.
    pub fn acquire(state: &'a mut VaultState) -> Result<Self, VaultError> {
        if state.reentrancy_guard {
            warn!("rejected overlapping mutating operation");
            return Err(VaultError::ReentrancyDetected);
        }
        state.reentrancy_guard = true;
        Ok(Self { state })
    }
}

impl Deref for GuardedState<'_> {
    type Target = VaultState;

    fn deref(&self) -> &VaultState {
        self.state
    }
}

impl DerefMut for GuardedState<'_> {
    fn deref_mut(&mut self) -> &mut VaultState {
        self.state
    }
}

impl Drop for GuardedState<'_> {
    fn drop(&mut self) {
        self.state.reentrancy_guard = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;

    fn state() -> VaultState {
        VaultState::new(&VaultConfig::default()).unwrap()
    }

    #[test]
    fn test_flag_held_inside_region() {
        let mut state = state();
        {
            let guarded = GuardedState::acquire(&mut state).unwrap();
            assert!(guarded.reentrancy_guard());
        }
        assert!(!state.reentrancy_guard());
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing(state: &mut VaultState) -> Result<(), VaultError> {
            let _guarded = GuardedState::acquire(state)?;
            Err(VaultError::Paused)
        }

        let mut state = state();
        assert_eq!(failing(&mut state), Err(VaultError::Paused));
        assert!(!state.reentrancy_guard());
    }

    #[test]
    fn test_released_on_panic() {
        let mut state = state();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guarded = GuardedState::acquire(&mut state).unwrap();
            panic!("engine bug");
        }));
        assert!(result.is_err());
        assert!(!state.reentrancy_guard());
    }

    #[test]
    fn test_second_entry_rejected_and_flag_kept() {
        let mut state = state();
        state.reentrancy_guard = true;
        assert!(matches!(
            GuardedState::acquire(&mut state),
            Err(VaultError::ReentrancyDetected)
        ));
        assert!(state.reentrancy_guard());
    }
}
