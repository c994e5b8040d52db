//! Persist-always wrapper around batch operations

use log::{error, info};

use crate::error::Result;
use crate::model::BatchState;
use crate::store::StateStore;

/// Runs an operation against a loaded run and saves the run afterwards,
/// whatever the operation returned
pub struct BatchRunner<'a> {
    store: &'a StateStore,
}

impl<'a> BatchRunner<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Invoke `op` on `state`, then save `state`
    ///
    /// Mutations made before an error (including `UserDeclined`) are
    /// persisted. If both the operation and the save fail, the operation's
    /// error is returned and the save error is logged.
    pub async fn run<T, F>(&self, state: &mut BatchState, op: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut BatchState) -> Result<T>,
    {
        let outcome = op(&mut *state).await;
        self.finish(state, outcome).await
    }

    /// Save `state` and hand back `outcome`
    pub async fn finish<T>(&self, state: &BatchState, outcome: Result<T>) -> Result<T> {
        let saved = self.store.save(state).await;

        match (outcome, saved) {
            (Ok(value), Ok(())) => {
                info!("Persisted run {}", state.name);
                Ok(value)
            }
            (Ok(_), Err(save_err)) => Err(save_err),
            (Err(op_err), Ok(())) => {
                info!("Persisted run {} after error: {}", state.name, op_err);
                Err(op_err)
            }
            (Err(op_err), Err(save_err)) => {
                error!("Failed to persist run {}: {}", state.name, save_err);
                Err(op_err)
            }
        }
    }
}
