//! # First-exit slot.
//!
//! Every started runner reports its termination to a shared [`ExitSlot`]. Only
//! the first report is delivered; later ones are discarded without blocking, so
//! a runner finishing during shutdown never waits on anybody.
//!
//! ```text
//! runner A ─ offer() ──► [slot] ──► ExitReceiver (wait phase)
//! runner B ─ offer() ──► dropped
//! ```

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::error::{RunnerError, ServiceError};

/// Termination report of one runner.
#[derive(Debug)]
pub(crate) struct RunnerExit {
    /// Name of the runner that returned.
    pub runner: String,
    /// What its `start` returned.
    pub result: Result<(), RunnerError>,
}

impl RunnerExit {
    /// Converts the report into the result of the run: clean exit is `Ok(())`.
    pub fn into_result(self) -> Result<(), ServiceError> {
        self.result.map_err(|source| ServiceError::Runner {
            runner: self.runner,
            source,
        })
    }
}

/// Single-slot, first-writer-wins sender side.
pub(crate) struct ExitSlot {
    tx: Mutex<Option<oneshot::Sender<RunnerExit>>>,
}

/// Receiving side of an [`ExitSlot`].
pub(crate) type ExitReceiver = oneshot::Receiver<RunnerExit>;

impl ExitSlot {
    /// Creates an empty slot and its receiver.
    pub fn new() -> (Self, ExitReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Offers a report; returns `true` if it was the first one and got delivered.
    pub fn offer(&self, exit: RunnerExit) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            Some(tx) => tx.send(exit).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(name: &str, result: Result<(), RunnerError>) -> RunnerExit {
        RunnerExit {
            runner: name.to_string(),
            result,
        }
    }

    #[tokio::test]
    async fn test_first_offer_wins() {
        let (slot, rx) = ExitSlot::new();
        assert!(slot.offer(exit("a", Err(RunnerError::fail("first")))));
        assert!(!slot.offer(exit("b", Ok(()))));
        assert!(!slot.offer(exit("c", Err(RunnerError::fail("third")))));

        let got = rx.await.unwrap();
        assert_eq!(got.runner, "a");
        match got.into_result() {
            Err(ServiceError::Runner { runner, .. }) => assert_eq!(runner, "a"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_offer_without_receiver_does_not_block() {
        let (slot, rx) = ExitSlot::new();
        drop(rx);
        assert!(!slot.offer(exit("late", Ok(()))));
    }

    #[test]
    fn test_clean_exit_is_ok() {
        assert!(exit("done", Ok(())).into_result().is_ok());
    }
}
