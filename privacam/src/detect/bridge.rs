//! Callback-to-future bridge for engines that report through listeners.
//!
//! A request owns one result slot. The engine gets [`Completion`] handles
//! that can fill it at most once; the awaiting side holds a [`PendingGuard`]
//! that empties the slot and cancels the engine request if the future is
//! dropped before a result arrives. Only completions keep the slot alive, so
//! once the engine has dropped every handle the waiter resolves as
//! [`BridgeError::Dropped`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;

type Slot<T, E> = Arc<Mutex<Option<oneshot::Sender<Result<T, E>>>>>;

/// Handle to an in-flight engine request
pub trait PendingRequest: Send {
    /// Release whatever the engine holds for this request
    fn cancel(&mut self);
}

/// Nothing to release
impl PendingRequest for () {
    fn cancel(&mut self) {}
}

/// Result delivery handle given to the engine.
///
/// Clones share the same slot, so a success listener and a failure listener
/// can each hold one; whichever fires first wins.
pub struct Completion<T, E> {
    slot: Slot<T, E>,
}

impl<T, E> Clone for Completion<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> Completion<T, E> {
    /// Deliver a success. Returns `false` if the request was already
    /// resolved or abandoned.
    pub fn succeed(&self, value: T) -> bool {
        self.deliver(Ok(value))
    }

    /// Deliver a failure. Returns `false` if the request was already
    /// resolved or abandoned.
    pub fn fail(&self, error: E) -> bool {
        self.deliver(Err(error))
    }

    /// Whether a result can still be delivered
    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .map_or(false, |tx| !tx.is_closed())
    }

    fn deliver(&self, result: Result<T, E>) -> bool {
        let sender = self.slot.lock().take();
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

/// Waiter side of a request
pub struct PendingGuard<T, E> {
    slot: Weak<Mutex<Option<oneshot::Sender<Result<T, E>>>>>,
    request: Option<Box<dyn PendingRequest>>,
}

impl<T, E> PendingGuard<T, E> {
    /// Result arrived; nothing left to cancel
    fn disarm(&mut self) {
        self.request = None;
    }
}

impl<T, E> Drop for PendingGuard<T, E> {
    fn drop(&mut self) {
        if let Some(mut request) = self.request.take() {
            if let Some(slot) = self.slot.upgrade() {
                slot.lock().take();
            }
            request.cancel();
            log::debug!("Abandoned pending detection request");
        }
    }
}

/// Why a bridged request produced no value
#[derive(Debug, PartialEq, Eq)]
pub enum BridgeError<E> {
    /// The engine reported a failure
    Engine(E),
    /// Every completion handle was dropped without a result
    Dropped,
}

/// Submit a request through `start` and wait for its single result.
///
/// `start` receives the completion handle and returns the request handle
/// used for cancellation. Dropping the returned future cancels the request
/// and turns any later delivery into a no-op.
pub async fn await_completion<T, E, F>(start: F) -> Result<T, BridgeError<E>>
where
    F: FnOnce(Completion<T, E>) -> Box<dyn PendingRequest>,
{
    let (tx, rx) = oneshot::channel();
    let slot: Slot<T, E> = Arc::new(Mutex::new(Some(tx)));

    let weak = Arc::downgrade(&slot);

    let request = start(Completion { slot });
    let mut guard = PendingGuard {
        slot: weak,
        request: Some(request),
    };

    let outcome = rx.await;
    guard.disarm();

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BridgeError::Engine(e)),
        Err(_) => Err(BridgeError::Dropped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FlagOnCancel(Arc<AtomicBool>);

    impl PendingRequest for FlagOnCancel {
        fn cancel(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let result: Result<u32, BridgeError<String>> = await_completion(|done| {
            assert!(done.succeed(7));
            Box::new(())
        })
        .await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_only_first_delivery_counts() {
        let second = Arc::new(Mutex::new(None));
        let second_in = Arc::clone(&second);

        let result: Result<u32, BridgeError<String>> = await_completion(move |done| {
            let failure = done.clone();
            assert!(done.succeed(1));
            *second_in.lock() = Some(failure.fail("late".to_string()));
            Box::new(())
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(*second.lock(), Some(false));
    }

    #[tokio::test]
    async fn test_failure_from_other_thread() {
        let result: Result<u32, BridgeError<String>> = await_completion(|done| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                done.fail("boom".to_string());
            });
            Box::new(())
        })
        .await;

        assert_eq!(result, Err(BridgeError::Engine("boom".to_string())));
    }

    #[tokio::test]
    async fn test_dropped_completion_resolves() {
        let result: Result<u32, BridgeError<String>> = await_completion(|done| {
            drop(done);
            Box::new(())
        })
        .await;

        assert_eq!(result, Err(BridgeError::Dropped));
    }

    #[tokio::test]
    async fn test_completion_dropped_on_other_thread() {
        let result: Result<u32, BridgeError<String>> = await_completion(|done| {
            let failure = done.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                drop(done);
                drop(failure);
            });
            Box::new(())
        })
        .await;

        assert_eq!(result, Err(BridgeError::Dropped));
    }

    #[tokio::test]
    async fn test_cancel_blocks_late_delivery() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let stash: Arc<Mutex<Option<Completion<u32, String>>>> = Arc::new(Mutex::new(None));

        let flag = Arc::clone(&cancelled);
        let stash_in = Arc::clone(&stash);
        let task = tokio::spawn(async move {
            await_completion(move |done| {
                *stash_in.lock() = Some(done);
                Box::new(FlagOnCancel(flag))
            })
            .await
        });

        while stash.lock().is_none() {
            tokio::task::yield_now().await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(cancelled.load(Ordering::SeqCst));
        let done = stash.lock().take().unwrap();
        assert!(!done.is_open());
        assert!(!done.succeed(3));
    }
}
