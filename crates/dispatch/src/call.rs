use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::TaskError;

/// Result of a call-and-await dispatch.
///
/// Completes exactly once, with the supplier's value or its failure. It may
/// complete on a scheduler thread, not the one that created it.
#[must_use = "the result is only observable through the future"]
#[derive(Debug)]
pub struct CallFuture<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> CallFuture<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Result<T, TaskError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Block the current thread until the result arrives.
    ///
    /// Do not call this from the thread that has to run the supplier.
    pub fn wait(self) -> Result<T, TaskError> {
        futures::executor::block_on(self)
    }

    /// The result, if it has already arrived.
    pub fn try_take(&mut self) -> Option<Result<T, TaskError>> {
        match self.rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(TaskError::Abandoned)),
        }
    }
}

impl<T> Future for CallFuture<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Abandoned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_value() {
        let (tx, fut) = CallFuture::channel();
        tx.send(Ok(42)).unwrap();
        assert_eq!(fut.wait().unwrap(), 42);
    }

    #[test]
    fn dropped_sender_is_abandoned() {
        let (tx, fut) = CallFuture::<u8>::channel();
        drop(tx);
        assert!(matches!(fut.wait(), Err(TaskError::Abandoned)));
    }

    #[test]
    fn try_take_before_and_after() {
        let (tx, mut fut) = CallFuture::channel();
        assert!(fut.try_take().is_none());
        tx.send(Ok("done")).unwrap();
        assert_eq!(fut.try_take().unwrap().unwrap(), "done");
    }
}
