//! Continuations for realtime requests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::{RtError, RtErrorCode};

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type ErrorFn = Box<dyn FnOnce(RtError) + Send>;

/// Optional success and error continuations for one request.
///
/// ```rust
/// use nakama_rs::rt::{Channel, RtCallback};
///
/// let callback = RtCallback::<Channel>::none()
///     .on_success(|channel| println!("joined {}", channel.id))
///     .on_error(|err| eprintln!("join failed: {err}"));
/// ```
pub struct RtCallback<T> {
    success: Option<SuccessFn<T>>,
    error: Option<ErrorFn>,
}

impl<T: Send + 'static> RtCallback<T> {
    /// No continuations; server errors fall back to the listener.
    pub fn none() -> Self {
        Self {
            success: None,
            error: None,
        }
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.success = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RtError) + Send + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    /// Continuations that feed an awaitable receiver.
    pub fn oneshot() -> (Self, RtReceiver<T>) {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_err = tx.clone();

        let callback = Self::none()
            .on_success(move |value| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(Ok(value));
                }
            })
            .on_error(move |err| {
                if let Some(tx) = tx_err.lock().take() {
                    let _ = tx.send(Err(err));
                }
            });

        (callback, RtReceiver { rx })
    }

    pub(crate) fn into_parts(self) -> (Option<SuccessFn<T>>, Option<ErrorFn>) {
        (self.success, self.error)
    }
}

impl<T: Send + 'static> Default for RtCallback<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Awaitable result of a realtime request.
///
/// Resolves to an error if the request is dropped without a reply.
pub struct RtReceiver<T> {
    rx: oneshot::Receiver<Result<T, RtError>>,
}

fn dropped() -> RtError {
    RtError::new(RtErrorCode::Unknown, "request dropped without a reply")
}

pub(crate) fn channel<T>() -> (oneshot::Sender<Result<T, RtError>>, RtReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, RtReceiver { rx })
}

impl<T> RtReceiver<T> {
    /// A receiver that is already resolved.
    pub fn ready(result: Result<T, RtError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Result if it has arrived, without waiting.
    pub fn try_result(&mut self) -> Option<Result<T, RtError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(dropped())),
        }
    }
}

impl<T> Future for RtReceiver<T> {
    type Output = Result<T, RtError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(dropped())),
            Poll::Pending => Poll::Pending,
        }
    }
}
