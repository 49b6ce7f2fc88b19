use crate::error::Result;
use crate::future::Future;
use parking_lot::Mutex;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Awaitable view of a [`Future`], created by [`Future::into_async`] or
/// `.await`.
pub struct JoinFuture<T> {
    future: Future<T>,
    waker: Arc<Mutex<Option<Waker>>>,
    registered: bool,
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    pub fn into_async(self) -> JoinFuture<T> {
        JoinFuture {
            future: self,
            waker: Arc::new(Mutex::new(None)),
            registered: false,
        }
    }
}

impl<T> IntoFuture for Future<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T>;
    type IntoFuture = JoinFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.into_async()
    }
}

impl<T> std::future::Future for JoinFuture<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.future.try_get() {
            return Poll::Ready(outcome);
        }

        *self.waker.lock() = Some(cx.waker().clone());

        if !self.registered {
            self.registered = true;
            let slot = self.waker.clone();
            self.future.on_settle(move |_| {
                if let Some(waker) = slot.lock().take() {
                    waker.wake();
                }
            });
        }

        // settlement may have raced the waker store
        match self.future.try_get() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for JoinFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinFuture")
            .field("future", &self.future)
            .field("registered", &self.registered)
            .finish()
    }
}
