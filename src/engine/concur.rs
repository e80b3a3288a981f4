// Copyright © 2025 Tributary

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::future::{self, BoxFuture};
use futures::stream::{BoxStream, FuturesUnordered, Stream};
use futures::{FutureExt, StreamExt};

use super::error::{DynError, DynResult};

/// Cold push-based value producer.
///
/// Nothing happens until [`ConcurStream::run`] is invoked with a per-value
/// handler; the returned completion resolves once production ended and every
/// handler invocation settled, or fails with the first observed failure.
/// Started handler invocations are never aborted, even after a failure.
pub trait ConcurStream: Send + 'static {
    type Item: Send + 'static;

    fn run<H>(self, handler: H) -> BoxFuture<'static, DynResult<()>>
    where
        H: FnMut(Self::Item) -> BoxFuture<'static, DynResult<()>> + Send + 'static;

    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> U + Send + 'static,
        U: Send + 'static,
    {
        Map { inner: self, f }
    }

    fn filter<P>(self, pred: P) -> Filter<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool + Send + 'static,
    {
        Filter { inner: self, pred }
    }

    fn then<U, F, Fut>(self, f: F) -> Then<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Fut + Send + 'static,
        Fut: Future<Output = DynResult<U>> + Send + 'static,
        U: Send + 'static,
    {
        Then { inner: self, f }
    }

    /// Bridges the push protocol into an ordinary pull stream. Delivered
    /// values drain before any completion failure is surfaced, and the
    /// failure is surfaced at most once.
    fn into_stream(self) -> IntoStream<Self::Item>
    where
        Self: Sized,
    {
        IntoStream::new(self)
    }
}

/// Sync sequence exposed through the push protocol. Running it invokes the
/// handler for every value without awaiting in between, then drives all
/// handler invocations to settlement.
pub struct IterConcur<T> {
    items: Box<dyn Iterator<Item = DynResult<T>> + Send>,
}

impl<T: Send + 'static> IterConcur<T> {
    pub fn new<S>(source: S) -> Self
    where
        S: IntoIterator<Item = T>,
        S::IntoIter: Send + 'static,
    {
        Self {
            items: Box::new(source.into_iter().map(Ok)),
        }
    }

    pub fn fallible<S>(source: S) -> Self
    where
        S: IntoIterator<Item = DynResult<T>>,
        S::IntoIter: Send + 'static,
    {
        Self {
            items: Box::new(source.into_iter()),
        }
    }
}

impl<T: Send + 'static> ConcurStream for IterConcur<T> {
    type Item = T;

    fn run<H>(self, mut handler: H) -> BoxFuture<'static, DynResult<()>>
    where
        H: FnMut(T) -> BoxFuture<'static, DynResult<()>> + Send + 'static,
    {
        async move {
            let pending = FuturesUnordered::new();
            let mut failure: Option<DynError> = None;
            for item in self.items {
                match item {
                    Ok(value) => pending.push(handler(value)),
                    Err(error) => {
                        // production stops here, started invocations still run
                        failure = Some(error);
                        break;
                    }
                }
            }
            let mut pending = pending;
            while let Some(settled) = pending.next().await {
                if let Err(error) = settled {
                    failure.get_or_insert(error);
                }
            }
            match failure {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
        .boxed()
    }
}

/// Sequential-async sequence exposed through the push protocol. Production is
/// pulled as fast as the stream permits and never waits for handler
/// completion.
pub struct StreamConcur<T> {
    items: BoxStream<'static, DynResult<T>>,
}

impl<T: Send + 'static> StreamConcur<T> {
    pub fn new<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            items: source.map(Ok).boxed(),
        }
    }

    pub fn fallible<S>(source: S) -> Self
    where
        S: Stream<Item = DynResult<T>> + Send + 'static,
    {
        Self {
            items: source.boxed(),
        }
    }
}

impl<T: Send + 'static> ConcurStream for StreamConcur<T> {
    type Item = T;

    fn run<H>(mut self, mut handler: H) -> BoxFuture<'static, DynResult<()>>
    where
        H: FnMut(T) -> BoxFuture<'static, DynResult<()>> + Send + 'static,
    {
        async move {
            let mut pending = FuturesUnordered::new();
            let mut failure: Option<DynError> = None;
            let mut exhausted = false;
            future::poll_fn(|cx| loop {
                let mut progress = false;
                loop {
                    match pending.poll_next_unpin(cx) {
                        Poll::Ready(Some(Ok(()))) => progress = true,
                        Poll::Ready(Some(Err(error))) => {
                            failure.get_or_insert(error);
                            progress = true;
                        }
                        Poll::Ready(None) | Poll::Pending => break,
                    }
                }
                while failure.is_none() && !exhausted {
                    match self.items.poll_next_unpin(cx) {
                        Poll::Ready(Some(Ok(value))) => {
                            pending.push(handler(value));
                            progress = true;
                        }
                        Poll::Ready(Some(Err(error))) => {
                            failure = Some(error);
                            progress = true;
                        }
                        Poll::Ready(None) => {
                            exhausted = true;
                            progress = true;
                        }
                        Poll::Pending => break,
                    }
                }
                if (exhausted || failure.is_some()) && pending.is_empty() {
                    return Poll::Ready(());
                }
                if !progress {
                    return Poll::Pending;
                }
            })
            .await;
            match failure {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
        .boxed()
    }
}

pub struct Map<C, F> {
    inner: C,
    f: F,
}

impl<C, F, U> ConcurStream for Map<C, F>
where
    C: ConcurStream,
    F: FnMut(C::Item) -> U + Send + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn run<H>(self, mut handler: H) -> BoxFuture<'static, DynResult<()>>
    where
        H: FnMut(U) -> BoxFuture<'static, DynResult<()>> + Send + 'static,
    {
        let mut f = self.f;
        self.inner.run(move |value| handler(f(value)))
    }
}

pub struct Filter<C, P> {
    inner: C,
    pred: P,
}

impl<C, P> ConcurStream for Filter<C, P>
where
    C: ConcurStream,
    P: FnMut(&C::Item) -> bool + Send + 'static,
{
    type Item = C::Item;

    fn run<H>(self, mut handler: H) -> BoxFuture<'static, DynResult<()>>
    where
        H: FnMut(C::Item) -> BoxFuture<'static, DynResult<()>> + Send + 'static,
    {
        let mut pred = self.pred;
        self.inner.run(move |value| {
            if pred(&value) {
                handler(value)
            } else {
                future::ready(Ok(())).boxed()
            }
        })
    }
}

pub struct Then<C, F> {
    inner: C,
    f: F,
}

impl<C, F, Fut, U> ConcurStream for Then<C, F>
where
    C: ConcurStream,
    F: FnMut(C::Item) -> Fut + Send + 'static,
    Fut: Future<Output = DynResult<U>> + Send + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn run<H>(self, handler: H) -> BoxFuture<'static, DynResult<()>>
    where
        H: FnMut(U) -> BoxFuture<'static, DynResult<()>> + Send + 'static,
    {
        let mut f = self.f;
        // the transform future has to hand its result back to the shared
        // handler once it settles
        let handler = Arc::new(Mutex::new(handler));
        self.inner.run(move |value| {
            let handler = Arc::clone(&handler);
            let transformed = f(value);
            async move {
                let value = transformed.await?;
                let invocation = (*handler.lock().unwrap())(value);
                invocation.await
            }
            .boxed()
        })
    }
}

/// Pull-stream view of a push producer, fed through an unbounded channel so
/// the producer is never throttled by the consumer.
pub struct IntoStream<T> {
    values: UnboundedReceiver<T>,
    completion: Option<BoxFuture<'static, DynResult<()>>>,
    failure: Option<DynError>,
}

impl<T: Send + 'static> IntoStream<T> {
    fn new(source: impl ConcurStream<Item = T>) -> Self {
        let (sender, values) = mpsc::unbounded();
        let completion = source.run(move |value| {
            // receiver may be gone when the consumer stopped early
            let _ = sender.unbounded_send(value);
            future::ready(Ok(())).boxed()
        });
        Self {
            values,
            completion: Some(completion),
            failure: None,
        }
    }
}

impl<T: Send + 'static> Stream for IntoStream<T> {
    type Item = DynResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match this.values.poll_next_unpin(cx) {
                Poll::Ready(Some(value)) => return Poll::Ready(Some(Ok(value))),
                Poll::Ready(None) => {
                    return match this.failure.take() {
                        Some(error) => Poll::Ready(Some(Err(error))),
                        None => Poll::Ready(None),
                    };
                }
                Poll::Pending => {}
            }
            let Some(completion) = this.completion.as_mut() else {
                return Poll::Pending;
            };
            match completion.poll_unpin(cx) {
                Poll::Ready(outcome) => {
                    // the producer-side sender is dropped with the completion
                    // future, closing the channel after buffered values
                    this.completion = None;
                    if let Err(error) = outcome {
                        this.failure = Some(error);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
