// Copyright © 2025 Tributary

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future;
use futures::stream::Stream;

/// Pull cursor over a sync sequence with an explicit end-of-sequence test.
///
/// A single-slot buffer holds the value fetched by `has_next` until `get_next`
/// takes it.
pub struct Lookahead<I: Iterator> {
    iter: I,
    slot: Option<I::Item>,
}

impl<I: Iterator> Lookahead<I> {
    pub fn new(source: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: source.into_iter(),
            slot: None,
        }
    }

    /// Checks whether another value is available, fetching it into the slot
    /// if the slot is empty.
    pub fn has_next(&mut self) -> bool {
        if self.slot.is_none() {
            self.slot = self.iter.next();
        }
        self.slot.is_some()
    }

    pub fn peek(&mut self) -> Option<&I::Item> {
        if self.slot.is_none() {
            self.slot = self.iter.next();
        }
        self.slot.as_ref()
    }

    /// Takes the buffered value. Valid only after `has_next` returned true.
    ///
    /// # Panics
    /// Panics if no value was fetched beforehand.
    pub fn get_next(&mut self) -> I::Item {
        self.slot
            .take()
            .expect("get_next called without a preceding has_next")
    }
}

/// Pull cursor over a stream, fused after the stream ends.
pub struct AsyncLookahead<S: Stream> {
    stream: Pin<Box<S>>,
    slot: Option<S::Item>,
    done: bool,
}

impl<S: Stream> AsyncLookahead<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Box::pin(stream),
            slot: None,
            done: false,
        }
    }

    /// Poll-level `has_next` for callers driving their own state machine.
    pub fn poll_has_next(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        if self.slot.is_some() {
            return Poll::Ready(true);
        }
        if self.done {
            return Poll::Ready(false);
        }
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.slot = Some(item);
                Poll::Ready(true)
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(false)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    pub async fn has_next(&mut self) -> bool {
        future::poll_fn(|cx| self.poll_has_next(cx)).await
    }

    /// Takes the buffered value. Valid only after `has_next` returned true.
    ///
    /// # Panics
    /// Panics if no value was fetched beforehand.
    pub fn get_next(&mut self) -> S::Item {
        self.slot
            .take()
            .expect("get_next called without a preceding has_next")
    }
}
