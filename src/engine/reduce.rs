// Copyright © 2025 Tributary

use std::collections::VecDeque;
use std::task::Poll;

use futures::future::{self, BoxFuture};
use futures::stream::{FuturesUnordered, Stream};
use futures::{FutureExt, StreamExt};
use log::debug;
use smallvec::SmallVec;

use super::concur::ConcurStream;
use super::error::{DynResult, Error, Result};
use super::iterator::{AsyncLookahead, Lookahead};
use super::reducer::{AsyncReducer, Reducer};

/// Reduces a synchronous source. Never suspends; at most one accumulator is
/// alive at any time.
///
/// Shapes without an upfront accumulator seed it from the first value and
/// report an empty source through their `Option` output; full shapes fold
/// every value into `create()` and an empty source yields `finish(create())`.
pub fn reduce<T, R>(reducer: &R, source: impl IntoIterator<Item = T>) -> Result<R::Output>
where
    R: Reducer<T>,
{
    try_reduce(reducer, source.into_iter().map(Ok))
}

/// Reduces a synchronous source of fallible items. The first failed item
/// fails the whole reduction.
pub fn try_reduce<T, R>(
    reducer: &R,
    source: impl IntoIterator<Item = DynResult<T>>,
) -> Result<R::Output>
where
    R: Reducer<T>,
{
    let mut cursor = Lookahead::new(source);
    let mut acc = match reducer.create() {
        Some(created) => Some(created.map_err(Error::Reduce)?),
        None => None,
    };
    while cursor.has_next() {
        let value = cursor.get_next().map_err(Error::Source)?;
        let folded = match acc.take() {
            Some(acc) => reducer.add(acc, value),
            None => reducer.seed(value),
        };
        acc = Some(folded.map_err(Error::Reduce)?);
    }
    reducer.finish(acc).map_err(Error::Reduce)
}

/// Reduces a sequential-async source, overlapping reducer operations with
/// each other and with source production. Values are delivered in source
/// order but merged in a nondeterministic order, so `add`/`combine` must be
/// associative in effect for the result to be reproducible.
pub async fn reduce_async<T, R, S>(reducer: &R, source: S) -> Result<R::Output>
where
    T: Send + 'static,
    R: AsyncReducer<T>,
    S: Stream<Item = T>,
{
    try_reduce_async(reducer, source.map(Ok)).await
}

/// Reduces a sequential-async source of fallible items.
pub async fn try_reduce_async<T, R, S>(reducer: &R, source: S) -> Result<R::Output>
where
    T: Send + 'static,
    R: AsyncReducer<T>,
    S: Stream<Item = DynResult<T>>,
{
    let mut cursor = AsyncLookahead::new(source);
    if reducer.can_combine() {
        reduce_pooled(reducer, &mut cursor).await
    } else {
        debug!("reducer cannot merge partial accumulators, serializing folds");
        reduce_serialized(reducer, &mut cursor).await
    }
}

/// Reduces a concurrent source. Values are folded as they are delivered;
/// neither delivery order nor merge order is deterministic.
pub async fn reduce_concur<T, R, C>(reducer: &R, source: C) -> Result<R::Output>
where
    T: Send + 'static,
    R: AsyncReducer<T>,
    C: ConcurStream<Item = T>,
{
    // the bridge handler is a plain channel send, so folding never throttles
    // the producer
    try_reduce_async(reducer, source.into_stream()).await
}

/// The concurrency-maximizing scheduler: an unordered pool of idle
/// accumulators plus a pool of in-flight operations.
///
/// Each poll pass settles finished operations back into the idle pool, pulls
/// the source as fast as it permits (every value immediately starts an `add`
/// against an idle accumulator, or a seeding chain when none is idle), and
/// greedily pairs idle accumulators into `combine` operations. A value never
/// pairs with another raw value, and an accumulator is owned by at most one
/// operation at a time. Terminates once the source is exhausted and no
/// operation is in flight, leaving at most one accumulator for `finish`.
async fn reduce_pooled<T, R, S>(reducer: &R, cursor: &mut AsyncLookahead<S>) -> Result<R::Output>
where
    T: Send + 'static,
    R: AsyncReducer<T>,
    S: Stream<Item = DynResult<T>>,
{
    let mut idle: SmallVec<[R::Acc; 2]> = SmallVec::new();
    let mut in_flight: FuturesUnordered<BoxFuture<'static, DynResult<R::Acc>>> =
        FuturesUnordered::new();
    let mut exhausted = false;
    let mut failure: Option<Error> = None;

    future::poll_fn(|cx| loop {
        let mut progress = false;
        loop {
            match in_flight.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(acc))) => {
                    progress = true;
                    // results settling after a failure are discarded
                    if failure.is_none() {
                        idle.push(acc);
                    }
                }
                Poll::Ready(Some(Err(error))) => {
                    progress = true;
                    if failure.is_none() {
                        failure = Some(Error::Reduce(error));
                        log_failure_drain(in_flight.len());
                    }
                }
                Poll::Ready(None) | Poll::Pending => break,
            }
        }
        while failure.is_none() && !exhausted {
            match cursor.poll_has_next(cx) {
                Poll::Ready(true) => {
                    progress = true;
                    match cursor.get_next() {
                        Ok(value) => match idle.pop() {
                            Some(acc) => in_flight.push(reducer.add(acc, value)),
                            None => in_flight.push(reducer.seed(value)),
                        },
                        Err(error) => {
                            failure = Some(Error::Source(error));
                            log_failure_drain(in_flight.len());
                        }
                    }
                }
                Poll::Ready(false) => {
                    progress = true;
                    exhausted = true;
                }
                Poll::Pending => break,
            }
        }
        while failure.is_none() && idle.len() >= 2 {
            progress = true;
            let right = idle.pop().expect("pool holds two accumulators");
            let left = idle.pop().expect("pool holds two accumulators");
            in_flight.push(reducer.combine(left, right));
        }
        if in_flight.is_empty() && (exhausted || failure.is_some()) {
            return Poll::Ready(());
        }
        if !progress {
            return Poll::Pending;
        }
    })
    .await;

    if let Some(error) = failure {
        return Err(error);
    }
    reducer.finish(idle.pop()).await.map_err(Error::Reduce)
}

/// Fallback for reducers that cannot merge partial accumulators: one
/// operation in flight at a time over a single accumulator chain, folding
/// values strictly in delivery order. Production is still pulled eagerly into
/// a buffer so source latency overlaps fold latency.
async fn reduce_serialized<T, R, S>(
    reducer: &R,
    cursor: &mut AsyncLookahead<S>,
) -> Result<R::Output>
where
    T: Send + 'static,
    R: AsyncReducer<T>,
    S: Stream<Item = DynResult<T>>,
{
    let mut buffered: VecDeque<T> = VecDeque::new();
    let mut acc: Option<R::Acc> = None;
    let mut op: Option<BoxFuture<'static, DynResult<R::Acc>>> = reducer.create();
    let mut exhausted = false;
    let mut failure: Option<Error> = None;

    future::poll_fn(|cx| loop {
        let mut progress = false;
        if let Some(pending) = op.as_mut() {
            match pending.poll_unpin(cx) {
                Poll::Ready(Ok(folded)) => {
                    progress = true;
                    op = None;
                    if failure.is_none() {
                        acc = Some(folded);
                    }
                }
                Poll::Ready(Err(error)) => {
                    progress = true;
                    op = None;
                    failure.get_or_insert(Error::Reduce(error));
                }
                Poll::Pending => {}
            }
        }
        while failure.is_none() && !exhausted {
            match cursor.poll_has_next(cx) {
                Poll::Ready(true) => {
                    progress = true;
                    match cursor.get_next() {
                        Ok(value) => buffered.push_back(value),
                        Err(error) => {
                            failure = Some(Error::Source(error));
                            log_failure_drain(usize::from(op.is_some()));
                        }
                    }
                }
                Poll::Ready(false) => {
                    progress = true;
                    exhausted = true;
                }
                Poll::Pending => break,
            }
        }
        if failure.is_none() && op.is_none() {
            if let Some(value) = buffered.pop_front() {
                progress = true;
                op = Some(match acc.take() {
                    Some(acc) => reducer.add(acc, value),
                    None => reducer.seed(value),
                });
            }
        }
        if op.is_none() && (failure.is_some() || (exhausted && buffered.is_empty())) {
            return Poll::Ready(());
        }
        if !progress {
            return Poll::Pending;
        }
    })
    .await;

    if let Some(error) = failure {
        return Err(error);
    }
    reducer.finish(acc.take()).await.map_err(Error::Reduce)
}

fn log_failure_drain(pending: usize) {
    if pending > 0 {
        debug!("reduction failed with {pending} operations in flight, letting them settle");
    }
}
