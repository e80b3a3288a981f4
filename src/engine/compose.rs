// Copyright © 2025 Tributary

use std::collections::HashMap;
use std::hash::Hash;

use derivative::Derivative;
use futures::future::{self, BoxFuture};
use futures::FutureExt;

use super::error::DynResult;
use super::reducer::{AsyncReducer, KeyedReducer, Lookup, Reducer};

/// Post-processing transform of the final value: every other operation
/// delegates to the inner reducer and only `finish` is wrapped.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MapOutput<R, F> {
    inner: R,
    #[derivative(Debug = "ignore")]
    f: F,
}

impl<R, F> MapOutput<R, F> {
    pub fn new(inner: R, f: F) -> Self {
        Self { inner, f }
    }
}

impl<T, R, F, O> Reducer<T> for MapOutput<R, F>
where
    R: Reducer<T>,
    F: Fn(R::Output) -> O,
{
    type Acc = R::Acc;
    type Output = O;

    fn create(&self) -> Option<DynResult<Self::Acc>> {
        self.inner.create()
    }

    fn seed(&self, value: T) -> DynResult<Self::Acc> {
        self.inner.seed(value)
    }

    fn add(&self, acc: Self::Acc, value: T) -> DynResult<Self::Acc> {
        self.inner.add(acc, value)
    }

    fn can_combine(&self) -> bool {
        self.inner.can_combine()
    }

    fn combine(&self, left: Self::Acc, right: Self::Acc) -> DynResult<Self::Acc> {
        self.inner.combine(left, right)
    }

    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<O> {
        Ok((self.f)(self.inner.finish(acc)?))
    }
}

/// Fans every value out to two reducers in one pass.
#[derive(Debug)]
pub struct Fanout<R1, R2> {
    first: R1,
    second: R2,
}

impl<R1, R2> Fanout<R1, R2> {
    pub fn new(first: R1, second: R2) -> Self {
        Self { first, second }
    }
}

impl<T, R1, R2> Reducer<T> for Fanout<R1, R2>
where
    T: Clone,
    R1: Reducer<T>,
    R2: Reducer<T>,
{
    type Acc = (R1::Acc, R2::Acc);
    type Output = (R1::Output, R2::Output);

    fn create(&self) -> Option<DynResult<Self::Acc>> {
        // seedless children force the seeding path for the pair as well
        let first = self.first.create()?;
        let second = self.second.create()?;
        Some(first.and_then(|first| Ok((first, second?))))
    }

    fn seed(&self, value: T) -> DynResult<Self::Acc> {
        Ok((self.first.seed(value.clone())?, self.second.seed(value)?))
    }

    fn add(&self, acc: Self::Acc, value: T) -> DynResult<Self::Acc> {
        let (first, second) = acc;
        Ok((
            self.first.add(first, value.clone())?,
            self.second.add(second, value)?,
        ))
    }

    fn can_combine(&self) -> bool {
        self.first.can_combine() && self.second.can_combine()
    }

    fn combine(&self, left: Self::Acc, right: Self::Acc) -> DynResult<Self::Acc> {
        Ok((
            self.first.combine(left.0, right.0)?,
            self.second.combine(left.1, right.1)?,
        ))
    }

    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<Self::Output> {
        match acc {
            Some((first, second)) => Ok((
                self.first.finish(Some(first))?,
                self.second.finish(Some(second))?,
            )),
            None => Ok((self.first.finish(None)?, self.second.finish(None)?)),
        }
    }
}

/// Async fan-out: the two children's operations run concurrently.
#[derive(Debug)]
pub struct FanoutAsync<R1, R2> {
    first: R1,
    second: R2,
}

impl<R1, R2> FanoutAsync<R1, R2> {
    pub fn new(first: R1, second: R2) -> Self {
        Self { first, second }
    }
}

impl<T, R1, R2> AsyncReducer<T> for FanoutAsync<R1, R2>
where
    T: Clone + Send + 'static,
    R1: AsyncReducer<T>,
    R2: AsyncReducer<T>,
{
    type Acc = (R1::Acc, R2::Acc);
    type Output = (R1::Output, R2::Output);

    fn create(&self) -> Option<BoxFuture<'static, DynResult<Self::Acc>>> {
        let first = self.first.create()?;
        let second = self.second.create()?;
        Some(future::try_join(first, second).boxed())
    }

    fn seed(&self, value: T) -> BoxFuture<'static, DynResult<Self::Acc>> {
        future::try_join(self.first.seed(value.clone()), self.second.seed(value)).boxed()
    }

    fn add(&self, acc: Self::Acc, value: T) -> BoxFuture<'static, DynResult<Self::Acc>> {
        let (first, second) = acc;
        future::try_join(
            self.first.add(first, value.clone()),
            self.second.add(second, value),
        )
        .boxed()
    }

    fn can_combine(&self) -> bool {
        self.first.can_combine() && self.second.can_combine()
    }

    fn combine(&self, left: Self::Acc, right: Self::Acc) -> BoxFuture<'static, DynResult<Self::Acc>> {
        future::try_join(
            self.first.combine(left.0, right.0),
            self.second.combine(left.1, right.1),
        )
        .boxed()
    }

    fn finish(&self, acc: Option<Self::Acc>) -> BoxFuture<'static, DynResult<Self::Output>> {
        match acc {
            Some((first, second)) => future::try_join(
                self.first.finish(Some(first)),
                self.second.finish(Some(second)),
            )
            .boxed(),
            None => future::try_join(self.first.finish(None), self.second.finish(None)).boxed(),
        }
    }
}

/// Groups values by a derived key and reduces each group with the inner
/// reducer. New groups are seeded through the inner seeding path, so the
/// inner reducer may itself be seedless.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GroupBy<F, R> {
    #[derivative(Debug = "ignore")]
    key_fn: F,
    inner: R,
}

impl<F, R> GroupBy<F, R> {
    pub fn new(key_fn: F, inner: R) -> Self {
        Self { key_fn, inner }
    }
}

impl<T, F, R, K> Reducer<T> for GroupBy<F, R>
where
    F: Fn(&T) -> K,
    R: Reducer<T>,
    K: Eq + Hash,
{
    type Acc = HashMap<K, R::Acc>;
    type Output = HashMap<K, R::Output>;

    fn create(&self) -> Option<DynResult<Self::Acc>> {
        Some(Ok(HashMap::new()))
    }

    fn add(&self, mut acc: Self::Acc, value: T) -> DynResult<Self::Acc> {
        let key = (self.key_fn)(&value);
        let group = match acc.remove(&key) {
            Some(group) => self.inner.add(group, value)?,
            None => self.inner.seed(value)?,
        };
        acc.insert(key, group);
        Ok(acc)
    }

    fn can_combine(&self) -> bool {
        self.inner.can_combine()
    }

    fn combine(&self, mut left: Self::Acc, right: Self::Acc) -> DynResult<Self::Acc> {
        for (key, group) in right {
            let merged = match left.remove(&key) {
                Some(other) => self.inner.combine(other, group)?,
                None => group,
            };
            left.insert(key, merged);
        }
        Ok(left)
    }

    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<Self::Output> {
        let mut finished = HashMap::new();
        for (key, group) in acc.unwrap_or_default() {
            finished.insert(key, self.inner.finish(Some(group))?);
        }
        Ok(finished)
    }
}

impl<T, F, R, K> KeyedReducer<T> for GroupBy<F, R>
where
    F: Fn(&T) -> K,
    R: Reducer<T>,
    K: Eq + Hash,
{
    type Key = K;
    type Entry = R::Acc;

    fn get<'a>(&self, acc: &'a Self::Acc, key: &K) -> Lookup<'a, R::Acc> {
        match acc.get(key) {
            Some(group) => Lookup::Found(group),
            None => Lookup::NoEntry,
        }
    }
}
