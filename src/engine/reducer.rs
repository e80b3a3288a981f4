// Copyright © 2025 Tributary

#![allow(clippy::module_name_repetitions)]

use std::future::Future;
use std::sync::Arc;

use derivative::Derivative;
use futures::future::{self, BoxFuture};
use futures::FutureExt;

use super::error::DynResult;

pub(crate) type CreateFn<A> = Box<dyn Fn() -> DynResult<A> + Send + Sync>;
pub(crate) type AddFn<A, T> = Box<dyn Fn(A, T) -> DynResult<A> + Send + Sync>;
pub(crate) type MergeFn<A> = Box<dyn Fn(A, A) -> DynResult<A> + Send + Sync>;
pub(crate) type FinishFn<A, O> = Box<dyn Fn(A) -> DynResult<O> + Send + Sync>;

pub(crate) type AsyncCreateFn<A> = Arc<dyn Fn() -> BoxFuture<'static, DynResult<A>> + Send + Sync>;
pub(crate) type AsyncAddFn<A, T> =
    Arc<dyn Fn(A, T) -> BoxFuture<'static, DynResult<A>> + Send + Sync>;
pub(crate) type AsyncMergeFn<A> =
    Arc<dyn Fn(A, A) -> BoxFuture<'static, DynResult<A>> + Send + Sync>;
pub(crate) type AsyncFinishFn<A, O> =
    Arc<dyn Fn(A) -> BoxFuture<'static, DynResult<O>> + Send + Sync>;

/// Canonical reduction interface over values of type `T`.
///
/// Every accepted reducer shape normalizes to this; the engine and the
/// composition layer depend on nothing else.
pub trait Reducer<T> {
    type Acc;
    type Output;

    /// Upfront accumulator, or `None` for shapes seeded by the first value.
    fn create(&self) -> Option<DynResult<Self::Acc>>;

    /// Accumulator holding a single value.
    fn seed(&self, value: T) -> DynResult<Self::Acc> {
        let acc = self
            .create()
            .expect("reducer without create must override seed")?;
        self.add(acc, value)
    }

    fn add(&self, acc: Self::Acc, value: T) -> DynResult<Self::Acc>;

    /// Whether two partial accumulators can be merged directly. When false,
    /// the engine folds every value through a single accumulator chain.
    fn can_combine(&self) -> bool {
        true
    }

    /// Merges two partial accumulators. Called only when `can_combine`.
    fn combine(&self, left: Self::Acc, right: Self::Acc) -> DynResult<Self::Acc>;

    /// Final result; `None` means the source produced no values.
    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<Self::Output>;
}

/// Asynchronous rendition of [`Reducer`]. Every sync reducer lifts into it,
/// so the async entry points accept either kind.
pub trait AsyncReducer<T: Send + 'static>: Sync {
    type Acc: Send + 'static;
    type Output: Send + 'static;

    fn create(&self) -> Option<BoxFuture<'static, DynResult<Self::Acc>>>;

    fn seed(&self, value: T) -> BoxFuture<'static, DynResult<Self::Acc>>;

    fn add(&self, acc: Self::Acc, value: T) -> BoxFuture<'static, DynResult<Self::Acc>>;

    fn can_combine(&self) -> bool {
        true
    }

    fn combine(
        &self,
        left: Self::Acc,
        right: Self::Acc,
    ) -> BoxFuture<'static, DynResult<Self::Acc>>;

    fn finish(&self, acc: Option<Self::Acc>) -> BoxFuture<'static, DynResult<Self::Output>>;
}

impl<T, R> AsyncReducer<T> for R
where
    T: Send + 'static,
    R: Reducer<T> + Sync,
    R::Acc: Send + 'static,
    R::Output: Send + 'static,
{
    type Acc = R::Acc;
    type Output = R::Output;

    fn create(&self) -> Option<BoxFuture<'static, DynResult<Self::Acc>>> {
        Reducer::create(self).map(|created| future::ready(created).boxed())
    }

    fn seed(&self, value: T) -> BoxFuture<'static, DynResult<Self::Acc>> {
        future::ready(Reducer::seed(self, value)).boxed()
    }

    fn add(&self, acc: Self::Acc, value: T) -> BoxFuture<'static, DynResult<Self::Acc>> {
        future::ready(Reducer::add(self, acc, value)).boxed()
    }

    fn can_combine(&self) -> bool {
        Reducer::can_combine(self)
    }

    fn combine(
        &self,
        left: Self::Acc,
        right: Self::Acc,
    ) -> BoxFuture<'static, DynResult<Self::Acc>> {
        future::ready(Reducer::combine(self, left, right)).boxed()
    }

    fn finish(&self, acc: Option<Self::Acc>) -> BoxFuture<'static, DynResult<Self::Output>> {
        future::ready(Reducer::finish(self, acc)).boxed()
    }
}

/// Result of a keyed lookup, distinguishable from any stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a, V> {
    Found(&'a V),
    NoEntry,
}

impl<'a, V> Lookup<'a, V> {
    pub fn found(self) -> Option<&'a V> {
        match self {
            Self::Found(value) => Some(value),
            Self::NoEntry => None,
        }
    }
}

/// Reducer whose accumulator supports lookup by key.
pub trait KeyedReducer<T>: Reducer<T> {
    type Key;
    type Entry;

    fn get<'a>(&self, acc: &'a Self::Acc, key: &Self::Key) -> Lookup<'a, Self::Entry>;
}

/// Plain combining function used as a reducer. The first value seeds the
/// accumulator, so an empty source yields `None`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CombineFn<T> {
    #[derivative(Debug = "ignore")]
    combine: MergeFn<T>,
}

impl<T> CombineFn<T> {
    pub fn new(combine: impl Fn(T, T) -> T + Send + Sync + 'static) -> Self {
        Self {
            combine: Box::new(move |left, right| Ok(combine(left, right))),
        }
    }

    pub fn fallible(combine: impl Fn(T, T) -> DynResult<T> + Send + Sync + 'static) -> Self {
        Self {
            combine: Box::new(combine),
        }
    }
}

impl<T> Reducer<T> for CombineFn<T> {
    type Acc = T;
    type Output = Option<T>;

    fn create(&self) -> Option<DynResult<T>> {
        None
    }

    fn seed(&self, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn add(&self, acc: T, value: T) -> DynResult<T> {
        (self.combine)(acc, value)
    }

    fn combine(&self, left: T, right: T) -> DynResult<T> {
        (self.combine)(left, right)
    }

    fn finish(&self, acc: Option<T>) -> DynResult<Option<T>> {
        Ok(acc)
    }
}

/// Async combining function used as a reducer; async counterpart of
/// [`CombineFn`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AsyncCombineFn<T> {
    #[derivative(Debug = "ignore")]
    combine: AsyncMergeFn<T>,
}

impl<T> AsyncCombineFn<T> {
    pub fn new<F, Fut>(combine: F) -> Self
    where
        F: Fn(T, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            combine: Arc::new(move |left, right| {
                let combined = combine(left, right);
                async move { Ok(combined.await) }.boxed()
            }),
        }
    }

    pub fn fallible<F, Fut>(combine: F) -> Self
    where
        F: Fn(T, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DynResult<T>> + Send + 'static,
    {
        Self {
            combine: Arc::new(move |left, right| combine(left, right).boxed()),
        }
    }
}

impl<T: Send + 'static> AsyncReducer<T> for AsyncCombineFn<T> {
    type Acc = T;
    type Output = Option<T>;

    fn create(&self) -> Option<BoxFuture<'static, DynResult<T>>> {
        None
    }

    fn seed(&self, value: T) -> BoxFuture<'static, DynResult<T>> {
        future::ready(Ok(value)).boxed()
    }

    fn add(&self, acc: T, value: T) -> BoxFuture<'static, DynResult<T>> {
        (self.combine)(acc, value)
    }

    fn combine(&self, left: T, right: T) -> BoxFuture<'static, DynResult<T>> {
        (self.combine)(left, right)
    }

    fn finish(&self, acc: Option<T>) -> BoxFuture<'static, DynResult<Option<T>>> {
        future::ready(Ok(acc)).boxed()
    }
}

/// Seedless reducer: `add` folds values of the accumulator's own type and an
/// optional `finish` maps the survivor. An empty source yields `None`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SemigroupReducer<T, O = T> {
    #[derivative(Debug = "ignore")]
    add: MergeFn<T>,
    #[derivative(Debug = "ignore")]
    finish: FinishFn<T, O>,
}

impl<T> SemigroupReducer<T> {
    pub fn new(add: impl Fn(T, T) -> T + Send + Sync + 'static) -> Self {
        Self {
            add: Box::new(move |acc, value| Ok(add(acc, value))),
            finish: Box::new(|acc| Ok(acc)),
        }
    }

    pub fn with_finish<O>(
        self,
        finish: impl Fn(T) -> O + Send + Sync + 'static,
    ) -> SemigroupReducer<T, O> {
        SemigroupReducer {
            add: self.add,
            finish: Box::new(move |acc| Ok(finish(acc))),
        }
    }
}

impl<T, O> Reducer<T> for SemigroupReducer<T, O> {
    type Acc = T;
    type Output = Option<O>;

    fn create(&self) -> Option<DynResult<T>> {
        None
    }

    fn seed(&self, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn add(&self, acc: T, value: T) -> DynResult<T> {
        (self.add)(acc, value)
    }

    fn combine(&self, left: T, right: T) -> DynResult<T> {
        (self.add)(left, right)
    }

    fn finish(&self, acc: Option<T>) -> DynResult<Option<O>> {
        match acc {
            Some(acc) => (self.finish)(acc).map(Some),
            None => Ok(None),
        }
    }
}

/// Async counterpart of [`SemigroupReducer`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AsyncSemigroupReducer<T, O = T> {
    #[derivative(Debug = "ignore")]
    add: AsyncMergeFn<T>,
    #[derivative(Debug = "ignore")]
    finish: AsyncFinishFn<T, O>,
}

impl<T: Send + 'static> AsyncSemigroupReducer<T> {
    pub fn new<F, Fut>(add: F) -> Self
    where
        F: Fn(T, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            add: Arc::new(move |acc, value| {
                let added = add(acc, value);
                async move { Ok(added.await) }.boxed()
            }),
            finish: Arc::new(|acc| future::ready(Ok(acc)).boxed()),
        }
    }

    pub fn with_finish<O, F, Fut>(self, finish: F) -> AsyncSemigroupReducer<T, O>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        AsyncSemigroupReducer {
            add: self.add,
            finish: Arc::new(move |acc| {
                let finished = finish(acc);
                async move { Ok(finished.await) }.boxed()
            }),
        }
    }
}

impl<T, O> AsyncReducer<T> for AsyncSemigroupReducer<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
{
    type Acc = T;
    type Output = Option<O>;

    fn create(&self) -> Option<BoxFuture<'static, DynResult<T>>> {
        None
    }

    fn seed(&self, value: T) -> BoxFuture<'static, DynResult<T>> {
        future::ready(Ok(value)).boxed()
    }

    fn add(&self, acc: T, value: T) -> BoxFuture<'static, DynResult<T>> {
        (self.add)(acc, value)
    }

    fn combine(&self, left: T, right: T) -> BoxFuture<'static, DynResult<T>> {
        (self.add)(left, right)
    }

    fn finish(&self, acc: Option<T>) -> BoxFuture<'static, DynResult<Option<O>>> {
        match acc {
            Some(acc) => {
                let finished = (self.finish)(acc);
                async move { Ok(Some(finished.await?)) }.boxed()
            }
            None => future::ready(Ok(None)).boxed(),
        }
    }
}

/// Full reducer with an upfront accumulator; reducing an empty source returns
/// `finish(create())`. Without [`FullReducer::with_combine`] the reducer
/// cannot merge partial accumulators and async reductions serialize.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FullReducer<T, A, O = A> {
    #[derivative(Debug = "ignore")]
    create: CreateFn<A>,
    #[derivative(Debug = "ignore")]
    add: AddFn<A, T>,
    #[derivative(Debug = "ignore")]
    combine: Option<MergeFn<A>>,
    #[derivative(Debug = "ignore")]
    finish: FinishFn<A, O>,
}

impl<T, A> FullReducer<T, A> {
    pub fn new(
        create: impl Fn() -> A + Send + Sync + 'static,
        add: impl Fn(A, T) -> A + Send + Sync + 'static,
    ) -> Self {
        Self {
            create: Box::new(move || Ok(create())),
            add: Box::new(move |acc, value| Ok(add(acc, value))),
            combine: None,
            finish: Box::new(|acc| Ok(acc)),
        }
    }

    pub fn fallible(
        create: impl Fn() -> DynResult<A> + Send + Sync + 'static,
        add: impl Fn(A, T) -> DynResult<A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            create: Box::new(create),
            add: Box::new(add),
            combine: None,
            finish: Box::new(|acc| Ok(acc)),
        }
    }

    pub fn with_finish<O>(
        self,
        finish: impl Fn(A) -> O + Send + Sync + 'static,
    ) -> FullReducer<T, A, O> {
        FullReducer {
            create: self.create,
            add: self.add,
            combine: self.combine,
            finish: Box::new(move |acc| Ok(finish(acc))),
        }
    }
}

impl<T, A, O> FullReducer<T, A, O> {
    pub fn with_combine(
        mut self,
        combine: impl Fn(A, A) -> A + Send + Sync + 'static,
    ) -> Self {
        self.combine = Some(Box::new(move |left, right| Ok(combine(left, right))));
        self
    }
}

impl<T, A, O> Reducer<T> for FullReducer<T, A, O> {
    type Acc = A;
    type Output = O;

    fn create(&self) -> Option<DynResult<A>> {
        Some((self.create)())
    }

    fn add(&self, acc: A, value: T) -> DynResult<A> {
        (self.add)(acc, value)
    }

    fn can_combine(&self) -> bool {
        self.combine.is_some()
    }

    fn combine(&self, left: A, right: A) -> DynResult<A> {
        let combine = self
            .combine
            .as_ref()
            .expect("combine called on a reducer without one");
        combine(left, right)
    }

    fn finish(&self, acc: Option<A>) -> DynResult<O> {
        let acc = match acc {
            Some(acc) => acc,
            None => (self.create)()?,
        };
        (self.finish)(acc)
    }
}

/// Async counterpart of [`FullReducer`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AsyncFullReducer<T, A, O = A> {
    #[derivative(Debug = "ignore")]
    create: AsyncCreateFn<A>,
    #[derivative(Debug = "ignore")]
    add: AsyncAddFn<A, T>,
    #[derivative(Debug = "ignore")]
    combine: Option<AsyncMergeFn<A>>,
    #[derivative(Debug = "ignore")]
    finish: AsyncFinishFn<A, O>,
}

impl<T, A: Send + 'static> AsyncFullReducer<T, A> {
    pub fn new<C, CFut, F, FFut>(create: C, add: F) -> Self
    where
        C: Fn() -> CFut + Send + Sync + 'static,
        CFut: Future<Output = A> + Send + 'static,
        F: Fn(A, T) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = A> + Send + 'static,
    {
        Self {
            create: Arc::new(move || {
                let created = create();
                async move { Ok(created.await) }.boxed()
            }),
            add: Arc::new(move |acc, value| {
                let added = add(acc, value);
                async move { Ok(added.await) }.boxed()
            }),
            combine: None,
            finish: Arc::new(|acc| future::ready(Ok(acc)).boxed()),
        }
    }

    pub fn fallible<C, CFut, F, FFut>(create: C, add: F) -> Self
    where
        C: Fn() -> CFut + Send + Sync + 'static,
        CFut: Future<Output = DynResult<A>> + Send + 'static,
        F: Fn(A, T) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = DynResult<A>> + Send + 'static,
    {
        Self {
            create: Arc::new(move || create().boxed()),
            add: Arc::new(move |acc, value| add(acc, value).boxed()),
            combine: None,
            finish: Arc::new(|acc| future::ready(Ok(acc)).boxed()),
        }
    }

    pub fn with_finish<O, F, Fut>(self, finish: F) -> AsyncFullReducer<T, A, O>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        AsyncFullReducer {
            create: self.create,
            add: self.add,
            combine: self.combine,
            finish: Arc::new(move |acc| {
                let finished = finish(acc);
                async move { Ok(finished.await) }.boxed()
            }),
        }
    }
}

impl<T, A, O> AsyncFullReducer<T, A, O> {
    pub fn with_combine<F, Fut>(mut self, combine: F) -> Self
    where
        F: Fn(A, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = A> + Send + 'static,
    {
        self.combine = Some(Arc::new(move |left, right| {
            let combined = combine(left, right);
            async move { Ok(combined.await) }.boxed()
        }));
        self
    }
}

impl<T, A, O> AsyncReducer<T> for AsyncFullReducer<T, A, O>
where
    T: Send + 'static,
    A: Send + 'static,
    O: Send + 'static,
{
    type Acc = A;
    type Output = O;

    fn create(&self) -> Option<BoxFuture<'static, DynResult<A>>> {
        Some((self.create)())
    }

    fn seed(&self, value: T) -> BoxFuture<'static, DynResult<A>> {
        let add = Arc::clone(&self.add);
        let created = (self.create)();
        async move { add(created.await?, value).await }.boxed()
    }

    fn add(&self, acc: A, value: T) -> BoxFuture<'static, DynResult<A>> {
        (self.add)(acc, value)
    }

    fn can_combine(&self) -> bool {
        self.combine.is_some()
    }

    fn combine(&self, left: A, right: A) -> BoxFuture<'static, DynResult<A>> {
        let combine = self
            .combine
            .as_ref()
            .expect("combine called on a reducer without one");
        combine(left, right)
    }

    fn finish(&self, acc: Option<A>) -> BoxFuture<'static, DynResult<O>> {
        match acc {
            Some(acc) => (self.finish)(acc),
            None => {
                let finish = Arc::clone(&self.finish);
                let created = (self.create)();
                async move { finish(created.await?).await }.boxed()
            }
        }
    }
}
