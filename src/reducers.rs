//! Leaf reducers over the canonical interface. All of them implement
//! `combine`, so every one participates in the concurrent-merge fast path.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::ops::Add;

use crate::engine::error::DynResult;
use crate::engine::reducer::{KeyedReducer, Lookup, Reducer};

/// Collects values into a `Vec` in fold order. Under async reduction the
/// merge order is nondeterministic, so treat the result as unordered there.
#[derive(Debug, Clone, Copy)]
pub struct ToVec;

impl<T> Reducer<T> for ToVec {
    type Acc = Vec<T>;
    type Output = Vec<T>;

    fn create(&self) -> Option<DynResult<Self::Acc>> {
        Some(Ok(Vec::new()))
    }

    fn add(&self, mut acc: Self::Acc, value: T) -> DynResult<Self::Acc> {
        acc.push(value);
        Ok(acc)
    }

    fn combine(&self, mut left: Self::Acc, mut right: Self::Acc) -> DynResult<Self::Acc> {
        left.append(&mut right);
        Ok(left)
    }

    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<Self::Output> {
        Ok(acc.unwrap_or_default())
    }
}

/// Collects distinct values into an ordered set.
#[derive(Debug, Clone, Copy)]
pub struct ToSet;

impl<T: Ord> Reducer<T> for ToSet {
    type Acc = BTreeSet<T>;
    type Output = BTreeSet<T>;

    fn create(&self) -> Option<DynResult<Self::Acc>> {
        Some(Ok(BTreeSet::new()))
    }

    fn add(&self, mut acc: Self::Acc, value: T) -> DynResult<Self::Acc> {
        acc.insert(value);
        Ok(acc)
    }

    fn combine(&self, mut left: Self::Acc, mut right: Self::Acc) -> DynResult<Self::Acc> {
        left.append(&mut right);
        Ok(left)
    }

    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<Self::Output> {
        Ok(acc.unwrap_or_default())
    }
}

/// Collects key-value pairs into a map, last write wins. Which write is last
/// is only well defined for sync reduction.
#[derive(Debug, Clone, Copy)]
pub struct ToMap;

impl<K: Eq + Hash, V> Reducer<(K, V)> for ToMap {
    type Acc = HashMap<K, V>;
    type Output = HashMap<K, V>;

    fn create(&self) -> Option<DynResult<Self::Acc>> {
        Some(Ok(HashMap::new()))
    }

    fn add(&self, mut acc: Self::Acc, value: (K, V)) -> DynResult<Self::Acc> {
        acc.insert(value.0, value.1);
        Ok(acc)
    }

    fn combine(&self, mut left: Self::Acc, right: Self::Acc) -> DynResult<Self::Acc> {
        left.extend(right);
        Ok(left)
    }

    fn finish(&self, acc: Option<Self::Acc>) -> DynResult<Self::Output> {
        Ok(acc.unwrap_or_default())
    }
}

impl<K: Eq + Hash, V> KeyedReducer<(K, V)> for ToMap {
    type Key = K;
    type Entry = V;

    fn get<'a>(&self, acc: &'a Self::Acc, key: &K) -> Lookup<'a, V> {
        match acc.get(key) {
            Some(entry) => Lookup::Found(entry),
            None => Lookup::NoEntry,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Count;

impl<T> Reducer<T> for Count {
    type Acc = usize;
    type Output = usize;

    fn create(&self) -> Option<DynResult<usize>> {
        Some(Ok(0))
    }

    fn add(&self, acc: usize, _value: T) -> DynResult<usize> {
        Ok(acc + 1)
    }

    fn combine(&self, left: usize, right: usize) -> DynResult<usize> {
        Ok(left + right)
    }

    fn finish(&self, acc: Option<usize>) -> DynResult<usize> {
        Ok(acc.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sum;

impl<T: Add<Output = T> + Default> Reducer<T> for Sum {
    type Acc = T;
    type Output = T;

    fn create(&self) -> Option<DynResult<T>> {
        Some(Ok(T::default()))
    }

    fn add(&self, acc: T, value: T) -> DynResult<T> {
        Ok(acc + value)
    }

    fn combine(&self, left: T, right: T) -> DynResult<T> {
        Ok(left + right)
    }

    fn finish(&self, acc: Option<T>) -> DynResult<T> {
        Ok(acc.unwrap_or_default())
    }
}

/// Smallest value, `None` on an empty source.
#[derive(Debug, Clone, Copy)]
pub struct Min;

impl<T: Ord> Reducer<T> for Min {
    type Acc = T;
    type Output = Option<T>;

    fn create(&self) -> Option<DynResult<T>> {
        None
    }

    fn seed(&self, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn add(&self, acc: T, value: T) -> DynResult<T> {
        Ok(acc.min(value))
    }

    fn combine(&self, left: T, right: T) -> DynResult<T> {
        Ok(left.min(right))
    }

    fn finish(&self, acc: Option<T>) -> DynResult<Option<T>> {
        Ok(acc)
    }
}

/// Largest value, `None` on an empty source.
#[derive(Debug, Clone, Copy)]
pub struct Max;

impl<T: Ord> Reducer<T> for Max {
    type Acc = T;
    type Output = Option<T>;

    fn create(&self) -> Option<DynResult<T>> {
        None
    }

    fn seed(&self, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn add(&self, acc: T, value: T) -> DynResult<T> {
        Ok(acc.max(value))
    }

    fn combine(&self, left: T, right: T) -> DynResult<T> {
        Ok(left.max(right))
    }

    fn finish(&self, acc: Option<T>) -> DynResult<Option<T>> {
        Ok(acc)
    }
}

/// First value in fold order; arbitrary under concurrent sources.
#[derive(Debug, Clone, Copy)]
pub struct First;

impl<T> Reducer<T> for First {
    type Acc = T;
    type Output = Option<T>;

    fn create(&self) -> Option<DynResult<T>> {
        None
    }

    fn seed(&self, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn add(&self, acc: T, _value: T) -> DynResult<T> {
        Ok(acc)
    }

    fn combine(&self, left: T, _right: T) -> DynResult<T> {
        Ok(left)
    }

    fn finish(&self, acc: Option<T>) -> DynResult<Option<T>> {
        Ok(acc)
    }
}

/// Last value in fold order; arbitrary under concurrent sources.
#[derive(Debug, Clone, Copy)]
pub struct Last;

impl<T> Reducer<T> for Last {
    type Acc = T;
    type Output = Option<T>;

    fn create(&self) -> Option<DynResult<T>> {
        None
    }

    fn seed(&self, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn add(&self, _acc: T, value: T) -> DynResult<T> {
        Ok(value)
    }

    fn combine(&self, _left: T, right: T) -> DynResult<T> {
        Ok(right)
    }

    fn finish(&self, acc: Option<T>) -> DynResult<Option<T>> {
        Ok(acc)
    }
}
