use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use futures::stream;
use itertools::Itertools;
use rand::seq::SliceRandom;

use tributary_engine::engine::{
    reduce_async, try_reduce_async, AsyncCombineFn, AsyncFullReducer, DynResult, Error,
    FullReducer,
};

#[tokio::test]
async fn test_sync_reducer_over_async_source() -> eyre::Result<()> {
    let sum = FullReducer::new(|| 0, |acc, value: i64| acc + value).with_combine(|a, b| a + b);
    assert_eq!(reduce_async(&sum, stream::iter(vec![1, 2, 3])).await?, 6);
    Ok(())
}

#[tokio::test]
async fn test_empty_async_source_uses_create() -> eyre::Result<()> {
    let count = FullReducer::new(|| 0_usize, |acc, _value: i64| acc + 1).with_combine(|a, b| a + b);
    assert_eq!(reduce_async(&count, stream::empty::<i64>()).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_async_combine_fn_cardinality() -> eyre::Result<()> {
    let add = AsyncCombineFn::new(|a: i64, b| async move { a + b });
    assert_eq!(
        reduce_async(&add, stream::iter(Vec::<i64>::new())).await?,
        None
    );
    assert_eq!(reduce_async(&add, stream::iter(vec![7])).await?, Some(7));
    Ok(())
}

#[tokio::test]
async fn test_adds_overlap_with_combines() -> eyre::Result<()> {
    let sum = AsyncFullReducer::new(
        || async { 0_i64 },
        |acc, value: i64| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            acc + value
        },
    )
    .with_combine(|a, b| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        a + b
    });
    let started = Instant::now();
    let total = reduce_async(&sum, stream::iter(vec![1, 2, 3, 4])).await?;
    let elapsed = started.elapsed();
    assert_eq!(total, 10);
    // sequential folding would cost four 100ms adds; the overlapped schedule
    // is bounded by the critical path through the merge tree
    assert!(elapsed < Duration::from_millis(350), "took {elapsed:?}");
    Ok(())
}

#[tokio::test]
async fn test_every_value_folds_exactly_once() -> eyre::Result<()> {
    let gather = AsyncFullReducer::new(
        || async { Vec::new() },
        |mut acc: Vec<u64>, value: u64| async move {
            // uneven delays scramble the merge order
            tokio::time::sleep(Duration::from_millis(value % 4)).await;
            acc.push(value);
            acc
        },
    )
    .with_combine(|mut left, mut right| async move {
        left.append(&mut right);
        left
    });
    let values: Vec<u64> = (0..50).collect();
    let folded = reduce_async(&gather, stream::iter(values.clone())).await?;
    assert_eq!(folded.into_iter().sorted().collect::<Vec<_>>(), values);
    Ok(())
}

#[tokio::test]
async fn test_merge_order_does_not_change_sums() -> eyre::Result<()> {
    let sum = AsyncFullReducer::new(
        || async { 0_u64 },
        |acc, value: u64| async move {
            tokio::time::sleep(Duration::from_millis(value % 3)).await;
            acc + value
        },
    )
    .with_combine(|a, b| async move { a + b });
    let mut values: Vec<u64> = (1..=40).collect();
    for _ in 0..3 {
        values.shuffle(&mut rand::rng());
        assert_eq!(reduce_async(&sum, stream::iter(values.clone())).await?, 820);
    }
    Ok(())
}

#[tokio::test]
async fn test_serialized_fallback_preserves_delivery_order() -> eyre::Result<()> {
    // no combine supplied, so the engine folds through a single chain
    let gather = AsyncFullReducer::new(
        || async { Vec::new() },
        |mut acc: Vec<u64>, value: u64| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            acc.push(value);
            acc
        },
    );
    let values: Vec<u64> = (0..20).collect();
    let folded = reduce_async(&gather, stream::iter(values.clone())).await?;
    assert_eq!(folded, values);
    Ok(())
}

#[tokio::test]
async fn test_failure_lets_in_flight_operations_settle() {
    let started = Arc::new(AtomicUsize::new(0));
    let settled = Arc::new(AtomicUsize::new(0));
    let sum = {
        let started = Arc::clone(&started);
        let settled = Arc::clone(&settled);
        AsyncFullReducer::new(
            || async { 0_u64 },
            move |acc, value: u64| {
                let started = Arc::clone(&started);
                let settled = Arc::clone(&settled);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    settled.fetch_add(1, Ordering::SeqCst);
                    acc + value
                }
            },
        )
        .with_combine(|a, b| async move { a + b })
    };
    let items: Vec<DynResult<u64>> = vec![Ok(1), Ok(2), Err("socket closed".into())];
    let result = try_reduce_async(&sum, stream::iter(items)).await;
    assert_matches!(result, Err(Error::Source(_)));
    let started = started.load(Ordering::SeqCst);
    assert!(started > 0);
    assert_eq!(settled.load(Ordering::SeqCst), started);
}

#[tokio::test]
async fn test_failing_add_rejects() {
    let picky = AsyncFullReducer::fallible(
        || async { Ok(0_i64) },
        |acc, value: i64| async move {
            if value == 3 {
                Err("rejected".into())
            } else {
                Ok(acc + value)
            }
        },
    );
    let result = reduce_async(&picky, stream::iter(vec![1, 2, 3, 4])).await;
    assert_matches!(result, Err(Error::Reduce(_)));
}
