use std::collections::HashMap;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use futures::stream;

use tributary_engine::engine::{
    reduce, reduce_async, AsyncFullReducer, Fanout, FanoutAsync, GroupBy, KeyedReducer, Lookup,
    MapOutput, Reducer,
};
use tributary_engine::reducers::{Count, Max, Min, Sum, ToVec};

#[test]
fn test_group_by_counts() -> eyre::Result<()> {
    let by_parity = GroupBy::new(|value: &i64| value % 2, Count);
    let groups = reduce(&by_parity, vec![1, 2, 3, 4, 5])?;
    assert_eq!(groups, HashMap::from([(1, 3), (0, 2)]));
    Ok(())
}

#[test]
fn test_group_by_empty_source() -> eyre::Result<()> {
    let by_parity = GroupBy::new(|value: &i64| value % 2, Count);
    assert_eq!(reduce(&by_parity, Vec::<i64>::new())?, HashMap::new());
    Ok(())
}

#[test]
fn test_group_by_seeds_seedless_inner() -> eyre::Result<()> {
    let best = GroupBy::new(|value: &i64| value % 2, Max);
    let groups = reduce(&best, vec![1, 2, 3, 4, 5])?;
    assert_eq!(groups, HashMap::from([(1, Some(5)), (0, Some(4))]));
    Ok(())
}

#[test]
fn test_group_by_keyed_lookup() {
    let by_parity = GroupBy::new(|value: &i64| value % 2, ToVec);
    let mut acc = by_parity.create().unwrap().unwrap();
    for value in [1, 2, 3] {
        acc = by_parity.add(acc, value).unwrap();
    }
    assert_matches!(by_parity.get(&acc, &1), Lookup::Found(group) if *group == vec![1, 3]);
    assert_matches!(by_parity.get(&acc, &7), Lookup::NoEntry);
}

#[tokio::test]
async fn test_group_by_merges_across_accumulators() -> eyre::Result<()> {
    let by_parity = GroupBy::new(|value: &u64| value % 2, Count);
    let groups = reduce_async(&by_parity, stream::iter(0..10)).await?;
    assert_eq!(groups, HashMap::from([(0, 5), (1, 5)]));
    Ok(())
}

#[test]
#[allow(clippy::cast_precision_loss)]
fn test_fanout_with_map_output_averages() -> eyre::Result<()> {
    let average = MapOutput::new(Fanout::new(Sum, Count), |(sum, count): (i64, usize)| {
        sum as f64 / count as f64
    });
    assert_eq!(reduce(&average, vec![1_i64, 2, 3, 4])?, 2.5);
    Ok(())
}

#[test]
fn test_fanout_of_seedless_children() -> eyre::Result<()> {
    let extrema = Fanout::new(Min, Max);
    assert_eq!(reduce(&extrema, vec![3_i64, 1, 4, 1, 5])?, (Some(1), Some(5)));
    assert_eq!(reduce(&extrema, Vec::<i64>::new())?, (None, None));
    Ok(())
}

#[tokio::test]
async fn test_fanout_async_runs_children_concurrently() -> eyre::Result<()> {
    let slow_sum = || {
        AsyncFullReducer::new(
            || async { 0_i64 },
            |acc, value: i64| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                acc + value
            },
        )
        .with_combine(|a, b| async move { a + b })
    };
    let pair = FanoutAsync::new(slow_sum(), slow_sum());
    let started = Instant::now();
    let (left, right) = reduce_async(&pair, stream::iter(vec![1, 2, 3, 4])).await?;
    let elapsed = started.elapsed();
    assert_eq!((left, right), (10, 10));
    assert!(elapsed < Duration::from_millis(200), "took {elapsed:?}");
    Ok(())
}
