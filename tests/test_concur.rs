use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use futures::stream;
use futures::{FutureExt, StreamExt};
use itertools::Itertools;

use tributary_engine::engine::{
    reduce_concur, ConcurStream, DynResult, Error, FullReducer, IterConcur, StreamConcur,
};

fn sum_reducer() -> FullReducer<i32, i32> {
    FullReducer::new(|| 0, |acc, value: i32| acc + value).with_combine(|a, b| a + b)
}

#[tokio::test]
async fn test_iter_concur_handles_every_value() -> eyre::Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completion = IterConcur::new(vec![1, 2, 3]).run({
        let seen = Arc::clone(&seen);
        move |value| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(value);
                Ok(())
            }
            .boxed()
        }
    });
    completion.await.map_err(|e| eyre::eyre!(e))?;
    let seen = seen.lock().unwrap().iter().copied().sorted().collect::<Vec<_>>();
    assert_eq!(seen, vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_handlers_overlap() {
    let started = Instant::now();
    let completion = IterConcur::new(0..8).run(|_value| {
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }
        .boxed()
    });
    completion.await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_millis(200), "took {elapsed:?}");
}

#[tokio::test]
async fn test_handler_failure_fails_completion_after_settlement() {
    let settled = Arc::new(AtomicUsize::new(0));
    let completion = IterConcur::new(vec![1, 2, 3, 4]).run({
        let settled = Arc::clone(&settled);
        move |value| {
            let settled = Arc::clone(&settled);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                settled.fetch_add(1, Ordering::SeqCst);
                if value == 2 {
                    Err("handler blew up".into())
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    });
    assert!(completion.await.is_err());
    // every started invocation ran to settlement
    assert_eq!(settled.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_stream_concur_production_not_blocked_by_handlers() {
    // each pull takes 10ms, each handler 40ms; awaiting the handler between
    // pulls would cost around 200ms
    let source = stream::iter(0..4).then(|value| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        value
    });
    let started = Instant::now();
    StreamConcur::new(source)
        .run(|_value| {
            async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
}

#[tokio::test]
async fn test_combinators_compose() -> eyre::Result<()> {
    let transformed = IterConcur::new(1..=6)
        .filter(|value| value % 2 == 0)
        .map(|value| value * 10)
        .then(|value| async move { Ok(value + 1) });
    let total = reduce_concur(&sum_reducer(), transformed).await?;
    assert_eq!(total, 21 + 41 + 61);
    Ok(())
}

#[tokio::test]
async fn test_into_stream_drains_values_before_failure() {
    let items: Vec<DynResult<i32>> = vec![Ok(1), Ok(2), Err("producer died".into())];
    let collected: Vec<_> = IterConcur::fallible(items).into_stream().collect().await;
    assert_eq!(collected.len(), 3);
    assert_matches!(collected[0], Ok(1));
    assert_matches!(collected[1], Ok(2));
    assert!(collected[2].is_err());
}

#[tokio::test]
async fn test_reduce_concur_sums() -> eyre::Result<()> {
    let total = reduce_concur(&sum_reducer(), IterConcur::new(vec![1, 2, 3])).await?;
    assert_eq!(total, 6);
    Ok(())
}

#[tokio::test]
async fn test_reduce_concur_surfaces_production_failure() {
    let items: Vec<DynResult<i32>> = vec![Ok(1), Ok(2), Err("producer died".into())];
    let result = reduce_concur(&sum_reducer(), IterConcur::fallible(items)).await;
    assert_matches!(result, Err(Error::Source(_)));
}
