//! Tests for worker thread utilities

use prometheus_fanout::runtime::{spawn_plain, spawn_worker};
use std::time::Duration;

#[test]
fn test_spawn_worker_drives_async_work() {
    let handle = spawn_worker("unit-worker".to_string(), 256 * 1024, |rt| {
        rt.block_on(async {
            let (tx, rx) = tokio::sync::oneshot::channel();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                tx.send(123).unwrap();
            });
            rx.await.expect("oneshot result")
        })
    })
    .expect("spawn worker");

    assert_eq!(handle.join().unwrap(), 123);
}

#[test]
fn test_spawn_plain_names_thread() {
    let handle = spawn_plain("unit-plain".to_string(), 128 * 1024, || {
        std::thread::current().name().map(str::to_string)
    })
    .expect("spawn thread");

    assert_eq!(handle.join().unwrap().as_deref(), Some("unit-plain"));
}
