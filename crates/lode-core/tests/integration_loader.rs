//! Integration tests: full sessions over scripted and HTTP transports.
//!
//! Covers the batch scenarios (all succeed, partial failure, empty start,
//! serialized cap), the pool-conservation and progress invariants observed
//! through the watch channel, populated files, abort, and an end-to-end run
//! against a local HTTP server.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lode_core::config::LoaderConfig;
use lode_core::error::LoaderError;
use lode_core::file::FileState;
use lode_core::loader::Loader;
use lode_core::transport::{HttpTransport, TransferError};

use common::scripted::{Script, ScriptedTransport};

fn loader_with(transport: &ScriptedTransport, cap: usize) -> Loader {
    let cfg = LoaderConfig {
        max_parallel_downloads: cap,
        ..LoaderConfig::default()
    };
    Loader::new(Arc::new(transport.clone()), cfg)
}

#[tokio::test]
async fn all_files_succeed_and_pools_empty() {
    let transport = ScriptedTransport::new();
    transport.script("a.png", Script::Deliver(vec![1]));
    transport.script("b.png", Script::Deliver(vec![2, 2]));
    transport.script("c.png", Script::Deliver(vec![3, 3, 3]));

    let mut loader = loader_with(&transport, 2);
    let handles = vec![
        loader.image("a", "a.png").unwrap(),
        loader.image("b", "b.png").unwrap(),
        loader.image("c", "c.png").unwrap(),
    ];

    let summary = loader.start().await.expect("session");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    for handle in handles {
        let file = handle.await.expect("fulfilled");
        assert_eq!(file.state(), FileState::Complete);
        assert!(file.data.is_some());
    }

    assert_eq!(loader.progress(), 1.0);
    assert!(loader.is_ready());
    let counts = loader.counts();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.in_flight, 0);
    assert_eq!(counts.succeeded, 0);
    assert_eq!(counts.failed, 0);
}

#[tokio::test]
async fn one_failure_does_not_abort_the_batch() {
    let transport = ScriptedTransport::new();
    for name in ["a", "b", "d", "e"] {
        transport.script(&format!("{}.png", name), Script::Deliver(vec![1]));
    }
    transport.script("c.png", Script::Fail(500));

    let mut loader = loader_with(&transport, 2);
    let mut handles = Vec::new();
    for name in ["a", "b", "c", "d", "e"] {
        handles.push(loader.image(name, &format!("{}.png", name)).unwrap());
    }

    let summary = loader.start().await.expect("session completes despite failure");
    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert!(loader.is_ready());

    let mut rejected = 0;
    for handle in handles {
        match handle.await {
            Ok(file) => assert_eq!(file.state(), FileState::Complete),
            Err(failure) => {
                rejected += 1;
                assert_eq!(failure.key, "c");
                assert_eq!(failure.url, "c.png");
                assert_eq!(failure.state, FileState::Failed);
                assert!(matches!(failure.error, TransferError::Http(500)));
            }
        }
    }
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn empty_start_completes_immediately() {
    let transport = ScriptedTransport::new();
    let mut loader = loader_with(&transport, 2);

    let summary = loader.start().await.expect("degenerate session");
    assert_eq!(summary.total, 0);
    assert_eq!(loader.progress(), 1.0);
    assert!(loader.is_ready());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn cap_of_one_serializes_transfers() {
    let transport = ScriptedTransport::with_delay(Duration::from_millis(30));
    transport.script("a.png", Script::Deliver(vec![1]));
    transport.script("b.png", Script::Deliver(vec![2]));

    let mut loader = loader_with(&transport, 1);
    let first = loader.image("a", "a.png").unwrap();
    let second = loader.image("b", "b.png").unwrap();

    loader.start().await.expect("session");
    assert_eq!(transport.max_concurrent(), 1);
    assert!(first.await.is_ok());
    assert!(second.await.is_ok());
}

#[tokio::test]
async fn in_flight_never_exceeds_the_cap() {
    let transport = ScriptedTransport::with_delay(Duration::from_millis(20));
    for i in 0..8 {
        transport.script(&format!("{}.bin", i), Script::Deliver(vec![i as u8]));
    }

    let mut loader = loader_with(&transport, 3);
    for i in 0..8 {
        loader.register(&format!("{}", i), &format!("{}.bin", i)).unwrap();
    }

    loader.start().await.expect("session");
    assert_eq!(transport.calls(), 8);
    assert!(transport.max_concurrent() <= 3);
}

#[tokio::test]
async fn pool_counts_are_conserved_and_progress_is_monotonic() {
    let transport = ScriptedTransport::with_delay(Duration::from_millis(5));
    for i in 0..6 {
        let script = if i == 2 {
            Script::Fail(503)
        } else {
            Script::Deliver(vec![i as u8])
        };
        transport.script(&format!("{}.bin", i), script);
    }

    let mut loader = loader_with(&transport, 2);
    for i in 0..6 {
        loader.register(&format!("{}", i), &format!("{}.bin", i)).unwrap();
    }

    let mut rx = loader.subscribe_progress();
    let observe = async {
        let mut snapshots = Vec::new();
        loop {
            rx.changed().await.expect("loader alive");
            let snapshot = *rx.borrow();
            snapshots.push(snapshot);
            if snapshot.total > 0 && snapshot.settled() == snapshot.total {
                break;
            }
        }
        snapshots
    };

    let (summary, snapshots) = tokio::join!(loader.start(), observe);
    let summary = summary.expect("session");
    assert_eq!(summary.total, 6);

    let mut last_fraction = 0.0_f64;
    for snapshot in snapshots {
        assert_eq!(
            snapshot.pending + snapshot.in_flight + snapshot.succeeded + snapshot.failed,
            snapshot.total,
            "pool conservation violated: {:?}",
            snapshot
        );
        assert!(snapshot.fraction() >= last_fraction, "progress went backwards");
        last_fraction = snapshot.fraction();
    }
    assert_eq!(last_fraction, 1.0);
}

#[tokio::test]
async fn populated_files_complete_without_the_transport() {
    let transport = ScriptedTransport::new();
    transport.script("a.png", Script::Deliver(vec![1]));

    let mut loader = loader_with(&transport, 2);
    let fetched = loader.image("a", "a.png").unwrap();
    let canned = loader.add_populated("atlas", "binary", vec![9, 9, 9]).unwrap();

    let summary = loader.start().await.expect("session");
    assert_eq!(summary.succeeded, 2);
    assert_eq!(transport.calls(), 1);

    let atlas = canned.await.expect("populated file fulfills");
    assert_eq!(atlas.data.as_deref(), Some(&[9u8, 9, 9][..]));
    assert!(fetched.await.is_ok());
}

#[tokio::test]
async fn abort_settles_every_outstanding_handle() {
    let transport = ScriptedTransport::with_delay(Duration::from_millis(100));
    for i in 0..4 {
        transport.script(&format!("{}.bin", i), Script::Deliver(vec![i as u8]));
    }

    let mut loader = loader_with(&transport, 1);
    let mut handles = Vec::new();
    for i in 0..4 {
        handles.push(loader.register(&format!("{}", i), &format!("{}.bin", i)).unwrap());
    }

    let control = loader.control();
    let abort = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        control.request_abort();
    };

    let (outcome, ()) = tokio::join!(loader.start(), abort);
    assert!(matches!(outcome, Err(LoaderError::Aborted)));
    assert!(!loader.is_ready());

    let mut fulfilled = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await {
            Ok(_) => fulfilled += 1,
            Err(failure) => {
                rejected += 1;
                assert!(matches!(failure.error, TransferError::Aborted));
            }
        }
    }
    assert_eq!(fulfilled + rejected, 4);
    assert!(rejected >= 2, "abandoned files must be rejected");

    // A shut-down loader refuses another session.
    assert!(matches!(
        loader.start().await,
        Err(LoaderError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn a_complete_loader_can_run_another_session() {
    let transport = ScriptedTransport::new();
    transport.script("a.png", Script::Deliver(vec![1]));
    transport.script("b.png", Script::Deliver(vec![2]));

    let mut loader = loader_with(&transport, 2);
    let first = loader.image("a", "a.png").unwrap();
    assert_eq!(loader.start().await.unwrap().succeeded, 1);
    assert!(first.await.is_ok());

    let second = loader.image("b", "b.png").unwrap();
    let summary = loader.start().await.expect("second session");
    assert_eq!(summary.total, 1);
    assert_eq!(summary.succeeded, 1);
    assert!(second.await.is_ok());
}

#[tokio::test]
async fn http_transport_end_to_end() {
    let mut routes = HashMap::new();
    routes.insert("/assets/a.bin".to_string(), b"alpha".to_vec());
    routes.insert("/assets/b.bin".to_string(), b"beta".to_vec());
    let base = common::server::start(routes);

    let mut loader = Loader::new(Arc::new(HttpTransport::default()), LoaderConfig::default());
    loader.set_base_url(&base).unwrap();
    loader.set_path("assets").unwrap();

    let a = loader.register("a", "a.bin").unwrap();
    let b = loader.register("b", "b.bin").unwrap();
    let missing = loader.register("m", "missing.bin").unwrap();

    let summary = loader.start().await.expect("session");
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    assert_eq!(a.await.unwrap().data.as_deref(), Some(&b"alpha"[..]));
    assert_eq!(b.await.unwrap().data.as_deref(), Some(&b"beta"[..]));
    let failure = missing.await.unwrap_err();
    assert!(matches!(failure.error, TransferError::Http(404)));
}
