// ABOUTME: Integration tests for the asynchronous operation engine.
// ABOUTME: Covers status transitions, waiters, cancellation, listing and reaping.

use quayd::error::{Error, ErrorKind};
use quayd::operation::{FnTask, OperationBody, OperationRegistry, Resources};
use quayd::status::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

fn registry() -> OperationRegistry {
    OperationRegistry::new(Duration::from_secs(5))
}

fn containers(names: &[&str]) -> Resources {
    let mut resources = Resources::new();
    resources.insert(
        "containers".into(),
        names.iter().map(|n| n.to_string()).collect(),
    );
    resources
}

#[tokio::test]
async fn new_operation_is_pending() {
    let ops = registry();
    let op = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();

    assert_eq!(op.status(), StatusCode::Pending);
    assert!(op.url().starts_with("/1.0/operations/"));
    assert_eq!(ops.get(op.id().as_str()).unwrap().id(), op.id());
}

#[tokio::test]
async fn successful_body_reaches_success() {
    let ops = registry();
    let op = ops
        .create(json!({}), containers(&["web"]), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();

    op.start().unwrap();
    let outcome = op.wait(Some(Duration::from_secs(5))).await.unwrap();

    assert_eq!(outcome.status, StatusCode::Success);
    assert_eq!(outcome.err, None);
    let view = op.view();
    assert_eq!(view.status, "Success");
    assert_eq!(view.err, "");
    assert_eq!(view.resources["containers"], vec!["/1.0/containers/web"]);
}

#[tokio::test]
async fn failing_body_reaches_failure_with_message() {
    let ops = registry();
    let op = ops
        .create(
            json!({"progress": 10}),
            Resources::new(),
            OperationBody::task(FnTask::new(|| async { Err(Error::internal("disk on fire")) })),
        )
        .unwrap();

    op.start().unwrap();
    let outcome = op.wait(None).await.unwrap();

    assert_eq!(outcome.status, StatusCode::Failure);
    assert_eq!(outcome.err.as_deref(), Some("disk on fire"));
    let view = op.view();
    assert_eq!(view.err, "disk on fire");
    assert_eq!(view.metadata["err"], "disk on fire");
    assert_eq!(view.metadata["progress"], 10);
}

#[tokio::test]
async fn operations_start_only_once() {
    let ops = registry();
    let op = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();

    ops.start(op.id().as_str()).unwrap();
    let err = ops.start(op.id().as_str()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn every_waiter_sees_the_same_outcome() {
    let ops = registry();
    let (release, gate) = oneshot::channel::<()>();
    let op = ops
        .create(
            json!({}),
            Resources::new(),
            OperationBody::task(FnTask::new(move || async move {
                let _ = gate.await;
                Ok(())
            })),
        )
        .unwrap();
    op.start().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let op = Arc::clone(&op);
            tokio::spawn(async move { op.wait(None).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.send(()).unwrap();

    for waiter in waiters {
        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome.status, StatusCode::Success);
    }
}

#[tokio::test]
async fn wait_times_out_while_running() {
    let ops = registry();
    let op = ops
        .create(
            json!({}),
            Resources::new(),
            OperationBody::task(FnTask::new(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })),
        )
        .unwrap();
    op.start().unwrap();

    assert_eq!(op.wait(Some(Duration::from_millis(30))).await, None);
    assert_eq!(op.status(), StatusCode::Running);
}

#[tokio::test]
async fn wait_after_completion_returns_immediately() {
    let ops = registry();
    let op = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();
    op.start().unwrap();
    op.wait(None).await.unwrap();

    let again = op.wait(Some(Duration::from_millis(1))).await.unwrap();
    assert_eq!(again.status, StatusCode::Success);
}

#[tokio::test]
async fn cancellable_operation_ends_cancelled() {
    let ops = registry();
    let hook_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&hook_ran);
    let task = FnTask::new(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    })
    .with_cancel(move || {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }
    });
    let op = ops
        .create(json!({}), Resources::new(), OperationBody::task(task))
        .unwrap();
    op.start().unwrap();
    assert!(op.may_cancel());

    ops.cancel(op.id().as_str()).await.unwrap();

    assert!(hook_ran.load(Ordering::SeqCst));
    assert_eq!(op.status(), StatusCode::Cancelled);
    assert!(!op.may_cancel());
    let outcome = op.wait(Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(outcome.status, StatusCode::Cancelled);
}

#[tokio::test]
async fn operation_without_hook_is_not_cancellable() {
    let ops = registry();
    let op = ops
        .create(
            json!({}),
            Resources::new(),
            OperationBody::task(FnTask::new(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })),
        )
        .unwrap();
    op.start().unwrap();

    assert!(!op.may_cancel());
    let err = op.cancel().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(op.status(), StatusCode::Running);
}

#[tokio::test]
async fn operation_without_hook_is_not_cancellable_in_any_status() {
    let ops = registry();
    let op = ops
        .create(
            json!({}),
            Resources::new(),
            OperationBody::task(FnTask::new(|| async { Ok(()) })),
        )
        .unwrap();

    let err = op.cancel().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(op.status(), StatusCode::Pending);

    op.start().unwrap();
    let outcome = op.wait(Some(Duration::from_secs(5))).await.unwrap();
    assert_eq!(outcome.status, StatusCode::Success);

    let err = ops.cancel(op.id().as_str()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(op.status(), StatusCode::Success);
}

#[tokio::test]
async fn cancelling_a_finished_operation_conflicts() {
    let ops = registry();
    let task = FnTask::new(|| async { Ok(()) }).with_cancel(|| async { Ok(()) });
    let op = ops
        .create(json!({}), Resources::new(), OperationBody::task(task))
        .unwrap();
    op.start().unwrap();
    op.wait(None).await.unwrap();

    let err = op.cancel().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(op.status(), StatusCode::Success);
}

#[tokio::test]
async fn failed_cancel_hook_leaves_operation_running() {
    let ops = registry();
    let task = FnTask::new(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    })
    .with_cancel(|| async { Err(Error::internal("refused")) });
    let op = ops
        .create(json!({}), Resources::new(), OperationBody::task(task))
        .unwrap();
    op.start().unwrap();

    assert!(op.cancel().await.is_err());
    assert_eq!(op.status(), StatusCode::Running);
}

#[tokio::test]
async fn unknown_operation_is_not_found() {
    let ops = registry();
    let err = ops.get("0d9f3b7e-0000-4000-8000-000000000000").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn list_groups_by_status() {
    let ops = registry();
    let pending = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();
    let done = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();
    done.start().unwrap();
    done.wait(None).await.unwrap();

    let listing = ops.list();
    assert_eq!(listing["pending"], vec![pending.url()]);
    assert_eq!(listing["success"], vec![done.url()]);
    assert!(!listing.contains_key("running"));
}

#[tokio::test]
async fn reap_drops_only_expired_terminal_operations() {
    let ops = OperationRegistry::new(Duration::ZERO);
    let running = ops
        .create(
            json!({}),
            Resources::new(),
            OperationBody::task(FnTask::new(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })),
        )
        .unwrap();
    running.start().unwrap();
    let done = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();
    done.start().unwrap();
    done.wait(None).await.unwrap();

    assert_eq!(ops.reap(), 1);
    assert!(ops.get(done.id().as_str()).is_err());
    assert!(ops.get(running.id().as_str()).is_ok());
}

#[tokio::test]
async fn retention_keeps_recent_operations() {
    let ops = registry();
    let done = ops
        .create(json!({}), Resources::new(), OperationBody::task(FnTask::new(|| async { Ok(()) })))
        .unwrap();
    done.start().unwrap();
    done.wait(None).await.unwrap();

    assert_eq!(ops.reap(), 0);
    assert!(ops.get(done.id().as_str()).is_ok());
}
