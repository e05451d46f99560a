//! End-to-end dispatch against both reference hosts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use glam::Vec3;
use parking_lot::Mutex;
use worldspace_common::{Location, Owner, Ticks};
use worldspace_dispatch::{
    DispatchConfig, DispatchError, Dispatcher, FallbackExecutor, HandleKind, HostEnvironment,
    ModelCell, REGION_MARKER, RegionizedStrategy, RetiredEntityPolicy, TaskError, TaskId,
    ThreadingModel,
};

use crate::{RegionConfig, SimEntity, SimHost};

fn owner() -> Owner {
    Owner::new("scenario")
}

fn at(x: f32) -> Location {
    Location::new("overworld", Vec3::new(x, 64.0, 0.0))
}

fn main_host() -> (SimHost, Dispatcher) {
    let host = SimHost::main_thread();
    let model = ModelCell::new().get_or_detect(&host, REGION_MARKER);
    let dispatcher = Dispatcher::for_model(model, &host, DispatchConfig::default()).unwrap();
    (host, dispatcher)
}

fn region_host(config: DispatchConfig) -> (SimHost, Dispatcher) {
    let host = SimHost::regionized(RegionConfig::default()).unwrap();
    let model = ModelCell::new().get_or_detect(&host, REGION_MARKER);
    let dispatcher = Dispatcher::for_model(model, &host, config).unwrap();
    (host, dispatcher)
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Clone + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let bump = {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    };
    (count, bump)
}

#[test]
fn hosts_are_detected_by_marker() {
    let cell = ModelCell::new();
    assert_eq!(
        cell.get_or_detect(&SimHost::main_thread(), REGION_MARKER),
        ThreadingModel::MainThread
    );
    // The first answer sticks for the life of the cell.
    let regions = SimHost::regionized(RegionConfig::default()).unwrap();
    assert_eq!(
        cell.get_or_detect(&regions, REGION_MARKER),
        ThreadingModel::MainThread
    );

    let fresh = ModelCell::new();
    assert_eq!(
        fresh.get_or_detect(&regions, REGION_MARKER),
        ThreadingModel::Regionized
    );
}

#[test]
fn main_thread_delayed_task_has_native_handle() {
    let (host, dispatcher) = main_host();
    let (count, bump) = counter();

    let handle = dispatcher.run_delayed(&owner(), bump, Ticks(3)).unwrap();
    assert_eq!(handle.kind(), HandleKind::Native);
    assert!(handle.id().is_known());
    assert_eq!(handle.owner().map(|o| o.name().to_string()).as_deref(), Some("scenario"));
    assert!(handle.is_sync());

    host.ticks(2);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    host.tick();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn regionized_delayed_task_has_adapted_handle() {
    let (host, dispatcher) = region_host(DispatchConfig::default());
    let (count, bump) = counter();

    let handle = dispatcher.run_delayed(&owner(), bump, Ticks(5)).unwrap();
    assert_eq!(handle.kind(), HandleKind::Adapted);
    assert_eq!(handle.id(), TaskId::UNKNOWN);
    assert_eq!(handle.owner().map(|o| o.name().to_string()).as_deref(), Some("scenario"));
    assert!(handle.is_sync());
    assert!(!handle.is_cancelled());

    host.ticks(4);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    host.tick();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn hidden_owner_leaves_adapted_owner_absent() {
    let config = RegionConfig {
        report_owners: false,
        ..RegionConfig::default()
    };
    let host = SimHost::regionized(config).unwrap();
    let dispatcher =
        Dispatcher::for_model(ThreadingModel::Regionized, &host, DispatchConfig::default())
            .unwrap();

    let handle = dispatcher.run_now(&owner(), || {}).unwrap();
    assert!(handle.owner().is_none());
    handle.cancel();
    assert!(handle.is_cancelled());
}

#[test]
fn cancelled_before_running_never_runs() {
    for (host, dispatcher) in [main_host(), region_host(DispatchConfig::default())] {
        let (count, bump) = counter();
        let handle = dispatcher.run_now(&owner(), bump).unwrap();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());

        host.ticks(2);
        assert_eq!(count.load(Ordering::SeqCst), 0, "{:?}", dispatcher.model());
        // Cancelling again is harmless.
        handle.cancel();
    }
}

#[test]
fn repeating_work_runs_each_period_under_both_models() {
    for (host, dispatcher) in [main_host(), region_host(DispatchConfig::default())] {
        let (count, bump) = counter();
        let handle = dispatcher
            .run_repeating(&owner(), bump, Ticks(1), Ticks(2))
            .unwrap();

        // Runs on ticks 1, 3 and 5.
        host.ticks(5);
        assert_eq!(count.load(Ordering::SeqCst), 3, "{:?}", dispatcher.model());

        handle.cancel();
        host.ticks(4);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

#[test]
fn main_thread_async_is_fire_and_forget() {
    let (_host, dispatcher) = main_host();
    let (tx, rx) = mpsc::channel();

    let handle = dispatcher
        .run_async_or_wait(&owner(), move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        })
        .unwrap();
    assert_eq!(handle.kind(), HandleKind::Native);
    assert!(!handle.is_sync());

    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name.as_deref(), Some("worldspace-tick-async"));
}

#[test]
fn regionized_async_blocks_until_done() {
    let (_host, dispatcher) = region_host(DispatchConfig::default());
    let seen = Arc::new(Mutex::new(None));

    let handle = {
        let seen = seen.clone();
        dispatcher
            .run_async_or_wait(&owner(), move || {
                thread::sleep(Duration::from_millis(20));
                *seen.lock() = thread::current().name().map(str::to_string);
            })
            .unwrap()
    };

    // No tick was needed: the call returned only after the work finished.
    assert_eq!(seen.lock().as_deref(), Some("worldspace-async"));
    assert_eq!(handle.kind(), HandleKind::Placeholder);
    assert_eq!(handle.id(), TaskId::UNKNOWN);
    assert!(handle.owner().is_none());
    assert!(!handle.is_sync());
    assert!(!handle.is_cancelled());
}

#[test]
fn regionized_dispatchers_share_one_fallback_pool() {
    let host = SimHost::regionized(RegionConfig::default()).unwrap();
    let server = host.regionized_server().unwrap();
    let renamed = DispatchConfig {
        async_thread_name: "renamed-async".to_string(),
        ..DispatchConfig::default()
    };

    let first = RegionizedStrategy::new(server.clone(), &DispatchConfig::default()).unwrap();
    let second = RegionizedStrategy::new(server, &renamed).unwrap();
    assert!(std::ptr::eq(first.executor(), second.executor()));
    assert!(std::ptr::eq(first.executor(), FallbackExecutor::shared("worldspace-async")));

    // Dispatchers come and go without leaving their own workers behind.
    for _ in 0..5 {
        let (_host, dispatcher) = region_host(renamed.clone());
        dispatcher.run_async_or_wait(&owner(), || {}).unwrap();
    }
    let name = Arc::new(Mutex::new(None));
    {
        let name = name.clone();
        let (_host, dispatcher) = region_host(renamed);
        dispatcher
            .run_async_or_wait(&owner(), move || {
                *name.lock() = thread::current().name().map(str::to_string);
            })
            .unwrap();
    }
    assert_eq!(name.lock().as_deref(), Some("worldspace-async"));
}

#[test]
fn huge_delays_do_not_overflow() {
    for (host, dispatcher) in [main_host(), region_host(DispatchConfig::default())] {
        host.tick();
        let (count, bump) = counter();
        dispatcher
            .run_delayed(&owner(), bump.clone(), Ticks(u64::MAX))
            .unwrap();
        dispatcher
            .run_repeating(&owner(), bump, Ticks(1), Ticks(u64::MAX))
            .unwrap();

        host.ticks(3);
        assert_eq!(count.load(Ordering::SeqCst), 1, "{:?}", dispatcher.model());
    }
}

#[test]
fn regionized_async_panic_is_reported() {
    let (_host, dispatcher) = region_host(DispatchConfig::default());
    let err = dispatcher
        .run_async_or_wait(&owner(), || panic!("async boom"))
        .err()
        .unwrap();
    assert!(matches!(err, DispatchError::AsyncTask(TaskError::Panicked(_))));
}

#[test]
fn call_and_await_delivers_value_under_both_models() {
    for (host, dispatcher) in [main_host(), region_host(DispatchConfig::default())] {
        let mut future = dispatcher.call_and_await(&owner(), || Ok(42)).unwrap();
        assert!(future.try_take().is_none());

        host.tick();
        assert_eq!(future.wait().unwrap(), 42, "{:?}", dispatcher.model());
    }
}

#[test]
fn call_and_await_surfaces_failures() {
    for (host, dispatcher) in [main_host(), region_host(DispatchConfig::default())] {
        let failed = dispatcher
            .call_and_await::<i32, _>(&owner(), || anyhow::bail!("no value"))
            .unwrap();
        let panicked = dispatcher
            .call_and_await::<i32, _>(&owner(), || panic!("supplier boom"))
            .unwrap();
        host.tick();

        match failed.wait() {
            Err(TaskError::Failed(err)) => assert_eq!(err.to_string(), "no value"),
            other => panic!("expected failure, got {:?}", other.err()),
        }
        match panicked.wait() {
            Err(TaskError::Panicked(message)) => assert!(message.contains("supplier boom")),
            other => panic!("expected panic, got {:?}", other.err()),
        }
    }
}

#[test]
fn location_and_entity_work_runs_now_on_main_thread() {
    let (host, dispatcher) = main_host();
    let (count, bump) = counter();
    let entity = SimEntity::detached(at(500.0));

    let a = dispatcher
        .run_at_location(&owner(), &at(500.0), bump.clone())
        .unwrap();
    let b = dispatcher.run_on_entity(&owner(), &*entity, bump).unwrap();
    assert_eq!(a.kind(), HandleKind::Native);
    assert_eq!(b.kind(), HandleKind::Native);
    assert_ne!(a.id(), b.id());

    host.tick();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn location_work_runs_on_owning_region_thread() {
    let (host, dispatcher) = region_host(DispatchConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    for x in [10.0, 300.0] {
        let seen = seen.clone();
        dispatcher
            .run_at_location(&owner(), &at(x), move || {
                seen.lock().push(thread::current().name().map(str::to_string));
            })
            .unwrap();
    }
    host.tick();

    let mut seen = seen.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        [
            Some("region-overworld[0,0]".to_string()),
            Some("region-overworld[2,0]".to_string()),
        ]
    );
}

#[test]
fn entity_work_is_dropped_when_entity_retires() {
    let (host, dispatcher) = region_host(DispatchConfig::default());
    let runtime = host.runtime().unwrap();
    let entity = runtime.spawn_entity(at(10.0));
    let (count, bump) = counter();

    dispatcher.run_on_entity(&owner(), &*entity, bump).unwrap();
    entity.retire();
    host.ticks(3);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    let err = dispatcher
        .run_on_entity(&owner(), &*entity, || {})
        .err()
        .unwrap();
    assert!(matches!(err, DispatchError::EntityRetired(id) if id == entity.id()));
}

#[test]
fn entity_work_moves_to_global_region_when_configured() {
    let config = DispatchConfig {
        retired_entity: RetiredEntityPolicy::Global,
        ..DispatchConfig::default()
    };
    let (host, dispatcher) = region_host(config);
    let runtime = host.runtime().unwrap();
    let entity = runtime.spawn_entity(at(10.0));
    let (count, bump) = counter();

    dispatcher
        .run_on_entity(&owner(), &*entity, bump.clone())
        .unwrap();
    entity.retire();
    host.ticks(3);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Already gone: scheduled straight onto the global region.
    dispatcher.run_on_entity(&owner(), &*entity, bump).unwrap();
    host.tick();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn explicit_retired_fallback_runs_instead() {
    let (host, dispatcher) = region_host(DispatchConfig::default());
    let entity = host.runtime().unwrap().spawn_entity(at(10.0));
    let (work, bump_work) = counter();
    let (fallback, bump_fallback) = counter();

    dispatcher
        .run_on_entity_or_else(&owner(), &*entity, bump_work, bump_fallback)
        .unwrap();
    entity.retire();
    host.ticks(2);

    assert_eq!(work.load(Ordering::SeqCst), 0);
    assert_eq!(fallback.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_backend_is_an_error() {
    let host = SimHost::main_thread();
    let err = Dispatcher::for_model(ThreadingModel::Regionized, &host, DispatchConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        DispatchError::BackendUnavailable(ThreadingModel::Regionized)
    ));
}

#[test]
fn shut_down_runtime_fails_binding() {
    let (host, dispatcher) = region_host(DispatchConfig::default());
    host.runtime().unwrap().shut_down();

    let err = dispatcher.run_now(&owner(), || {}).err().unwrap();
    assert!(matches!(err, DispatchError::Bind { .. }));
}
