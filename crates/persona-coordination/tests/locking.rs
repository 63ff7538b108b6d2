//! Cross-thread lock-count behavior of the proxy coordinator

#![allow(clippy::unwrap_used)]

use persona_coordination::ProxyCoordinator;
use persona_core::{CoordinatorConfig, Proxy, SharedProxy};
use persona_testkit::db_proxy_class;
use proptest::prelude::*;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn stored(coordinator: &ProxyCoordinator) -> SharedProxy {
    let handle = Proxy::shared(&db_proxy_class());
    coordinator.store(handle.clone());
    handle
}

#[test]
fn three_locks_need_three_unlocks() {
    let coordinator = ProxyCoordinator::default();
    let p = stored(&coordinator);
    for _ in 0..3 {
        assert!(coordinator.lock(&p, false, None));
    }
    assert_eq!(coordinator.lock_count(p.id()), 3);
    for remaining in (0..3).rev() {
        assert!(coordinator.unlock(p.id(), false));
        assert_eq!(coordinator.lock_count(p.id()), remaining);
    }
    assert!(!coordinator.is_locked(p.id()));
}

#[test]
fn blocked_reader_wakes_after_unlock_all() {
    let coordinator = Arc::new(ProxyCoordinator::default());
    let p = stored(&coordinator);
    coordinator.lock(&p, false, None);

    let (tx, rx) = mpsc::channel();
    let reader = {
        let coordinator = Arc::clone(&coordinator);
        let id = p.id();
        thread::spawn(move || {
            let current = coordinator.current_of(id);
            tx.send(current.map(|handle| handle.id())).unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert!(coordinator.unlock(p.id(), true));
    let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(seen, Some(p.id()));
    reader.join().unwrap();
}

#[test]
fn reader_sees_version_stored_during_lock() {
    let coordinator = Arc::new(ProxyCoordinator::default());
    let p1 = stored(&coordinator);
    coordinator.lock(&p1, false, None);

    let reader = {
        let coordinator = Arc::clone(&coordinator);
        let id = p1.id();
        thread::spawn(move || coordinator.current_of(id))
    };

    let mut next = Proxy::instantiate(&db_proxy_class());
    next.adopt_identity(p1.id());
    let p2 = Arc::new(next);
    thread::sleep(Duration::from_millis(20));
    coordinator.store(p2.clone());
    coordinator.unlock(p1.id(), false);

    let seen = reader.join().unwrap().unwrap();
    assert!(Arc::ptr_eq(&seen, &p2));
}

#[test]
fn blocking_lock_returns_once_other_thread_unlocks() {
    let coordinator = Arc::new(ProxyCoordinator::default());
    let p = stored(&coordinator);

    let (locked_tx, locked_rx) = mpsc::channel();
    let locker = {
        let coordinator = Arc::clone(&coordinator);
        let p = p.clone();
        thread::spawn(move || {
            locked_tx.send(()).unwrap();
            coordinator.lock(&p, true, Some(Duration::from_secs(5)))
        })
    };

    locked_rx.recv().unwrap();
    while !coordinator.is_locked(p.id()) {
        thread::yield_now();
    }
    assert!(coordinator.unlock(p.id(), true));
    assert!(locker.join().unwrap());
}

#[test]
fn zero_timeout_waits_for_unlock() {
    let coordinator = Arc::new(ProxyCoordinator::default());
    let p = stored(&coordinator);
    coordinator.lock(&p, false, None);

    let locker = {
        let coordinator = Arc::clone(&coordinator);
        let p = p.clone();
        thread::spawn(move || coordinator.lock(&p, true, Some(Duration::ZERO)))
    };
    while coordinator.lock_count(p.id()) < 2 {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(20));
    assert!(!locker.is_finished());

    assert!(coordinator.unlock(p.id(), true));
    assert!(locker.join().unwrap());
}

#[test]
fn delete_wakes_blocked_readers() {
    let coordinator = Arc::new(ProxyCoordinator::default());
    let p = stored(&coordinator);
    coordinator.lock(&p, false, None);

    let reader = {
        let coordinator = Arc::clone(&coordinator);
        let id = p.id();
        thread::spawn(move || coordinator.current_of(id))
    };
    thread::sleep(Duration::from_millis(20));
    assert!(coordinator.delete(p.id()).is_some());
    assert!(reader.join().unwrap().is_none());
    assert!(!coordinator.contains(p.id()));
}

#[test]
fn default_timeout_comes_from_config() {
    let coordinator = ProxyCoordinator::new(CoordinatorConfig {
        default_lock_timeout_ms: 10,
    });
    let p = stored(&coordinator);
    assert!(!coordinator.lock_default(&p, true));
    assert!(coordinator.lock_default(&p, false));
    assert_eq!(coordinator.lock_count(p.id()), 2);
}

proptest! {
    #[test]
    fn lock_count_never_goes_negative(steps in proptest::collection::vec(0u8..3, 0..64)) {
        let coordinator = ProxyCoordinator::default();
        let p = stored(&coordinator);
        let mut expected = 0usize;
        for step in steps {
            match step {
                0 => {
                    coordinator.lock(&p, false, None);
                    expected += 1;
                }
                1 => {
                    let released = coordinator.unlock(p.id(), false);
                    prop_assert_eq!(released, expected > 0);
                    expected = expected.saturating_sub(1);
                }
                _ => {
                    let released = coordinator.unlock(p.id(), true);
                    prop_assert_eq!(released, expected > 0);
                    expected = 0;
                }
            }
            prop_assert_eq!(coordinator.lock_count(p.id()), expected);
            prop_assert_eq!(coordinator.is_locked(p.id()), expected > 0);
        }
    }
}
