use super::*;
use crate::testonly;
use assert_matches::assert_matches;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

fn sleep_ms(ms: u64) {
    thread::sleep(std::time::Duration::from_millis(ms));
}

/// Completes `promise` with `res` from a background thread after `ms` milliseconds.
fn complete_after<T: 'static + Send + Sync>(ms: u64, promise: Promise<T>, res: Outcome<T>) {
    thread::spawn(move || {
        sleep_ms(ms);
        promise.complete(res);
    });
}

fn failure(msg: &'static str) -> Error {
    anyhow::format_err!(msg).into()
}

#[test]
fn join_blocks_until_success() {
    testonly::abort_on_panic();
    let p = Promise::new();
    let f = p.future();
    assert!(!f.is_completed());
    complete_after(100, p, Ok(true));
    assert!(f.join().unwrap());
    assert!(f.is_completed());
}

#[test]
fn all_waiters_observe_the_same_outcome() {
    testonly::abort_on_panic();
    let p = Promise::<i32>::new();
    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let f = p.future();
            thread::spawn(move || f.join())
        })
        .collect();
    sleep_ms(20);
    assert!(p.success(7));
    for w in waiters {
        assert_eq!(7, w.join().unwrap().unwrap());
    }
}

#[test]
fn second_completion_is_ignored() {
    testonly::abort_on_panic();
    let p = Promise::new();
    assert!(p.success(1));
    assert!(!p.success(2));
    assert!(!p.failure(anyhow::format_err!("too late")));
    assert_eq!(1, p.future().join().unwrap());
    assert_eq!(Some(1), p.future().try_get().map(Result::unwrap));
}

#[test]
fn dropped_promise_breaks_the_future() {
    testonly::abort_on_panic();
    let p = Promise::<u8>::new();
    let f = p.future();
    assert!(f.try_get().is_none());
    drop(p);
    assert_matches!(f.join(), Err(Error::Broken));
}

#[test]
fn get_times_out_without_poisoning_the_future() {
    testonly::abort_on_panic();
    let p = Promise::new();
    let f = p.future();
    complete_after(200, p, Ok(true));
    let err = f.get(time::Duration::milliseconds(50)).unwrap_err();
    assert_matches!(err, Error::Timeout);
    assert!(err.to_string().contains("timeout"));
    assert!(f.join().unwrap());
    assert!(f.get(time::Duration::ZERO).unwrap());
}

#[test]
fn transform_chain() {
    testonly::abort_on_panic();
    let p = Promise::<i32>::new();
    let f = p
        .future()
        .map(|v| Ok(v + 1))
        .flat_map(|v| Ok(Future::ready(Ok(v + 1))))
        .recover(|| Ok(5));
    complete_after(100, p, Ok(1));
    assert_eq!(3, f.get(time::Duration::seconds(5)).unwrap());
    assert_eq!(3, f.join().unwrap());
}

#[test]
fn map_propagates_failure_without_calling_f() {
    testonly::abort_on_panic();
    let called = Arc::new(AtomicBool::new(false));
    let f = Future::<i32>::ready(Err(failure("source failed"))).map({
        let called = called.clone();
        move |v| {
            called.store(true, Ordering::SeqCst);
            Ok(v)
        }
    });
    let err = f.join().unwrap_err();
    assert_eq!("source failed", err.to_string());
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn map_fails_with_error_of_f() {
    testonly::abort_on_panic();
    let f = Future::ready(Ok(1)).map(|v: i32| -> anyhow::Result<i32> {
        anyhow::bail!("cannot map {v}")
    });
    assert_matches!(f.join(), Err(Error::Failure(err)) if err.to_string() == "cannot map 1");
}

#[test]
fn flat_map_adopts_continuation_outcome() {
    testonly::abort_on_panic();
    let next = Promise::<i32>::new();
    let f = Future::ready(Ok(1)).flat_map({
        let next = next.future();
        move |_| Ok(next)
    });
    complete_after(50, next, Err(failure("continuation failed")));
    assert_eq!("continuation failed", f.join().unwrap_err().to_string());

    let called = Arc::new(AtomicBool::new(false));
    let f = Future::<i32>::ready(Err(Error::Timeout)).flat_map({
        let called = called.clone();
        move |v| {
            called.store(true, Ordering::SeqCst);
            Ok(Future::ready(Ok(v)))
        }
    });
    assert_matches!(f.join(), Err(Error::Timeout));
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn recover_passes_value_through() {
    testonly::abort_on_panic();
    let f = Future::ready(Ok(4)).recover(|| panic!("recover must not be called"));
    assert_eq!(4, f.join().unwrap());
}

#[test]
fn recover_replaces_failure() {
    testonly::abort_on_panic();
    let f = Future::ready(Err(failure("boom"))).recover(|| Ok(5));
    assert_eq!(5, f.join().unwrap());

    let f = Future::<i32>::ready(Err(failure("boom")))
        .recover(|| Err(anyhow::format_err!("recovery failed")));
    assert_eq!("recovery failed", f.join().unwrap_err().to_string());
}

#[test]
fn recover_with_alternative() {
    testonly::abort_on_panic();
    let p1 = Promise::<i32>::new();
    let p2 = Promise::new();
    let f = p1.future().recover_with(p2.future());
    thread::spawn(move || {
        sleep_ms(100);
        p1.failure(anyhow::format_err!("Future error"));
        sleep_ms(200);
        p2.success(2);
    });
    assert_eq!(2, f.join().unwrap());

    let f = Future::ready(Ok(1)).recover_with(Future::ready(Ok(2)));
    assert_eq!(1, f.join().unwrap());
}

#[test]
fn panic_in_closure_fails_the_future() {
    // Expects a panic, so no abort_on_panic().
    let f = Future::ready(Ok(1)).map(|_: i32| -> anyhow::Result<i32> { panic!("boom") });
    assert_matches!(f.join(), Err(Error::Panicked(msg)) if msg == "boom");
}

#[test]
fn seq_preserves_input_order() {
    testonly::abort_on_panic();
    let ps: Vec<_> = (0..3).map(|_| Promise::<i32>::new()).collect();
    let f = seq(ps.iter().map(Promise::future));
    let mut ps = ps.into_iter();
    let (p1, p2, p3) = (ps.next().unwrap(), ps.next().unwrap(), ps.next().unwrap());
    // Complete in the reverse order.
    complete_after(300, p1, Ok(1));
    complete_after(200, p2, Ok(2));
    complete_after(100, p3, Ok(3));
    assert_eq!(vec![1, 2, 3], f.join().unwrap());
}

#[test]
fn seq_fails_with_first_failure_in_input_order() {
    testonly::abort_on_panic();
    let p1 = Promise::<i32>::new();
    let p2 = Promise::new();
    let p3 = Promise::new();
    let f = seq([p1.future(), p2.future(), p3.future()]);
    complete_after(50, p3, Err(failure("third")));
    complete_after(100, p2, Ok(2));
    complete_after(200, p1, Err(failure("first")));
    assert_eq!("first", f.join().unwrap_err().to_string());
}

#[test]
fn seq_of_nothing() {
    assert_eq!(Vec::<u8>::new(), seq(Vec::<Future<u8>>::new()).join().unwrap());
}

#[test]
fn first_completed_of_timeout() {
    testonly::abort_on_panic();
    let p = Promise::<bool>::new();
    let f = p.future();
    complete_after(1000, p, Ok(true));
    let start = Instant::now();
    let res = first_completed_of([f.clone(), timeout(time::Duration::milliseconds(100))]).join();
    assert_matches!(res, Err(Error::Timeout));
    assert!(start.elapsed() < std::time::Duration::from_millis(900));
    // The slow future was not canceled.
    assert!(f.join().unwrap());
}

#[test]
fn first_completed_of_timer() {
    testonly::abort_on_panic();
    let p = Promise::<()>::new();
    let slow = p.future().map(|()| Ok("slow"));
    complete_after(1000, p, Ok(()));
    let fast = timer(time::Duration::milliseconds(50)).map(|()| Ok("timer"));
    assert_eq!("timer", first_completed_of([slow, fast]).join().unwrap());
}

#[test]
fn first_completed_of_failure() {
    testonly::abort_on_panic();
    let p = Promise::<i32>::new();
    let f = first_completed_of([p.future(), Future::ready(Err(failure("failed first")))]);
    assert_eq!("failed first", f.join().unwrap_err().to_string());
    assert!(p.success(1));
}

#[test]
fn first_completed_of_nothing() {
    let f = first_completed_of(Vec::<Future<u8>>::new());
    assert_matches!(f.try_get(), Some(Err(Error::Failure(_))));
}

#[test]
fn timer_with_negative_duration_fires_immediately() {
    testonly::abort_on_panic();
    let start = Instant::now();
    timer(-time::Duration::SECOND).join().unwrap();
    assert!(start.elapsed() < std::time::Duration::from_secs(1));
}

#[test]
fn long_chain() {
    testonly::abort_on_panic();
    let _guard = testonly::set_timeout(time::Duration::seconds(20));
    let p = Promise::<u32>::new();
    let mut f = p.future();
    for _ in 0..200 {
        f = f.map(|v| Ok(v + 1));
    }
    p.success(0);
    assert_eq!(200, f.join().unwrap());
}
