//! Handle ownership and release order.

mod common;

use common::*;
use evtlog::prelude::*;
use evtlog::{EvtApi, HandleKind, Misuse};

#[test]
fn close_is_idempotent() {
    let sim = sim_with_application(3);
    let log = event_log(&sim, 8);
    let context = log.render_context(RenderContextKind::System).unwrap();
    let mut handle = evtlog::Handle::new(
        log.api().clone(),
        context.raw().unwrap(),
        HandleKind::RenderContext,
    );
    std::mem::forget(context);

    handle.close();
    handle.close();
    assert!(handle.is_closed());
    drop(handle);

    assert_eq!(sim.close_calls(), 1);
    assert_eq!(sim.open_handles(), 0);
    assert!(sim.misuse().is_empty());
}

#[test]
fn consuming_close_releases_once() {
    let sim = sim_with_application(3);
    let log = event_log(&sim, 8);
    let result_set = log
        .query(None, "Application", "*", QueryFlags::CHANNEL_PATH)
        .unwrap();
    result_set.close();
    assert_eq!(sim.close_calls(), 1);
    assert!(sim.misuse().is_empty());
}

#[test]
fn closed_handle_reports_its_kind() {
    let sim = sim_with_application(0);
    let log = event_log(&sim, 8);
    let mut handle = evtlog::Handle::null(log.api().clone(), HandleKind::Session);
    handle.close();
    let err = evtlog::Error::from(handle.raw().unwrap_err());
    assert!(matches!(err, evtlog::Error::HandleClosed("session")));
}

#[test]
fn scoped_release_is_children_first() {
    let sim = sim_with_application(10);
    let log = event_log(&sim, 4);
    {
        let session = log.open_session("collector01").unwrap();
        let result_set = log
            .query(Some(&session), "Application", "*", QueryFlags::CHANNEL_PATH)
            .unwrap();
        let first = log.next(&result_set).unwrap();
        let second = log.next(&result_set).unwrap();
        assert_eq!(sim.open_events(), 8);
        drop(first);
        assert_eq!(sim.open_events(), 4);
        let _keep = second;
        // Locals drop in reverse order: batch, result set, session.
    }
    assert_eq!(sim.open_handles(), 0);
    assert!(sim.misuse().is_empty());
}

#[test]
fn explicit_close_in_order_is_clean() {
    let sim = sim_with_application(5);
    let log = event_log(&sim, 5);
    let context = log.render_context(RenderContextKind::User).unwrap();
    let result_set = log
        .query(None, "Application", "*", QueryFlags::CHANNEL_PATH)
        .unwrap();
    let batch = log.next(&result_set).unwrap();
    for event in batch.into_events() {
        assert_eq!(log.render(&context, &event).unwrap().len(), 1);
        event.close();
    }
    result_set.close();
    context.close();

    assert_eq!(sim.close_calls(), 7);
    assert_eq!(sim.open_handles(), 0);
    assert!(sim.misuse().is_empty());
}

#[test]
fn platform_flags_parent_released_before_children() {
    // Bypass the typed layer to confirm the platform sees the mistake the
    // borrow checker prevents.
    let sim = sim_with_application(3);
    let log = event_log(&sim, 3);
    let result_set = log
        .query(None, "Application", "*", QueryFlags::CHANNEL_PATH)
        .unwrap();
    let raw_result_set = result_set.raw().unwrap();
    let batch = log.next(&result_set).unwrap();
    let raw_events: Vec<_> = batch.iter().map(|e| e.raw().unwrap()).collect();
    std::mem::forget(batch);
    std::mem::forget(result_set);

    let api = log.api();
    api.close(raw_result_set);
    for raw in raw_events {
        api.close(raw);
    }

    assert_eq!(
        sim.misuse(),
        vec![Misuse::ParentClosedWithOpenChildren {
            parent: raw_result_set,
            kind: "query",
            open_children: 3,
        }]
    );
    assert_eq!(sim.open_handles(), 0);
}

#[test]
fn double_release_at_platform_is_flagged() {
    let sim = sim_with_application(1);
    let log = event_log(&sim, 1);
    let context = log.render_context(RenderContextKind::System).unwrap();
    let raw = context.raw().unwrap();
    log.api().close(raw);
    drop(context);

    assert_eq!(
        sim.misuse(),
        vec![Misuse::UnknownHandle {
            call: "EvtClose",
            raw,
        }]
    );
}

#[test]
fn sentinel_handles_are_never_released() {
    let sim = sim_with_application(0);
    let log = event_log(&sim, 1);
    drop(evtlog::Handle::null(log.api().clone(), HandleKind::Event));
    assert_eq!(sim.close_calls(), 0);
    assert_eq!(sim.ignored_closes(), 0);
}
