//! End-to-end collection scenarios.

mod common;

use std::time::Duration;

use common::*;
use evtlog::prelude::*;

const PROVIDER_GUID: Guid = Guid {
    data1: 0x5484_9625,
    data2: 0x5478,
    data3: 0x4994,
    data4: [0xa5, 0xba, 0x3e, 0x3b, 0x03, 0x28, 0xc3, 0x0d],
};

/// Event carrying one field of every scalar shape a collector sees.
fn security_event(id: u64) -> SimEvent {
    SimEvent::record("Security", id)
        .with_value(
            "Event/System/Provider/@Guid",
            Variant::Guid(PROVIDER_GUID),
        )
        .with_value("Event/System/Keywords", Variant::HexInt64(0x8020_0000_0000_0000))
        .with_value(
            "Event/EventData/Data[@Name='IpAddress']",
            Variant::String("10.0.0.7".into()),
        )
        .with_value(
            "Event/EventData/Data[@Name='Groups']",
            Variant::Array(VariantArray::String(vec!["Users".into(), "Admins".into()])),
        )
}

#[test]
fn remote_collection_round() {
    let sim = sim_with_application(0);
    sim.add_channel("Security", (100..108).map(security_event));
    let log = event_log(&sim, 3);

    let session = log.open_session("dc01.corp.example").unwrap();
    assert_eq!(session.server(), "dc01.corp.example");

    let context = log
        .render_context(RenderContextKind::Values(vec![
            RECORD_ID.into(),
            "Event/System/Provider/@Guid".into(),
            "Event/System/Keywords".into(),
            "Event/EventData/Data[@Name='IpAddress']".into(),
            "Event/EventData/Data[@Name='Groups']".into(),
            "Event/EventData/Data[@Name='Missing']".into(),
        ]))
        .unwrap();
    assert_eq!(context.paths().len(), 6);

    let mut renderer = log.renderer();
    let mut seen = Vec::new();
    {
        let result_set = log
            .query(
                Some(&session),
                "Security",
                "*",
                QueryFlags::CHANNEL_PATH | QueryFlags::FORWARD_DIRECTION,
            )
            .unwrap();
        for batch in log.batches(&result_set) {
            let batch = batch.unwrap();
            assert!(batch.len() <= 3);
            for event in &batch {
                let row = renderer.render(&context, event).unwrap();
                assert_eq!(row.len(), 6);
                assert_eq!(
                    row[1],
                    Variant::Guid(PROVIDER_GUID)
                );
                assert_eq!(row[2], Variant::HexInt64(0x8020_0000_0000_0000));
                assert_eq!(row[3], Variant::String("10.0.0.7".into()));
                assert_eq!(
                    row[4],
                    Variant::Array(VariantArray::String(vec!["Users".into(), "Admins".into()]))
                );
                assert_eq!(row[5], Variant::Null);
                seen.push(record_id(&row));
            }
        }
    }
    assert_eq!(seen, (100..108).collect::<Vec<_>>());

    context.close();
    session.close();
    assert_eq!(sim.open_handles(), 0);
    assert!(sim.misuse().is_empty());
}

#[test]
fn tail_then_catch_up() {
    let sim = sim_with_application(5);
    let log = event_log(&sim, 10);
    let context = log.render_context(RenderContextKind::Values(vec![RECORD_ID.into()])).unwrap();

    let subscription = log
        .subscribe(None, "Application", "*", SubscribeFrom::FutureEvents)
        .unwrap();
    assert!(log
        .next_with_timeout(&subscription, Duration::from_millis(10))
        .unwrap_err()
        .is_timeout());

    for id in 6..=8 {
        sim.publish("Application", SimEvent::record("Application", id));
    }
    let batch = log.next(&subscription).unwrap();
    let ids: Vec<u64> = batch
        .iter()
        .map(|event| record_id(&log.render(&context, event).unwrap()))
        .collect();
    assert_eq!(ids, vec![6, 7, 8]);

    batch.close();
    subscription.close();
    context.close();
    assert_eq!(sim.open_handles(), 0);
}

#[test]
fn system_and_user_contexts() {
    let sim = sim_with_application(2);
    let log = event_log(&sim, 2);
    let system = log.render_context(RenderContextKind::System).unwrap();
    let user = log.render_context(RenderContextKind::User).unwrap();
    let result_set = log
        .query(None, "Application", "*", QueryFlags::CHANNEL_PATH)
        .unwrap();
    let batch = log.next(&result_set).unwrap();
    let event = &batch.events()[0];

    let values = log.render(&system, event).unwrap();
    assert_eq!(values[0], Variant::String("SimProvider".into()));
    assert_eq!(values[4], Variant::UInt64(1));
    assert!(matches!(values[7], Variant::Sid(_)));
    assert_eq!(log.render(&user, event).unwrap(), vec![Variant::String("1".into())]);

    let xml = log.render_xml(event).unwrap();
    assert!(xml.starts_with("<Event"));
    assert!(xml.contains("<Channel>Application</Channel>"));

    // Same event, same order, after the buffer held another event.
    let mut renderer = log.renderer();
    let first = renderer.render(&system, event).unwrap();
    let other = renderer.render(&system, &batch.events()[1]).unwrap();
    let again = renderer.render(&system, event).unwrap();
    assert_eq!(first, values);
    assert_eq!(other[4], Variant::UInt64(2));
    assert_eq!(first, again);
}

#[test]
fn arrays_survive_renderer_and_batch_release() {
    let groups = |names: &[&str]| {
        Variant::Array(VariantArray::String(names.iter().map(|n| n.to_string()).collect()))
    };
    let sim = sim_with_application(0);
    sim.add_channel(
        "Application",
        [
            SimEvent::record("Application", 1)
                .with_value("Event/EventData/Data", groups(&["Users", "Admins"])),
            SimEvent::record("Application", 2)
                .with_value("Event/EventData/Data", groups(&["Guests"])),
        ],
    );
    let log = event_log(&sim, 2);
    let context = log
        .render_context(RenderContextKind::Values(vec!["Event/EventData/Data".into()]))
        .unwrap();
    let result_set = log
        .query(None, "Application", "*", QueryFlags::CHANNEL_PATH)
        .unwrap();
    let batch = log.next(&result_set).unwrap();

    let mut renderer = log.renderer();
    let kept = renderer.render(&context, &batch.events()[0]).unwrap();
    let later = renderer.render(&context, &batch.events()[1]).unwrap();
    drop(renderer);
    batch.close();
    result_set.close();
    context.close();

    assert_eq!(kept, vec![groups(&["Users", "Admins"])]);
    assert_eq!(later, vec![groups(&["Guests"])]);
    assert_eq!(sim.open_handles(), 0);
}

#[test]
fn malformed_value_fails_only_that_render() {
    let sim = sim_with_application(0);
    sim.add_channel(
        "Application",
        [
            SimEvent::record("Application", 1).with_malformed("Event/EventData/Data", 0x2a, 1),
            SimEvent::record("Application", 2).with_value(
                "Event/EventData/Data",
                Variant::Binary(vec![0xde, 0xad]),
            ),
        ],
    );
    let log = event_log(&sim, 2);
    let context = log
        .render_context(RenderContextKind::Values(vec!["Event/EventData/Data".into()]))
        .unwrap();
    let result_set = log
        .query(None, "Application", "*", QueryFlags::CHANNEL_PATH)
        .unwrap();
    let batch = log.next(&result_set).unwrap();

    let err = log.render(&context, &batch.events()[0]).unwrap_err();
    assert!(matches!(err, Error::UnknownVariantType(0x2a)));
    assert_eq!(
        log.render(&context, &batch.events()[1]).unwrap(),
        vec![Variant::Binary(vec![0xde, 0xad])]
    );
}

#[test]
fn empty_value_path_list_rejected() {
    let sim = sim_with_application(0);
    let log = event_log(&sim, 1);
    let err = log.render_context(RenderContextKind::Values(Vec::new())).unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(sim.open_handles(), 0);
}

#[cfg(windows)]
#[test]
#[ignore = "reads the local Application channel"]
fn local_application_channel() {
    init_tracing();
    let log = EventLog::local().unwrap();
    let context = log
        .render_context(RenderContextKind::Values(vec![RECORD_ID.into()]))
        .unwrap();
    let result_set = log
        .query(
            None,
            "Application",
            "*",
            QueryFlags::CHANNEL_PATH | QueryFlags::REVERSE_DIRECTION,
        )
        .unwrap();
    match log.next(&result_set) {
        Ok(batch) => {
            for event in &batch {
                let row = log.render(&context, event).unwrap();
                assert!(matches!(row[0], Variant::UInt64(_)));
            }
        }
        Err(e) => assert!(e.is_end_of_stream()),
    }
}
