//! End-to-end routing behavior across chains, cloning fan-out, and
//! concurrent registration/rebinding.

use simbus_core::{GlobalBrokerId, GlobalFederateId, Message, SimTime};
use simbus_filter::filter::{make_cloning_filter, make_source_filter, FilterView, SourceFilter};
use simbus_filter::kind::FilterKind;
use simbus_filter::ops::CustomOperator;
use simbus_filter::registry::FilterRegistry;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn registry_with(endpoints: &[&str]) -> Arc<FilterRegistry> {
    let registry = Arc::new(FilterRegistry::new(GlobalBrokerId::new(0)));
    let fed = GlobalFederateId::new(1);
    for name in endpoints {
        registry.register_endpoint(fed, name).unwrap();
    }
    registry
}

#[test]
fn chained_delays_accumulate_in_registration_order() {
    let registry = registry_with(&["ept_a", "ept_b"]);

    let f1 = make_source_filter(FilterKind::Delay, &registry, "ept_a", "first").unwrap();
    f1.set("delay", 1.0).unwrap();
    let f2 = make_source_filter(FilterKind::Delay, &registry, "ept_a", "second").unwrap();
    f2.set("delay", 2.0).unwrap();

    let out = registry
        .route_send(Message::new("ept_a", "ept_b", "x", SimTime::ZERO))
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].time, SimTime::from_secs_f64(3.0));
}

#[test]
fn consuming_filter_short_circuits_the_chain() {
    let registry = registry_with(&["ept_a", "ept_b"]);

    let eater = make_source_filter(FilterKind::Custom, &registry, "ept_a", "eater").unwrap();
    eater
        .set_operator(Arc::new(CustomOperator::new(|_msg| Ok(Vec::new()))))
        .unwrap();
    // if this ever ran, its fault fallback would make the output non-empty
    let later = make_source_filter(FilterKind::Custom, &registry, "ept_a", "later").unwrap();
    later
        .set_operator(Arc::new(CustomOperator::new(|_msg| {
            panic!("short-circuited filter must not run")
        })))
        .unwrap();

    let out = registry
        .route_send(Message::new("ept_a", "ept_b", "x", SimTime::ZERO))
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn cloning_filter_emits_original_plus_delivery_set() {
    let registry = registry_with(&["ept_a", "ept_d"]);

    let tap = make_cloning_filter(&registry, "tap").unwrap();
    tap.add_source_target("ept_a").unwrap();
    tap.add_delivery_endpoint("clone_a");
    tap.add_delivery_endpoint("clone_b");

    let out = registry
        .route_send(Message::new("ept_a", "ept_d", "payload", SimTime::ZERO))
        .unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].dest, "ept_d");
    assert_eq!(out[1].dest, "clone_a");
    assert_eq!(out[2].dest, "clone_b");
    for clone in &out[1..] {
        assert_eq!(clone.payload, out[0].payload);
        assert_eq!(clone.source, out[0].source);
        assert_eq!(clone.time, out[0].time);
        assert_eq!(clone.original_dest, "ept_d");
    }
}

#[test]
fn cloning_destination_watch_fires_on_receive() {
    let registry = registry_with(&["ept_a", "ept_d"]);

    let tap = make_cloning_filter(&registry, "tap").unwrap();
    tap.add_destination_target("ept_d").unwrap();
    tap.add_delivery_endpoint("audit");

    let out = registry
        .route_receive(Message::new("ept_a", "ept_d", "payload", SimTime::ZERO))
        .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].dest, "ept_d");
    assert_eq!(out[1].dest, "audit");

    // the source side of ept_d is untouched
    let out = registry
        .route_send(Message::new("ept_d", "ept_a", "payload", SimTime::ZERO))
        .unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn reroute_then_clone_sees_rewritten_destination() {
    let registry = registry_with(&["ept_a", "ept_b"]);

    let reroute = make_source_filter(FilterKind::Reroute, &registry, "ept_a", "detour").unwrap();
    reroute.set_string("newdestination", "ept_c").unwrap();
    let tap = make_cloning_filter(&registry, "tap").unwrap();
    tap.add_source_target("ept_a").unwrap();
    tap.add_delivery_endpoint("audit");

    let out = registry
        .route_send(Message::new("ept_a", "ept_b", "x", SimTime::ZERO))
        .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].dest, "ept_c");
    assert_eq!(out[0].original_dest, "ept_b");
    // the clone duplicates the rerouted message, minus the destination
    assert_eq!(out[1].dest, "audit");
    assert_eq!(out[1].original_dest, "ept_b");
}

#[test]
fn registration_does_not_block_routing_on_other_endpoints() {
    let registry = registry_with(&["ept_a", "ept_b", "sink"]);

    let router = {
        let registry = registry.clone();
        thread::spawn(move || {
            let mut routed = 0usize;
            for i in 0..500 {
                let msg = Message::new("ept_a", "sink", format!("m{i}"), SimTime::ZERO);
                let out = registry.route_send(msg).unwrap();
                routed += out.len();
            }
            routed
        })
    };

    // concurrent registration churn on an unrelated endpoint
    for i in 0..100 {
        let filt =
            make_source_filter(FilterKind::Delay, &registry, "ept_b", &format!("d{i}")).unwrap();
        filt.set("delay", 0.001 * i as f64).unwrap();
    }

    // ept_a carries no filters, so every message passes through untouched
    assert_eq!(router.join().unwrap(), 500);
    assert_eq!(registry.filter_count(), 100);
}

#[test]
fn rebinding_leaves_in_flight_transform_on_old_operator() {
    let registry = registry_with(&["ept_a", "ept_b"]);
    let filt = SourceFilter::create(&registry, "ept_a", "swap-me", "", "").unwrap();

    let entered = Arc::new(Barrier::new(2));
    let old_op = {
        let entered = entered.clone();
        Arc::new(CustomOperator::new(move |mut msg: Message| {
            entered.wait();
            // keep the old operator busy while the swap happens
            thread::sleep(Duration::from_millis(150));
            msg.time = msg.time.saturating_add(SimTime::from_secs_f64(1.0));
            Ok(vec![msg])
        }))
    };
    filt.set_operator(old_op).unwrap();

    let in_flight = {
        let registry = registry.clone();
        thread::spawn(move || {
            registry
                .route_send(Message::new("ept_a", "ept_b", "x", SimTime::ZERO))
                .unwrap()
        })
    };

    entered.wait();
    filt.set_operator(Arc::new(CustomOperator::new(|mut msg: Message| {
        msg.time = msg.time.saturating_add(SimTime::from_secs_f64(2.0));
        Ok(vec![msg])
    })))
    .unwrap();

    // the call that started before the swap finishes on the old operator
    let out = in_flight.join().unwrap();
    assert_eq!(out[0].time, SimTime::from_secs_f64(1.0));

    // calls starting after the swap see the new operator
    let out = registry
        .route_send(Message::new("ept_a", "ept_b", "x", SimTime::ZERO))
        .unwrap();
    assert_eq!(out[0].time, SimTime::from_secs_f64(2.0));
}

#[test]
fn parallel_routing_on_distinct_endpoints() {
    let registry = registry_with(&["ept_a", "ept_b", "sink"]);
    for (endpoint, name) in [("ept_a", "da"), ("ept_b", "db")] {
        let filt = make_source_filter(FilterKind::Delay, &registry, endpoint, name).unwrap();
        filt.set("delay", 1.0).unwrap();
    }

    let threads: Vec<_> = ["ept_a", "ept_b"]
        .into_iter()
        .map(|endpoint| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let out = registry
                        .route_send(Message::new(endpoint, "sink", "x", SimTime::ZERO))
                        .unwrap();
                    assert_eq!(out.len(), 1);
                    assert_eq!(out[0].time, SimTime::from_secs_f64(1.0));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(registry.metrics().messages_routed(), 2000);
}

#[test]
fn filter_declared_before_endpoint_activates_on_registration() {
    let registry = registry_with(&[]);
    let filt = make_source_filter(FilterKind::Delay, &registry, "ept_late", "early").unwrap();
    filt.set("delay", 4.0).unwrap();

    registry
        .register_endpoint(GlobalFederateId::new(9), "ept_late")
        .unwrap();
    registry
        .register_endpoint(GlobalFederateId::new(9), "sink")
        .unwrap();

    let out = registry
        .route_send(Message::new("ept_late", "sink", "x", SimTime::ZERO))
        .unwrap();
    assert_eq!(out[0].time, SimTime::from_secs_f64(4.0));
}
