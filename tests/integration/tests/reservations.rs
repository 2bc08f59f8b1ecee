//! Integration test: the reservation ledger under sequential and
//! concurrent use.

use std::sync::Arc;
use std::thread;

use lnroute_integration_tests::{channel, msat, policy, request, scidd, service};
use lnroute_routing::{ReserveHop, RouteService, RoutingError};

fn hop(s: &str, amount: u64) -> ReserveHop {
    ReserveHop {
        short_channel_id_dir: scidd(s),
        amount_msat: msat(amount),
    }
}

fn single_edge(capacity: u64) -> RouteService {
    service(vec![channel("1x1x0", 1, 2, capacity, policy(capacity, 0, 0, 6))])
}

#[test]
fn test_reserve_list_unreserve() {
    let svc = single_edge(100_000_000);
    let path = [hop("1x1x0/0", 30_000_000)];

    svc.reserve(&path, None).unwrap();
    let list = svc.list_reservations();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].short_channel_id_dir, scidd("1x1x0/0"));
    assert_eq!(list[0].amount_msat, msat(30_000_000));
    assert!(!list[0].owner.is_empty());

    svc.unreserve(&path).unwrap();
    assert!(svc.list_reservations().is_empty());
}

#[test]
fn test_round_trip_restores_capacity_in_any_order() {
    let svc = single_edge(100_000);
    let amounts = [10_000, 25_000, 40_000, 25_000];

    for a in amounts {
        svc.reserve(&[hop("1x1x0/0", a)], None).unwrap();
    }
    // Remaining: 100_000 - 100_000.
    assert!(matches!(
        svc.reserve(&[hop("1x1x0/0", 1)], None),
        Err(RoutingError::InsufficientCapacity { .. })
    ));

    for a in [25_000, 10_000, 25_000, 40_000] {
        svc.unreserve(&[hop("1x1x0/0", a)]).unwrap();
    }
    assert!(svc.list_reservations().is_empty());

    // The full capacity is available again, and no more.
    svc.reserve(&[hop("1x1x0/0", 100_000)], None).unwrap();
    assert!(svc.reserve(&[hop("1x1x0/0", 1)], None).is_err());
}

#[test]
fn test_reserve_is_all_or_nothing() {
    let cap = 1_000_000;
    let svc = service(vec![
        channel("1x1x0", 1, 2, cap, policy(cap, 0, 0, 6)),
        channel("2x1x0", 2, 3, cap / 2, policy(cap / 2, 0, 0, 6)),
    ]);

    let err = svc
        .reserve(&[hop("1x1x0/0", 600_000), hop("2x1x0/0", 600_000)], None)
        .unwrap_err();
    match err {
        RoutingError::InsufficientCapacity { scidd: blocked, .. } => {
            assert_eq!(blocked, scidd("2x1x0/0"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(svc.list_reservations().is_empty());
}

#[test]
fn test_unreserve_mismatch_is_a_conflict() {
    let svc = single_edge(100_000);
    svc.reserve(&[hop("1x1x0/0", 5_000)], None).unwrap();

    let err = svc.unreserve(&[hop("1x1x0/0", 4_000)]).unwrap_err();
    assert!(matches!(err, RoutingError::ReservationConflict { .. }));
    assert!(err.is_recoverable());
    // Nothing was released.
    assert_eq!(svc.list_reservations().len(), 1);
}

#[test]
fn test_routes_net_of_reservations() {
    let svc = single_edge(100_000);
    svc.reserve(&[hop("1x1x0/0", 70_000)], None).unwrap();

    assert!(svc.get_routes(&request(1, 2, 30_000, &[])).is_ok());
    assert!(matches!(
        svc.get_routes(&request(1, 2, 30_001, &[])),
        Err(RoutingError::NoRouteFound { .. })
    ));
}

#[test]
fn test_concurrent_route_and_reserve_never_oversubscribes() {
    let svc = Arc::new(single_edge(10_000_000));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                let mut held: usize = 0;
                // Each pass either books a route or learns the edge is full.
                loop {
                    let set = match svc.get_routes(&request(1, 2, 1_000_000, &[])) {
                        Ok(set) => set,
                        Err(_) => return held,
                    };
                    let path = set.routes[0].to_reserve_hops();
                    if svc.reserve(&path, None).is_ok() {
                        held += 1;
                    }
                }
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 10);
    assert_eq!(svc.list_reservations().len(), 10);
    assert!(svc
        .list_reservations()
        .iter()
        .all(|r| r.short_channel_id_dir == scidd("1x1x0/0")));
    assert_eq!(svc.stats().reservations, 10);
}
