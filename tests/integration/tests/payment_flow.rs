//! Integration test: the full attempt loop.
//!
//! get routes -> reserve -> attempt outcome -> feedback -> get routes again,
//! plus splitting and determinism across the whole stack.

use lnroute_integration_tests::{channel, diamond, msat, node, policy, request, scidd, service};
use lnroute_routing::{apply_outcome, AttemptOutcome, InformKind, RoutingError};

// =========================================================================
// Feedback loop
// =========================================================================

#[test]
fn test_failure_steers_next_attempt() {
    let svc = diamond();
    svc.create_layer("learned", false).unwrap();

    let first = svc
        .get_routes(&request(1, 4, 1_000_000, &["learned"]))
        .unwrap();
    let route = &first.routes[0];
    assert_eq!(route.path[0].next_node_id, node(2));

    let hops = route.to_reserve_hops();
    svc.reserve(&hops, Some("attempt-1".into())).unwrap();
    assert_eq!(svc.list_reservations().len(), 2);

    // Node 2 could not forward over its outgoing edge.
    let failing = route.path[1].clone();
    let report = apply_outcome(
        &svc,
        "learned",
        &hops,
        &AttemptOutcome::Failed {
            short_channel_id_dir: failing.short_channel_id_dir,
            amount_msat: failing.amount_msat,
        },
    )
    .unwrap();
    assert!(report.released);
    assert!(report.conflict.is_none());
    assert!(svc.list_reservations().is_empty());

    let second = svc
        .get_routes(&request(1, 4, 1_000_000, &["learned"]))
        .unwrap();
    assert_eq!(second.routes[0].path[0].next_node_id, node(3));

    // Without the layer the original route is still preferred.
    let plain = svc.get_routes(&request(1, 4, 1_000_000, &[])).unwrap();
    assert_eq!(plain.routes[0].path[0].next_node_id, node(2));
}

#[test]
fn test_success_raises_confidence() {
    let svc = diamond();
    svc.create_layer("learned", false).unwrap();

    let before = svc
        .get_routes(&request(1, 4, 5_000_000, &["learned"]))
        .unwrap();
    let hops = before.routes[0].to_reserve_hops();
    svc.reserve(&hops, None).unwrap();
    apply_outcome(&svc, "learned", &hops, &AttemptOutcome::Succeeded).unwrap();

    let after = svc
        .get_routes(&request(1, 4, 5_000_000, &["learned"]))
        .unwrap();
    assert_eq!(after.routes[0].path, before.routes[0].path);
    assert!(after.probability_ppm > before.probability_ppm);
    assert_eq!(after.probability_ppm, 1_000_000);
}

#[test]
fn test_unconstrained_clears_stale_ceiling() {
    let svc = diamond();
    svc.create_layer("learned", false).unwrap();
    let edge = "2x1x0/0".parse().unwrap();

    svc.inform_channel_at("learned", edge, msat(500_000), InformKind::Constrained, 100)
        .unwrap();
    let via = svc
        .get_routes(&request(1, 4, 1_000_000, &["learned"]))
        .unwrap();
    assert_eq!(via.routes[0].path[0].next_node_id, node(3));

    svc.inform_channel_at("learned", edge, msat(2_000_000), InformKind::Unconstrained, 200)
        .unwrap();
    let via = svc
        .get_routes(&request(1, 4, 1_000_000, &["learned"]))
        .unwrap();
    assert_eq!(via.routes[0].path[0].next_node_id, node(2));
}

// =========================================================================
// Limits against competing paths
// =========================================================================

/// Node 2 reaches node 4 over a slow free channel or a fast one charging
/// 15 msat; node 3 charges 10 msat and 30 blocks to reach node 2.
fn two_speeds() -> lnroute_routing::RouteService {
    let cap = 10_000_000;
    service(vec![
        channel("1x1x0", 1, 3, cap, policy(cap, 0, 0, 6)),
        channel("2x1x0", 2, 3, cap, policy(cap, 10, 0, 30)),
        channel("3x1x0", 2, 4, cap, policy(cap, 0, 0, 100)),
        channel("3x2x0", 2, 4, cap, policy(cap, 15, 0, 6)),
    ])
}

#[test]
fn test_layer_bias_within_fee_budget() {
    let svc = two_speeds();
    svc.create_layer("L", false).unwrap();
    svc.bias_channel("L", scidd("3x1x0/0"), 100_000, None, false)
        .unwrap();

    let steered = svc.get_routes(&request(1, 4, 1_000, &["L"])).unwrap();
    assert_eq!(steered.routes[0].path[2].short_channel_id_dir, scidd("3x2x0/0"));
    assert_eq!(steered.total_fee().unwrap(), msat(25));

    // The biased channel is the only one within budget, so it is still used.
    let mut req = request(1, 4, 1_000, &["L"]);
    req.maxfee_msat = Some(msat(20));
    let set = svc.get_routes(&req).unwrap();
    assert_eq!(set.routes.len(), 1);
    assert_eq!(set.routes[0].path[2].short_channel_id_dir, scidd("3x1x0/0"));
    assert_eq!(set.total_fee().unwrap(), msat(10));
}

#[test]
fn test_max_delay_picks_fast_route() {
    let svc = two_speeds();

    let cheap = svc.get_routes(&request(1, 4, 1_000, &[])).unwrap();
    assert_eq!(cheap.routes[0].total_delay(), 148);

    let mut req = request(1, 4, 1_000, &[]);
    req.maxdelay = Some(130);
    let fast = svc.get_routes(&req).unwrap();
    assert_eq!(fast.routes[0].path[2].short_channel_id_dir, scidd("3x2x0/0"));
    assert_eq!(fast.routes[0].total_delay(), 54);

    // No path meets both limits.
    req.maxfee_msat = Some(msat(20));
    assert!(matches!(
        svc.get_routes(&req),
        Err(RoutingError::NoRouteFound { .. })
    ));
}

// =========================================================================
// Splitting
// =========================================================================

#[test]
fn test_split_amounts_sum_exactly() {
    let svc = service(vec![
        channel("1x1x0", 1, 2, 60_000, policy(60_000, 0, 0, 6)),
        channel("2x1x0", 1, 2, 40_000, policy(40_000, 0, 0, 6)),
        channel("3x1x0", 1, 2, 25_000, policy(25_000, 0, 0, 6)),
    ]);

    let set = svc.get_routes(&request(1, 2, 110_000, &[])).unwrap();
    assert!(set.routes.len() > 1);
    assert_eq!(set.total_amount().unwrap(), msat(110_000));
    let hop0: u64 = set.routes.iter().map(|r| r.path[0].amount_msat.msat()).sum();
    assert_eq!(hop0, 110_000);
    assert!(set.probability_ppm <= set.routes[0].probability_ppm);

    // Every part can be held at once.
    for route in &set.routes {
        svc.reserve(&route.to_reserve_hops(), None).unwrap();
    }
}

#[test]
fn test_split_with_fees_delivers_exact_amount() {
    let cap = 50_000;
    let svc = service(vec![
        channel("1x1x0", 1, 2, cap, policy(cap, 0, 0, 6)),
        channel("2x1x0", 2, 4, cap, policy(cap, 3, 1_000, 6)),
        channel("3x1x0", 1, 3, cap, policy(cap, 0, 0, 6)),
        channel("4x1x0", 3, 4, cap, policy(cap, 5, 2_000, 6)),
    ]);

    let set = svc.get_routes(&request(1, 4, 80_000, &[])).unwrap();
    assert_eq!(set.routes.len(), 2);
    assert_eq!(set.total_amount().unwrap(), msat(80_000));
    for route in &set.routes {
        let last = route.path.last().unwrap();
        assert_eq!(last.amount_msat, route.amount_msat);
        assert!(route.path[0].amount_msat > route.amount_msat);
    }
}

#[test]
fn test_insufficient_total_capacity() {
    let svc = service(vec![
        channel("1x1x0", 1, 2, 60_000, policy(60_000, 0, 0, 6)),
        channel("2x1x0", 1, 2, 40_000, policy(40_000, 0, 0, 6)),
    ]);
    let err = svc.get_routes(&request(1, 2, 100_001, &[])).unwrap_err();
    assert!(matches!(err, RoutingError::NoRouteFound { .. }));
}

// =========================================================================
// Determinism
// =========================================================================

#[test]
fn test_repeated_requests_are_identical() {
    let svc = diamond();
    svc.create_layer("L", false).unwrap();
    svc.bias_channel("L", "1x1x0/0".parse().unwrap(), 10, None, false)
        .unwrap();

    let req = request(1, 4, 3_000_000, &["L"]);
    let first = svc.get_routes(&req).unwrap();
    for _ in 0..10 {
        assert_eq!(svc.get_routes(&req).unwrap(), first);
    }
}
