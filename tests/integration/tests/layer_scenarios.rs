//! Integration test: layers shaping route computation.
//!
//! Exercises layer creation, virtual channels, disabled nodes, learned
//! constraints and ageing through the public `RouteService` facade.

use lnroute_integration_tests::{diamond, msat, node, request, scid, scidd, service};
use lnroute_routing::{InformKind, RoutingError};

// =========================================================================
// Virtual channels
// =========================================================================

#[test]
fn test_route_over_layer_channel() {
    let svc = service(vec![]);
    svc.create_layer("L", false).unwrap();
    let created = svc
        .create_channel("L", node(1), node(2), scid("1x1x0"), msat(100_000_000))
        .unwrap();
    assert_eq!(created.scidd(), scidd("1x1x0/0"));

    let set = svc.get_routes(&request(1, 2, 50_000_000, &["L"])).unwrap();
    assert_eq!(set.routes.len(), 1);
    let route = &set.routes[0];
    assert_eq!(route.amount_msat, msat(50_000_000));
    assert_eq!(route.path.len(), 1);
    assert_eq!(route.path[0].short_channel_id_dir, scidd("1x1x0/0"));
    assert_eq!(route.path[0].next_node_id, node(2));
    assert!(route.probability_ppm > 0);
    assert!(set.probability_ppm > 0);
}

#[test]
fn test_layer_channel_invisible_without_layer() {
    let svc = service(vec![]);
    svc.create_layer("L", false).unwrap();
    svc.create_channel("L", node(1), node(2), scid("1x1x0"), msat(100_000_000))
        .unwrap();

    assert!(svc.get_routes(&request(1, 2, 1_000, &[])).is_err());
}

#[test]
fn test_removing_layer_drops_its_channels() {
    let svc = service(vec![]);
    svc.create_layer("L", false).unwrap();
    svc.create_channel("L", node(1), node(2), scid("1x1x0"), msat(100_000_000))
        .unwrap();
    svc.remove_layer("L").unwrap();

    let err = svc.get_routes(&request(1, 2, 1_000, &["L"])).unwrap_err();
    assert!(matches!(err, RoutingError::LayerNotFound(_)));
    assert!(matches!(
        svc.remove_layer("L"),
        Err(RoutingError::LayerNotFound(_))
    ));
}

// =========================================================================
// Learned constraints
// =========================================================================

#[test]
fn test_constrained_edge_refuses_larger_amount() {
    let svc = service(vec![]);
    svc.create_layer("L", false).unwrap();
    svc.create_channel("L", node(1), node(2), scid("1x1x0"), msat(100_000_000))
        .unwrap();

    svc.inform_channel("L", scidd("1x1x0/0"), msat(80_000_000), InformKind::Constrained)
        .unwrap();

    let err = svc
        .get_routes(&request(1, 2, 90_000_000, &["L"]))
        .unwrap_err();
    assert!(matches!(err, RoutingError::NoRouteFound { .. }));
    assert!(err.is_recoverable());

    // Below the learned ceiling the edge is still usable.
    assert!(svc.get_routes(&request(1, 2, 70_000_000, &["L"])).is_ok());
}

#[test]
fn test_succeeded_never_regresses_minimum() {
    let svc = diamond();
    svc.create_layer("L", false).unwrap();
    let edge = scidd("1x1x0/0");

    svc.inform_channel_at("L", edge, msat(5_000_000), InformKind::Succeeded, 100)
        .unwrap();
    let after = svc
        .inform_channel_at("L", edge, msat(1_000_000), InformKind::Succeeded, 200)
        .unwrap();

    assert_eq!(after.len(), 1);
    assert_eq!(after[0].minimum_msat(), Some(msat(5_000_000)));
}

#[test]
fn test_age_removes_exactly_older_bounds() {
    let svc = diamond();
    svc.create_layer("L", false).unwrap();
    svc.inform_channel_at("L", scidd("1x1x0/0"), msat(1_000), InformKind::Succeeded, 100)
        .unwrap();
    svc.inform_channel_at("L", scidd("2x1x0/0"), msat(9_000_000), InformKind::Constrained, 150)
        .unwrap();
    svc.inform_channel_at("L", scidd("3x1x0/0"), msat(2_000), InformKind::Succeeded, 200)
        .unwrap();

    assert_eq!(svc.age("L", 150).unwrap(), 1);

    let layer = &svc.list_layers(Some("L")).unwrap()[0];
    assert!(!layer.constraints.contains_key(&scidd("1x1x0/0")));
    assert_eq!(
        layer.constraints[&scidd("2x1x0/0")].maximum_msat(),
        Some(msat(8_999_999))
    );
    assert_eq!(
        layer.constraints[&scidd("3x1x0/0")].minimum_msat(),
        Some(msat(2_000))
    );
}

// =========================================================================
// Disabled nodes and layer ordering
// =========================================================================

#[test]
fn test_disabled_node_never_on_route() {
    let svc = diamond();
    let cheap = svc.get_routes(&request(1, 4, 1_000_000, &[])).unwrap();
    assert_eq!(cheap.routes[0].path[0].next_node_id, node(2));

    svc.create_layer("avoid", false).unwrap();
    svc.disable_node("avoid", node(2)).unwrap();
    // Idempotent.
    svc.disable_node("avoid", node(2)).unwrap();

    for amount in [1_000, 1_000_000, 9_000_000] {
        let set = svc.get_routes(&request(1, 4, amount, &["avoid"])).unwrap();
        for route in &set.routes {
            assert!(route.path.iter().all(|hop| hop.next_node_id != node(2)));
        }
    }
}

#[test]
fn test_later_layer_overrides_earlier() {
    let svc = diamond();
    svc.create_layer("cheap", false).unwrap();
    svc.create_layer("dear", false).unwrap();

    let free = lnroute_routing::ChannelUpdate {
        fee_base_msat: Some(msat(0)),
        fee_proportional_millionths: Some(0),
        ..Default::default()
    };
    let pricey = lnroute_routing::ChannelUpdate {
        fee_base_msat: Some(msat(50_000)),
        ..Default::default()
    };
    // Node 2 charges for forwarding over 2x1x0; the source pays itself nothing.
    svc.update_channel("cheap", scidd("2x1x0/0"), &free).unwrap();
    svc.update_channel("dear", scidd("2x1x0/0"), &pricey).unwrap();

    let set = svc
        .get_routes(&request(1, 4, 1_000_000, &["cheap", "dear"]))
        .unwrap();
    assert_eq!(set.routes[0].path[0].next_node_id, node(3));

    let set = svc
        .get_routes(&request(1, 4, 1_000_000, &["dear", "cheap"]))
        .unwrap();
    assert_eq!(set.routes[0].path[0].next_node_id, node(2));
}

#[test]
fn test_layer_listing_serializes() {
    let svc = diamond();
    svc.create_layer("L", true).unwrap();
    svc.disable_node("L", node(3)).unwrap();
    svc.bias_channel("L", scidd("1x1x0/0"), 500, Some("slow peer".into()), false)
        .unwrap();

    let layers = svc.list_layers(None).unwrap();
    let json = serde_json::to_value(&layers).unwrap();
    assert_eq!(json[0]["name"], "L");
    assert_eq!(json[0]["persistent"], true);
    assert_eq!(json[0]["disabled_nodes"].as_array().unwrap().len(), 1);
}
