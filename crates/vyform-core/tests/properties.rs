// Cross-module invariants of templates, trees and the diff engine.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

use common::{Call, FakeDevice};
use vyform_core::tree::{self, Block};
use vyform_core::{
    BlockSchema, Collection, Engine, EngineSettings, Field, KeyTemplate, Operation, PlanAction,
    ResourceDef, ResourceId, ResourceState, ScalarKind,
};

fn values(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn interface_def() -> ResourceDef {
    let schema = BlockSchema::new()
        .field("ethernet", Field::string().required())
        .field("description", Field::string())
        .field("mtu", Field::int())
        .field("address", Field::list(ScalarKind::String))
        .field("disable_link_detect", Field::bool())
        .field(
            "dhcp_options",
            Field::block(
                BlockSchema::new()
                    .field("client_id", Field::string())
                    .field("host_name", Field::string())
                    .field("default_route_distance", Field::int())
                    .with_collection(Collection::List { max_items: Some(1) }),
            ),
        );
    ResourceDef::new("interface_ethernet", "interfaces ethernet {{ethernet}}", schema).unwrap()
}

// ── 1. Template round-trip ──────────────────────────────────────────

#[test]
fn identities_round_trip_through_parse() {
    let cases = [
        (
            "firewall group port-group {{name}}",
            json!({ "name": "web", "port": ["80"] }),
        ),
        (
            "service dhcp-server shared-network-name {{shared_network_name}} subnet {{subnet}}",
            json!({ "shared_network_name": "LAN_1", "subnet": "10.0.0.0/24" }),
        ),
        (
            "firewall name {{name}} rule {{rule}}",
            json!({ "rule": 10, "name": "WAN-IN", "action": "drop" }),
        ),
        (
            "protocols static route {{route}} next-hop {{next_hop}}",
            json!({ "route": "0.0.0.0/0", "next_hop": "192.0.2.1" }),
        ),
    ];

    for (raw, declared) in cases {
        let template = KeyTemplate::parse(raw).unwrap();
        let declared = values(declared);
        let id = template.build_id(&declared).unwrap().to_string();
        let parsed = ResourceId::parse(&id).unwrap();

        let expected: Vec<(String, String)> = template
            .fields()
            .into_iter()
            .map(|field| {
                let value = match &declared[field] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (field.to_owned(), value)
            })
            .collect();
        assert_eq!(parsed.pairs(), expected.as_slice(), "{raw}");
        assert_eq!(
            template.build_path_from_id(&parsed).unwrap(),
            template.build_path(&declared).unwrap()
        );
    }
}

// ── 2. Hyphenation ──────────────────────────────────────────────────

#[tokio::test]
async fn wire_form_hyphenates_and_declared_form_does_not() {
    let device = Arc::new(FakeDevice::new());
    let engine = Engine::from_shared(Arc::clone(&device), EngineSettings::default());
    let def = interface_def();
    let ctx = engine.context(&def, Operation::Create);

    let state = engine
        .create(
            &ctx,
            &def,
            values(json!({
                "ethernet": "eth0",
                "disable_link_detect": true,
                "dhcp_options": [{ "client_id": "router", "default_route_distance": 210 }],
            })),
        )
        .await
        .unwrap();

    assert_eq!(
        device.mutations(),
        vec![Call::Set(
            "interfaces ethernet eth0".into(),
            json!({
                "disable-link-detect": [],
                "dhcp-options": { "client-id": "router", "default-route-distance": "210" },
            }),
        )]
    );
    assert_eq!(state.values["disable_link_detect"], json!(true));
    assert_eq!(
        state.values["dhcp_options"],
        json!([{ "client_id": "router", "host_name": null, "default_route_distance": 210 }])
    );
}

// ── 3. Diff idempotence ─────────────────────────────────────────────

#[test]
fn diff_of_a_tree_with_itself_or_nothing() {
    let def = interface_def();
    let t = def
        .desired_tree(
            "interfaces ethernet eth0",
            &values(json!({
                "ethernet": "eth0",
                "mtu": 9000,
                "address": ["192.0.2.1/24", "2001:db8::1/64"],
                "dhcp_options": [{ "host_name": "edge" }],
            })),
        )
        .unwrap();

    assert!(tree::diff(Some(&t), Some(&t)).is_empty());

    let d = tree::diff(Some(&t), None);
    assert_eq!(d.changed.as_ref(), Some(&t));
    assert_eq!(d.missing, None);

    let d = tree::diff(None, Some(&t));
    assert_eq!(d.changed, None);
    assert_eq!(d.missing.as_ref(), Some(&t));
}

// ── 4. Diff convergence ─────────────────────────────────────────────

#[tokio::test]
async fn applying_a_diff_converges() {
    let cases = [
        (
            json!({ "address": ["192.0.2.1/24"], "mtu": "1500" }),
            json!({ "ethernet": "eth0", "address": ["198.51.100.1/24", "192.0.2.1/24"], "mtu": 9000 }),
        ),
        (
            json!({ "description": "uplink", "disable-link-detect": {} }),
            json!({ "ethernet": "eth0", "description": "wan" }),
        ),
        (
            json!({ "dhcp-options": { "client-id": "a", "host-name": "h" } }),
            json!({ "ethernet": "eth0", "dhcp_options": [{ "client_id": "b" }] }),
        ),
        (
            json!({ "address": ["a", "b", "c"], "dhcp-options": { "host-name": "h" } }),
            json!({ "ethernet": "eth0", "address": ["c"] }),
        ),
        (
            json!({}),
            json!({ "ethernet": "eth0", "address": ["a"], "disable_link_detect": true }),
        ),
    ];

    let def = interface_def();
    for (live, desired) in cases {
        let device = Arc::new(FakeDevice::new());
        device.seed("interfaces ethernet eth0", live.clone());
        let engine = Engine::from_shared(Arc::clone(&device), EngineSettings::default());
        let ctx = engine.context(&def, Operation::Update);
        let prior = ResourceState::new("ethernet=eth0", Map::new());

        engine
            .update(&ctx, &def, &prior, values(desired.clone()))
            .await
            .unwrap();
        let plan = engine.plan(&ctx, &def, values(desired.clone())).await.unwrap();

        assert_eq!(
            (plan.changed, plan.missing),
            (None, None),
            "live {live} -> desired {desired}"
        );
    }
}

// ── 5. Bool encoding ────────────────────────────────────────────────

#[test]
fn false_never_reaches_the_wire() {
    let def = interface_def();
    let declared = values(json!({ "ethernet": "eth0", "disable_link_detect": false, "mtu": 1500 }));
    let (_, body) = tree::to_wire(&def.desired_tree("interfaces ethernet eth0", &declared).unwrap());
    assert_eq!(body, json!({ "mtu": "1500" }));

    let declared = values(json!({ "ethernet": "eth0", "disable_link_detect": true }));
    let (_, body) = tree::to_wire(&def.desired_tree("interfaces ethernet eth0", &declared).unwrap());
    assert_eq!(body, json!({ "disable-link-detect": [] }));
}

// ── 6. Leaf-list order ──────────────────────────────────────────────

#[tokio::test]
async fn reordered_leaf_lists_plan_as_no_op() {
    let device = Arc::new(FakeDevice::new());
    device.seed("interfaces ethernet eth0", json!({ "address": ["a", "b", "c"] }));
    let engine = Engine::from_shared(Arc::clone(&device), EngineSettings::default());
    let def = interface_def();
    let ctx = engine.context(&def, Operation::Read);

    let plan = engine
        .plan(
            &ctx,
            &def,
            values(json!({ "ethernet": "eth0", "address": ["c", "a", "b"] })),
        )
        .await
        .unwrap();

    assert_eq!(plan.action, PlanAction::NoOp);
}

#[test]
fn reordered_leaf_lists_diff_empty() {
    let a = Block::root("x").with_child(Block::list("port", ScalarKind::Int, ["1", "2", "3"]));
    let b = Block::root("x").with_child(Block::list("port", ScalarKind::Int, ["3", "01", "2"]));
    assert!(tree::diff(Some(&a), Some(&b)).is_empty());
}
