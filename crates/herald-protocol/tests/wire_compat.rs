// Verify wire format matches what EventSource clients and peer instances expect.
// The fanout envelope is shared with older instances on the same channel.

use herald_core::{InstanceId, SubscriberId};
use herald_protocol::frames::{ConnectedNotice, Frame, HistorySnapshot};
use herald_protocol::{names, Event};
use serde_json::json;

#[test]
fn envelope_uses_camel_case_and_server_id() {
    let ev = Event::new("message", json!({"text": "hi"}), 1_700_000_000_000, "inst-a".into());
    let wire = ev.encode().unwrap();

    assert!(wire.contains(r#""serverId":"inst-a""#));
    assert!(wire.contains(r#""eventType":"message""#));
    assert!(wire.contains(r#""timestamp":1700000000000"#));
    assert!(wire.contains(r#""payload":{"text":"hi"}"#));
    // internal field name must not leak
    assert!(!wire.contains("origin"));
}

#[test]
fn envelope_from_peer_decodes() {
    let raw = r#"{"serverId":"peer-1","eventType":"update","payload":{"clients":3},"timestamp":42}"#;
    let ev = Event::decode(raw).unwrap();

    assert_eq!(ev.event_type, "update");
    assert_eq!(ev.origin, InstanceId::from("peer-1"));
    assert_eq!(ev.payload["clients"], 3);
    assert!(ev.is_from(&InstanceId::from("peer-1")));
    assert!(!ev.is_from(&InstanceId::from("peer-2")));
}

#[test]
fn envelope_missing_server_id_is_rejected() {
    let raw = r#"{"eventType":"update","payload":{},"timestamp":42}"#;
    assert!(Event::decode(raw).is_err());
}

#[test]
fn live_frame_carries_bare_payload() {
    let ev = Event::new("alert", json!({"text": "fire"}), 7, "inst-a".into());
    let frame = Frame::event(9, &ev);

    assert_eq!(frame.id, 9);
    assert_eq!(frame.event, "alert");
    assert_eq!(frame.data, r#"{"text":"fire"}"#);
}

#[test]
fn connected_frame_names_client_and_server() {
    let notice = ConnectedNotice::new(SubscriberId::from("c-1"), InstanceId::from("s-1"));
    let frame = Frame::connected(1, &notice);

    assert_eq!(frame.event, names::CONNECTED);
    assert!(frame.data.contains(r#""clientId":"c-1""#));
    assert!(frame.data.contains(r#""serverId":"s-1""#));
    assert!(frame.data.contains(r#""message""#));
}

#[test]
fn history_frame_lists_items_oldest_first() {
    let events = vec![
        Event::new("message", json!({"text": "one"}), 1, "a".into()),
        Event::new("update", json!({"text": "two"}), 2, "b".into()),
    ];
    let snapshot: HistorySnapshot = events.iter().collect();
    let frame = Frame::history(3, &snapshot);

    assert_eq!(frame.event, names::HISTORY);
    let body: serde_json::Value = serde_json::from_str(&frame.data).unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["eventType"], "message");
    assert_eq!(body["items"][0]["data"]["text"], "one");
    assert_eq!(body["items"][1]["timestamp"], 2);
}

#[test]
fn empty_history_frame_has_zero_count() {
    let snapshot = HistorySnapshot::new(Vec::new());
    let frame = Frame::history(1, &snapshot);
    assert_eq!(frame.data, r#"{"items":[],"count":0}"#);
}
