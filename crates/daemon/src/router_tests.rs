// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scheduler::SchedulerHandle;

fn router() -> Arc<Router> {
    Router::new("/home/pixoo")
}

#[test]
fn parse_topic_splits_host_and_suffix() {
    let r = Router::new("/home/pixoo");
    let parsed = r.parse_topic("/home/pixoo/10.0.0.5/scene/switch").expect("parses");
    assert_eq!(parsed, ParsedTopic::Device { host: "10.0.0.5", suffix: "scene/switch" });
}

#[test]
fn parse_topic_recognizes_state_update() {
    let r = Router::new("/home/pixoo");
    let parsed = r.parse_topic("/home/pixoo/state/update").expect("parses");
    assert_eq!(parsed, ParsedTopic::StateUpdate);
}

#[test]
fn parse_topic_rejects_wrong_base() {
    let r = Router::new("/home/pixoo");
    assert!(r.parse_topic("/other/base/10.0.0.5/scene/switch").is_none());
}

#[tokio::test]
async fn route_mqtt_dispatches_scene_switch_to_bound_mailbox() {
    let r = router();
    let (handle, mut mailbox) = SchedulerHandle::new();
    r.bind("10.0.0.5", handle).await;

    r.route_mqtt(
        "/home/pixoo/10.0.0.5/scene/switch",
        br#"{"scene":"clock","clear":true}"#,
    )
    .await;

    let envelope = mailbox.recv().await.expect("command delivered");
    match envelope.command {
        Command::Switch { scene, clear, .. } => {
            assert_eq!(scene, "clock");
            assert!(clear);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn route_mqtt_on_unknown_device_does_not_panic() {
    let r = router();
    // No device bound — this must warn-log and return, not panic.
    r.route_mqtt("/home/pixoo/ghost/scene/stop", b"{}").await;
}

#[tokio::test]
async fn route_mqtt_drops_invalid_topic() {
    let r = router();
    r.route_mqtt("totally/unrelated/topic", b"{}").await;
}

#[tokio::test]
async fn http_switch_requires_known_device() {
    let r = router();
    let err = r.http_switch("ghost", "clock".to_owned(), Default::default(), true).await.unwrap_err();
    assert_eq!(err, FleetError::DeviceNotFound);
}

#[tokio::test]
async fn http_set_brightness_rejects_out_of_range() {
    let r = router();
    let (handle, _mailbox) = SchedulerHandle::new();
    r.bind("10.0.0.5", handle).await;

    let err = r.http_set_brightness("10.0.0.5", 101).await.unwrap_err();
    assert_eq!(err, FleetError::ValidationError);
}

