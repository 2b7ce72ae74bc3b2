use super::*;
use crate::config::ServerConfig;
use crate::state::test_helpers;
use serde_json::json;
use tokio::time::{Duration, timeout};

fn notify_state() -> AppState {
    AppState::new(ServerConfig { reject_policy: RejectPolicy::Notify, ..ServerConfig::default() })
}

async fn assert_no_broadcast(rx: &mut mpsc::Receiver<Arc<str>>) {
    assert!(
        timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
        "expected no broadcast frame"
    );
}

// =============================================================================
// canvas_id_from_path
// =============================================================================

#[test]
fn canvas_id_is_last_segment() {
    assert_eq!(canvas_id_from_path("room1"), Some("room1"));
    assert_eq!(canvas_id_from_path("team/room1"), Some("room1"));
}

#[test]
fn empty_canvas_id_is_rejected() {
    assert_eq!(canvas_id_from_path(""), None);
    assert_eq!(canvas_id_from_path("room1/"), None);
}

// =============================================================================
// process_inbound_text
// =============================================================================

#[tokio::test]
async fn applied_mutation_sends_nothing_back() {
    let state = test_helpers::test_app_state();
    let (origin, _origin_rx) = test_helpers::test_session(8);
    let (peer, mut peer_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let attached = state.canvases.attach("room1", origin).await;
    let _ = state.canvases.attach("room1", peer).await;

    let text = json!({"type": "new-circle", "circle": {"x": 10, "y": 10, "r": 28, "color": "orange", "name": "Alpha"}});
    let reply = process_inbound_text(&state, &attached.canvas, origin_id, &text.to_string()).await;
    assert!(reply.is_none());

    let payload = timeout(Duration::from_millis(200), peer_rx.recv())
        .await
        .expect("peer receive timed out")
        .expect("peer channel closed");
    let frame: Frame = serde_json::from_str(&payload).unwrap();
    assert_eq!(frame.kind(), "new-circle");
}

#[tokio::test]
async fn silent_policy_drops_ignored_mutation() {
    let state = test_helpers::test_app_state();
    let (origin, _origin_rx) = test_helpers::test_session(8);
    let (peer, mut peer_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let attached = state.canvases.attach("room1", origin).await;
    let _ = state.canvases.attach("room1", peer).await;

    let text = json!({"type": "update-circle-color", "circle": {"id": "missing", "color": "blue"}});
    let reply = process_inbound_text(&state, &attached.canvas, origin_id, &text.to_string()).await;
    assert!(reply.is_none());
    assert_no_broadcast(&mut peer_rx).await;
}

#[tokio::test]
async fn silent_policy_drops_malformed_message() {
    let state = test_helpers::test_app_state();
    let (origin, _origin_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let attached = state.canvases.attach("room1", origin).await;

    let reply = process_inbound_text(&state, &attached.canvas, origin_id, "{oops").await;
    assert!(reply.is_none());
}

#[tokio::test]
async fn notify_policy_replies_with_rejected() {
    let state = notify_state();
    let (origin, _origin_rx) = test_helpers::test_session(8);
    let (peer, mut peer_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let attached = state.canvases.attach("room1", origin).await;
    let _ = state.canvases.attach("room1", peer).await;

    let text = json!({"type": "update-circle-color", "circle": {"id": "missing", "color": "blue"}});
    let reply = process_inbound_text(&state, &attached.canvas, origin_id, &text.to_string()).await;
    assert_eq!(
        reply,
        Some(Frame::Rejected { code: "E_CIRCLE_NOT_FOUND".into(), message: "circle not found: missing".into() })
    );
    assert_no_broadcast(&mut peer_rx).await;
}

#[tokio::test]
async fn notify_policy_reports_unknown_kind() {
    let state = notify_state();
    let (origin, _origin_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let attached = state.canvases.attach("room1", origin).await;

    let reply = process_inbound_text(&state, &attached.canvas, origin_id, r#"{"type":"delete-circle"}"#).await;
    let Some(Frame::Rejected { code, .. }) = reply else {
        panic!("expected rejected frame");
    };
    assert_eq!(code, "E_UNKNOWN_KIND");
}

#[tokio::test]
async fn notify_policy_stays_quiet_on_success() {
    let state = notify_state();
    let (origin, _origin_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let attached = state.canvases.attach("room1", origin).await;

    let text = json!({"type": "new-connection", "connection": {"startId": "a", "endId": "b", "lr": 0}});
    let reply = process_inbound_text(&state, &attached.canvas, origin_id, &text.to_string()).await;
    assert!(reply.is_none());
    assert_eq!(attached.canvas.lock().await.connections.len(), 1);
}
