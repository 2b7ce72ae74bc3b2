use super::*;
use crate::state::test_helpers;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

fn sample_frame() -> Frame {
    Frame::NewCircle { circle: test_helpers::dummy_shape("s1") }
}

async fn recv_frame(rx: &mut mpsc::Receiver<Arc<str>>) -> Frame {
    let payload = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("broadcast receive timed out")
        .expect("broadcast channel closed unexpectedly");
    serde_json::from_str(&payload).expect("broadcast payload should be a frame")
}

async fn assert_nothing_received(rx: &mut mpsc::Receiver<Arc<str>>) {
    assert!(
        timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
        "expected no broadcast frame"
    );
}

#[tokio::test]
async fn fan_out_skips_excluded_session() {
    let mut canvas = CanvasState::new();
    let (origin, mut origin_rx) = test_helpers::test_session(8);
    let (peer, mut peer_rx) = test_helpers::test_session(8);
    canvas.sessions.insert(origin.id, origin.tx.clone());
    canvas.sessions.insert(peer.id, peer.tx.clone());

    let delivery = fan_out(&canvas, &sample_frame(), Some(origin.id));
    assert_eq!(delivery, Delivery { delivered: 1, closed: 0, lagged: 0 });

    assert_eq!(recv_frame(&mut peer_rx).await, sample_frame());
    assert_nothing_received(&mut origin_rx).await;
}

#[tokio::test]
async fn fan_out_without_exclusion_reaches_everyone() {
    let mut canvas = CanvasState::new();
    let (a, mut rx_a) = test_helpers::test_session(8);
    let (b, mut rx_b) = test_helpers::test_session(8);
    canvas.sessions.insert(a.id, a.tx.clone());
    canvas.sessions.insert(b.id, b.tx.clone());

    let delivery = fan_out(&canvas, &sample_frame(), None);
    assert_eq!(delivery.delivered, 2);
    assert_eq!(recv_frame(&mut rx_a).await, sample_frame());
    assert_eq!(recv_frame(&mut rx_b).await, sample_frame());
}

#[test]
fn fan_out_to_empty_canvas_is_noop() {
    let canvas = CanvasState::new();
    assert_eq!(fan_out(&canvas, &sample_frame(), None), Delivery::default());
}

#[test]
fn fan_out_counts_closed_sessions() {
    let mut canvas = CanvasState::new();
    let (gone, gone_rx) = test_helpers::test_session(8);
    canvas.sessions.insert(gone.id, gone.tx.clone());
    drop(gone_rx);

    let delivery = fan_out(&canvas, &sample_frame(), None);
    assert_eq!(delivery, Delivery { delivered: 0, closed: 1, lagged: 0 });
}

#[tokio::test]
async fn fan_out_skips_full_session_without_blocking() {
    let mut canvas = CanvasState::new();
    let (slow, _slow_rx) = test_helpers::test_session(1);
    let (fast, mut fast_rx) = test_helpers::test_session(8);
    canvas.sessions.insert(slow.id, slow.tx.clone());
    canvas.sessions.insert(fast.id, fast.tx.clone());

    let first = fan_out(&canvas, &sample_frame(), None);
    assert_eq!(first.delivered, 2);

    // The slow session's single slot is still occupied.
    let second = fan_out(&canvas, &sample_frame(), None);
    assert_eq!(second, Delivery { delivered: 1, closed: 0, lagged: 1 });

    assert_eq!(recv_frame(&mut fast_rx).await, sample_frame());
    assert_eq!(recv_frame(&mut fast_rx).await, sample_frame());
}

#[tokio::test]
async fn broadcast_by_canvas_id() {
    let registry = CanvasRegistry::new();
    let (origin, mut origin_rx) = test_helpers::test_session(8);
    let (peer, mut peer_rx) = test_helpers::test_session(8);
    let origin_id = origin.id;
    let _a = registry.attach("room1", origin).await;
    let _b = registry.attach("room1", peer).await;

    let delivery = broadcast(&registry, "room1", &sample_frame(), Some(origin_id)).await;
    assert_eq!(delivery.delivered, 1);
    assert_eq!(recv_frame(&mut peer_rx).await, sample_frame());
    assert_nothing_received(&mut origin_rx).await;
}

#[tokio::test]
async fn broadcast_is_scoped_to_one_canvas() {
    let registry = CanvasRegistry::new();
    let (here, mut here_rx) = test_helpers::test_session(8);
    let (elsewhere, mut elsewhere_rx) = test_helpers::test_session(8);
    let _a = registry.attach("room1", here).await;
    let _b = registry.attach("room2", elsewhere).await;

    broadcast(&registry, "room1", &sample_frame(), None).await;
    assert_eq!(recv_frame(&mut here_rx).await, sample_frame());
    assert_nothing_received(&mut elsewhere_rx).await;
}

#[tokio::test]
async fn broadcast_to_unknown_canvas_delivers_nothing() {
    let registry = CanvasRegistry::new();
    let delivery = broadcast(&registry, "ghost", &sample_frame(), None).await;
    assert_eq!(delivery, Delivery::default());
    assert!(registry.is_empty().await);
}
