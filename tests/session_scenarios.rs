//! Subscriber session behavior against a scripted transport
//!
//! Tests the session's observable contract:
//! - Subscribe exactly once per accepted connection, never on refusal
//! - One output line per matching message, payload untouched, in order
//! - Termination reasons for interrupt, transport end and transport failure

use mqtt_testclient::session::{
    PrintSubscriber, Session, SessionState, Subscription, TerminationReason,
};
use mqtt_testclient::testing::{MockTransport, SharedSink};
use mqtt_testclient::transport::{ConnectReturnCode, InboundMessage, TransportEvent};
use rumqttc::QoS;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

const FILTER: &str = "/vvm/visitorcounter/#";

fn subscriber(sink: &SharedSink) -> PrintSubscriber<SharedSink> {
    PrintSubscriber::new(Subscription::new(FILTER, QoS::AtMostOnce), sink.clone())
}

fn session_for(
    transport: MockTransport,
    sink: &SharedSink,
) -> Session<MockTransport, PrintSubscriber<SharedSink>> {
    Session::new(transport, subscriber(sink))
}

#[tokio::test]
async fn test_accepted_connection_prints_published_message() {
    // Arrange: broker accepts, then publishes on a matching topic
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .suback(vec![0x00])
        .message("/vvm/visitorcounter/lobby", "42");
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    // Act
    let reason = session.run(shutdown_rx).await;

    // Assert
    assert_eq!(reason, TerminationReason::TransportClosed);
    assert_eq!(
        session.transport().subscriptions(),
        &[Subscription::new(FILTER, QoS::AtMostOnce)]
    );
    assert_eq!(sink.contents(), b"/vvm/visitorcounter/lobby 42\n");
    assert_eq!(session.handler().printed(), 1);
}

#[tokio::test]
async fn test_refused_connection_stays_in_loop_without_subscribing() {
    // Arrange: broker refuses with 5 (not authorized), connection stays open
    let sink = SharedSink::new();
    let transport = MockTransport::new().connack(5).hold_open();
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    // Act: the loop must still be running after a while
    let still_running = timeout(Duration::from_millis(100), session.run(shutdown_rx)).await;

    // Assert
    assert!(still_running.is_err(), "session should remain in the receive loop");
    assert!(session.transport().subscriptions().is_empty());
    assert_eq!(
        session.state(),
        &SessionState::Refused(ConnectReturnCode::NotAuthorized)
    );
    assert!(sink.contents().is_empty());
}

#[tokio::test]
async fn test_every_nonzero_code_skips_subscribe() {
    for code in 1..=5u8 {
        let sink = SharedSink::new();
        let transport = MockTransport::new()
            .connack(code)
            .message("/vvm/visitorcounter/lobby", "42");
        let mut session = session_for(transport, &sink);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let reason = session.run(shutdown_rx).await;

        assert_eq!(reason, TerminationReason::TransportClosed);
        assert!(
            session.transport().subscriptions().is_empty(),
            "code {code} must not subscribe"
        );
        assert!(sink.contents().is_empty(), "code {code} must not print");
    }
}

#[tokio::test]
async fn test_messages_printed_in_delivery_order() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .message("/vvm/visitorcounter/lobby", "1")
        .message("/vvm/visitorcounter/exit", "2")
        .message("/vvm/visitorcounter/lobby", "3");
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    session.run(shutdown_rx).await;

    assert_eq!(
        sink.lines(),
        vec![
            "/vvm/visitorcounter/lobby 1",
            "/vvm/visitorcounter/exit 2",
            "/vvm/visitorcounter/lobby 3",
        ]
    );
}

#[tokio::test]
async fn test_payload_bytes_are_not_transformed() {
    let payload = vec![0x00, 0xc3, 0x28, b' ', 0xff];
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .message("/vvm/visitorcounter/raw", payload.clone());
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    session.run(shutdown_rx).await;

    let mut expected = b"/vvm/visitorcounter/raw ".to_vec();
    expected.extend_from_slice(&payload);
    expected.push(b'\n');
    assert_eq!(sink.contents(), expected);
}

#[tokio::test]
async fn test_messages_outside_the_filter_are_dropped() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .message("/vvm/other/lobby", "stray")
        .message("/vvm/visitorcounter/lobby", "42");
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    session.run(shutdown_rx).await;

    assert_eq!(sink.lines(), vec!["/vvm/visitorcounter/lobby 42"]);
}

#[tokio::test]
async fn test_messages_before_connack_are_dropped() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .message("/vvm/visitorcounter/lobby", "early")
        .connack(0);
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    session.run(shutdown_rx).await;

    assert!(sink.contents().is_empty());
    assert_eq!(session.transport().subscriptions().len(), 1);
}

#[tokio::test]
async fn test_each_accepted_connack_subscribes_once() {
    // A collaborator that reconnects internally delivers a second CONNACK
    let sink = SharedSink::new();
    let transport = MockTransport::new().connack(0).connack(0);
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    session.run(shutdown_rx).await;

    assert_eq!(session.transport().subscriptions().len(), 2);
}

#[tokio::test]
async fn test_suback_moves_session_to_subscribed() {
    let sink = SharedSink::new();
    let transport = MockTransport::new().connack(0).suback(vec![0x00]).hold_open();
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let _ = timeout(Duration::from_millis(50), session.run(shutdown_rx)).await;

    assert_eq!(session.state(), &SessionState::Subscribed);
    assert_eq!(
        session.active_subscription().map(|s| s.topic.as_str()),
        Some(FILTER)
    );
}

#[tokio::test]
async fn test_rejected_suback_keeps_session_connected() {
    let sink = SharedSink::new();
    let transport = MockTransport::new().connack(0).suback(vec![0x80]).hold_open();
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let _ = timeout(Duration::from_millis(50), session.run(shutdown_rx)).await;

    assert_eq!(session.state(), &SessionState::Connected);
}

#[tokio::test]
async fn test_shutdown_interrupts_idle_session() {
    let sink = SharedSink::new();
    let transport = MockTransport::new().connack(0).hold_open();
    let mut session = session_for(transport, &sink);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (reason, _) = tokio::join!(session.run(shutdown_rx), async {
        sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(true).expect("session holds the receiver");
    });

    assert_eq!(reason, TerminationReason::Interrupted);
    assert!(reason.is_clean());
}

#[tokio::test]
async fn test_shutdown_requested_before_run() {
    let sink = SharedSink::new();
    let transport = MockTransport::new().connack(0).message("/vvm/visitorcounter/a", "1");
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    let reason = session.run(shutdown_rx).await;

    assert_eq!(reason, TerminationReason::Interrupted);
    assert_eq!(session.transport().remaining_events(), 2);
    assert!(sink.contents().is_empty());
}

#[tokio::test]
async fn test_dropped_shutdown_sender_runs_until_transport_ends() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .message("/vvm/visitorcounter/lobby", "42");
    let mut session = session_for(transport, &sink);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);

    let reason = session.run(shutdown_rx).await;

    assert_eq!(reason, TerminationReason::TransportClosed);
    assert_eq!(sink.lines(), vec!["/vvm/visitorcounter/lobby 42"]);
}

#[tokio::test]
async fn test_transport_failure_is_reported() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .message("/vvm/visitorcounter/lobby", "42")
        .failing_with("connection reset by peer");
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let reason = session.run(shutdown_rx).await;

    match reason {
        TerminationReason::TransportFailed(message) => {
            assert!(message.contains("connection reset by peer"))
        }
        other => panic!("expected TransportFailed, got {other:?}"),
    }
    assert_eq!(session.state(), &SessionState::Disconnected);
    assert_eq!(sink.lines(), vec!["/vvm/visitorcounter/lobby 42"]);
}

#[tokio::test]
async fn test_subscribe_failure_ends_session() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .message("/vvm/visitorcounter/lobby", "42")
        .with_subscribe_failure();
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let reason = session.run(shutdown_rx).await;

    assert!(matches!(reason, TerminationReason::TransportFailed(_)));
    assert!(sink.contents().is_empty());
}

#[tokio::test]
async fn test_broker_disconnect_closes_session() {
    let sink = SharedSink::new();
    let transport = MockTransport::new()
        .connack(0)
        .with_event(TransportEvent::Disconnected)
        .message("/vvm/visitorcounter/lobby", "after");
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let reason = session.run(shutdown_rx).await;

    assert_eq!(reason, TerminationReason::TransportClosed);
    assert!(sink.contents().is_empty());
}

#[tokio::test]
async fn test_retained_messages_are_printed() {
    let sink = SharedSink::new();
    let mut retained = InboundMessage::new("/vvm/visitorcounter/lobby", "17");
    retained.retain = true;
    let transport = MockTransport::new()
        .connack(0)
        .with_event(TransportEvent::Message(retained));
    let mut session = session_for(transport, &sink);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    session.run(shutdown_rx).await;

    assert_eq!(sink.lines(), vec!["/vvm/visitorcounter/lobby 17"]);
}
