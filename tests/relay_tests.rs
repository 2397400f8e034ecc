//! Integration tests for relay lifecycle and message validation
use std::time::{Duration, Instant};

use serde_json::json;

use murmur::connection::ConnectionId;
use murmur::error::Rejection;
use murmur::identity::{ADJECTIVES, NOUNS, SUFFIX_BOUND};
use murmur::presence::{outbox, Inbox, PresenceRegistry};
use murmur::protocol::ServerEvent;
use murmur::relay::{BroadcastState, Outcome};
use murmur::settings::RelaySettings;

fn new_state() -> BroadcastState {
    BroadcastState::with_presence(RelaySettings::default(), PresenceRegistry::with_seed(2024))
}

fn drain(inbox: &mut Inbox) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = inbox.try_recv() {
        events.push((*event).clone());
    }
    events
}

fn connect(state: &mut BroadcastState, id: u64) -> (ConnectionId, Inbox, String) {
    let connection_id = ConnectionId::new(id);
    let (tx, rx) = outbox();
    let name = state.connect(connection_id, tx);
    (connection_id, rx, name.to_string())
}

fn is_valid_pseudonym(name: &str) -> bool {
    ADJECTIVES.iter().any(|adjective| {
        name.strip_prefix(adjective).map_or(false, |rest| {
            NOUNS.iter().any(|noun| {
                rest.strip_prefix(noun)
                    .and_then(|digits| digits.parse::<u16>().ok())
                    .map_or(false, |n| n < SUFFIX_BOUND)
            })
        })
    })
}

#[test]
fn test_first_connection_is_welcomed_and_announced() {
    let mut state = new_state();
    let (_a, mut rx_a, name) = connect(&mut state, 1);

    assert!(is_valid_pseudonym(&name), "bad pseudonym {}", name);
    let events = drain(&mut rx_a);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ServerEvent::Welcome(welcome) => {
            assert_eq!(welcome.username.as_str(), name);
            assert_eq!(welcome.online_count, 1);
        }
        other => panic!("expected welcome, got {:?}", other),
    }
    assert_eq!(
        events[1],
        ServerEvent::System(format!("{} joined the chat (1 online)", name))
    );
}

#[test]
fn test_join_is_broadcast_to_existing_connections() {
    let mut state = new_state();
    let (_a, mut rx_a, _) = connect(&mut state, 1);
    drain(&mut rx_a);

    let (_b, mut rx_b, name_b) = connect(&mut state, 2);
    let joined = ServerEvent::System(format!("{} joined the chat (2 online)", name_b));
    assert_eq!(drain(&mut rx_a), vec![joined.clone()]);

    let events_b = drain(&mut rx_b);
    assert!(matches!(&events_b[0], ServerEvent::Welcome(w) if w.online_count == 2));
    assert_eq!(events_b[1], joined);
}

#[test]
fn test_ten_messages_then_rate_limited() {
    let mut state = new_state();
    let (a, mut rx_a, name_a) = connect(&mut state, 1);
    let (_b, mut rx_b, _) = connect(&mut state, 2);
    drain(&mut rx_a);
    drain(&mut rx_b);

    let start = Instant::now();
    for n in 0..10u64 {
        let at = start + Duration::from_millis(n * 500);
        assert_eq!(
            state.handle_incoming(a, &json!({"text": "hi"}), at),
            Outcome::Delivered { id: n }
        );
    }
    for rx in [&mut rx_a, &mut rx_b] {
        let ids: Vec<u64> = drain(rx)
            .into_iter()
            .map(|event| match event {
                ServerEvent::Message(message) => {
                    assert_eq!(message.username.as_str(), name_a);
                    assert_eq!(message.text, "hi");
                    message.id
                }
                other => panic!("expected message, got {:?}", other),
            })
            .collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    let outcome = state.handle_incoming(a, &json!({"text": "hi"}), start + Duration::from_secs(6));
    assert_eq!(outcome, Outcome::Rejected(Rejection::RateLimitExceeded));
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::Error(
            "Message rate limit exceeded. Please wait.".to_string()
        )]
    );
    assert!(drain(&mut rx_b).is_empty());
    assert_eq!(state.next_message_id(), 10);
}

#[test]
fn test_window_reset_admits_again() {
    let mut state = new_state();
    let (a, _rx_a, _) = connect(&mut state, 1);
    let start = Instant::now();
    for _ in 0..10 {
        state.handle_incoming(a, &json!({"text": "hi"}), start);
    }
    assert_eq!(
        state.handle_incoming(a, &json!({"text": "hi"}), start + Duration::from_secs(30)),
        Outcome::Rejected(Rejection::RateLimitExceeded)
    );

    let later = start + Duration::from_secs(31);
    assert_eq!(
        state.handle_incoming(a, &json!({"text": "again"}), later),
        Outcome::Delivered { id: 10 }
    );
    assert_eq!(state.admission().window(a).unwrap().count, 1);
}

#[test]
fn test_long_message_is_rejected() {
    let mut state = new_state();
    let (a, mut rx_a, _) = connect(&mut state, 1);
    let (_b, mut rx_b, _) = connect(&mut state, 2);
    drain(&mut rx_a);
    drain(&mut rx_b);

    let outcome = state.handle_incoming(a, &json!({"text": "x".repeat(501)}), Instant::now());
    assert_eq!(outcome, Outcome::Rejected(Rejection::MessageTooLong));
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerEvent::Error(
            "Message too long (max 500 characters)".to_string()
        )]
    );
    assert!(drain(&mut rx_b).is_empty());
    assert_eq!(state.next_message_id(), 0);

    // exactly at the limit goes through
    let outcome = state.handle_incoming(a, &json!({"text": "x".repeat(500)}), Instant::now());
    assert_eq!(outcome, Outcome::Delivered { id: 0 });
}

#[test]
fn test_long_message_rejected_even_when_rate_limited() {
    let mut state = new_state();
    let (a, mut rx_a, _) = connect(&mut state, 1);
    let now = Instant::now();
    for _ in 0..10 {
        state.handle_incoming(a, &json!({"text": "hi"}), now);
    }
    drain(&mut rx_a);

    let outcome = state.handle_incoming(a, &json!({"text": "x".repeat(501)}), now);
    assert_eq!(outcome, Outcome::Rejected(Rejection::RateLimitExceeded));
    assert!(drain(&mut rx_a)
        .iter()
        .all(|event| !matches!(event, ServerEvent::Message(_))));
}

#[test]
fn test_malformed_payloads_are_silent() {
    let mut state = new_state();
    let (a, mut rx_a, _) = connect(&mut state, 1);
    drain(&mut rx_a);

    for payload in [
        json!({}),
        json!({"text": 42}),
        json!({"text": ""}),
        json!("hi"),
        json!(null),
        json!([{"text": "hi"}]),
    ] {
        assert_eq!(
            state.handle_incoming(a, &payload, Instant::now()),
            Outcome::Rejected(Rejection::MalformedInput)
        );
    }
    assert!(drain(&mut rx_a).is_empty());
    assert!(state.admission().is_empty());
    assert_eq!(state.next_message_id(), 0);
}

#[test]
fn test_unregistered_sender_leaves_no_state() {
    let mut state = new_state();
    let stranger = ConnectionId::new(77);
    assert_eq!(
        state.handle_incoming(stranger, &json!({"text": "hi"}), Instant::now()),
        Outcome::Rejected(Rejection::UnregisteredSender)
    );
    assert!(state.admission().is_empty());
}

#[test]
fn test_disconnect_tears_down_and_announces() {
    let mut state = new_state();
    let (a, mut rx_a, name_a) = connect(&mut state, 1);
    let (_b, mut rx_b, _) = connect(&mut state, 2);
    state.handle_incoming(a, &json!({"text": "bye"}), Instant::now());
    assert!(state.admission().window(a).is_some());
    drain(&mut rx_a);
    drain(&mut rx_b);

    assert_eq!(state.disconnect(a).unwrap().as_str(), name_a);
    assert!(!state.presence().contains(a));
    assert!(state.admission().window(a).is_none());
    assert_eq!(
        drain(&mut rx_b),
        vec![ServerEvent::System(format!("{} left the chat (1 online)", name_a))]
    );
    // the leaver is no longer on the fan-out list
    assert!(drain(&mut rx_a).is_empty());
}

#[test]
fn test_unregistered_disconnect_is_suppressed() {
    let mut state = new_state();
    let (_a, mut rx_a, _) = connect(&mut state, 1);
    drain(&mut rx_a);

    assert_eq!(
        state.disconnect(ConnectionId::new(99)),
        Err(Rejection::UnregisteredDisconnect)
    );
    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(state.snapshot().online, 1);
}

#[test]
fn test_ids_continue_across_senders() {
    let mut state = new_state();
    let (a, _rx_a, _) = connect(&mut state, 1);
    let (b, _rx_b, _) = connect(&mut state, 2);
    let now = Instant::now();

    let mut ids = Vec::new();
    for sender in [a, b, a, b, b] {
        if let Outcome::Delivered { id } = state.handle_incoming(sender, &json!({"text": "m"}), now) {
            ids.push(id);
        }
    }
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);

    // rejects do not burn ids
    state.handle_incoming(a, &json!({"text": "y".repeat(600)}), now);
    assert_eq!(
        state.handle_incoming(b, &json!({"text": "m"}), now),
        Outcome::Delivered { id: 5 }
    );
}

#[test]
fn test_message_timestamp_is_iso_8601() {
    let mut state = new_state();
    let (a, mut rx_a, _) = connect(&mut state, 1);
    drain(&mut rx_a);
    state.handle_incoming(a, &json!({"text": "<script>"}), Instant::now());

    match drain(&mut rx_a).pop() {
        Some(ServerEvent::Message(message)) => {
            // literal text, no escaping
            assert_eq!(message.text, "<script>");
            assert!(message.timestamp.ends_with('Z'));
            assert!(chrono::DateTime::parse_from_rfc3339(&message.timestamp).is_ok());
        }
        other => panic!("expected message, got {:?}", other),
    }
}
