use serde_json::json;

use aula::live::codec::{self, Packet, SocketPacket};
use aula::live::event::{LiveEvent, ScanAction};
use aula::live::{SessionTracker, WhatsAppState};

#[tokio::test]
async fn test_decode_engine_open_and_ping() {
    let open = codec::decode(
        r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
    )
    .unwrap();
    match open {
        Packet::Open(handshake) => {
            assert_eq!(handshake.sid, "abc");
            assert_eq!(handshake.liveness_timeout().as_millis(), 45000);
        }
        other => panic!("unexpected packet {:?}", other),
    }

    assert_eq!(codec::decode("2").unwrap(), Packet::Ping(String::new()));
    assert_eq!(codec::encode_pong(""), "3");
    assert_eq!(codec::decode("6").unwrap(), Packet::Noop);
}

#[tokio::test]
async fn test_decode_socket_packets() {
    assert_eq!(
        codec::decode(r#"40{"sid":"xyz"}"#).unwrap(),
        Packet::Message(SocketPacket::Connect {
            namespace: "/".to_string(),
            payload: Some(json!({"sid": "xyz"})),
        })
    );

    assert_eq!(
        codec::decode(r#"42["qr","data:image/png;base64,AAA"]"#).unwrap(),
        Packet::Message(SocketPacket::Event {
            namespace: "/".to_string(),
            ack: None,
            name: "qr".to_string(),
            data: json!("data:image/png;base64,AAA"),
        })
    );

    assert_eq!(
        codec::decode(r#"42/rfid,7["rfid_read",{"uid":"04A1"}]"#).unwrap(),
        Packet::Message(SocketPacket::Event {
            namespace: "/rfid".to_string(),
            ack: Some(7),
            name: "rfid_read".to_string(),
            data: json!({"uid": "04A1"}),
        })
    );

    assert_eq!(
        codec::decode(r#"42["connecting"]"#).unwrap(),
        Packet::Message(SocketPacket::Event {
            namespace: "/".to_string(),
            ack: None,
            name: "connecting".to_string(),
            data: serde_json::Value::Null,
        })
    );

    assert_eq!(
        codec::decode(r#"44{"message":"Not authorized"}"#).unwrap(),
        Packet::Message(SocketPacket::ConnectError {
            namespace: "/".to_string(),
            message: "Not authorized".to_string(),
        })
    );
}

#[tokio::test]
async fn test_decode_rejects_garbage() {
    assert!(codec::decode("").is_err());
    assert!(codec::decode("9").is_err());
    assert!(codec::decode("42{not json").is_err());
    assert!(codec::decode(r#"451-["upload",{"_placeholder":true,"num":0}]"#).is_err());
}

#[tokio::test]
async fn test_encode_frames() {
    assert_eq!(codec::encode_connect("/"), "40");
    assert_eq!(codec::encode_connect("/admin"), "40/admin,");
    assert_eq!(
        codec::encode_event("ping", &json!({"a": 1})),
        r#"42["ping",{"a":1}]"#
    );
    assert_eq!(
        codec::endpoint_url("https://bridge.example.com/"),
        "wss://bridge.example.com/socket.io/?EIO=4&transport=websocket"
    );
    assert_eq!(
        codec::endpoint_url("http://localhost:4000"),
        "ws://localhost:4000/socket.io/?EIO=4&transport=websocket"
    );
}

#[tokio::test]
async fn test_scan_payload_discriminators() {
    let attendance = LiveEvent::decode(
        "rfid_read",
        json!({
            "type": "attendance",
            "uid": "04A1",
            "user": {"id": 5, "name": "Ana"},
            "attendance": {"date": "2024-05-06", "paralelo_id": 3, "action": "check_out", "record_id": 9}
        }),
    );
    match &attendance {
        LiveEvent::Attendance(scan) => {
            assert_eq!(scan.action(), ScanAction::CheckOut);
            assert_eq!(scan.describe(), "Ana: check-out recorded");
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert_eq!(
        LiveEvent::decode("rfid_read", json!({"event": "unknown_uid", "uid": "04B2", "date": "2024-05-06"})),
        LiveEvent::UnknownUid {
            uid: "04B2".to_string(),
            date: Some("2024-05-06".to_string()),
        }
    );

    assert_eq!(
        LiveEvent::decode("rfid_read", json!({"uid": "04C3"})),
        LiveEvent::RfidRead {
            uid: "04C3".to_string()
        }
    );

    assert!(matches!(
        LiveEvent::decode("unknown_uid", json!({"date": "2024-05-06"})),
        LiveEvent::Other { .. }
    ));
}

#[tokio::test]
async fn test_attendance_scan_defaults() {
    let event = LiveEvent::decode("attendance", json!({"uid": "04A1"}));
    match event {
        LiveEvent::Attendance(scan) => {
            assert_eq!(scan.action(), ScanAction::CheckIn);
            assert_eq!(scan.describe(), "Student: check-in recorded");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_whatsapp_tracker_follows_bridge() {
    let mut tracker = SessionTracker::new();
    assert_eq!(tracker.state, WhatsAppState::Initializing);

    assert!(tracker.apply(&LiveEvent::decode("connecting", serde_json::Value::Null)));
    assert_eq!(tracker.state, WhatsAppState::Connecting);

    tracker.apply(&LiveEvent::decode("qr", json!("data:image/png;base64,QQ")));
    assert_eq!(tracker.state, WhatsAppState::NotConnected);
    assert!(tracker.needs_pairing());

    tracker.apply(&LiveEvent::decode(
        "status",
        json!({"connected": true, "stats": {"messagesCount": 12, "sessionDuration": "2h"}}),
    ));
    assert_eq!(tracker.state, WhatsAppState::Connected);
    assert_eq!(tracker.qr, None);
    assert_eq!(tracker.stats.messages_count, Some(12));

    assert!(!tracker.apply(&LiveEvent::Connected));

    tracker.apply(&LiveEvent::decode("whatsapp_error", json!("session expired")));
    assert_eq!(tracker.state, WhatsAppState::Error);
    assert_eq!(tracker.error.as_deref(), Some("session expired"));

    tracker.logged_out();
    assert_eq!(tracker.state, WhatsAppState::NotConnected);
    assert!(!tracker.needs_pairing());
}
