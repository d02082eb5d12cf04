//! Integration tests for the chainx-signer-core frame codec.
//!
//! These tests drive the public API the way the client dispatcher does:
//! typed payloads are encoded into wire text, and wire text captured from a
//! signer is decoded back into frames whose payloads deserialize into the
//! typed structs.

use chainx_signer_core::{
    decode_frame, encode_frame,
    protocol::{
        frame::encode_bare_frame,
        messages::{ApiPayload, ApiRequest, Envelope, EventMessage, PairRequest, Rekeyed, TxStatusEvent},
    },
    Decoded, Frame, FrameType,
};
use serde_json::{json, Value};

fn frame_of(text: &str) -> Frame {
    match decode_frame(text).expect("decode must succeed") {
        Decoded::Frame(frame) => frame,
        Decoded::NotAFrame => panic!("expected a frame"),
    }
}

#[test]
fn test_outbound_pair_frame_decodes_to_same_envelope() {
    // Arrange
    let envelope = Envelope {
        data: PairRequest {
            appkey: "appkey:1234".to_string(),
            origin: "example.com".to_string(),
            passthrough: false,
        },
        plugin: "wallet".to_string(),
    };

    // Act
    let text = encode_frame(&FrameType::Pair, &envelope).unwrap();
    let frame = frame_of(&text);

    // Assert
    assert!(text.starts_with("42/chainx,[\"pair\","));
    assert_eq!(frame.kind, FrameType::Pair);
    let decoded: Envelope<PairRequest> = serde_json::from_value(frame.payload).unwrap();
    assert_eq!(decoded, envelope);
}

#[test]
fn test_outbound_api_frame_carries_correlation_id() {
    let envelope = Envelope {
        data: ApiRequest {
            appkey: "deadbeef".to_string(),
            payload: ApiPayload {
                id: "1202553".to_string(),
                method: "chainx_sign".to_string(),
                params: vec![json!("5Fxyz"), json!("0x00")],
            },
            origin: "example.com".to_string(),
        },
        plugin: "wallet".to_string(),
    };

    let frame = frame_of(&encode_frame(&FrameType::Api, &envelope).unwrap());

    assert_eq!(frame.payload["data"]["payload"]["id"], json!("1202553"));
    assert_eq!(frame.payload["data"]["payload"]["params"][1], json!("0x00"));
}

#[test]
fn test_rekeyed_frame_has_appkey_and_origin() {
    let envelope = Envelope {
        data: Rekeyed {
            appkey: "appkey:77".to_string(),
            origin: "wallet".to_string(),
        },
        plugin: "wallet".to_string(),
    };
    let frame = frame_of(&encode_frame(&FrameType::Rekeyed, &envelope).unwrap());
    assert_eq!(frame.kind, FrameType::Rekeyed);
    assert_eq!(frame.payload["data"], json!({"appkey": "appkey:77", "origin": "wallet"}));
}

#[test]
fn test_inbound_event_frame_deserializes_into_event_message() {
    let frame = frame_of(
        r#"42/chainx,["event",{"event":"TX_STATUS","payload":{"id":"9","err":null,"status":{"status":"Ready"}}}]"#,
    );
    let event: EventMessage = serde_json::from_value(frame.payload).unwrap();
    assert_eq!(event.event, "TX_STATUS");

    let status: TxStatusEvent = serde_json::from_value(event.payload).unwrap();
    assert_eq!(status.id, "9");
    assert!(!status.is_terminal());
}

#[test]
fn test_bare_pong_decodes_with_null_payload() {
    let frame = frame_of(&encode_bare_frame(&FrameType::Pong));
    assert_eq!(frame.kind, FrameType::Pong);
    assert_eq!(frame.payload, Value::Null);
}

#[test]
fn test_text_before_marker_is_ignored() {
    // Some transports prefix an ack id or packet number before the namespace.
    let frame = frame_of(r#"442/chainx,["connected"]"#);
    assert_eq!(frame.kind, FrameType::Connected);
}
