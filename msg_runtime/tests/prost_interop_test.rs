//! Wire compatibility with prost-generated types.
//!
//! The same logical message is built twice: once as a `#[derive(prost::Message)]`
//! struct, once as a `DynamicMessage` over an equivalent descriptor. Both
//! must produce identical bytes and each must decode the other's output.

use std::sync::Arc;

use prost::Message as ProstMessage;

use msg_runtime::msg_schema::{FieldKind, FieldSpec, MessageDescriptor};
use msg_runtime::{DynamicMessage, MessageExt, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum Channel {
    Unknown = 0,
    Retail = 1,
    Wholesale = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
struct LineProto {
    #[prost(string, required, tag = "1")]
    sku: String,
    #[prost(int64, optional, tag = "2")]
    qty: Option<i64>,
    #[prost(bytes = "vec", optional, tag = "3")]
    blob: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct OrderProto {
    #[prost(uint64, required, tag = "1")]
    id: u64,
    #[prost(message, repeated, tag = "2")]
    lines: Vec<LineProto>,
    #[prost(string, optional, tag = "3")]
    note: Option<String>,
    #[prost(sint32, repeated, packed = "true", tag = "4")]
    weights: Vec<i32>,
    #[prost(fixed32, repeated, packed = "false", tag = "5")]
    codes: Vec<u32>,
    #[prost(double, optional, tag = "6")]
    total: Option<f64>,
    #[prost(bool, optional, tag = "7")]
    gift: Option<bool>,
    #[prost(int32, optional, tag = "8")]
    delta: Option<i32>,
    #[prost(sfixed64, optional, tag = "9")]
    ledger: Option<i64>,
    #[prost(enumeration = "Channel", optional, tag = "10")]
    channel: Option<i32>,
    #[prost(float, optional, tag = "11")]
    discount: Option<f32>,
    #[prost(message, optional, tag = "12")]
    primary: Option<LineProto>,
}

struct Schema {
    order: Arc<MessageDescriptor>,
    line: Arc<MessageDescriptor>,
}

fn schema() -> Schema {
    let line = MessageDescriptor::builder("interop.Line")
        .field(FieldSpec::required("sku", 1, FieldKind::String))
        .field(FieldSpec::optional("qty", 2, FieldKind::Int64))
        .field(FieldSpec::optional("blob", 3, FieldKind::Bytes))
        .build()
        .unwrap();
    let order = MessageDescriptor::builder("interop.Order")
        .field(FieldSpec::required("id", 1, FieldKind::UInt64))
        .field(FieldSpec::repeated("lines", 2, FieldKind::Message).of_type(&line))
        .field(FieldSpec::optional("note", 3, FieldKind::String))
        .field(FieldSpec::repeated("weights", 4, FieldKind::SInt32).packed())
        .field(FieldSpec::repeated("codes", 5, FieldKind::Fixed32))
        .field(FieldSpec::optional("total", 6, FieldKind::Double))
        .field(FieldSpec::optional("gift", 7, FieldKind::Bool))
        .field(FieldSpec::optional("delta", 8, FieldKind::Int32))
        .field(FieldSpec::optional("ledger", 9, FieldKind::SFixed64))
        .field(FieldSpec::optional("channel", 10, FieldKind::Enum))
        .field(FieldSpec::optional("discount", 11, FieldKind::Float))
        .field(FieldSpec::optional("primary", 12, FieldKind::Message).of_type(&line))
        .build()
        .unwrap();
    Schema { order, line }
}

fn sample_proto() -> OrderProto {
    OrderProto {
        id: 1_234_567_890_123,
        lines: vec![
            LineProto {
                sku: "widget".to_string(),
                qty: Some(-3),
                blob: Some(vec![0, 255, 7]),
            },
            LineProto {
                sku: "gadget".to_string(),
                qty: None,
                blob: None,
            },
        ],
        note: Some("gift wrap, please".to_string()),
        weights: vec![-1, 0, 63, -64, 100_000],
        codes: vec![7, u32::MAX],
        total: Some(99.95),
        gift: Some(false),
        delta: Some(-1),
        ledger: Some(i64::MIN),
        channel: Some(Channel::Wholesale as i32),
        discount: Some(0.25),
        primary: Some(LineProto {
            sku: "widget".to_string(),
            qty: Some(1),
            blob: None,
        }),
    }
}

fn line(schema: &Schema, sku: &str, qty: Option<i64>, blob: Option<Vec<u8>>) -> DynamicMessage {
    let mut m = DynamicMessage::new(&schema.line);
    m.set("sku", sku).unwrap();
    if let Some(qty) = qty {
        m.set("qty", qty).unwrap();
    }
    if let Some(blob) = blob {
        m.set("blob", blob).unwrap();
    }
    m
}

fn sample_dynamic(schema: &Schema) -> DynamicMessage {
    let mut m = DynamicMessage::new(&schema.order);
    m.set("id", 1_234_567_890_123u64).unwrap();
    m.set_message("lines", line(schema, "widget", Some(-3), Some(vec![0, 255, 7])))
        .unwrap();
    m.set_message("lines", line(schema, "gadget", None, None)).unwrap();
    m.set("note", "gift wrap, please").unwrap();
    m.set_repeated(
        "weights",
        [-1, 0, 63, -64, 100_000].into_iter().map(Value::I32).collect(),
    )
    .unwrap();
    m.push("codes", 7u32).unwrap().push("codes", u32::MAX).unwrap();
    m.set("total", 99.95f64).unwrap();
    m.set("gift", false).unwrap();
    m.set("delta", -1i32).unwrap();
    m.set("ledger", i64::MIN).unwrap();
    m.set("channel", Value::Enum(Channel::Wholesale as i32)).unwrap();
    m.set("discount", 0.25f32).unwrap();
    m.set_message("primary", line(schema, "widget", Some(1), None))
        .unwrap();
    m
}

// ─────────────────────────────────────────────────────────────
// Test 1: identical bytes and sizes
// ─────────────────────────────────────────────────────────────

#[test]
fn engine_bytes_match_prost_bytes() {
    let schema = schema();
    let dynamic = sample_dynamic(&schema);
    let proto = sample_proto();

    assert_eq!(dynamic.serialized_size(), proto.encoded_len());
    assert_eq!(dynamic.encode_to_vec(), proto.encode_to_vec());
    assert_eq!(
        dynamic.encode_length_delimited_to_vec(),
        proto.encode_length_delimited_to_vec()
    );
}

// ─────────────────────────────────────────────────────────────
// Test 2: each side decodes the other
// ─────────────────────────────────────────────────────────────

#[test]
fn prost_decodes_engine_output() {
    let schema = schema();
    let bytes = sample_dynamic(&schema).encode_to_vec();
    let decoded = OrderProto::decode(bytes.as_slice()).expect("prost decode");
    assert_eq!(decoded, sample_proto());
}

#[test]
fn engine_decodes_prost_output() {
    let schema = schema();
    let bytes = sample_proto().encode_to_vec();
    let decoded = DynamicMessage::decode(&schema.order, &bytes).expect("engine decode");
    assert_eq!(decoded, sample_dynamic(&schema));
    assert!(decoded.is_initialized());
}

// ─────────────────────────────────────────────────────────────
// Test 3: prost skips what the engine keeps as unknown data
// ─────────────────────────────────────────────────────────────

#[test]
fn unknown_data_survives_the_engine_and_is_skipped_by_prost() {
    let schema = schema();
    let mut dynamic = sample_dynamic(&schema);
    dynamic.unknown_fields_mut().add_varint(200, 5);
    dynamic.unknown_fields_mut().add_length_delimited(201, b"opaque".to_vec());

    let bytes = dynamic.encode_to_vec();
    assert_eq!(bytes.len(), dynamic.serialized_size());

    let decoded = OrderProto::decode(bytes.as_slice()).expect("prost decode");
    assert_eq!(decoded, sample_proto());

    let back = DynamicMessage::decode(&schema.order, &bytes).unwrap();
    assert_eq!(back.encode_to_vec(), bytes);
}

// ─────────────────────────────────────────────────────────────
// Test 4: a singular message split across occurrences is merged
// ─────────────────────────────────────────────────────────────

#[test]
fn split_embedded_message_merges_like_prost() {
    let schema = schema();
    // primary {sku: "a"} followed by primary {qty: 5}
    let bytes = [0x62, 0x03, 0x0a, 0x01, b'a', 0x62, 0x02, 0x10, 0x05];

    let from_prost = OrderProto::decode(&bytes[..]).expect("prost decode");
    let expected = from_prost.primary.expect("primary present");
    assert_eq!(expected.sku, "a");
    assert_eq!(expected.qty, Some(5));

    let decoded = DynamicMessage::decode(&schema.order, &bytes).expect("engine decode");
    let primary = decoded
        .get("primary")
        .and_then(Value::as_message)
        .expect("primary present");
    assert!(primary.is_initialized());
    assert_eq!(primary.serialized_size(), expected.encoded_len());
    assert_eq!(primary.encode_to_vec(), expected.encode_to_vec());
}
