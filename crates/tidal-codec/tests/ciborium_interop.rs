//! Cross-checks against an independent CBOR implementation.

use ciborium::value::{Integer, Value as Oracle};
use tidal_codec::{decode, encode, Value};

fn oracle_decode(bytes: &[u8]) -> Oracle {
    ciborium::de::from_reader(bytes).expect("oracle should decode our output")
}

fn oracle_encode(value: &Oracle) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).expect("oracle should encode");
    out
}

#[test]
fn our_encoding_is_read_by_oracle() {
    let value = Value::map([
        ("int", Value::from(-500_i64)),
        ("float", Value::Float(2.5)),
        ("text", Value::from("héllo")),
        ("bytes", Value::Bytes(vec![1, 2, 3])),
        ("none", Value::Null),
        ("tagged", Value::tagged(7, "person")),
    ]);
    let bytes = encode(&value).expect("value should encode");

    let expected = Oracle::Map(vec![
        (Oracle::Text("int".into()), Oracle::Integer(Integer::from(-500_i64))),
        (Oracle::Text("float".into()), Oracle::Float(2.5)),
        (Oracle::Text("text".into()), Oracle::Text("héllo".into())),
        (Oracle::Text("bytes".into()), Oracle::Bytes(vec![1, 2, 3])),
        (Oracle::Text("none".into()), Oracle::Null),
        (
            Oracle::Text("tagged".into()),
            Oracle::Tag(7, Box::new(Oracle::Text("person".into()))),
        ),
    ]);
    assert_eq!(oracle_decode(&bytes), expected);
}

#[test]
fn oracle_encoding_is_read_by_us() {
    // The oracle picks the narrowest float width, exercising f16/f32 paths.
    let oracle = Oracle::Array(vec![
        Oracle::Float(1.5),
        Oracle::Float(100000.0),
        Oracle::Float(0.1),
        Oracle::Integer(Integer::from(u64::MAX)),
        Oracle::Bool(true),
    ]);
    let bytes = oracle_encode(&oracle);
    let decoded = decode(&bytes).expect("oracle output should decode");
    assert_eq!(
        decoded,
        Value::Array(vec![
            Value::Float(1.5),
            Value::Float(100000.0),
            Value::Float(0.1),
            Value::from(u64::MAX),
            Value::Bool(true),
        ])
    );
}

#[test]
fn large_lengths_agree_with_oracle() {
    let text = "x".repeat(70_000);
    let ours = encode(&Value::Text(text.clone())).expect("text should encode");
    assert_eq!(ours.to_vec(), oracle_encode(&Oracle::Text(text)));
}
