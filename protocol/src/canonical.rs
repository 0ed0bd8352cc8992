//! # Canonical JSON
//!
//! The bytes that get hashed and signed. Two payloads that mean the same
//! thing must produce the same bytes, or the same record ends up with two
//! different signatures and one of them fails verification downstream.
//!
//! ## Rules
//!
//! - Object keys are sorted by Unicode code point, recursively.
//! - Array order is preserved (it is meaningful).
//! - No insignificant whitespace, no trailing newline.
//! - Strings and numbers are rendered exactly as `serde_json` renders them.
//! - Output is UTF-8.
//!
//! Sorting is done here, explicitly, rather than by relying on whichever map
//! type `serde_json` happens to be compiled with. With `preserve_order`
//! enabled anywhere in the dependency graph, `serde_json::to_vec` would
//! follow insertion order instead.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::SubmitError;

/// Deterministic UTF-8 encoding of a payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(String);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse arbitrary JSON text and re-encode it canonically.
    pub fn from_json_str(json: &str) -> Result<Self, SubmitError> {
        let value: Value = serde_json::from_str(json)?;
        Ok(encode(&value))
    }
}

impl fmt::Debug for CanonicalBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalBytes({} bytes)", self.0.len())
    }
}

impl fmt::Display for CanonicalBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonically encode a JSON value. Total: every `Value` has an encoding.
pub fn encode(value: &Value) -> CanonicalBytes {
    let mut out = String::with_capacity(128);
    write_value(value, &mut out);
    CanonicalBytes(out)
}

/// Canonically encode any serializable payload.
///
/// Fails with [`SubmitError::Serialization`] when the payload has no JSON
/// form, e.g. a map keyed by something other than strings or integers, or a
/// NaN or infinite float. `serde_json` would write those floats as `null`,
/// so they are rejected before conversion.
pub fn encode_serializable<T: Serialize + ?Sized>(payload: &T) -> Result<CanonicalBytes, SubmitError> {
    payload
        .serialize(finite::FiniteFloats)
        .map_err(|e| SubmitError::Serialization(e.to_string()))?;
    let value = serde_json::to_value(payload)?;
    Ok(encode(&value))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(child, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(child, out);
            }
            out.push(']');
        }
        // Scalars: serde_json's compact Display is already canonical.
        leaf => out.push_str(&leaf.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Escaping follows serde_json so keys and string values agree.
    out.push_str(&Value::String(s.to_owned()).to_string());
}

/// A serializer that produces nothing and fails on the first non-finite
/// float it is handed.
mod finite {
    use serde::ser::{self, Serialize};
    use std::fmt;

    #[derive(Debug)]
    pub(super) struct NonFinite(String);

    impl fmt::Display for NonFinite {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for NonFinite {}

    impl ser::Error for NonFinite {
        fn custom<M: fmt::Display>(msg: M) -> Self {
            NonFinite(msg.to_string())
        }
    }

    fn check(v: f64) -> Result<(), NonFinite> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite(format!("{v} has no JSON representation")))
        }
    }

    pub(super) struct FiniteFloats;

    macro_rules! accept {
        ($($method:ident($ty:ty)),* $(,)?) => {
            $(fn $method(self, _v: $ty) -> Result<(), NonFinite> {
                Ok(())
            })*
        };
    }

    impl ser::Serializer for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;
        type SerializeSeq = Self;
        type SerializeTuple = Self;
        type SerializeTupleStruct = Self;
        type SerializeTupleVariant = Self;
        type SerializeMap = Self;
        type SerializeStruct = Self;
        type SerializeStructVariant = Self;

        accept!(
            serialize_bool(bool),
            serialize_i8(i8),
            serialize_i16(i16),
            serialize_i32(i32),
            serialize_i64(i64),
            serialize_i128(i128),
            serialize_u8(u8),
            serialize_u16(u16),
            serialize_u32(u32),
            serialize_u64(u64),
            serialize_u128(u128),
            serialize_char(char),
            serialize_str(&str),
            serialize_bytes(&[u8]),
        );

        fn serialize_f32(self, v: f32) -> Result<(), NonFinite> {
            check(f64::from(v))
        }

        fn serialize_f64(self, v: f64) -> Result<(), NonFinite> {
            check(v)
        }

        fn serialize_none(self) -> Result<(), NonFinite> {
            Ok(())
        }

        fn serialize_some<T>(self, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(self)
        }

        fn serialize_unit(self) -> Result<(), NonFinite> {
            Ok(())
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<(), NonFinite> {
            Ok(())
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<(), NonFinite> {
            Ok(())
        }

        fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(self)
        }

        fn serialize_newtype_variant<T>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            value: &T,
        ) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(self)
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFinite> {
            Ok(self)
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self, NonFinite> {
            Ok(self)
        }
    }

    impl ser::SerializeSeq for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_element<T>(&mut self, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }

    impl ser::SerializeTuple for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_element<T>(&mut self, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }

    impl ser::SerializeTupleStruct for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T>(&mut self, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }

    impl ser::SerializeTupleVariant for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T>(&mut self, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }

    impl ser::SerializeMap for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_key<T>(&mut self, key: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            key.serialize(FiniteFloats)
        }

        fn serialize_value<T>(&mut self, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }

    impl ser::SerializeStruct for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }

    impl ser::SerializeStructVariant for FiniteFloats {
        type Ok = ();
        type Error = NonFinite;

        fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<(), NonFinite>
        where
            T: ?Sized + Serialize,
        {
            value.serialize(FiniteFloats)
        }

        fn end(self) -> Result<(), NonFinite> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_sorts_top_level_keys() {
        assert_eq!(encode(&json!({"b": 2, "a": 1})).as_str(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        // Regression: naive serialization follows insertion order, so these
        // two logically equal payloads used to sign differently.
        let p1 = CanonicalBytes::from_json_str(r#"{"b":2,"a":1,"c":{"z":[3,2,1],"y":null}}"#)
            .unwrap();
        let p2 = CanonicalBytes::from_json_str(r#"{"c":{"y":null,"z":[3,2,1]},"a":1,"b":2}"#)
            .unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.as_bytes(), p2.as_bytes());
    }

    #[test]
    fn test_nested_objects_sorted_arrays_kept() {
        let value = json!({
            "UploadContractTemplate": {
                "providerName": "Acme Mutual",
                "categories": ["flood", "fire"],
                "limits": {"max": 10, "min": 1}
            }
        });
        assert_eq!(
            encode(&value).as_str(),
            r#"{"UploadContractTemplate":{"categories":["flood","fire"],"limits":{"max":10,"min":1},"providerName":"Acme Mutual"}}"#
        );
    }

    #[test]
    fn test_no_whitespace_or_trailing_newline() {
        let out = CanonicalBytes::from_json_str("{ \"a\" : [ 1 , 2 ] }\n").unwrap();
        assert_eq!(out.as_str(), r#"{"a":[1,2]}"#);
        assert!(!out.as_str().ends_with('\n'));
    }

    #[test]
    fn test_string_escaping_matches_serde_json() {
        let value = json!({"quote\"key": "line\nbreak", "unicode": "ação"});
        assert_eq!(
            encode(&value).as_str(),
            "{\"quote\\\"key\":\"line\\nbreak\",\"unicode\":\"ação\"}"
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(encode(&json!(null)).as_str(), "null");
        assert_eq!(encode(&json!(true)).as_str(), "true");
        assert_eq!(encode(&json!(-12)).as_str(), "-12");
        assert_eq!(encode(&json!(1.5)).as_str(), "1.5");
        assert_eq!(encode(&json!("s")).as_str(), "\"s\"");
        assert_eq!(encode(&json!({})).as_str(), "{}");
        assert_eq!(encode(&json!([])).as_str(), "[]");
    }

    #[test]
    fn test_keys_sort_by_code_point() {
        // Uppercase sorts before lowercase; byte order, not locale order.
        assert_eq!(
            encode(&json!({"b": 1, "B": 2, "a": 3})).as_str(),
            r#"{"B":2,"a":3,"b":1}"#
        );
    }

    #[test]
    fn test_encode_serializable_matches_value_encoding() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Template {
            provider_name: String,
            active: bool,
        }
        let t = Template {
            provider_name: "Acme".into(),
            active: true,
        };
        let out = encode_serializable(&t).unwrap();
        assert_eq!(out.as_str(), r#"{"active":true,"providerName":"Acme"}"#);
    }

    #[test]
    fn test_hashmap_order_is_irrelevant() {
        let mut a: HashMap<String, u32> = HashMap::new();
        let mut b: BTreeMap<String, u32> = BTreeMap::new();
        for (k, v) in [("zeta", 1), ("alpha", 2), ("mid", 3)] {
            a.insert(k.to_string(), v);
            b.insert(k.to_string(), v);
        }
        assert_eq!(
            encode_serializable(&a).unwrap(),
            encode_serializable(&b).unwrap()
        );
    }

    #[test]
    fn test_non_finite_floats_are_serialization_errors() {
        #[derive(Serialize)]
        struct Quote {
            provider: &'static str,
            premium: f64,
            factors: Vec<f32>,
        }

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                encode_serializable(&bad),
                Err(SubmitError::Serialization(_))
            ));
        }

        let infinite = Quote {
            provider: "Acme",
            premium: f64::INFINITY,
            factors: vec![1.0],
        };
        assert!(matches!(
            encode_serializable(&infinite),
            Err(SubmitError::Serialization(_))
        ));

        let nested_nan = Quote {
            provider: "Acme",
            premium: 10.5,
            factors: vec![0.5, f32::NAN],
        };
        assert!(matches!(
            encode_serializable(&nested_nan),
            Err(SubmitError::Serialization(_))
        ));

        let finite = Quote {
            provider: "Acme",
            premium: 10.5,
            factors: vec![0.5],
        };
        assert_eq!(
            encode_serializable(&finite).unwrap().as_str(),
            r#"{"factors":[0.5],"premium":10.5,"provider":"Acme"}"#
        );
    }

    #[test]
    fn test_unencodable_payload_is_serialization_error() {
        let mut bad: HashMap<Vec<u8>, u32> = HashMap::new();
        bad.insert(vec![1, 2], 3);
        assert!(matches!(
            encode_serializable(&bad),
            Err(SubmitError::Serialization(_))
        ));
    }

    #[test]
    fn test_encoding_is_idempotent() {
        let once = encode(&json!({"b": [{"d": 1, "c": 2}], "a": "x"}));
        let twice = CanonicalBytes::from_json_str(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }
}
