//! JSON payload encoding for cache storage.
//!
//! Cache entries are UTF-8 text so they stay readable from `redis-cli` and
//! from services written in other languages. Two encodings are used:
//!
//! - [`encode_for_cache`]: string types (`str`, `String`, `&'static str`,
//!   `Box<str>`, `Arc<str>`, `Cow<'static, str>`) are stored as the raw
//!   string; anything else is stored as JSON. Used by
//!   [`Cache::remember`](crate::cache::Cache::remember), so
//!   `remember(.., || Ok("v1"))` stores `v1`, not `"v1"`. Other values that
//!   happen to serialize to a JSON string (unit enum variants, `char`, UUIDs)
//!   keep their quotes and read back through `get_json` / `remember_json`.
//! - [`encode_json`]: always JSON. Used by the typed operations
//!   (`set_json`, `remember_json`) so that decoding is symmetric.
//!
//! Struct fields are written in declaration order.
//!
//! # Example
//!
//! ```rust
//! use service_kit::serialization::{decode_from_cache, encode_for_cache, encode_json};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn main() -> service_kit::Result<()> {
//! let user = User { id: 1, name: "Alice".to_string() };
//!
//! let payload = encode_json(&user)?;
//! assert_eq!(payload, r#"{"id":1,"name":"Alice"}"#);
//!
//! let back: User = decode_from_cache(&payload)?;
//! assert_eq!(user, back);
//!
//! assert_eq!(encode_for_cache(&"plain text")?, "plain text");
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::borrow::Cow;
use std::sync::Arc;

/// Serialize a value to its JSON text.
///
/// # Errors
/// Returns `Error::SerializationError` if the value cannot be represented
/// as JSON (for example a map with non-string keys).
pub fn encode_json<V: Serialize + ?Sized>(value: &V) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Serialize a value for a string cache entry.
///
/// Strings are stored verbatim; every other value is stored as JSON.
///
/// # Errors
/// Returns `Error::SerializationError` if the value cannot be represented
/// as JSON.
pub fn encode_for_cache<V: Serialize + ?Sized + 'static>(value: &V) -> Result<String> {
    let json = encode_json(value)?;
    if !is_string_type::<V>() {
        return Ok(json);
    }
    serde_json::from_str::<String>(&json).map_err(|e| Error::SerializationError(e.to_string()))
}

fn is_string_type<V: ?Sized + 'static>() -> bool {
    let id = TypeId::of::<V>();
    id == TypeId::of::<str>()
        || id == TypeId::of::<String>()
        || id == TypeId::of::<&'static str>()
        || id == TypeId::of::<Box<str>>()
        || id == TypeId::of::<Arc<str>>()
        || id == TypeId::of::<Cow<'static, str>>()
}

/// Deserialize a JSON cache payload.
///
/// # Errors
/// Returns `Error::DeserializationError` if the payload is not valid JSON or
/// does not match the shape of `T`.
pub fn decode_from_cache<T: DeserializeOwned>(payload: &str) -> Result<T> {
    serde_json::from_str(payload).map_err(|e| Error::DeserializationError(e.to_string()))
}

/// Interpret raw backend bytes as a text payload.
///
/// Payloads are never transcoded: bytes that are not UTF-8 are rejected.
///
/// # Errors
/// Returns `Error::DeserializationError` for non-UTF-8 input.
pub fn payload_to_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        Error::DeserializationError(format!("Cached payload is not valid UTF-8: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Order {
        zeta: u32,
        alpha: String,
        items: Vec<String>,
    }

    #[test]
    fn test_string_is_stored_verbatim() {
        assert_eq!(encode_for_cache("v1").expect("encode"), "v1");
        assert_eq!(
            encode_for_cache(&"quote \" and ünïcode".to_string()).expect("encode"),
            "quote \" and ünïcode"
        );
    }

    #[test]
    fn test_non_string_is_stored_as_json() {
        assert_eq!(encode_for_cache(&42).expect("encode"), "42");
        assert_eq!(encode_for_cache(&vec![1, 2]).expect("encode"), "[1,2]");
        assert_eq!(encode_for_cache(&Option::<u8>::None).expect("encode"), "null");
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    enum Status {
        Active,
    }

    #[test]
    fn test_string_like_values_keep_json_quotes() {
        assert_eq!(encode_for_cache(&Status::Active).expect("encode"), "\"Active\"");
        assert_eq!(encode_for_cache(&'x').expect("encode"), "\"x\"");
        assert_eq!(encode_for_cache(&Some("v1".to_string())).expect("encode"), "\"v1\"");

        let back: Status = decode_from_cache(&encode_for_cache(&Status::Active).expect("encode"))
            .expect("decode");
        assert_eq!(back, Status::Active);
    }

    #[test]
    fn test_owned_string_types_are_verbatim() {
        assert_eq!(encode_for_cache(&Box::<str>::from("a")).expect("encode"), "a");
        assert_eq!(encode_for_cache(&Arc::<str>::from("b")).expect("encode"), "b");
        assert_eq!(encode_for_cache(&Cow::<str>::Borrowed("c")).expect("encode"), "c");
    }

    #[test]
    fn test_struct_field_order_is_preserved() {
        let order = Order {
            zeta: 1,
            alpha: "a".into(),
            items: vec![],
        };
        assert_eq!(
            encode_json(&order).expect("encode"),
            r#"{"zeta":1,"alpha":"a","items":[]}"#
        );
    }

    #[test]
    fn test_encode_json_quotes_strings() {
        assert_eq!(encode_json("v1").expect("encode"), "\"v1\"");
    }

    #[test]
    fn test_non_string_map_keys_fail_to_serialize() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "x");
        let err = encode_json(&map).expect_err("vector keys are not representable");
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn test_decode_mismatched_shape() {
        let err = decode_from_cache::<Order>(r#"{"zeta":"not a number"}"#)
            .expect_err("shape mismatch");
        assert!(matches!(err, Error::DeserializationError(_)));

        let err = decode_from_cache::<Order>("v1").expect_err("not JSON");
        assert!(matches!(err, Error::DeserializationError(_)));
    }

    #[test]
    fn test_decode_nested_map() {
        let payload = r#"{"a":{"b":[1,2,3]},"c":{}}"#;
        let value: BTreeMap<String, BTreeMap<String, Vec<u8>>> =
            decode_from_cache(payload).expect("decode");
        assert_eq!(value["a"]["b"], vec![1, 2, 3]);
        assert!(value["c"].is_empty());
    }

    #[test]
    fn test_payload_to_string_rejects_invalid_utf8() {
        assert_eq!(payload_to_string(b"ok".to_vec()).expect("utf8"), "ok");
        let err = payload_to_string(vec![0xff, 0xfe]).expect_err("invalid utf8");
        assert!(matches!(err, Error::DeserializationError(_)));
    }
}
