//! Serde adapter writing `U256` as a base-10 string.
//!
//! Use with `#[serde(with = "core_types::serde_u256")]`. Deserialization also
//! accepts plain JSON integers for values that fit in a `u64`.

use alloy_primitives::U256;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(U256Visitor)
}

struct U256Visitor;

impl<'de> Visitor<'de> for U256Visitor {
    type Value = U256;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
        Ok(U256::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<U256, E> {
        u64::try_from(v)
            .map(U256::from)
            .map_err(|_| E::custom(format!("negative amount {v}")))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<U256, E> {
        Ok(U256::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
        U256::from_str_radix(v.trim(), 10).map_err(|e| E::custom(format!("bad amount {v:?}: {e}")))
    }
}
