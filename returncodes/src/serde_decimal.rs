//! Big integers travel as decimal strings.

use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serializer};
use std::str::FromStr;

/// Parse a decimal string, accepting digits only.
pub fn parse_decimal(value: &str) -> Result<BigUint, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a decimal integer", value));
    }
    BigUint::from_str(value).map_err(|e| e.to_string())
}

pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_str_radix(10))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_decimal(&s).map_err(de::Error::custom)
}

pub mod vec {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[BigUint], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| v.to_str_radix(10)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| parse_decimal(s).map_err(de::Error::custom))
            .collect()
    }
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_str_radix(10)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => parse_decimal(&s).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

pub mod option_vec {
    use super::*;

    pub fn serialize<S: Serializer>(
        values: &Option<Vec<BigUint>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match values {
            Some(values) => {
                let strings: Vec<String> = values.iter().map(|v| v.to_str_radix(10)).collect();
                serializer.serialize_some(&strings)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<BigUint>>, D::Error> {
        match Option::<Vec<String>>::deserialize(deserializer)? {
            Some(strings) => strings
                .iter()
                .map(|s| parse_decimal(s).map_err(de::Error::custom))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            None => Ok(None),
        }
    }
}
