//! Serialization helpers for GitHub payloads
//!
//! GitHub sends workflow ids as JSON numbers while the store keys them as
//! strings. Use with `#[serde(with = "string_or_number")]`.

pub mod string_or_number {
    use serde::{Deserializer, Serializer};
    use std::fmt;

    /// Deserialize a string or an integer into its canonical decimal string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrNumberVisitor;

        impl<'de> serde::de::Visitor<'de> for StringOrNumberVisitor {
            type Value = String;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or an integer")
            }

            fn visit_str<E>(self, value: &str) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_string<E>(self, value: String) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value)
            }

            fn visit_i64<E>(self, value: i64) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_u64<E>(self, value: u64) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }

            // Fractional ids would silently lose precision
            fn visit_f64<E>(self, value: f64) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Err(E::custom(format!("expected an integer id, got {}", value)))
            }
        }

        deserializer.deserialize_any(StringOrNumberVisitor)
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::string_or_number")]
        id: String,
    }

    #[test]
    fn test_number_becomes_string() {
        let holder: Holder = serde_json::from_str(r#"{"id": 161335}"#).unwrap();
        assert_eq!(holder.id, "161335");
    }

    #[test]
    fn test_large_ids_keep_precision() {
        let holder: Holder = serde_json::from_str(r#"{"id": 18446744073709551615}"#).unwrap();
        assert_eq!(holder.id, "18446744073709551615");
    }

    #[test]
    fn test_string_is_kept() {
        let holder: Holder = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(holder.id, "abc");
    }

    #[test]
    fn test_float_rejected() {
        assert!(serde_json::from_str::<Holder>(r#"{"id": 1.5}"#).is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Holder { id: "42".into() }).unwrap();
        assert_eq!(json, r#"{"id":"42"}"#);
    }
}
