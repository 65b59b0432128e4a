/// Timestamp encoding for stored documents
///
/// Every timestamp written by this crate uses one fixed-width RFC 3339 layout
/// (UTC, microseconds, `Z` suffix), so lexical order of the stored strings is
/// chronological order. Reads are lenient: embedded comment timestamps written
/// by older clients may lack an offset.
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Format a timestamp in the stored/serialized layout
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamp as a document field value
pub fn timestamp_value(dt: &DateTime<Utc>) -> Value {
    Value::String(format_timestamp(dt))
}

/// Parse a stored timestamp, returning None when it is not recognisable
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Offset-less ISO-8601 is taken as UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(dt))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Same layout for optional fields
pub mod option {
    use super::*;

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => serializer.serialize_some(&format_timestamp(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_width_layout() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(format_timestamp(&a), "2025-03-01T09:05:00.000000Z");
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }

    #[test]
    fn test_lenient_parse() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T09:05:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T10:05:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T09:05:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
