use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn to_json<T: Serialize + ?Sized>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to serialize {field}"))
}

pub fn from_json<T: DeserializeOwned>(value: &str, field: &str) -> Result<T> {
    serde_json::from_str(value).with_context(|| format!("failed to parse {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_into_utc() {
        let dt = parse_datetime("2024-03-01T10:00:00+02:00", "created_at").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T08:00:00+00:00");
    }

    #[test]
    fn names_field_on_failure() {
        let err = parse_datetime("yesterday", "created_at").unwrap_err();
        assert_eq!(err.to_string(), "failed to parse created_at");

        let err = from_json::<Vec<String>>("{", "columns_json").unwrap_err();
        assert_eq!(err.to_string(), "failed to parse columns_json");
    }
}
