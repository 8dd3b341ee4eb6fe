use std::str::FromStr;

use crate::db::error::{DbError, DbResult};

/// Parse an enum column stored as text, returning a DbError on failure
pub fn parse_text_enum<T>(value: &str, column: &str) -> DbResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| DbError::Internal(format!("Invalid {} in database: {}", column, e)))
}

/// Parse a JSON column stored as text
pub fn parse_json_text<T: serde::de::DeserializeOwned>(value: &str) -> DbResult<T> {
    Ok(serde_json::from_str(value)?)
}
