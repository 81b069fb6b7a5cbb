// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use hireboard_app::{ColumnDescriptor, ColumnKind};
use serde_json::{Number, Value};
use time::Date;
use time::macros::format_description;

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    InvalidNumber(String),
    InvalidDate(String),
    NotEditable(String),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber(header) => write!(f, "{header}: enter a number"),
            Self::InvalidDate(header) => write!(f, "{header}: use {DATE_LAYOUT}"),
            Self::NotEditable(header) => write!(f, "{header} cannot be typed into"),
        }
    }
}

impl std::error::Error for InputError {}

pub fn is_typed(column: &ColumnDescriptor) -> bool {
    matches!(
        column.kind,
        ColumnKind::Text | ColumnKind::Number | ColumnKind::Date
    )
}

/// Converts typed text into the JSON value stored in a row cell. Empty
/// input clears the cell.
pub fn parse_cell(column: &ColumnDescriptor, input: &str) -> Result<Value, InputError> {
    let trimmed = input.trim();
    match column.kind {
        ColumnKind::Text => Ok(Value::String(trimmed.to_owned())),
        ColumnKind::Number => {
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            if let Ok(value) = trimmed.parse::<i64>() {
                return Ok(Value::from(value));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| InputError::InvalidNumber(column.header.clone()))
        }
        ColumnKind::Date => {
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            Date::parse(trimmed, &format_description!("[year]-[month]-[day]"))
                .map(|_| Value::String(trimmed.to_owned()))
                .map_err(|_| InputError::InvalidDate(column.header.clone()))
        }
        _ => Err(InputError::NotEditable(column.header.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::{InputError, is_typed, parse_cell};
    use hireboard_app::{ColumnDescriptor, ColumnKind};
    use serde_json::{Value, json};

    #[test]
    fn numbers_keep_integers_integral() {
        let column = ColumnDescriptor::new("Weight", "weight", ColumnKind::Number);
        assert_eq!(parse_cell(&column, " 4 "), Ok(json!(4)));
        assert_eq!(parse_cell(&column, "2.5"), Ok(json!(2.5)));
        assert_eq!(parse_cell(&column, ""), Ok(Value::Null));
        assert_eq!(
            parse_cell(&column, "four"),
            Err(InputError::InvalidNumber("Weight".to_owned()))
        );
    }

    #[test]
    fn dates_must_be_calendar_dates() {
        let column = ColumnDescriptor::new("Created", "createdOn", ColumnKind::Date);
        assert_eq!(parse_cell(&column, "2026-02-28"), Ok(json!("2026-02-28")));
        assert!(parse_cell(&column, "2026-02-30").is_err());
        assert!(parse_cell(&column, "02/01/2026").is_err());
    }

    #[test]
    fn only_typed_columns_accept_text() {
        let toggle = ColumnDescriptor::new("Active", "active", ColumnKind::Toggle);
        assert!(!is_typed(&toggle));
        assert!(parse_cell(&toggle, "yes").is_err());
    }
}
