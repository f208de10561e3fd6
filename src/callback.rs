//! # Callback Codec Module
//!
//! Encodes inline keyboard button actions into the opaque `callback_data`
//! string Telegram carries back on a press. Telegram caps that string at
//! 64 bytes, so the wire form is minified JSON with a short tag and
//! one-letter keys:
//!
//! ```text
//! {"t":"c","id":3,"m":17}
//! {"t":"p","d":"n","o":10,"l":10,"m":17}
//! ```
//!
//! Older deployments used `"<Type>||<id>"` for single-field actions; those
//! are still decoded for `Undo` and `Cancel`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::errors::CallbackError;

/// Telegram's hard limit on `callback_data`
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

const LEGACY_DELIMITER: &str = "||";
const KNOWN_TAGS: [&str; 5] = ["c", "tt", "p", "u", "x"];

/// Direction of a pagination step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "n")]
    Next,
    #[serde(rename = "p")]
    Previous,
}

/// Every action a keyboard button can trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Callback {
    #[serde(rename = "c")]
    Category {
        #[serde(rename = "id")]
        category_id: i32,
        #[serde(rename = "m")]
        message_context_id: i32,
    },
    #[serde(rename = "tt")]
    TransactionType {
        #[serde(rename = "id")]
        transaction_type_id: i32,
        #[serde(rename = "m")]
        message_context_id: i32,
    },
    #[serde(rename = "p")]
    Pagination {
        #[serde(rename = "d")]
        direction: Direction,
        #[serde(rename = "o")]
        offset: u32,
        #[serde(rename = "l")]
        limit: u32,
        #[serde(rename = "m")]
        message_context_id: i32,
    },
    #[serde(rename = "u")]
    Undo {
        #[serde(rename = "id")]
        transaction_id: i64,
    },
    #[serde(rename = "x")]
    Cancel {
        #[serde(rename = "m")]
        message_context_id: i32,
    },
}

impl Callback {
    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Callback::Category { .. } => "Category",
            Callback::TransactionType { .. } => "TransactionType",
            Callback::Pagination { .. } => "Pagination",
            Callback::Undo { .. } => "Undo",
            Callback::Cancel { .. } => "Cancel",
        }
    }
}

/// Serialize a callback, refusing anything Telegram would reject
pub fn encode(callback: &Callback) -> Result<String, CallbackError> {
    let data =
        serde_json::to_string(callback).map_err(|e| CallbackError::Malformed(e.to_string()))?;
    if data.len() > MAX_CALLBACK_DATA_LEN {
        return Err(CallbackError::PayloadTooLarge(data.len()));
    }
    Ok(data)
}

/// Parse callback data from a button press.
///
/// Structural problems are [`CallbackError::Malformed`]; a well-formed
/// payload with an unknown discriminator is [`CallbackError::UnrecognisedType`].
pub fn decode(data: &str) -> Result<Callback, CallbackError> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) if data.contains(LEGACY_DELIMITER) => return decode_legacy(data),
        Err(e) => return Err(CallbackError::Malformed(e.to_string())),
    };

    let tag = value
        .get("t")
        .and_then(Value::as_str)
        .ok_or_else(|| CallbackError::Malformed(format!("missing tag in {data}")))?;
    if !KNOWN_TAGS.contains(&tag) {
        return Err(CallbackError::UnrecognisedType(tag.to_string()));
    }

    let callback: Callback =
        serde_json::from_value(value).map_err(|e| CallbackError::Malformed(e.to_string()))?;
    trace!(callback = callback.name(), "Decoded callback");
    Ok(callback)
}

fn decode_legacy(data: &str) -> Result<Callback, CallbackError> {
    let parts: Vec<&str> = data.split(LEGACY_DELIMITER).collect();
    let [kind, id] = parts.as_slice() else {
        return Err(CallbackError::Malformed(format!(
            "expected one delimiter in {data}"
        )));
    };
    let bad_id = || CallbackError::Malformed(format!("non-numeric id in {data}"));

    match *kind {
        "Undo" => Ok(Callback::Undo {
            transaction_id: id.parse().map_err(|_| bad_id())?,
        }),
        "Cancel" => Ok(Callback::Cancel {
            message_context_id: id.parse().map_err(|_| bad_id())?,
        }),
        "Category" | "TransactionType" | "Pagination" => {
            if id.parse::<i64>().is_err() {
                Err(bad_id())
            } else {
                Err(CallbackError::Malformed(format!(
                    "{kind} needs more than one field: {data}"
                )))
            }
        }
        other => Err(CallbackError::UnrecognisedType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_short() {
        let data = encode(&Callback::Category {
            category_id: 3,
            message_context_id: 17,
        })
        .unwrap();
        assert_eq!(data, r#"{"t":"c","id":3,"m":17}"#);
    }

    #[test]
    fn test_legacy_cancel_and_undo() {
        assert_eq!(
            decode("Cancel||12").unwrap(),
            Callback::Cancel {
                message_context_id: 12
            }
        );
        assert_eq!(
            decode("Undo||99").unwrap(),
            Callback::Undo { transaction_id: 99 }
        );
    }

    #[test]
    fn test_legacy_errors() {
        assert!(matches!(
            decode("Category||abc"),
            Err(CallbackError::Malformed(_))
        ));
        assert!(matches!(
            decode("Undo||1||2"),
            Err(CallbackError::Malformed(_))
        ));
        assert!(matches!(
            decode("Bogus||1"),
            Err(CallbackError::UnrecognisedType(_))
        ));
    }

    #[test]
    fn test_unknown_tag_is_distinct_from_malformed() {
        assert!(matches!(
            decode(r#"{"t":"zz","m":1}"#),
            Err(CallbackError::UnrecognisedType(ref t)) if t == "zz"
        ));
        assert!(matches!(
            decode(r#"{"t":"c","m":1}"#),
            Err(CallbackError::Malformed(_))
        ));
        assert!(matches!(decode(r#"{"m":1}"#), Err(CallbackError::Malformed(_))));
        assert!(matches!(decode("garbage"), Err(CallbackError::Malformed(_))));
    }
}
