//! Typed push-notification requests decoded from client JSON objects.

use std::collections::TryReserveError;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Serialize;
use serde_json::{Map, Value};

/// A decoded client request awaiting delivery.
///
/// Every field is optional on the wire. Fields the client omits keep their
/// default: `None` for strings and `0` for the badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    /// Notification body.
    pub text: Option<String>,
    /// Sound identifier played on delivery.
    pub sound: Option<String>,
    /// Badge count shown on the application icon.
    pub badge_number: i32,
    /// Opaque application payload.
    pub custom_payload: Option<String>,
    /// Target device token.
    pub device_id: Option<String>,
}

/// Keys understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Text,
    Sound,
    Badge,
    Custom,
    Key,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "text" => Some(Self::Text),
            "sound" => Some(Self::Sound),
            "badge" => Some(Self::Badge),
            "custom" => Some(Self::Custom),
            "key" => Some(Self::Key),
            _ => None,
        }
    }

    const fn expected_type(self) -> &'static str {
        match self {
            Self::Badge => "integer",
            Self::Text | Self::Sound | Self::Custom | Self::Key => "string",
        }
    }
}

/// Why a key/value pair was left out of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The key is not part of the protocol.
    Unrecognised,
    /// The key is known but its value has the wrong JSON type.
    TypeMismatch {
        /// Type the key requires.
        expected: &'static str,
        /// Type the client sent.
        found: &'static str,
    },
    /// The badge was an integer that does not fit the badge range.
    OutOfRange,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognised => formatter.write_str("unrecognised key"),
            Self::TypeMismatch { expected, found } => {
                write!(formatter, "expected {expected}, found {found}")
            }
            Self::OutOfRange => formatter.write_str("integer out of range"),
        }
    }
}

/// A key/value pair skipped while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnoredField<'a> {
    /// Key as sent by the client.
    pub key: &'a str,
    /// Reason the pair was skipped.
    pub reason: IgnoreReason,
}

impl PushRequest {
    /// Builds a request from a parsed JSON object.
    ///
    /// A `Map` holds one value per key, so use [`Self::from_pairs`] when
    /// repeated keys must be seen as sent.
    ///
    /// # Errors
    ///
    /// Returns [`TryReserveError`] when copying a string field cannot
    /// allocate.
    pub fn from_object<F>(
        object: &Map<String, Value>,
        on_ignored: F,
    ) -> Result<Self, TryReserveError>
    where
        F: FnMut(IgnoredField<'_>),
    {
        let members = object.iter().map(|(key, value)| (key.as_str(), value));
        Self::from_pairs(members, on_ignored)
    }

    /// Builds a request from key/value pairs in the order the client sent
    /// them.
    ///
    /// A repeated key keeps its last well-typed value. Unknown keys and
    /// mistyped values are passed to `on_ignored` and never fail the request.
    ///
    /// # Errors
    ///
    /// Returns [`TryReserveError`] when copying a string field cannot
    /// allocate.
    pub fn from_pairs<'a, I, F>(pairs: I, mut on_ignored: F) -> Result<Self, TryReserveError>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
        F: FnMut(IgnoredField<'_>),
    {
        let mut request = Self::default();
        for (key, value) in pairs {
            let Some(field) = Field::from_key(key) else {
                on_ignored(IgnoredField {
                    key,
                    reason: IgnoreReason::Unrecognised,
                });
                continue;
            };
            if let Err(reason) = request.assign(field, value)? {
                on_ignored(IgnoredField { key, reason });
            }
        }
        Ok(request)
    }

    /// Whether the request names a target device.
    #[must_use]
    pub const fn has_device_id(&self) -> bool {
        self.device_id.is_some()
    }

    fn assign(
        &mut self,
        field: Field,
        value: &Value,
    ) -> Result<Result<(), IgnoreReason>, TryReserveError> {
        let Some(slot) = self.string_slot(field) else {
            return Ok(badge_value(value).map(|badge| self.badge_number = badge));
        };
        let Value::String(text) = value else {
            return Ok(Err(IgnoreReason::TypeMismatch {
                expected: field.expected_type(),
                found: json_type_name(value),
            }));
        };
        *slot = Some(copy_string(text)?);
        Ok(Ok(()))
    }

    fn string_slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::Text => Some(&mut self.text),
            Field::Sound => Some(&mut self.sound),
            Field::Custom => Some(&mut self.custom_payload),
            Field::Key => Some(&mut self.device_id),
            Field::Badge => None,
        }
    }
}

fn badge_value(value: &Value) -> Result<i32, IgnoreReason> {
    let Value::Number(number) = value else {
        return Err(IgnoreReason::TypeMismatch {
            expected: Field::Badge.expected_type(),
            found: json_type_name(value),
        });
    };
    if number.is_f64() {
        return Err(IgnoreReason::TypeMismatch {
            expected: Field::Badge.expected_type(),
            found: "float",
        });
    }
    number
        .as_i64()
        .and_then(|badge| i32::try_from(badge).ok())
        .ok_or(IgnoreReason::OutOfRange)
}

fn copy_string(value: &str) -> Result<String, TryReserveError> {
    let mut owned = String::new();
    owned.try_reserve_exact(value.len())?;
    owned.push_str(value);
    Ok(owned)
}

/// Root of a request line, parsed without merging repeated keys.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RequestRoot {
    /// Object members in wire order, duplicates included.
    Object(Vec<(String, Value)>),
    /// Any other JSON value, named by type.
    Other(&'static str),
}

impl<'de> Deserialize<'de> for RequestRoot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RootVisitor)
    }
}

struct RootVisitor;

impl<'de> Visitor<'de> for RootVisitor {
    type Value = RequestRoot;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a JSON value")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(pair) = map.next_entry::<String, Value>()? {
            pairs.push(pair);
        }
        Ok(RequestRoot::Object(pairs))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(RequestRoot::Other("array"))
    }

    fn visit_str<E: de::Error>(self, _value: &str) -> Result<Self::Value, E> {
        Ok(RequestRoot::Other("string"))
    }

    fn visit_bool<E: de::Error>(self, _value: bool) -> Result<Self::Value, E> {
        Ok(RequestRoot::Other("boolean"))
    }

    fn visit_i64<E: de::Error>(self, _value: i64) -> Result<Self::Value, E> {
        Ok(RequestRoot::Other("number"))
    }

    fn visit_u64<E: de::Error>(self, _value: u64) -> Result<Self::Value, E> {
        Ok(RequestRoot::Other("number"))
    }

    fn visit_f64<E: de::Error>(self, _value: f64) -> Result<Self::Value, E> {
        Ok(RequestRoot::Other("number"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RequestRoot::Other("null"))
    }
}

/// Short JSON type name used in logs and error messages.
pub(crate) const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
