//! Builds the request line sent by `pushwire send`.

use serde::Serialize;

use crate::cli::SendArgs;

use super::AppError;

/// Wire form of a push request. Absent flags are left out of the object.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
}

impl<'a> From<&'a SendArgs> for WireRequest<'a> {
    fn from(args: &'a SendArgs) -> Self {
        Self {
            text: args.text.as_deref(),
            sound: args.sound.as_deref(),
            badge: args.badge,
            custom: args.custom.as_deref(),
            key: args.key.as_deref(),
        }
    }
}

/// Serialises the given flags as one newline-terminated JSON object.
pub(crate) fn request_line(args: &SendArgs) -> Result<Vec<u8>, AppError> {
    let mut line = serde_json::to_vec(&WireRequest::from(args)).map_err(AppError::Serialise)?;
    line.push(b'\n');
    Ok(line)
}
