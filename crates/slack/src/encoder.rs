use std::io;

use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter, Serializer};
use thiserror::Error;

use slashgate_core::errors::ApplicationError;

use crate::markup::{MarkupConverter, MarkupError};
use crate::message::{CommandResult, Message};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("response serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<EncodeError> for ApplicationError {
    fn from(value: EncodeError) -> Self {
        ApplicationError::Encoding(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct Envelope {
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<EnvelopeAttachment>,
}

#[derive(Debug, Serialize)]
struct EnvelopeAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mrkdwn_in: Vec<String>,
}

impl Envelope {
    fn assemble(result: &CommandResult) -> Self {
        let text = result
            .fragments()
            .iter()
            .map(|fragment| fragment.text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let attachments = result.fragments().iter().flat_map(inherited_attachments).collect();

        Self { text, attachments }
    }
}

fn inherited_attachments(fragment: &Message) -> impl Iterator<Item = EnvelopeAttachment> + '_ {
    fragment.attachments.iter().map(move |attachment| EnvelopeAttachment {
        color: attachment.color.clone().or_else(|| fragment.color.clone()),
        title: attachment.title.clone(),
        text: attachment.text.clone(),
        mrkdwn_in: if attachment.mrkdwn_in.is_empty() {
            fragment.mrkdwn_fields.clone()
        } else {
            attachment.mrkdwn_in.clone()
        },
    })
}

/// Serializes command results into the Slack response body.
pub struct ResponseEncoder {
    converter: MarkupConverter,
}

impl ResponseEncoder {
    pub fn new() -> Result<Self, MarkupError> {
        Ok(Self { converter: MarkupConverter::new()? })
    }

    pub fn encode(&self, result: &CommandResult) -> Result<Vec<u8>, EncodeError> {
        let envelope = serde_json::to_value(Envelope::assemble(result))?;
        let converted = self.converter.convert(envelope);

        let mut body = Vec::with_capacity(128);
        let mut serializer = Serializer::with_formatter(&mut body, HtmlSafeFormatter);
        converted.serialize(&mut serializer)?;
        Ok(body)
    }
}

/// Compact JSON that never emits `<`, `>`, `'`, `&` or `"` inside strings,
/// so the body is safe to embed in HTML.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (index, byte) in bytes.iter().enumerate() {
            let escape: &[u8] = match byte {
                b'<' => b"\\u003C",
                b'>' => b"\\u003E",
                b'\'' => b"\\u0027",
                b'&' => b"\\u0026",
                _ => continue,
            };
            writer.write_all(&bytes[start..index])?;
            writer.write_all(escape)?;
            start = index + 1;
        }
        writer.write_all(&bytes[start..])
    }

    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let escaped: &[u8] = match char_escape {
            CharEscape::Quote => b"\\u0022",
            CharEscape::ReverseSolidus => b"\\\\",
            CharEscape::Solidus => b"\\/",
            CharEscape::Backspace => b"\\b",
            CharEscape::FormFeed => b"\\f",
            CharEscape::LineFeed => b"\\n",
            CharEscape::CarriageReturn => b"\\r",
            CharEscape::Tab => b"\\t",
            CharEscape::AsciiControl(byte) => {
                const HEX: &[u8; 16] = b"0123456789abcdef";
                let escape = [
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    HEX[(byte >> 4) as usize],
                    HEX[(byte & 0xF) as usize],
                ];
                return writer.write_all(&escape);
            }
        };
        writer.write_all(escaped)
    }
}
