use serde::Deserialize;

pub const TIMESTAMP_HEADER: &str = "x-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-request-signature";

const UNKNOWN_CORRELATION_ID: &str = "unknown-correlation-id";

/// One slash-command callback as received. Built once per request and never
/// mutated by the authenticator or dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub timestamp: Option<String>,
    pub signature: Option<String>,
    pub raw_body: Vec<u8>,
    pub command: String,
    pub text: String,
    pub client_ip: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlashCommandFields {
    command: String,
    text: String,
}

impl InboundEvent {
    /// Parses `command` and `text` out of the body. JSON is used when the
    /// content type says so, form encoding otherwise. A body that does not
    /// parse yields empty fields, which the dispatcher rejects.
    pub fn new(raw_body: Vec<u8>, content_type: Option<&str>) -> Self {
        let fields = if is_json(content_type) {
            serde_json::from_slice::<SlashCommandFields>(&raw_body).unwrap_or_default()
        } else {
            serde_urlencoded::from_bytes::<SlashCommandFields>(&raw_body).unwrap_or_default()
        };

        Self {
            timestamp: None,
            signature: None,
            raw_body,
            command: fields.command,
            text: fields.text,
            client_ip: None,
            correlation_id: UNKNOWN_CORRELATION_ID.to_owned(),
        }
    }

    pub fn with_signature_headers(
        mut self,
        timestamp: Option<String>,
        signature: Option<String>,
    ) -> Self {
        self.timestamp = timestamp;
        self.signature = signature;
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
