use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_LABEL_LEN: usize = 255;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered chat-platform application whose signing secret may
/// authenticate inbound slash commands.
#[derive(Clone, Debug)]
pub struct TenantApplication {
    pub id: TenantId,
    pub label: String,
    pub secret: SecretString,
    pub active: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TenantValidationError {
    #[error("tenant id must be a machine name (lowercase letters, digits, `_`)")]
    InvalidId,
    #[error("tenant label must be 1..={MAX_LABEL_LEN} characters")]
    InvalidLabel,
    #[error("tenant signing secret must not be empty")]
    EmptySecret,
}

impl TenantApplication {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            id: TenantId(id.into()),
            label: label.into(),
            secret: SecretString::from(secret.into()),
            active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// True when the record may take part in signature verification.
    pub fn is_verifiable(&self) -> bool {
        self.active && !self.secret.expose_secret().is_empty()
    }

    pub fn validate(&self) -> Result<(), TenantValidationError> {
        if !is_machine_name(&self.id.0) {
            return Err(TenantValidationError::InvalidId);
        }

        let label_len = self.label.trim().chars().count();
        if label_len == 0 || label_len > MAX_LABEL_LEN {
            return Err(TenantValidationError::InvalidLabel);
        }

        if self.secret.expose_secret().trim().is_empty() {
            return Err(TenantValidationError::EmptySecret);
        }

        Ok(())
    }
}

fn is_machine_name(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_')
}
