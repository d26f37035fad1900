//! Secret type tags

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Tags under which encrypted secrets are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretType {
    /// Password protecting archives dropped on the SFTP host
    #[serde(rename = "SFAFileDecryptionPassword")]
    ArchiveDecryptionPassword,
}

impl SecretType {
    pub fn tag(&self) -> &'static str {
        match self {
            SecretType::ArchiveDecryptionPassword => "SFAFileDecryptionPassword",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SecretType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SFAFileDecryptionPassword" => Ok(SecretType::ArchiveDecryptionPassword),
            other => Err(DomainError::UnknownSecretType(other.to_string())),
        }
    }
}
