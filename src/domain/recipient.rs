use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RecipientEmail, RecipientName};

/// An address targeted by a send, plus an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Recipient {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
        }
    }

    pub fn named(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Checks the address syntax and, when present and non-blank, the display name.
    pub fn parse(email: String, display_name: Option<String>) -> Result<Self, String> {
        let email = RecipientEmail::parse(email)?;
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .map(RecipientName::parse)
            .transpose()?
            .map(RecipientName::into_inner);
        Ok(Self {
            email: email.as_ref().to_owned(),
            display_name,
        })
    }

    /// Entries without an address are dropped by the dispatcher.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => f.write_str(&self.email),
        }
    }
}
