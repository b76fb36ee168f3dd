use std::sync::LazyLock;

use regex::Regex;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("address pattern is a valid regex")
});

/// Syntactic check only, no deliverability or MX lookup.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address)
}

/// Splits `addresses` into `(valid, invalid)`, both in input order.
pub fn validate_addresses<I, S>(addresses: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    addresses
        .into_iter()
        .map(Into::into)
        .partition(|address| is_valid_address(address))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientEmail(String);

impl RecipientEmail {
    pub fn parse(s: String) -> Result<RecipientEmail, String> {
        if is_valid_address(&s) {
            Ok(Self(s))
        } else {
            Err(format!("{} is not a valid recipient email.", s))
        }
    }
}

impl AsRef<str> for RecipientEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
