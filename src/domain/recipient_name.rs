use unicode_segmentation::UnicodeSegmentation;

/// A display name that is safe to place in a `Name <address>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientName(String);

impl RecipientName {
    pub fn parse(s: String) -> Result<RecipientName, String> {
        let is_empty_or_whitespace = s.trim().is_empty();
        let is_too_long = s.graphemes(true).count() > 256;
        let forbidden_characters = ['/', '(', ')', '"', '<', '>', '\\', '{', '}'];
        let contains_forbidden_characters = s.chars().any(|g| forbidden_characters.contains(&g));

        if is_empty_or_whitespace || is_too_long || contains_forbidden_characters {
            Err(format!("{} is not a valid recipient name.", s))
        } else {
            Ok(Self(s))
        }
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for RecipientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
