mod recipient;
mod recipient_email;
mod recipient_name;
mod template;

pub use recipient::Recipient;
pub use recipient_email::{RecipientEmail, is_valid_address, validate_addresses};
pub use recipient_name::RecipientName;
pub use template::{
    Alert, AlertLevel, Company, Notification, TemplateDescriptor, TemplateKind, TemplateUser,
};

#[cfg(test)]
pub(crate) use template::fixtures;
