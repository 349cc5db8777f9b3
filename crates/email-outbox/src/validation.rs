//! Row checks done before any network call.

use crate::{DeliveryError, DeliveryResult, EmailMessage};
use outbox_store::OutboxItem;
use regex::Regex;
use std::sync::OnceLock;

fn recipient_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("recipient pattern is valid")
    })
}

/// Whether `address` looks like `local@domain.tld`.
pub fn is_valid_recipient(address: &str) -> bool {
    recipient_pattern().is_match(address.trim())
}

/// Check recipient format and required fields, producing the message to send.
pub fn validate_item(item: &OutboxItem) -> DeliveryResult<EmailMessage> {
    let recipient = item.recipient.trim();
    if recipient.is_empty() {
        return Err(DeliveryError::Validation("missing recipient".into()));
    }
    if !is_valid_recipient(recipient) {
        return Err(DeliveryError::Validation(format!(
            "invalid recipient address: {recipient}"
        )));
    }
    if item.subject.trim().is_empty() {
        return Err(DeliveryError::Validation("missing subject".into()));
    }
    if item.body.trim().is_empty() {
        return Err(DeliveryError::Validation("missing body".into()));
    }

    Ok(EmailMessage {
        to: recipient.to_string(),
        subject: item.subject.clone(),
        html: item.body.clone(),
    })
}
