//! SF-007: Bundle size guard.
//!
//! The upload travels as a single protocol message, so the bundle may use at
//! most 90% of the transport maximum; the rest is left for call framing.

use super::error::ProvisionError;

/// Share of the transport maximum a bundle may occupy, in percent.
pub const PAYLOAD_PERCENT: u64 = 90;

/// Largest bundle accepted for a given transport maximum.
pub fn size_limit(max_message_bytes: u64) -> u64 {
    max_message_bytes / 100 * PAYLOAD_PERCENT + max_message_bytes % 100 * PAYLOAD_PERCENT / 100
}

/// Reject a bundle larger than [`size_limit`]. A bundle exactly at the limit passes.
pub fn check_bundle_size(name: &str, size: u64, max_message_bytes: u64) -> Result<(), ProvisionError> {
    let limit = size_limit(max_message_bytes);
    if size > limit {
        return Err(ProvisionError::BundleTooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}
