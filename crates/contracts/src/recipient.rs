//! Recipient traits - Dispatcher output interface
//!
//! The dispatcher never touches a transport directly. It only sees the
//! capability set below and treats every recipient as opaque.

use std::sync::Arc;

use bytes::Bytes;

use crate::ContractError;

/// Placement substituted for `{server}` when a recipient is not attached anywhere.
pub const UNKNOWN_PLACEMENT: &str = "Unknown";

/// A connected client capable of receiving an encoded frame.
pub trait Recipient: Send + Sync {
    /// Whether the client is still connected
    fn is_active(&self) -> bool;

    /// Stable display name (used for `{player}` and logging)
    fn display_name(&self) -> &str;

    /// Logical placement, e.g. the backend the client is attached to
    fn current_placement(&self) -> Option<String>;

    /// Hand an encoded frame to the transport
    ///
    /// # Errors
    /// Returns a send error when the transport refuses the payload.
    fn send(&self, payload: Bytes) -> Result<(), ContractError>;

    /// Placement with the `"Unknown"` fallback applied
    fn placement_or_unknown(&self) -> String {
        self.current_placement()
            .unwrap_or_else(|| UNKNOWN_PLACEMENT.to_string())
    }
}

/// Shared handle to a recipient
pub type SharedRecipient = Arc<dyn Recipient>;

/// Enumeration of currently connected recipients.
pub trait RecipientRegistry: Send + Sync {
    /// Point-in-time copy of all connected recipients
    fn snapshot(&self) -> Vec<SharedRecipient>;

    /// Number of connected recipients (`{online}`)
    fn online_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Advertised capacity (`{max_players}`)
    fn capacity(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<String>);

    impl Recipient for Fixed {
        fn is_active(&self) -> bool {
            true
        }

        fn display_name(&self) -> &str {
            "fixed"
        }

        fn current_placement(&self) -> Option<String> {
            self.0.clone()
        }

        fn send(&self, _payload: Bytes) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[test]
    fn test_placement_fallback() {
        assert_eq!(Fixed(None).placement_or_unknown(), "Unknown");
        assert_eq!(Fixed(Some("lobby".into())).placement_or_unknown(), "lobby");
    }
}
