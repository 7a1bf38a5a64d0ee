//! Error taxonomy for the booking flow.
//!
//! Pure engine code (selection, pricing) never produces these: it returns
//! verdict values. `BookingError` is what the session reducer records in
//! state when a collaborator call or a validation fails, so every variant
//! is `Clone` and carries a displayable message.

use crate::customer::DetailsError;
use crate::selection::SelectionRejection;

/// A failure surfaced to the user during the booking flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// Missing or invalid establishment configuration. Fatal: replaces the
    /// widget body, nothing to retry.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// No availability for the chosen date/party size, or the fetch failed.
    /// Recoverable by re-selecting.
    #[error("availability error: {0}")]
    Availability(String),
    /// The constraint engine rejected a mutation.
    #[error(transparent)]
    Selection(#[from] SelectionRejection),
    /// "Proceed" was pressed while the selection is not yet complete.
    #[error("the selection is not complete yet")]
    Incomplete(crate::selection::IncompleteReason),
    /// Contact details failed validation.
    #[error(transparent)]
    Details(#[from] DetailsError),
    /// The remote service rejected the hold request.
    #[error("hold failed: {0}")]
    Hold(String),
    /// The remote service rejected the confirm/update request.
    #[error("confirmation failed: {0}")]
    Confirm(String),
    /// Card decline or payment-processor error. The hold stays alive while
    /// time remains, so payment can be retried.
    #[error("payment failed: {0}")]
    Payment(String),
    /// The hold countdown elapsed. Terminal for this hold.
    #[error("the reservation hold has expired")]
    Expired,
}

impl BookingError {
    /// Whether the error invalidates the whole widget rather than one step.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
