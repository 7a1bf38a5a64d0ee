//! External collaborators.
//!
//! Traits for the remote booking service and the payment processor. The
//! reducers depend on these traits only; the runtime wires in the HTTP
//! implementation, tests wire in mocks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::availability::{DayAvailability, MonthAvailability};
use crate::customer::CustomerDetails;
use crate::money::Money;

pub mod http;
pub mod payment_registry;

pub use http::HttpBookingApi;
pub use payment_registry::PaymentClientRegistry;

/// Card requirement attached to a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardRequirement {
    /// No card needed; confirm directly after details.
    None,
    /// Card stored for no-show protection; authorized, not charged.
    NoShowProtection,
    /// Deposit charged up front.
    Deposit,
}

/// What the payment processor is asked to do for a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    /// Charge the card now (deposit).
    OneTimeCharge,
    /// Store and authorize the card for later use (no-show protection).
    StoredCardAuthorization,
}

/// An ephemeral server-issued reservation lock.
///
/// Never mutated in place; a new hold entirely replaces a stale one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// Server-issued id, quoted on confirm.
    pub id: String,
    /// Server-side creation time.
    pub created_at: DateTime<Utc>,
    /// Card requirement for this booking.
    pub card: CardRequirement,
    /// Per-head charge amount in minor units.
    pub per_head: Money,
}

impl Hold {
    /// Whether this hold needs the payment step at all.
    #[must_use]
    pub const fn requires_payment(&self) -> bool {
        !matches!(self.card, CardRequirement::None)
    }

    /// The payment intent implied by the card requirement, when any.
    #[must_use]
    pub const fn intent(&self) -> Option<IntentKind> {
        match self.card {
            CardRequirement::None => None,
            CardRequirement::NoShowProtection => Some(IntentKind::StoredCardAuthorization),
            CardRequirement::Deposit => Some(IntentKind::OneTimeCharge),
        }
    }

    /// The amount presented to the user: per-head charge times party size.
    #[must_use]
    pub const fn required_charge(&self, covers: u32) -> Money {
        self.per_head.saturating_mul(covers as u64)
    }
}

/// Parameters of a hold request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRequest {
    /// Party size.
    pub covers: u32,
    /// Booking date.
    pub date: NaiveDate,
    /// Slot time value.
    pub time: i32,
    /// Wire-encoded add-on selection.
    pub addons: String,
    /// Chosen seating area, when the day offers areas.
    pub area: Option<String>,
    /// Event shift id, when booking an event slot.
    pub event: Option<String>,
}

/// Parameters of a confirm/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// The hold being upgraded into a booking.
    pub hold_id: String,
    /// Validated contact details.
    pub details: CustomerDetails,
    /// Wire-encoded add-on selection.
    pub addons: String,
    /// Payment reference, when a charge or authorization happened.
    pub payment_reference: Option<String>,
}

/// A confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    /// Booking reference shown to the user.
    pub reference: String,
}

/// A remote-service call failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ApiError {
    /// The request never completed (network, timeout).
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a definitive rejection.
    #[error("{message}")]
    Service {
        /// HTTP status code, when known.
        status: Option<u16>,
        /// Message from the service, surfaced verbatim.
        message: String,
    },
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// The remote booking service.
pub trait BookingApi: Send + Sync {
    /// Fetch availability for one day at a party size.
    fn fetch_day(
        &self,
        covers: u32,
        date: NaiveDate,
    ) -> impl Future<Output = Result<DayAvailability, ApiError>> + Send;

    /// Fetch availability for the month containing `month_start`.
    fn fetch_month(
        &self,
        covers: u32,
        month_start: NaiveDate,
    ) -> impl Future<Output = Result<MonthAvailability, ApiError>> + Send;

    /// Request a hold on a slot.
    fn create_hold(
        &self,
        request: HoldRequest,
    ) -> impl Future<Output = Result<Hold, ApiError>> + Send;

    /// Upgrade a hold into a confirmed booking.
    fn confirm(
        &self,
        request: ConfirmRequest,
    ) -> impl Future<Output = Result<BookingConfirmation, ApiError>> + Send;
}

/// Processor credentials scoped to one hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCredentials {
    /// Publishable key identifying the processor account.
    pub publishable_key: String,
    /// Client secret scoped to this hold's payment intent.
    pub client_secret: String,
}

/// A tokenized payment method captured from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodToken(pub String);

/// A settled or authorized payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Processor reference carried on the confirm request.
    pub reference: String,
    /// What actually happened: charge or stored-card authorization.
    pub intent: IntentKind,
}

/// A payment-processor failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PaymentError {
    /// The card was declined. User may retry with another card.
    #[error("card declined: {0}")]
    Declined(String),
    /// Processor or credential-exchange failure.
    #[error("payment processor error: {0}")]
    Processor(String),
}

/// The payment processor.
pub trait PaymentProcessor: Send + Sync {
    /// Exchange a hold id/creation pair for processor credentials.
    fn credentials(
        &self,
        hold_id: &str,
        created_at: DateTime<Utc>,
        amount: Money,
        intent: IntentKind,
    ) -> impl Future<Output = Result<PaymentCredentials, PaymentError>> + Send;

    /// Charge or authorize a tokenized payment method.
    fn settle(
        &self,
        credentials: &PaymentCredentials,
        method: PaymentMethodToken,
        intent: IntentKind,
    ) -> impl Future<Output = Result<PaymentReceipt, PaymentError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_charge_is_per_head_times_covers() {
        let hold = Hold {
            id: "h1".to_owned(),
            created_at: Utc::now(),
            card: CardRequirement::Deposit,
            per_head: Money::from_minor(2000),
        };
        assert_eq!(hold.required_charge(3), Money::from_minor(6000));
        assert_eq!(hold.intent(), Some(IntentKind::OneTimeCharge));
    }

    #[test]
    fn card_codes_map_to_intents() {
        let mut hold = Hold {
            id: "h1".to_owned(),
            created_at: Utc::now(),
            card: CardRequirement::None,
            per_head: Money::ZERO,
        };
        assert!(!hold.requires_payment());
        assert_eq!(hold.intent(), None);

        hold.card = CardRequirement::NoShowProtection;
        assert_eq!(hold.intent(), Some(IntentKind::StoredCardAuthorization));
    }
}
