//! Booking actions.
//!
//! User commands and the internal events fed back by effects. Results of
//! remote calls arrive as actions carrying `Result`, so every failure path
//! flows through the reducer like any other input.

use chrono::NaiveDate;

use crate::availability::{DayAvailability, MonthAvailability};
use crate::customer::CustomerDetails;
use crate::providers::{
    ApiError, BookingConfirmation, Hold, PaymentCredentials, PaymentError, PaymentMethodToken,
    PaymentReceipt,
};
use crate::selection::SelectionMutation;

/// Everything that can happen to the booking widget.
#[derive(Debug, Clone)]
pub enum BookingAction {
    // ── Availability ────────────────────────────────────────────────
    /// The user changed the party size.
    SetCovers(u32),
    /// The user picked a date to view.
    SetDate(NaiveDate),
    /// The calendar scrolled to a month; fetch its closed days if unknown.
    EnsureMonth(NaiveDate),
    /// The availability debounce window elapsed.
    DebounceElapsed {
        /// Epoch the window was opened under.
        epoch: u64,
    },
    /// A day fetch completed.
    DayLoaded {
        /// Epoch the fetch was issued under; stale epochs are discarded.
        epoch: u64,
        /// The fetch outcome.
        result: Result<DayAvailability, ApiError>,
    },
    /// A month fetch completed.
    MonthLoaded {
        /// The `"YYYY-MM"` cache key.
        key: String,
        /// The fetch outcome.
        result: Result<MonthAvailability, ApiError>,
    },

    // ── Selection ───────────────────────────────────────────────────
    /// The user picked a shift/time slot.
    SelectSlot {
        /// Shift id within the loaded day.
        shift: String,
        /// Time value within the shift.
        time: i32,
    },
    /// The user changed the add-on selection.
    Select(SelectionMutation),
    /// The user chose a seating area.
    ChooseArea(String),

    // ── Session ─────────────────────────────────────────────────────
    /// "Proceed to booking": request a hold.
    Proceed,
    /// The hold request completed.
    HoldResolved(Result<Hold, ApiError>),
    /// Internal: move a fresh hold into details entry.
    BeginDetailsEntry,
    /// The user submitted contact details.
    SubmitDetails(CustomerDetails),
    /// Processor credential acquisition completed.
    CredentialsResolved(Result<PaymentCredentials, PaymentError>),
    /// The user submitted a captured payment method.
    SubmitPayment(PaymentMethodToken),
    /// The charge/authorization completed.
    PaymentResolved(Result<PaymentReceipt, PaymentError>),
    /// The confirm/update request completed.
    ConfirmResolved(Result<BookingConfirmation, ApiError>),
    /// The confirm safety timeout fired after a successful charge.
    ConfirmTimedOut,
    /// The hold countdown reached zero.
    CountdownExpired,
    /// Retry after a definitive failure, resuming under the same hold.
    Retry,
    /// Abandon everything and return to browsing.
    Restart,
}
