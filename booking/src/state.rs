//! Booking widget state.

use chrono::{DateTime, NaiveDate, Utc};

use crate::availability::{ClosedDatesCache, DayAvailability};
use crate::catalog::SelectionContext;
use crate::customer::CustomerDetails;
use crate::error::BookingError;
use crate::providers::{Hold, PaymentCredentials, PaymentReceipt};
use crate::selection::SelectionState;

/// Where the session is in the hold → details → (pay) → confirm lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// Picking date, time, party size, and add-ons.
    Browsing,
    /// A hold was just granted; transitions to details entry immediately.
    Held {
        /// The granted hold.
        hold: Hold,
    },
    /// Collecting contact details under the hold countdown.
    DetailsEntry {
        /// The active hold.
        hold: Hold,
        /// Details entered so far, kept across failures and retries.
        details: Option<CustomerDetails>,
    },
    /// Collecting and settling payment.
    PaymentPending {
        /// The active hold.
        hold: Hold,
        /// Validated contact details.
        details: CustomerDetails,
        /// Processor credentials, once acquired.
        credentials: Option<PaymentCredentials>,
        /// The settled payment, once the charge/authorization succeeded.
        /// A set receipt with no confirmation yet is what the safety
        /// timeout resolves.
        settled: Option<PaymentReceipt>,
    },
    /// Booked.
    Confirmed {
        /// Booking reference shown to the user.
        reference: String,
    },
    /// The hold countdown elapsed. Requires a full restart.
    Expired,
    /// A remote call failed definitively. The hold may still be alive, so
    /// a retry can resume without a new hold while time remains.
    Failed {
        /// What went wrong.
        error: BookingError,
        /// The hold at the time of failure, when one existed.
        hold: Option<Hold>,
        /// Details entered before the failure.
        details: Option<CustomerDetails>,
    },
}

impl SessionPhase {
    /// The hold attached to the current phase, if any.
    #[must_use]
    pub const fn hold(&self) -> Option<&Hold> {
        match self {
            Self::Held { hold }
            | Self::DetailsEntry { hold, .. }
            | Self::PaymentPending { hold, .. } => Some(hold),
            Self::Failed { hold, .. } => hold.as_ref(),
            Self::Browsing | Self::Confirmed { .. } | Self::Expired => None,
        }
    }

    /// Phases in which the hold countdown is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Held { .. }
                | Self::DetailsEntry { .. }
                | Self::PaymentPending { .. }
                | Self::Failed { hold: Some(_), .. }
        )
    }
}

/// The whole widget state driven by the booking reducer.
#[derive(Debug)]
pub struct BookingState {
    /// Party size.
    pub covers: u32,
    /// The date being viewed.
    pub date: Option<NaiveDate>,
    /// Availability for the viewed date, once loaded.
    pub day: Option<DayAvailability>,
    /// Whether a day fetch (or its debounce) is outstanding.
    pub day_loading: bool,
    /// Monotonic counter tagging availability fetches; results carrying a
    /// stale epoch are discarded.
    pub fetch_epoch: u64,
    /// Month-keyed closed-dates cache.
    pub closed_dates: ClosedDatesCache,
    /// Selected shift id within the loaded day.
    pub selected_shift: Option<String>,
    /// Selected time within the selected shift.
    pub selected_time: Option<i32>,
    /// Effective policy/catalog for the selected slot.
    pub selection_ctx: Option<SelectionContext>,
    /// Current add-on selection. Reset when the slot changes.
    pub selection: SelectionState,
    /// Chosen seating area id.
    pub area: Option<String>,
    /// Session lifecycle phase.
    pub session: SessionPhase,
    /// Client-side hold expiry instant, while a hold is active.
    pub hold_deadline: Option<DateTime<Utc>>,
    /// Single-flight guard for the hold request.
    pub hold_in_flight: bool,
    /// Single-flight guard for the confirm request.
    pub confirm_in_flight: bool,
    /// Set while a settle request is outstanding. Expiry is deferred while
    /// this is up: the charge outcome decides whether the session confirms
    /// or expires.
    pub payment_in_flight: bool,
    /// The most recent recoverable error, for inline display.
    pub error: Option<BookingError>,
}

impl BookingState {
    /// Fresh state for a party of the given size.
    #[must_use]
    pub fn new(covers: u32) -> Self {
        Self {
            covers,
            date: None,
            day: None,
            day_loading: false,
            fetch_epoch: 0,
            closed_dates: ClosedDatesCache::new(),
            selected_shift: None,
            selected_time: None,
            selection_ctx: None,
            selection: SelectionState::empty(),
            area: None,
            session: SessionPhase::Browsing,
            hold_deadline: None,
            hold_in_flight: false,
            confirm_in_flight: false,
            payment_in_flight: false,
            error: None,
        }
    }

    /// Drop the slot selection and everything derived from it.
    pub fn clear_slot(&mut self) {
        self.selected_shift = None;
        self.selected_time = None;
        self.selection_ctx = None;
        self.selection = SelectionState::empty();
        self.area = None;
    }

    /// Return to browsing, discarding any hold-related state.
    pub fn reset_session(&mut self) {
        self.session = SessionPhase::Browsing;
        self.hold_deadline = None;
        self.hold_in_flight = false;
        self.confirm_in_flight = false;
        self.payment_in_flight = false;
        self.error = None;
    }
}

impl Default for BookingState {
    fn default() -> Self {
        Self::new(2)
    }
}
