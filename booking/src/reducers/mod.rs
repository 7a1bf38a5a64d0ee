//! Booking reducers.
//!
//! Pure functions `(State, Action, Environment) → (State, Effects)`. The
//! unified [`BookingReducer`] routes each action to the sub-reducer that
//! owns it: availability fetching, add-on selection, or the session
//! lifecycle.

pub mod availability;
pub mod selection;
pub mod session;

use tablewise_core::effect::{Effect, EffectId};
use tablewise_core::reducer::Reducer;
use tablewise_core::SmallVec;

use crate::actions::BookingAction;
use crate::environment::BookingEnvironment;
use crate::providers::{BookingApi, PaymentProcessor};
use crate::state::BookingState;

pub use availability::AvailabilityReducer;
pub use selection::SelectionReducer;
pub use session::SessionReducer;

/// Slot for the debounce window between date/covers edits and the day
/// fetch. A later edit supersedes (aborts) the pending window.
pub const DEBOUNCE_SLOT: EffectId = EffectId::new("availability-debounce");

/// Slot for the hold countdown. A new hold restarts it; confirmation or
/// restart clears it.
pub const HOLD_COUNTDOWN: EffectId = EffectId::new("hold-countdown");

/// Slot for the confirm safety timeout armed after a successful charge.
pub const CONFIRM_SAFETY: EffectId = EffectId::new("confirm-safety");

/// Unified booking reducer.
#[derive(Debug, Clone)]
pub struct BookingReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    availability: AvailabilityReducer<B, P>,
    selection: SelectionReducer<B, P>,
    session: SessionReducer<B, P>,
}

impl<B, P> BookingReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    /// Create the unified reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            availability: AvailabilityReducer::new(),
            selection: SelectionReducer::new(),
            session: SessionReducer::new(),
        }
    }
}

impl<B, P> Default for BookingReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B, P> Reducer for BookingReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment<B, P>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BookingAction::SetCovers(_)
            | BookingAction::SetDate(_)
            | BookingAction::EnsureMonth(_)
            | BookingAction::DebounceElapsed { .. }
            | BookingAction::DayLoaded { .. }
            | BookingAction::MonthLoaded { .. } => self.availability.reduce(state, action, env),

            BookingAction::SelectSlot { .. }
            | BookingAction::Select(_)
            | BookingAction::ChooseArea(_) => self.selection.reduce(state, action, env),

            BookingAction::Proceed
            | BookingAction::HoldResolved(_)
            | BookingAction::BeginDetailsEntry
            | BookingAction::SubmitDetails(_)
            | BookingAction::CredentialsResolved(_)
            | BookingAction::SubmitPayment(_)
            | BookingAction::PaymentResolved(_)
            | BookingAction::ConfirmResolved(_)
            | BookingAction::ConfirmTimedOut
            | BookingAction::CountdownExpired
            | BookingAction::Retry
            | BookingAction::Restart => self.session.reduce(state, action, env),
        }
    }
}
