//! Selection reducer: slot choice and add-on mutations.

use std::marker::PhantomData;

use tablewise_core::effect::Effect;
use tablewise_core::reducer::Reducer;
use tablewise_core::{smallvec, SmallVec};
use tracing::warn;

use crate::actions::BookingAction;
use crate::environment::BookingEnvironment;
use crate::providers::{BookingApi, PaymentProcessor};
use crate::selection::{self, SelectionState};
use crate::state::{BookingState, SessionPhase};

/// Selection sub-reducer.
#[derive(Debug, Clone)]
pub struct SelectionReducer<B, P> {
    _phantom: PhantomData<(B, P)>,
}

impl<B, P> SelectionReducer<B, P> {
    /// Create the sub-reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B, P> Default for SelectionReducer<B, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, P> Reducer for SelectionReducer<B, P>
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
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if !matches!(state.session, SessionPhase::Browsing) {
            warn!("ignoring selection input outside browsing");
            return smallvec![Effect::None];
        }

        match action {
            BookingAction::SelectSlot { shift, time } => {
                let Some(day) = &state.day else {
                    warn!("slot selected before the day loaded");
                    return smallvec![Effect::None];
                };
                let Some((found, slot)) = day
                    .shifts
                    .iter()
                    .find(|s| s.id == shift)
                    .and_then(|s| s.slot_at(time).map(|slot| (s, slot)))
                else {
                    warn!(shift, time, "slot not present in loaded day");
                    return smallvec![Effect::None];
                };

                state.selection_ctx = Some(found.context_for(slot));
                state.selected_shift = Some(shift);
                state.selected_time = Some(time);
                // A new slot means a new catalog; selections do not carry over.
                state.selection = SelectionState::empty();
                state.error = None;
                smallvec![Effect::None]
            }

            BookingAction::Select(mutation) => {
                let Some(ctx) = &state.selection_ctx else {
                    warn!("selection mutation before a slot was chosen");
                    return smallvec![Effect::None];
                };
                match selection::apply(ctx, state.covers, &state.selection, mutation) {
                    Ok(next) => {
                        state.selection = next;
                        state.error = None;
                    }
                    Err(rejection) => {
                        state.error = Some(rejection.into());
                    }
                }
                smallvec![Effect::None]
            }

            BookingAction::ChooseArea(area) => {
                let known = state
                    .day
                    .as_ref()
                    .is_some_and(|day| day.areas.iter().any(|a| a.id == area));
                if known {
                    state.area = Some(area);
                } else {
                    warn!(area, "unknown seating area");
                }
                smallvec![Effect::None]
            }

            other => {
                warn!(action = ?other, "action not handled by selection reducer");
                smallvec![Effect::None]
            }
        }
    }
}
