//! Availability reducer: debounced day fetches and the month cache.
//!
//! Date and party-size edits open a debounce window under
//! [`super::DEBOUNCE_SLOT`]; a later edit supersedes the pending window, so
//! only the latest context ever issues a fetch. Every fetch is additionally
//! tagged with the state's `fetch_epoch`, and results carrying a stale
//! epoch are discarded, so a slow response can never overwrite a newer
//! selection.

use std::marker::PhantomData;

use chrono::{Datelike, NaiveDate};
use tablewise_core::effect::Effect;
use tablewise_core::reducer::Reducer;
use tablewise_core::{smallvec, SmallVec};
use tracing::{debug, warn};

use crate::actions::BookingAction;
use crate::availability::month_key;
use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::providers::{BookingApi, PaymentProcessor};
use crate::selection::reclamp_options;
use crate::state::{BookingState, SessionPhase};

use super::DEBOUNCE_SLOT;

/// Availability sub-reducer.
#[derive(Debug, Clone)]
pub struct AvailabilityReducer<B, P> {
    _phantom: PhantomData<(B, P)>,
}

impl<B, P> AvailabilityReducer<B, P> {
    /// Create the sub-reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B, P> Default for AvailabilityReducer<B, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, P> AvailabilityReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    /// Open (or restart) the debounce window for the current epoch.
    fn schedule_day_fetch(
        &self,
        state: &mut BookingState,
        env: &BookingEnvironment<B, P>,
    ) -> Effect<BookingAction> {
        state.fetch_epoch += 1;
        state.day = None;
        state.day_loading = true;
        let epoch = state.fetch_epoch;
        Effect::Delay {
            duration: env.config.availability_debounce.to_std().unwrap_or_default(),
            action: Box::new(BookingAction::DebounceElapsed { epoch }),
        }
        .cancellable(DEBOUNCE_SLOT)
    }

    fn ensure_month(
        &self,
        state: &mut BookingState,
        env: &BookingEnvironment<B, P>,
        date: NaiveDate,
    ) -> Effect<BookingAction> {
        let key = month_key(date);
        if !state.closed_dates.begin_fetch(&key) {
            return Effect::None;
        }
        let api = env.api.clone();
        let covers = state.covers;
        let month_start = date.with_day(1).unwrap_or(date);
        Effect::Future(Box::pin(async move {
            let result = api.fetch_month(covers, month_start).await;
            Some(BookingAction::MonthLoaded { key, result })
        }))
    }
}

impl<B, P> Reducer for AvailabilityReducer<B, P>
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
            BookingAction::SetCovers(covers) => {
                if !matches!(state.session, SessionPhase::Browsing) {
                    warn!("ignoring party-size change outside browsing");
                    return smallvec![Effect::None];
                }
                state.covers = covers;
                if let Some(ctx) = &state.selection_ctx {
                    state.selection =
                        reclamp_options(ctx, covers, std::mem::take(&mut state.selection));
                }
                if state.date.is_some() {
                    let fetch = self.schedule_day_fetch(state, env);
                    smallvec![fetch]
                } else {
                    smallvec![Effect::None]
                }
            }

            BookingAction::SetDate(date) => {
                if !matches!(state.session, SessionPhase::Browsing) {
                    warn!("ignoring date change outside browsing");
                    return smallvec![Effect::None];
                }
                state.date = Some(date);
                state.clear_slot();
                state.error = None;
                let fetch = self.schedule_day_fetch(state, env);
                let month = self.ensure_month(state, env, date);
                smallvec![fetch, month]
            }

            BookingAction::EnsureMonth(date) => {
                let month = self.ensure_month(state, env, date);
                smallvec![month]
            }

            BookingAction::DebounceElapsed { epoch } => {
                if epoch != state.fetch_epoch {
                    debug!(epoch, current = state.fetch_epoch, "stale debounce ignored");
                    return smallvec![Effect::None];
                }
                let Some(date) = state.date else {
                    state.day_loading = false;
                    return smallvec![Effect::None];
                };
                let api = env.api.clone();
                let covers = state.covers;
                smallvec![Effect::Future(Box::pin(async move {
                    let result = api.fetch_day(covers, date).await;
                    Some(BookingAction::DayLoaded { epoch, result })
                }))]
            }

            BookingAction::DayLoaded { epoch, result } => {
                if epoch != state.fetch_epoch {
                    debug!(epoch, current = state.fetch_epoch, "stale day result discarded");
                    return smallvec![Effect::None];
                }
                state.day_loading = false;
                match result {
                    Ok(day) => {
                        if !day.has_slots() {
                            let message = day
                                .message
                                .clone()
                                .unwrap_or_else(|| "no availability for this date".to_owned());
                            state.error = Some(BookingError::Availability(message));
                        }
                        state.day = Some(day);
                    }
                    Err(err) => {
                        state.error = Some(BookingError::Availability(err.to_string()));
                    }
                }
                smallvec![Effect::None]
            }

            BookingAction::MonthLoaded { key, result } => {
                match result {
                    Ok(month) => state.closed_dates.insert(key, month.closed_dates),
                    Err(err) => {
                        debug!(month = key, error = %err, "month fetch failed");
                        state.closed_dates.abandon_fetch(&key);
                    }
                }
                smallvec![Effect::None]
            }

            other => {
                warn!(action = ?other, "action not handled by availability reducer");
                smallvec![Effect::None]
            }
        }
    }
}
