//! Session reducer: the hold → details → (pay) → confirm lifecycle.
//!
//! Timers live in two cancellation slots: the hold countdown under
//! [`super::HOLD_COUNTDOWN`] and the confirm safety timeout under
//! [`super::CONFIRM_SAFETY`]. Every user-driven continuation first checks
//! the hold deadline against the environment clock, so an expired hold is
//! caught even if the countdown action is still in flight, and no network
//! call ever goes out for a dead hold. The one exception is an outstanding
//! settle request: expiry is deferred until the charge resolves, because a
//! charged guest must end up confirmed, never expired.

use std::marker::PhantomData;

use tablewise_core::effect::Effect;
use tablewise_core::reducer::Reducer;
use tablewise_core::{smallvec, SmallVec};
use tracing::{info, warn};

use crate::actions::BookingAction;
use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::providers::{
    BookingApi, ConfirmRequest, HoldRequest, PaymentProcessor, PaymentReceipt,
};
use crate::selection::completion;
use crate::state::{BookingState, SessionPhase};
use crate::wire::encode_addons;

use super::{CONFIRM_SAFETY, HOLD_COUNTDOWN};

/// Session sub-reducer.
#[derive(Debug, Clone)]
pub struct SessionReducer<B, P> {
    _phantom: PhantomData<(B, P)>,
}

impl<B, P> SessionReducer<B, P> {
    /// Create the sub-reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B, P> Default for SessionReducer<B, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, P> SessionReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    /// True when the hold deadline has passed. Moves the session to
    /// `Expired` as a side effect, so callers just return the effects.
    fn expire_if_elapsed(
        &self,
        state: &mut BookingState,
        env: &BookingEnvironment<B, P>,
    ) -> Option<SmallVec<[Effect<BookingAction>; 4]>> {
        let deadline = state.hold_deadline?;
        if env.clock.now() < deadline {
            return None;
        }
        if state.payment_in_flight {
            // A settle is outstanding; its outcome decides between
            // confirmation and expiry. Do not expire under it.
            return None;
        }
        warn!("hold deadline elapsed, expiring session");
        state.session = SessionPhase::Expired;
        state.hold_deadline = None;
        state.hold_in_flight = false;
        state.confirm_in_flight = false;
        state.error = Some(BookingError::Expired);
        Some(smallvec![
            Effect::Cancel(HOLD_COUNTDOWN),
            Effect::Cancel(CONFIRM_SAFETY),
        ])
    }

    fn confirm_effect(
        &self,
        state: &BookingState,
        env: &BookingEnvironment<B, P>,
        hold_id: String,
        details: crate::customer::CustomerDetails,
        payment_reference: Option<String>,
    ) -> Effect<BookingAction> {
        let api = env.api.clone();
        let request = ConfirmRequest {
            hold_id,
            details,
            addons: encode_addons(&state.selection),
            payment_reference,
        };
        Effect::Future(Box::pin(async move {
            let result = api.confirm(request).await;
            Some(BookingAction::ConfirmResolved(result))
        }))
    }

    fn credentials_effect(
        &self,
        state: &BookingState,
        env: &BookingEnvironment<B, P>,
        hold: &crate::providers::Hold,
    ) -> Effect<BookingAction> {
        let payments = env.payments.clone();
        let hold_id = hold.id.clone();
        let created_at = hold.created_at;
        let amount = hold.required_charge(state.covers);
        // A hold that does not require payment never reaches this path.
        let Some(intent) = hold.intent() else {
            return Effect::None;
        };
        Effect::Future(Box::pin(async move {
            let result = payments
                .credentials(&hold_id, created_at, amount, intent)
                .await;
            Some(BookingAction::CredentialsResolved(result))
        }))
    }
}

impl<B, P> Reducer for SessionReducer<B, P>
where
    B: BookingApi + Clone + 'static,
    P: PaymentProcessor + Clone + 'static,
{
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment<B, P>;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BookingAction::Proceed => {
                if !matches!(state.session, SessionPhase::Browsing) {
                    warn!("proceed outside browsing ignored");
                    return smallvec![Effect::None];
                }
                if state.hold_in_flight {
                    // Single-flight: a second click while the hold request
                    // is outstanding is a no-op.
                    return smallvec![Effect::None];
                }
                let (Some(date), Some(time), Some(ctx)) =
                    (state.date, state.selected_time, state.selection_ctx.as_ref())
                else {
                    warn!("proceed without a selected slot ignored");
                    return smallvec![Effect::None];
                };

                match completion(ctx, state.covers, &state.selection) {
                    crate::selection::Completion::Complete => {}
                    crate::selection::Completion::Incomplete(reason) => {
                        state.error = Some(BookingError::Incomplete(reason));
                        return smallvec![Effect::None];
                    }
                }
                let offers_areas = state
                    .day
                    .as_ref()
                    .is_some_and(|day| !day.areas.is_empty());
                if offers_areas && state.area.is_none() {
                    state.error = Some(BookingError::Availability(
                        "a seating area must be chosen".to_owned(),
                    ));
                    return smallvec![Effect::None];
                }

                let event = state
                    .day
                    .as_ref()
                    .zip(state.selected_shift.as_ref())
                    .and_then(|(day, id)| day.shifts.iter().find(|s| &s.id == id))
                    .filter(|shift| shift.kind == crate::catalog::ShiftKind::Event)
                    .map(|shift| shift.id.clone());

                state.hold_in_flight = true;
                state.error = None;
                let api = env.api.clone();
                let request = HoldRequest {
                    covers: state.covers,
                    date,
                    time,
                    addons: encode_addons(&state.selection),
                    area: state.area.clone(),
                    event,
                };
                smallvec![Effect::Future(Box::pin(async move {
                    let result = api.create_hold(request).await;
                    Some(BookingAction::HoldResolved(result))
                }))]
            }

            BookingAction::HoldResolved(result) => {
                if !state.hold_in_flight {
                    // No request outstanding: the session was restarted or
                    // expired while this response was in transit.
                    warn!("dropping hold result with no request outstanding");
                    return smallvec![Effect::None];
                }
                state.hold_in_flight = false;
                match result {
                    Ok(hold) => {
                        info!(hold = %hold.id, card = ?hold.card, "hold granted");
                        state.hold_deadline =
                            Some(env.clock.now() + env.config.hold_countdown);
                        state.session = SessionPhase::Held { hold };
                        state.error = None;
                        let countdown = Effect::Delay {
                            duration: env.config.hold_countdown.to_std().unwrap_or_default(),
                            action: Box::new(BookingAction::CountdownExpired),
                        }
                        .cancellable(HOLD_COUNTDOWN);
                        // Details entry follows automatically.
                        let advance = Effect::Future(Box::pin(async move {
                            Some(BookingAction::BeginDetailsEntry)
                        }));
                        smallvec![countdown, advance]
                    }
                    Err(err) => {
                        // Stay browsing; the remote message is surfaced as is.
                        state.error = Some(BookingError::Hold(err.to_string()));
                        smallvec![Effect::None]
                    }
                }
            }

            BookingAction::BeginDetailsEntry => {
                if let SessionPhase::Held { hold } = &state.session {
                    state.session = SessionPhase::DetailsEntry {
                        hold: hold.clone(),
                        details: None,
                    };
                } else {
                    warn!("details entry requested outside held phase");
                }
                smallvec![Effect::None]
            }

            BookingAction::SubmitDetails(details) => {
                if let Some(effects) = self.expire_if_elapsed(state, env) {
                    return effects;
                }
                let SessionPhase::DetailsEntry { hold, .. } = &state.session else {
                    warn!("details submitted outside details entry");
                    return smallvec![Effect::None];
                };
                let hold = hold.clone();

                if let Err(err) = details.validate() {
                    // Keep what the user typed; only flag the error.
                    state.session = SessionPhase::DetailsEntry {
                        hold,
                        details: Some(details),
                    };
                    state.error = Some(err.into());
                    return smallvec![Effect::None];
                }

                state.error = None;
                if hold.requires_payment() {
                    let credentials = self.credentials_effect(state, env, &hold);
                    state.session = SessionPhase::PaymentPending {
                        hold,
                        details,
                        credentials: None,
                        settled: None,
                    };
                    smallvec![credentials]
                } else {
                    if state.confirm_in_flight {
                        return smallvec![Effect::None];
                    }
                    state.confirm_in_flight = true;
                    let confirm = self.confirm_effect(
                        state,
                        env,
                        hold.id.clone(),
                        details.clone(),
                        None,
                    );
                    state.session = SessionPhase::DetailsEntry {
                        hold,
                        details: Some(details),
                    };
                    smallvec![confirm]
                }
            }

            BookingAction::CredentialsResolved(result) => {
                let SessionPhase::PaymentPending {
                    hold,
                    details,
                    settled,
                    ..
                } = &state.session
                else {
                    return smallvec![Effect::None];
                };
                let hold = hold.clone();
                let details = details.clone();
                let settled = settled.clone();
                match result {
                    Ok(creds) => {
                        state.session = SessionPhase::PaymentPending {
                            hold,
                            details,
                            credentials: Some(creds),
                            settled,
                        };
                    }
                    Err(err) => {
                        // Back to details; the hold is untouched.
                        state.session = SessionPhase::DetailsEntry {
                            hold,
                            details: Some(details),
                        };
                        state.error = Some(BookingError::Payment(err.to_string()));
                    }
                }
                smallvec![Effect::None]
            }

            BookingAction::SubmitPayment(method) => {
                if let Some(effects) = self.expire_if_elapsed(state, env) {
                    return effects;
                }
                if state.payment_in_flight {
                    // Single-flight: one settle at a time.
                    return smallvec![Effect::None];
                }
                let SessionPhase::PaymentPending {
                    hold,
                    credentials: Some(credentials),
                    settled: None,
                    ..
                } = &state.session
                else {
                    warn!("payment submitted in an unready phase");
                    return smallvec![Effect::None];
                };
                let Some(intent) = hold.intent() else {
                    return smallvec![Effect::None];
                };
                let payments = env.payments.clone();
                let credentials = credentials.clone();
                state.payment_in_flight = true;
                state.error = None;
                smallvec![Effect::Future(Box::pin(async move {
                    let result = payments.settle(&credentials, method, intent).await;
                    Some(BookingAction::PaymentResolved(result))
                }))]
            }

            BookingAction::PaymentResolved(result) => {
                state.payment_in_flight = false;
                let SessionPhase::PaymentPending {
                    hold,
                    details,
                    credentials,
                    ..
                } = &state.session
                else {
                    if let Ok(receipt) = &result {
                        warn!(
                            reference = %receipt.reference,
                            "settled receipt arrived for an abandoned session"
                        );
                    }
                    return smallvec![Effect::None];
                };
                let hold = hold.clone();
                let details = details.clone();
                let credentials = credentials.clone();
                match result {
                    Ok(receipt) => {
                        info!(reference = %receipt.reference, "payment settled");
                        state.session = SessionPhase::PaymentPending {
                            hold: hold.clone(),
                            details: details.clone(),
                            credentials,
                            settled: Some(receipt.clone()),
                        };
                        if state.confirm_in_flight {
                            return smallvec![Effect::None];
                        }
                        state.confirm_in_flight = true;
                        let confirm = self.confirm_effect(
                            state,
                            env,
                            hold.id,
                            details,
                            Some(receipt.reference),
                        );
                        // The charge has happened; if the acknowledgment is
                        // delayed or lost, force completion.
                        let safety = Effect::Delay {
                            duration: env
                                .config
                                .confirm_safety_timeout
                                .to_std()
                                .unwrap_or_default(),
                            action: Box::new(BookingAction::ConfirmTimedOut),
                        }
                        .cancellable(CONFIRM_SAFETY);
                        smallvec![confirm, safety]
                    }
                    Err(err) => {
                        state.error = Some(BookingError::Payment(err.to_string()));
                        // If the countdown ran out while the charge was in
                        // flight, the failed charge settles the race: expire.
                        if let Some(effects) = self.expire_if_elapsed(state, env) {
                            return effects;
                        }
                        // Hold stays alive; payment can be retried while
                        // time remains.
                        smallvec![Effect::None]
                    }
                }
            }

            BookingAction::ConfirmResolved(result) => {
                state.confirm_in_flight = false;
                match result {
                    Ok(confirmation) => {
                        info!(reference = %confirmation.reference, "booking confirmed");
                        state.session = SessionPhase::Confirmed {
                            reference: confirmation.reference,
                        };
                        state.hold_deadline = None;
                        state.error = None;
                        smallvec![
                            Effect::Cancel(HOLD_COUNTDOWN),
                            Effect::Cancel(CONFIRM_SAFETY),
                        ]
                    }
                    Err(err) => match &state.session {
                        // Charge already settled: stay put and let the
                        // safety timeout force completion.
                        SessionPhase::PaymentPending {
                            settled: Some(_), ..
                        } => {
                            warn!(error = %err, "confirm failed after settled payment");
                            state.error = Some(BookingError::Confirm(err.to_string()));
                            smallvec![Effect::None]
                        }
                        SessionPhase::DetailsEntry { hold, details } => {
                            let hold = hold.clone();
                            let details = details.clone();
                            let error = BookingError::Confirm(err.to_string());
                            state.session = SessionPhase::Failed {
                                error: error.clone(),
                                hold: Some(hold),
                                details,
                            };
                            state.error = Some(error);
                            smallvec![Effect::None]
                        }
                        _ => {
                            state.error = Some(BookingError::Confirm(err.to_string()));
                            smallvec![Effect::None]
                        }
                    },
                }
            }

            BookingAction::ConfirmTimedOut => {
                if let SessionPhase::PaymentPending {
                    settled: Some(receipt),
                    ..
                } = &state.session
                {
                    let PaymentReceipt { reference, .. } = receipt.clone();
                    warn!(%reference, "confirm acknowledgment overdue, forcing completion");
                    state.session = SessionPhase::Confirmed { reference };
                    state.confirm_in_flight = false;
                    state.hold_deadline = None;
                    state.error = None;
                    smallvec![Effect::Cancel(HOLD_COUNTDOWN)]
                } else {
                    smallvec![Effect::None]
                }
            }

            BookingAction::CountdownExpired => {
                match &state.session {
                    // At-least-once bias: a settled charge is never
                    // stranded, even if the countdown wins the race.
                    SessionPhase::PaymentPending {
                        settled: Some(receipt),
                        ..
                    } => {
                        let reference = receipt.reference.clone();
                        state.session = SessionPhase::Confirmed { reference };
                        state.confirm_in_flight = false;
                        state.hold_deadline = None;
                        smallvec![Effect::Cancel(CONFIRM_SAFETY)]
                    }
                    // A charge is mid-flight: hold the phase until it
                    // resolves. Success confirms, failure expires.
                    SessionPhase::PaymentPending { settled: None, .. }
                        if state.payment_in_flight =>
                    {
                        info!("countdown expired with a charge in flight, awaiting its outcome");
                        smallvec![Effect::None]
                    }
                    phase if phase.is_active() => {
                        info!("hold countdown expired");
                        state.session = SessionPhase::Expired;
                        state.hold_deadline = None;
                        state.hold_in_flight = false;
                        state.confirm_in_flight = false;
                        state.error = Some(BookingError::Expired);
                        smallvec![Effect::Cancel(CONFIRM_SAFETY)]
                    }
                    _ => smallvec![Effect::None],
                }
            }

            BookingAction::Retry => {
                if let Some(effects) = self.expire_if_elapsed(state, env) {
                    return effects;
                }
                let SessionPhase::Failed {
                    hold: Some(hold),
                    details,
                    ..
                } = &state.session
                else {
                    warn!("retry without a resumable failure");
                    return smallvec![Effect::None];
                };
                let hold = hold.clone();
                let details = details.clone();
                state.error = None;
                match (hold.requires_payment(), details) {
                    (true, Some(details)) => {
                        let credentials = self.credentials_effect(state, env, &hold);
                        state.session = SessionPhase::PaymentPending {
                            hold,
                            details,
                            credentials: None,
                            settled: None,
                        };
                        smallvec![credentials]
                    }
                    (_, details) => {
                        state.session = SessionPhase::DetailsEntry { hold, details };
                        smallvec![Effect::None]
                    }
                }
            }

            BookingAction::Restart => {
                state.reset_session();
                smallvec![
                    Effect::Cancel(HOLD_COUNTDOWN),
                    Effect::Cancel(CONFIRM_SAFETY),
                ]
            }

            other => {
                warn!(action = ?other, "action not handled by session reducer");
                smallvec![Effect::None]
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{
        Addon, AddonKind, ParentLink, PerBasis, SelectionContext, Shift, ShiftKind, TimeSlot,
        UsagePolicy,
    };
    use crate::config::BookingConfig;
    use crate::customer::CustomerDetails;
    use crate::error::BookingError;
    use crate::mocks::{MockBookingApi, MockPaymentProcessor};
    use crate::money::Money;
    use crate::providers::{
        ApiError, BookingConfirmation, CardRequirement, Hold, PaymentCredentials, PaymentReceipt,
    };
    use crate::selection::{MenuEntry, SelectionState};
    use chrono::Duration;
    use std::sync::Arc;
    use tablewise_core::environment::Clock;
    use tablewise_testing::assertions::assert_has_future_effect;
    use tablewise_testing::mocks::{test_clock, FixedClock};
    use tablewise_testing::{assert_has_cancel, assert_has_cancellable, assert_no_effects, ReducerTest};

    fn reducer() -> SessionReducer<MockBookingApi, MockPaymentProcessor> {
        SessionReducer::new()
    }

    fn env_with_clock(clock: Arc<FixedClock>) -> BookingEnvironment<MockBookingApi, MockPaymentProcessor> {
        BookingEnvironment::new(
            MockBookingApi::new(),
            MockPaymentProcessor::new(),
            clock,
            BookingConfig::builder("est-1").build().unwrap(),
        )
    }

    fn env() -> BookingEnvironment<MockBookingApi, MockPaymentProcessor> {
        env_with_clock(Arc::new(test_clock()))
    }

    fn menu(id: &str) -> Addon {
        Addon {
            id: id.into(),
            kind: AddonKind::Menu,
            name: id.to_owned(),
            price: Money::from_minor(1000),
            per: PerBasis::Item,
            min_covers: 0,
            max_covers: 0,
            min_quantity: 0,
            max_quantity: 0,
            parent: ParentLink::Unlinked,
        }
    }

    fn ready_state() -> BookingState {
        let mut state = BookingState::new(3);
        state.date = Some("2025-06-14".parse().unwrap());
        state.day = Some(crate::availability::DayAvailability {
            shifts: vec![Shift {
                id: "dinner".to_owned(),
                name: "Dinner".to_owned(),
                kind: ShiftKind::Standard,
                usage: UsagePolicy::Single,
                max_menu_types: None,
                charge: false,
                addons: vec![menu("m")],
                times: vec![TimeSlot {
                    time: 1900,
                    usage: None,
                    addons: None,
                }],
                message: None,
            }],
            areas: Vec::new(),
            message: None,
        });
        state.selected_shift = Some("dinner".to_owned());
        state.selected_time = Some(1900);
        state.selection_ctx = Some(SelectionContext {
            usage: UsagePolicy::Single,
            max_menu_types: None,
            addons: vec![menu("m")],
        });
        state.selection = SelectionState {
            menus: vec![MenuEntry {
                id: "m".into(),
                quantity: None,
            }],
            options: std::collections::BTreeMap::new(),
        };
        state
    }

    fn hold(card: CardRequirement) -> Hold {
        Hold {
            id: "h1".to_owned(),
            created_at: test_clock().now(),
            card,
            per_head: Money::from_minor(2000),
        }
    }

    fn details() -> CustomerDetails {
        CustomerDetails {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: "ada@example.com".to_owned(),
            phone: "+44 20 7946 0000".to_owned(),
            notes: None,
        }
    }

    fn in_details(card: CardRequirement, clock: &FixedClock) -> BookingState {
        let mut state = ready_state();
        state.session = SessionPhase::DetailsEntry {
            hold: hold(card),
            details: None,
        };
        state.hold_deadline = Some(clock.now() + Duration::seconds(180));
        state
    }

    #[test]
    fn proceed_with_incomplete_selection_is_blocked() {
        let mut state = ready_state();
        state.selection = SelectionState::empty();
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(state)
            .when_action(BookingAction::Proceed)
            .then_state(|state| {
                assert!(matches!(state.error, Some(BookingError::Incomplete(_))));
                assert!(!state.hold_in_flight);
            })
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn second_proceed_while_hold_outstanding_is_a_noop() {
        let mut state = ready_state();
        state.hold_in_flight = true;
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(state)
            .when_action(BookingAction::Proceed)
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn granted_hold_starts_countdown_and_advances_to_details() {
        let clock = Arc::new(test_clock());
        let t0 = clock.now();
        let mut state = ready_state();
        state.hold_in_flight = true;
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::HoldResolved(Ok(hold(CardRequirement::None))))
            .then_state(move |state| {
                assert!(matches!(state.session, SessionPhase::Held { .. }));
                assert_eq!(state.hold_deadline, Some(t0 + Duration::seconds(180)));
                assert!(!state.hold_in_flight);
            })
            .then_effects(|effects| {
                assert_has_cancellable(effects, HOLD_COUNTDOWN);
                assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn hold_rejection_stays_browsing_with_the_remote_message() {
        let mut state = ready_state();
        state.hold_in_flight = true;
        ReducerTest::new(reducer())
            .with_env(env())
            .given_state(state)
            .when_action(BookingAction::HoldResolved(Err(ApiError::Service {
                status: Some(409),
                message: "slot just taken".to_owned(),
            })))
            .then_state(|state| {
                assert!(matches!(state.session, SessionPhase::Browsing));
                assert!(matches!(state.error, Some(BookingError::Hold(ref m)) if m.contains("slot just taken")));
            })
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn continue_after_deadline_expires_without_network() {
        let clock = Arc::new(test_clock());
        let state = in_details(CardRequirement::None, &clock);
        clock.advance(Duration::seconds(200));
        let env = env_with_clock(clock);
        let api = env.api.clone();
        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::SubmitDetails(details()))
            .then_state(|state| {
                assert!(matches!(state.session, SessionPhase::Expired));
                assert_eq!(state.error, Some(BookingError::Expired));
            })
            .then_effects(|effects| {
                assert_has_cancel(effects, HOLD_COUNTDOWN);
                assert_has_cancel(effects, CONFIRM_SAFETY);
            })
            .run();
        assert_eq!(api.confirm_calls(), 0);
    }

    #[test]
    fn invalid_details_keep_the_draft() {
        let clock = Arc::new(test_clock());
        let state = in_details(CardRequirement::None, &clock);
        let mut bad = details();
        bad.email = "nope".to_owned();
        let expected = bad.clone();
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::SubmitDetails(bad))
            .then_state(move |state| {
                assert!(matches!(state.error, Some(BookingError::Details(_))));
                match &state.session {
                    SessionPhase::DetailsEntry { details, .. } => {
                        assert_eq!(details.as_ref(), Some(&expected));
                    }
                    other => panic!("expected details entry, got {other:?}"),
                }
            })
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn card_free_details_go_straight_to_confirm() {
        let clock = Arc::new(test_clock());
        let state = in_details(CardRequirement::None, &clock);
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::SubmitDetails(details()))
            .then_state(|state| {
                assert!(state.confirm_in_flight);
                assert!(matches!(state.session, SessionPhase::DetailsEntry { .. }));
            })
            .then_effects(assert_has_future_effect)
            .run();
    }

    #[test]
    fn card_holds_move_to_payment_pending() {
        let clock = Arc::new(test_clock());
        let state = in_details(CardRequirement::Deposit, &clock);
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::SubmitDetails(details()))
            .then_state(|state| {
                assert!(matches!(
                    state.session,
                    SessionPhase::PaymentPending {
                        credentials: None,
                        settled: None,
                        ..
                    }
                ));
            })
            .then_effects(assert_has_future_effect)
            .run();
    }

    #[test]
    fn settled_payment_arms_the_safety_timeout() {
        let clock = Arc::new(test_clock());
        let mut state = in_details(CardRequirement::Deposit, &clock);
        state.session = SessionPhase::PaymentPending {
            hold: hold(CardRequirement::Deposit),
            details: details(),
            credentials: Some(PaymentCredentials {
                publishable_key: "pk_test".to_owned(),
                client_secret: "cs_test".to_owned(),
            }),
            settled: None,
        };
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::PaymentResolved(Ok(PaymentReceipt {
                reference: "pay_1".to_owned(),
                intent: crate::providers::IntentKind::OneTimeCharge,
            })))
            .then_state(|state| {
                assert!(state.confirm_in_flight);
                assert!(matches!(
                    state.session,
                    SessionPhase::PaymentPending {
                        settled: Some(_),
                        ..
                    }
                ));
            })
            .then_effects(|effects| {
                assert_has_cancellable(effects, CONFIRM_SAFETY);
                assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn confirm_success_cancels_both_timers() {
        let clock = Arc::new(test_clock());
        let mut state = in_details(CardRequirement::None, &clock);
        state.confirm_in_flight = true;
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::ConfirmResolved(Ok(BookingConfirmation {
                reference: "BK-42".to_owned(),
            })))
            .then_state(|state| {
                assert!(matches!(
                    state.session,
                    SessionPhase::Confirmed { ref reference } if reference == "BK-42"
                ));
                assert!(state.hold_deadline.is_none());
                assert!(!state.confirm_in_flight);
            })
            .then_effects(|effects| {
                assert_has_cancel(effects, HOLD_COUNTDOWN);
                assert_has_cancel(effects, CONFIRM_SAFETY);
            })
            .run();
    }

    #[test]
    fn confirm_failure_after_settlement_waits_for_the_safety_net() {
        let clock = Arc::new(test_clock());
        let mut state = in_details(CardRequirement::Deposit, &clock);
        state.confirm_in_flight = true;
        state.session = SessionPhase::PaymentPending {
            hold: hold(CardRequirement::Deposit),
            details: details(),
            credentials: None,
            settled: Some(PaymentReceipt {
                reference: "pay_1".to_owned(),
                intent: crate::providers::IntentKind::OneTimeCharge,
            }),
        };
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::ConfirmResolved(Err(ApiError::Transport(
                "ack lost".to_owned(),
            ))))
            .then_state(|state| {
                // Still pending: the safety timeout will force completion.
                assert!(matches!(
                    state.session,
                    SessionPhase::PaymentPending {
                        settled: Some(_),
                        ..
                    }
                ));
            })
            .run();
    }

    #[test]
    fn safety_timeout_forces_confirmation() {
        let clock = Arc::new(test_clock());
        let mut state = in_details(CardRequirement::Deposit, &clock);
        state.confirm_in_flight = true;
        state.session = SessionPhase::PaymentPending {
            hold: hold(CardRequirement::Deposit),
            details: details(),
            credentials: None,
            settled: Some(PaymentReceipt {
                reference: "pay_1".to_owned(),
                intent: crate::providers::IntentKind::OneTimeCharge,
            }),
        };
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::ConfirmTimedOut)
            .then_state(|state| {
                assert!(matches!(
                    state.session,
                    SessionPhase::Confirmed { ref reference } if reference == "pay_1"
                ));
            })
            .then_effects(|effects| assert_has_cancel(effects, HOLD_COUNTDOWN))
            .run();
    }

    fn mid_charge(clock: &FixedClock) -> BookingState {
        let mut state = in_details(CardRequirement::Deposit, clock);
        state.session = SessionPhase::PaymentPending {
            hold: hold(CardRequirement::Deposit),
            details: details(),
            credentials: Some(PaymentCredentials {
                publishable_key: "pk_test".to_owned(),
                client_secret: "cs_test".to_owned(),
            }),
            settled: None,
        };
        state.payment_in_flight = true;
        state
    }

    #[test]
    fn settled_charge_beats_a_racing_countdown() {
        let clock = Arc::new(test_clock());
        let state = mid_charge(&clock);
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::CountdownExpired)
            .when_action(BookingAction::PaymentResolved(Ok(PaymentReceipt {
                reference: "pay_7".to_owned(),
                intent: crate::providers::IntentKind::OneTimeCharge,
            })))
            .then_state(|state| {
                assert!(matches!(
                    state.session,
                    SessionPhase::PaymentPending {
                        settled: Some(_),
                        ..
                    }
                ));
                assert!(state.confirm_in_flight);
                assert!(!state.payment_in_flight);
            })
            .then_effects(|effects| {
                assert_has_cancellable(effects, CONFIRM_SAFETY);
                assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn failed_charge_after_the_countdown_expires_the_session() {
        let clock = Arc::new(test_clock());
        let state = mid_charge(&clock);
        clock.advance(Duration::seconds(200));
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::CountdownExpired)
            .when_action(BookingAction::PaymentResolved(Err(
                crate::providers::PaymentError::Declined("insufficient funds".to_owned()),
            )))
            .then_state(|state| {
                assert!(matches!(state.session, SessionPhase::Expired));
                assert_eq!(state.error, Some(BookingError::Expired));
                assert!(!state.payment_in_flight);
            })
            .then_effects(|effects| {
                assert_has_cancel(effects, HOLD_COUNTDOWN);
                assert_has_cancel(effects, CONFIRM_SAFETY);
            })
            .run();
    }

    #[test]
    fn second_payment_submission_while_settling_is_a_noop() {
        let clock = Arc::new(test_clock());
        let state = mid_charge(&clock);
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::SubmitPayment(
                crate::providers::PaymentMethodToken("tok_visa".to_owned()),
            ))
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn stale_hold_grant_after_restart_is_dropped() {
        let clock = Arc::new(test_clock());
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(ready_state())
            .when_action(BookingAction::Proceed)
            .when_action(BookingAction::Restart)
            .when_action(BookingAction::HoldResolved(Ok(hold(CardRequirement::None))))
            .then_state(|state| {
                assert!(matches!(state.session, SessionPhase::Browsing));
                assert!(state.hold_deadline.is_none());
                assert!(!state.hold_in_flight);
            })
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn countdown_expiry_in_details_is_terminal() {
        let clock = Arc::new(test_clock());
        let state = in_details(CardRequirement::None, &clock);
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock))
            .given_state(state)
            .when_action(BookingAction::CountdownExpired)
            .then_state(|state| {
                assert!(matches!(state.session, SessionPhase::Expired));
                assert_eq!(state.error, Some(BookingError::Expired));
            })
            .run();
    }

    #[test]
    fn continue_actions_after_confirmation_are_noops() {
        let clock = Arc::new(test_clock());
        let mut state = in_details(CardRequirement::None, &clock);
        state.session = SessionPhase::Confirmed {
            reference: "BK-9".to_owned(),
        };
        state.hold_deadline = None;
        let env = env_with_clock(clock);
        let api = env.api.clone();
        ReducerTest::new(reducer())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::SubmitDetails(details()))
            .when_action(BookingAction::ConfirmTimedOut)
            .then_state(|state| {
                assert!(matches!(
                    state.session,
                    SessionPhase::Confirmed { ref reference } if reference == "BK-9"
                ));
            })
            .then_effects(assert_no_effects)
            .run();
        assert_eq!(api.confirm_calls(), 0);
    }

    #[test]
    fn confirm_failure_before_payment_is_resumable() {
        let clock = Arc::new(test_clock());
        let mut state = in_details(CardRequirement::None, &clock);
        state.session = SessionPhase::DetailsEntry {
            hold: hold(CardRequirement::None),
            details: Some(details()),
        };
        state.confirm_in_flight = true;
        ReducerTest::new(reducer())
            .with_env(env_with_clock(clock.clone()))
            .given_state(state)
            .when_action(BookingAction::ConfirmResolved(Err(ApiError::Service {
                status: Some(500),
                message: "try later".to_owned(),
            })))
            .when_action(BookingAction::Retry)
            .then_state(|state| {
                match &state.session {
                    SessionPhase::DetailsEntry { details: d, .. } => {
                        assert!(d.is_some(), "details survive the failure");
                    }
                    other => panic!("expected details entry, got {other:?}"),
                }
                assert!(state.error.is_none());
            })
            .run();
    }
}
