//! End-to-end booking flows through the store: availability, hold, details,
//! payment, and the timers that guard them.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate};
use tablewise_booking::availability::DayAvailability;
use tablewise_booking::catalog::{
    Addon, AddonKind, ParentLink, PerBasis, Shift, ShiftKind, TimeSlot, UsagePolicy,
};
use tablewise_booking::customer::CustomerDetails;
use tablewise_booking::mocks::{MockBookingApi, MockPaymentProcessor};
use tablewise_booking::providers::{
    ApiError, BookingConfirmation, CardRequirement, Hold, IntentKind, PaymentCredentials,
    PaymentError, PaymentMethodToken, PaymentReceipt,
};
use tablewise_booking::selection::SelectionMutation;
use tablewise_booking::{
    BookingAction, BookingConfig, BookingEnvironment, BookingError, BookingReducer, BookingState,
    Money, SessionPhase,
};
use tablewise_core::environment::Clock;
use tablewise_runtime::Store;
use tablewise_testing::mocks::{test_clock, FixedClock};

type BookingStore = Store<
    BookingState,
    BookingAction,
    BookingEnvironment<MockBookingApi, MockPaymentProcessor>,
    BookingReducer<MockBookingApi, MockPaymentProcessor>,
>;

struct Harness {
    store: BookingStore,
    api: MockBookingApi,
    payments: MockPaymentProcessor,
    clock: Arc<FixedClock>,
}

/// Short debounce and safety timeout so flows complete quickly; a long
/// countdown so it never fires on its own. Expiry is exercised by advancing
/// the fixed clock instead.
fn test_config() -> BookingConfig {
    BookingConfig::builder("est-1")
        .hold_countdown(Duration::seconds(60))
        .availability_debounce(Duration::milliseconds(30))
        .confirm_safety_timeout(Duration::milliseconds(80))
        .build()
        .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness() -> Harness {
    init_tracing();
    let api = MockBookingApi::new();
    let payments = MockPaymentProcessor::new();
    let clock = Arc::new(test_clock());
    let env = BookingEnvironment::new(
        api.clone(),
        payments.clone(),
        clock.clone(),
        test_config(),
    );
    Harness {
        store: Store::new(BookingState::new(3), BookingReducer::new(), env),
        api,
        payments,
        clock,
    }
}

/// Poll the state until the predicate holds. Broadcast observation would
/// race the state write, so flow tests watch the state itself.
async fn wait_until<F>(store: &BookingStore, mut pred: F)
where
    F: FnMut(&BookingState) -> bool,
{
    for _ in 0..300 {
        if store.state(|s| pred(s)).await {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("condition not reached within the polling window");
}

fn booking_date() -> NaiveDate {
    "2025-06-14".parse().unwrap()
}

fn scripted_day() -> DayAvailability {
    DayAvailability {
        shifts: vec![Shift {
            id: "dinner".to_owned(),
            name: "Dinner".to_owned(),
            kind: ShiftKind::Standard,
            usage: UsagePolicy::Single,
            max_menu_types: None,
            charge: false,
            addons: vec![Addon {
                id: "tasting".into(),
                kind: AddonKind::Menu,
                name: "Tasting menu".to_owned(),
                price: Money::from_minor(1000),
                per: PerBasis::Item,
                min_covers: 0,
                max_covers: 0,
                min_quantity: 0,
                max_quantity: 0,
                parent: ParentLink::Unlinked,
            }],
            times: vec![TimeSlot {
                time: 1900,
                usage: None,
                addons: None,
            }],
            message: None,
        }],
        areas: Vec::new(),
        message: None,
    }
}

fn hold(card: CardRequirement, clock: &FixedClock) -> Hold {
    Hold {
        id: "h1".to_owned(),
        created_at: clock.now(),
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

/// Drive the harness to a complete selection: date loaded, slot picked, one
/// menu selected under a single-choice shift.
async fn browse_to_ready(h: &Harness) {
    h.api.push_month(Ok(Default::default()));
    h.api.push_day(Ok(scripted_day()));

    h.store
        .send(BookingAction::SetDate(booking_date()))
        .await
        .unwrap();
    wait_until(&h.store, |s| s.day.is_some()).await;

    h.store
        .send(BookingAction::SelectSlot {
            shift: "dinner".to_owned(),
            time: 1900,
        })
        .await
        .unwrap();
    h.store
        .send(BookingAction::Select(SelectionMutation::PickMenu(
            "tasting".into(),
        )))
        .await
        .unwrap();
}

#[tokio::test]
async fn card_free_booking_confirms() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api.push_hold(Ok(hold(CardRequirement::None, &h.clock)));
    h.api.push_confirm(Ok(BookingConfirmation {
        reference: "BK-1".to_owned(),
    }));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;

    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::Confirmed { ref reference } if reference == "BK-1")
    })
    .await;

    assert_eq!(h.api.hold_calls(), 1);
    assert_eq!(h.api.confirm_calls(), 1);
    let hold_request = h.api.last_hold_request().unwrap();
    assert_eq!(hold_request.covers, 3);
    assert_eq!(hold_request.addons, "tasting");
    let confirm = h.api.last_confirm_request().unwrap();
    assert_eq!(confirm.hold_id, "h1");
    assert!(confirm.payment_reference.is_none());
    assert_eq!(h.payments.credential_calls(), 0);
}

#[tokio::test]
async fn deposit_booking_charges_per_head_before_confirming() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api
        .push_hold(Ok(hold(CardRequirement::Deposit, &h.clock)));
    h.payments.push_credentials(Ok(PaymentCredentials {
        publishable_key: "pk_test".to_owned(),
        client_secret: "cs_test".to_owned(),
    }));
    h.payments.push_settlement(Ok(PaymentReceipt {
        reference: "pay_1".to_owned(),
        intent: IntentKind::OneTimeCharge,
    }));
    h.api.push_confirm(Ok(BookingConfirmation {
        reference: "BK-2".to_owned(),
    }));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;

    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(
            s.session,
            SessionPhase::PaymentPending {
                credentials: Some(_),
                ..
            }
        )
    })
    .await;

    h.store
        .send(BookingAction::SubmitPayment(PaymentMethodToken(
            "tok_visa".to_owned(),
        )))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::Confirmed { .. })
    })
    .await;

    // 2000 per head at a party of three.
    assert_eq!(h.payments.last_amount(), Some(Money::from_minor(6000)));
    assert_eq!(h.payments.last_intent(), Some(IntentKind::OneTimeCharge));
    let confirm = h.api.last_confirm_request().unwrap();
    assert_eq!(confirm.payment_reference.as_deref(), Some("pay_1"));
}

#[tokio::test]
async fn expired_hold_never_reaches_the_network() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api.push_hold(Ok(hold(CardRequirement::None, &h.clock)));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;

    // The countdown timer has not fired, but the deadline has passed.
    h.clock.advance(Duration::seconds(120));
    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| matches!(s.session, SessionPhase::Expired)).await;

    assert_eq!(h.api.confirm_calls(), 0);
    assert_eq!(
        h.store.state(|s| s.error.clone()).await,
        Some(BookingError::Expired)
    );
}

#[tokio::test]
async fn lost_confirm_acknowledgment_is_forced_complete() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api
        .push_hold(Ok(hold(CardRequirement::Deposit, &h.clock)));
    h.payments.push_credentials(Ok(PaymentCredentials {
        publishable_key: "pk_test".to_owned(),
        client_secret: "cs_test".to_owned(),
    }));
    h.payments.push_settlement(Ok(PaymentReceipt {
        reference: "pay_9".to_owned(),
        intent: IntentKind::OneTimeCharge,
    }));
    h.api.hang_confirm(true);

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;
    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(
            s.session,
            SessionPhase::PaymentPending {
                credentials: Some(_),
                ..
            }
        )
    })
    .await;

    h.store
        .send(BookingAction::SubmitPayment(PaymentMethodToken(
            "tok_visa".to_owned(),
        )))
        .await
        .unwrap();

    // The confirm request hangs; the safety timeout completes the booking
    // under the payment reference instead.
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::Confirmed { ref reference } if reference == "pay_9")
    })
    .await;
}

#[tokio::test]
async fn rapid_edits_collapse_into_one_day_fetch() {
    let h = harness();
    h.api.push_month(Ok(Default::default()));
    h.api.push_day(Ok(scripted_day()));

    h.store
        .send(BookingAction::SetDate(booking_date()))
        .await
        .unwrap();
    // Inside the debounce window; supersedes the pending fetch.
    h.store.send(BookingAction::SetCovers(5)).await.unwrap();

    wait_until(&h.store, |s| s.day.is_some()).await;
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(h.api.day_calls(), 1);
    assert_eq!(h.store.state(|s| s.covers).await, 5);
}

#[tokio::test]
async fn rejected_hold_keeps_the_user_browsing() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api.push_hold(Err(ApiError::Service {
        status: Some(409),
        message: "slot just taken".to_owned(),
    }));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.error, Some(BookingError::Hold(_)))
    })
    .await;

    assert!(matches!(
        h.store.state(|s| s.session.clone()).await,
        SessionPhase::Browsing
    ));
    assert_eq!(h.api.hold_calls(), 1);
}

#[tokio::test]
async fn confirm_failure_is_retryable_under_the_same_hold() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api.push_hold(Ok(hold(CardRequirement::None, &h.clock)));
    h.api.push_confirm(Err(ApiError::Service {
        status: Some(500),
        message: "temporarily unavailable".to_owned(),
    }));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;
    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::Failed { hold: Some(_), .. })
    })
    .await;

    h.api.push_confirm(Ok(BookingConfirmation {
        reference: "BK-3".to_owned(),
    }));
    h.store.send(BookingAction::Retry).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { details: Some(_), .. })
    })
    .await;

    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::Confirmed { ref reference } if reference == "BK-3")
    })
    .await;
    assert_eq!(h.api.confirm_calls(), 2);
}

#[tokio::test]
async fn declined_card_leaves_the_hold_alive_for_another_attempt() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api
        .push_hold(Ok(hold(CardRequirement::NoShowProtection, &h.clock)));
    h.payments.push_credentials(Ok(PaymentCredentials {
        publishable_key: "pk_test".to_owned(),
        client_secret: "cs_test".to_owned(),
    }));
    h.payments
        .push_settlement(Err(PaymentError::Declined("insufficient funds".to_owned())));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;
    h.store
        .send(BookingAction::SubmitDetails(details()))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(
            s.session,
            SessionPhase::PaymentPending {
                credentials: Some(_),
                ..
            }
        )
    })
    .await;

    h.store
        .send(BookingAction::SubmitPayment(PaymentMethodToken(
            "tok_declined".to_owned(),
        )))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(s.error, Some(BookingError::Payment(_)))
    })
    .await;
    assert!(matches!(
        h.store.state(|s| s.session.clone()).await,
        SessionPhase::PaymentPending { settled: None, .. }
    ));

    // Second card succeeds; an authorization, not a charge.
    h.payments.push_settlement(Ok(PaymentReceipt {
        reference: "auth_1".to_owned(),
        intent: IntentKind::StoredCardAuthorization,
    }));
    h.api.push_confirm(Ok(BookingConfirmation {
        reference: "BK-4".to_owned(),
    }));
    h.store
        .send(BookingAction::SubmitPayment(PaymentMethodToken(
            "tok_visa".to_owned(),
        )))
        .await
        .unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::Confirmed { .. })
    })
    .await;
    assert_eq!(h.payments.settle_calls(), 2);
    assert_eq!(
        h.payments.last_intent(),
        Some(IntentKind::StoredCardAuthorization)
    );
}

#[tokio::test]
async fn restart_abandons_the_session() {
    let h = harness();
    browse_to_ready(&h).await;
    h.api.push_hold(Ok(hold(CardRequirement::None, &h.clock)));

    h.store.send(BookingAction::Proceed).await.unwrap();
    wait_until(&h.store, |s| {
        matches!(s.session, SessionPhase::DetailsEntry { .. })
    })
    .await;

    h.store.send(BookingAction::Restart).await.unwrap();
    let (session, deadline) = h
        .store
        .state(|s| (s.session.clone(), s.hold_deadline))
        .await;
    assert!(matches!(session, SessionPhase::Browsing));
    assert!(deadline.is_none());
}
