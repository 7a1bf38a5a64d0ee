//! Mock providers for tests and demo harnesses.
//!
//! Responses are scripted per call with queues; an unscripted call fails
//! loudly rather than inventing data. Call counts and captured requests
//! let tests assert on single-flight and wire-encoding behavior.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::availability::{DayAvailability, MonthAvailability};
use crate::money::Money;
use crate::providers::{
    ApiError, BookingApi, BookingConfirmation, ConfirmRequest, Hold, HoldRequest, IntentKind,
    PaymentCredentials, PaymentError, PaymentMethodToken, PaymentProcessor, PaymentReceipt,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn unscripted(what: &str) -> ApiError {
    ApiError::Transport(format!("no scripted {what} response"))
}

#[derive(Default)]
struct ApiInner {
    day: Mutex<VecDeque<Result<DayAvailability, ApiError>>>,
    month: Mutex<VecDeque<Result<MonthAvailability, ApiError>>>,
    hold: Mutex<VecDeque<Result<Hold, ApiError>>>,
    confirm: Mutex<VecDeque<Result<BookingConfirmation, ApiError>>>,
    day_calls: AtomicUsize,
    month_calls: AtomicUsize,
    hold_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
    hang_confirm: AtomicBool,
    last_hold_request: Mutex<Option<HoldRequest>>,
    last_confirm_request: Mutex<Option<ConfirmRequest>>,
}

/// Scripted [`BookingApi`] mock.
#[derive(Clone, Default)]
pub struct MockBookingApi {
    inner: Arc<ApiInner>,
}

impl MockBookingApi {
    /// Empty mock; every call fails until scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a day-availability response.
    pub fn push_day(&self, result: Result<DayAvailability, ApiError>) {
        lock(&self.inner.day).push_back(result);
    }

    /// Queue a month-availability response.
    pub fn push_month(&self, result: Result<MonthAvailability, ApiError>) {
        lock(&self.inner.month).push_back(result);
    }

    /// Queue a hold response.
    pub fn push_hold(&self, result: Result<Hold, ApiError>) {
        lock(&self.inner.hold).push_back(result);
    }

    /// Queue a confirm response.
    pub fn push_confirm(&self, result: Result<BookingConfirmation, ApiError>) {
        lock(&self.inner.confirm).push_back(result);
    }

    /// Make confirm calls hang forever (acknowledgment lost).
    pub fn hang_confirm(&self, hang: bool) {
        self.inner.hang_confirm.store(hang, Ordering::SeqCst);
    }

    /// Number of day fetches issued.
    #[must_use]
    pub fn day_calls(&self) -> usize {
        self.inner.day_calls.load(Ordering::SeqCst)
    }

    /// Number of month fetches issued.
    #[must_use]
    pub fn month_calls(&self) -> usize {
        self.inner.month_calls.load(Ordering::SeqCst)
    }

    /// Number of hold requests issued.
    #[must_use]
    pub fn hold_calls(&self) -> usize {
        self.inner.hold_calls.load(Ordering::SeqCst)
    }

    /// Number of confirm requests issued.
    #[must_use]
    pub fn confirm_calls(&self) -> usize {
        self.inner.confirm_calls.load(Ordering::SeqCst)
    }

    /// The most recent hold request, when any.
    #[must_use]
    pub fn last_hold_request(&self) -> Option<HoldRequest> {
        lock(&self.inner.last_hold_request).clone()
    }

    /// The most recent confirm request, when any.
    #[must_use]
    pub fn last_confirm_request(&self) -> Option<ConfirmRequest> {
        lock(&self.inner.last_confirm_request).clone()
    }
}

impl BookingApi for MockBookingApi {
    async fn fetch_day(&self, _covers: u32, _date: NaiveDate) -> Result<DayAvailability, ApiError> {
        self.inner.day_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.day)
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("day-availability")))
    }

    async fn fetch_month(
        &self,
        _covers: u32,
        _month_start: NaiveDate,
    ) -> Result<MonthAvailability, ApiError> {
        self.inner.month_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.month)
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("month-availability")))
    }

    async fn create_hold(&self, request: HoldRequest) -> Result<Hold, ApiError> {
        self.inner.hold_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.last_hold_request) = Some(request);
        lock(&self.inner.hold)
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("hold")))
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<BookingConfirmation, ApiError> {
        self.inner.confirm_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.last_confirm_request) = Some(request);
        if self.inner.hang_confirm.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        lock(&self.inner.confirm)
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("confirm")))
    }
}

#[derive(Default)]
struct PaymentsInner {
    credentials: Mutex<VecDeque<Result<PaymentCredentials, PaymentError>>>,
    settlements: Mutex<VecDeque<Result<PaymentReceipt, PaymentError>>>,
    credential_calls: AtomicUsize,
    settle_calls: AtomicUsize,
    last_amount: Mutex<Option<Money>>,
    last_intent: Mutex<Option<IntentKind>>,
}

/// Scripted [`PaymentProcessor`] mock.
#[derive(Clone, Default)]
pub struct MockPaymentProcessor {
    inner: Arc<PaymentsInner>,
}

impl MockPaymentProcessor {
    /// Empty mock; every call fails until scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a credential-exchange response.
    pub fn push_credentials(&self, result: Result<PaymentCredentials, PaymentError>) {
        lock(&self.inner.credentials).push_back(result);
    }

    /// Queue a settle response.
    pub fn push_settlement(&self, result: Result<PaymentReceipt, PaymentError>) {
        lock(&self.inner.settlements).push_back(result);
    }

    /// Number of credential exchanges issued.
    #[must_use]
    pub fn credential_calls(&self) -> usize {
        self.inner.credential_calls.load(Ordering::SeqCst)
    }

    /// Number of settle calls issued.
    #[must_use]
    pub fn settle_calls(&self) -> usize {
        self.inner.settle_calls.load(Ordering::SeqCst)
    }

    /// The amount quoted on the most recent credential exchange.
    #[must_use]
    pub fn last_amount(&self) -> Option<Money> {
        *lock(&self.inner.last_amount)
    }

    /// The intent quoted on the most recent credential exchange.
    #[must_use]
    pub fn last_intent(&self) -> Option<IntentKind> {
        *lock(&self.inner.last_intent)
    }
}

impl PaymentProcessor for MockPaymentProcessor {
    async fn credentials(
        &self,
        _hold_id: &str,
        _created_at: DateTime<Utc>,
        amount: Money,
        intent: IntentKind,
    ) -> Result<PaymentCredentials, PaymentError> {
        self.inner.credential_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.last_amount) = Some(amount);
        *lock(&self.inner.last_intent) = Some(intent);
        lock(&self.inner.credentials)
            .pop_front()
            .unwrap_or_else(|| Err(PaymentError::Processor("no scripted credentials".to_owned())))
    }

    async fn settle(
        &self,
        _credentials: &PaymentCredentials,
        _method: PaymentMethodToken,
        intent: IntentKind,
    ) -> Result<PaymentReceipt, PaymentError> {
        self.inner.settle_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.last_intent) = Some(intent);
        lock(&self.inner.settlements)
            .pop_front()
            .unwrap_or_else(|| Err(PaymentError::Processor("no scripted settlement".to_owned())))
    }
}
