//! Booking environment.
//!
//! All external dependencies the booking reducers reach for, injected as
//! trait implementations so tests can substitute mocks.

use std::sync::Arc;

use tablewise_core::environment::Clock;

use crate::config::BookingConfig;
use crate::providers::{BookingApi, PaymentProcessor};

/// Dependencies for the booking reducers.
///
/// # Type Parameters
///
/// - `B`: remote booking service
/// - `P`: payment processor
pub struct BookingEnvironment<B, P>
where
    B: BookingApi + Clone,
    P: PaymentProcessor + Clone,
{
    /// Remote booking service.
    pub api: B,
    /// Payment processor.
    pub payments: P,
    /// Source of "now" for deadline checks.
    pub clock: Arc<dyn Clock>,
    /// Widget configuration.
    pub config: BookingConfig,
}

impl<B, P> BookingEnvironment<B, P>
where
    B: BookingApi + Clone,
    P: PaymentProcessor + Clone,
{
    /// Assemble an environment.
    pub fn new(api: B, payments: P, clock: Arc<dyn Clock>, config: BookingConfig) -> Self {
        Self {
            api,
            payments,
            clock,
            config,
        }
    }
}

impl<B, P> Clone for BookingEnvironment<B, P>
where
    B: BookingApi + Clone,
    P: PaymentProcessor + Clone,
{
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            payments: self.payments.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}
