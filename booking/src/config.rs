//! Widget configuration.

use chrono::Duration;

use crate::error::BookingError;

/// Configuration for one embedded booking widget.
///
/// Built once at startup via [`BookingConfig::builder`]; the establishment
/// id is the only hard requirement.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Establishment identifier sent on every remote call.
    pub establishment: String,
    /// Base URL of the remote booking service.
    pub base_url: String,
    /// How long a hold stays valid client-side.
    pub hold_countdown: Duration,
    /// Quiet window between a date/party-size edit and the availability
    /// fetch it triggers.
    pub availability_debounce: Duration,
    /// How long to wait for a confirm acknowledgment after a successful
    /// charge before forcing completion.
    pub confirm_safety_timeout: Duration,
}

impl BookingConfig {
    /// Start building a configuration for the given establishment.
    #[must_use]
    pub fn builder(establishment: impl Into<String>) -> BookingConfigBuilder {
        BookingConfigBuilder {
            establishment: establishment.into(),
            base_url: "https://api.tablewise.example/v1".to_owned(),
            hold_countdown: Duration::seconds(180),
            availability_debounce: Duration::milliseconds(1200),
            confirm_safety_timeout: Duration::seconds(12),
        }
    }
}

/// Builder for [`BookingConfig`].
#[derive(Debug, Clone)]
pub struct BookingConfigBuilder {
    establishment: String,
    base_url: String,
    hold_countdown: Duration,
    availability_debounce: Duration,
    confirm_safety_timeout: Duration,
}

impl BookingConfigBuilder {
    /// Override the remote service base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the hold countdown.
    #[must_use]
    pub const fn hold_countdown(mut self, countdown: Duration) -> Self {
        self.hold_countdown = countdown;
        self
    }

    /// Override the availability debounce window.
    #[must_use]
    pub const fn availability_debounce(mut self, debounce: Duration) -> Self {
        self.availability_debounce = debounce;
        self
    }

    /// Override the confirm safety timeout.
    #[must_use]
    pub const fn confirm_safety_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_safety_timeout = timeout;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Configuration`] when the establishment id is
    /// blank.
    pub fn build(self) -> Result<BookingConfig, BookingError> {
        if self.establishment.trim().is_empty() {
            return Err(BookingError::Configuration(
                "establishment id must not be empty".to_owned(),
            ));
        }
        Ok(BookingConfig {
            establishment: self.establishment,
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            hold_countdown: self.hold_countdown,
            availability_debounce: self.availability_debounce,
            confirm_safety_timeout: self.confirm_safety_timeout,
        })
    }
}
