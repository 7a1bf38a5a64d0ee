//! HTTP implementation of [`BookingApi`] against the remote service.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::availability::{DayAvailability, MonthAvailability};
use crate::config::BookingConfig;
use crate::wire::{DayAvailabilityDto, HoldDto, MonthAvailabilityDto};

use super::{ApiError, BookingApi, BookingConfirmation, ConfirmRequest, Hold, HoldRequest};

/// [`BookingApi`] over HTTPS with the establishment baked in.
#[derive(Debug, Clone)]
pub struct HttpBookingApi {
    client: reqwest::Client,
    base_url: String,
    establishment: String,
}

impl HttpBookingApi {
    /// Build a client for the configured service.
    #[must_use]
    pub fn new(config: &BookingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            establishment: config.establishment.clone(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "booking service request");
        let response = self
            .client
            .get(&url)
            .query(&[("est", self.establishment.clone())])
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "booking service request");
        let response = self
            .client
            .post(&url)
            .query(&[("est", self.establishment.clone())])
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        return Err(ApiError::Service {
            status: Some(status.as_u16()),
            message,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ApiError::Decode(err.to_string()))
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

impl BookingApi for HttpBookingApi {
    #[instrument(skip(self))]
    async fn fetch_day(&self, covers: u32, date: NaiveDate) -> Result<DayAvailability, ApiError> {
        let dto: DayAvailabilityDto = self
            .get(
                "day-avail",
                &[
                    ("covers", covers.to_string()),
                    ("date", date.to_string()),
                ],
            )
            .await?;
        Ok(dto.into_domain())
    }

    #[instrument(skip(self))]
    async fn fetch_month(
        &self,
        covers: u32,
        month_start: NaiveDate,
    ) -> Result<MonthAvailability, ApiError> {
        let dto: MonthAvailabilityDto = self
            .get(
                "month-avail",
                &[
                    ("covers", covers.to_string()),
                    ("date", month_start.to_string()),
                ],
            )
            .await?;
        Ok(dto.into_domain())
    }

    #[instrument(skip(self, request))]
    async fn create_hold(&self, request: HoldRequest) -> Result<Hold, ApiError> {
        let dto: HoldDto = self.post("hold", &request).await?;
        Ok(dto.into_domain())
    }

    #[instrument(skip(self, request), fields(hold = %request.hold_id))]
    async fn confirm(&self, request: ConfirmRequest) -> Result<BookingConfirmation, ApiError> {
        self.post("update", &request).await
    }
}
