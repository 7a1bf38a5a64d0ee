//! Customer contact details and their synchronous validation.

use serde::{Deserialize, Serialize};

/// Contact details collected before confirming a booking.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    /// Given name. Required.
    pub first_name: String,
    /// Family name. Required.
    pub last_name: String,
    /// Email address. Required, shape-checked.
    pub email: String,
    /// Phone number. Required, free-form.
    pub phone: String,
    /// Free-text note passed through to the restaurant.
    pub notes: Option<String>,
}

/// A failed details validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DetailsError {
    /// A required field is empty.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// The email does not look like an address.
    #[error("email address is not valid")]
    InvalidEmail,
}

impl CustomerDetails {
    /// Validate required fields and the email shape.
    ///
    /// # Errors
    ///
    /// Returns the first failing field, in display order.
    pub fn validate(&self) -> Result<(), DetailsError> {
        for (value, label) in [
            (&self.first_name, "first name"),
            (&self.last_name, "last name"),
            (&self.email, "email"),
            (&self.phone, "phone"),
        ] {
            if value.trim().is_empty() {
                return Err(DetailsError::MissingField(label));
            }
        }
        if !email_shape_ok(&self.email) {
            return Err(DetailsError::InvalidEmail);
        }
        Ok(())
    }
}

// Shape check only; deliverability is the remote service's problem.
fn email_shape_ok(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
