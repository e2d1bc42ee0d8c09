/// Request bodies shared by several resources
///
/// Each body validates its own fields; nested bodies are validated through
/// `check`, which walks into them.

use crate::error::ApiResult;
use chrono::NaiveDate;
use martialbase_shared::{
    models::{address::AddressInput, person::PersonDetails},
    services::people::NewPerson,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

fn default_country_code() -> String {
    "GB".to_string()
}

/// Postal address
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressRequest {
    /// Only used in venue lists, to update a stored venue in place
    #[serde(default)]
    pub id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "Line 1 must be 1-255 characters"))]
    pub line1: String,

    #[validate(length(max = 255, message = "Line 2 must be at most 255 characters"))]
    pub line2: Option<String>,

    #[validate(length(max = 255, message = "Line 3 must be at most 255 characters"))]
    pub line3: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Town must be 1-100 characters"))]
    pub town: String,

    #[validate(length(max = 100, message = "County must be at most 100 characters"))]
    pub county: Option<String>,

    #[validate(length(min = 1, max = 16, message = "Postcode must be 1-16 characters"))]
    pub postcode: String,

    #[serde(default = "default_country_code")]
    #[validate(length(equal = 2, message = "Country code must be 2 characters"))]
    pub country_code: String,
}

impl From<AddressRequest> for AddressInput {
    fn from(req: AddressRequest) -> Self {
        AddressInput {
            id: req.id,
            line1: req.line1,
            line2: req.line2,
            line3: req.line3,
            town: req.town,
            county: req.county,
            postcode: req.postcode,
            country_code: req.country_code.to_ascii_uppercase(),
        }
    }
}

/// Person details with an optional home address
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Middle name must be at most 100 characters"))]
    pub middle_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,

    pub date_of_birth: Option<NaiveDate>,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: Option<String>,

    #[validate(length(max = 32, message = "Mobile number must be at most 32 characters"))]
    pub mobile_no: Option<String>,

    pub address: Option<AddressRequest>,
}

impl PersonRequest {
    pub fn check(&self) -> ApiResult<()> {
        self.validate()?;
        check_optional(self.address.as_ref())
    }

    pub fn into_parts(self) -> (PersonDetails, Option<AddressInput>) {
        (
            PersonDetails {
                first_name: self.first_name,
                middle_name: self.middle_name,
                last_name: self.last_name,
                date_of_birth: self.date_of_birth,
                email: self.email,
                mobile_no: self.mobile_no,
            },
            self.address.map(AddressInput::from),
        )
    }

    pub fn into_new_person(self) -> NewPerson {
        let (details, address) = self.into_parts();
        NewPerson { details, address }
    }
}

pub fn check_optional<T: Validate>(body: Option<&T>) -> ApiResult<()> {
    if let Some(body) = body {
        body.validate()?;
    }
    Ok(())
}

pub fn check_all<T: Validate>(bodies: &[T]) -> ApiResult<()> {
    for body in bodies {
        body.validate()?;
    }
    Ok(())
}
