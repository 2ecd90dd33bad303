//! Input validation for client profile fields.

use std::fmt;

use crate::models::NewClient;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty value where one is required.
    Empty(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Numeric value outside its allowed range.
    OutOfRange { field: String, min: i64, max: i64, actual: i64 },
    /// Invalid birth year-month format.
    InvalidBirthYearMonth(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(f, "{} must be between {} and {} (got {})", field, min, max, actual),
            ValidationError::InvalidBirthYearMonth(msg) => {
                write!(f, "Invalid birth year-month: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for client names.
pub const MAX_NAME_LENGTH: usize = 64;

/// Highest education ordinal (doctorate).
pub const MAX_EDUCATION: i32 = 5;

/// Upper bound for a recorded age.
pub const MAX_AGE: i32 = 120;

/// Upper bound for a recorded height in centimetres.
pub const MAX_HEIGHT: i32 = 250;

/// Validate a client's display name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Empty("name".to_string()));
    }

    let len = name.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LENGTH,
            actual: len,
        });
    }

    Ok(())
}

/// Validate a birth year-month in `YYYY-MM` form.
pub fn validate_birth_year_month(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();

    let (year, month) = value.split_once('-').ok_or_else(|| {
        ValidationError::InvalidBirthYearMonth("expected YYYY-MM".to_string())
    })?;

    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidBirthYearMonth(
            "year must be four digits".to_string(),
        ));
    }

    let month: u32 = month.parse().map_err(|_| {
        ValidationError::InvalidBirthYearMonth("month must be a number".to_string())
    })?;
    if !(1..=12).contains(&month) {
        return Err(ValidationError::InvalidBirthYearMonth(format!(
            "month {} out of range",
            month
        )));
    }

    Ok(())
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
            actual: value,
        });
    }
    Ok(())
}

/// Validate every field of a profile before it is written.
///
/// Zero is accepted for age, height, education and income and means "unknown".
pub fn validate_client(client: &NewClient) -> Result<(), ValidationError> {
    validate_name(&client.name)?;
    check_range("age", client.age.into(), 0, MAX_AGE.into())?;
    check_range("height", client.height.into(), 0, MAX_HEIGHT.into())?;
    check_range("education", client.education.into(), 0, MAX_EDUCATION.into())?;
    check_range("monthly income", client.monthly_income, 0, i64::MAX)?;

    if let Some(ym) = client.birth_year_month.as_deref() {
        validate_birth_year_month(ym)?;
    }

    Ok(())
}
