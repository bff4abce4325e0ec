pub mod action_plans;
pub mod admin;
pub mod assessments;
pub mod companies;
pub mod entitlements;
pub mod health;
pub mod session;

use std::collections::HashMap;

use uuid::Uuid;

use crate::errors::AppError;

/// Parse a UUID path parameter with the same 400 shape as the company scope.
pub(crate) fn path_uuid(params: &HashMap<String, String>, key: &str) -> Result<Uuid, AppError> {
    let raw = params
        .get(key)
        .ok_or_else(|| AppError::bad_request(format!("{key} is required")))?;
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request(format!("{key} must be a valid UUID")))
}
