//! Caller identity and capability checks.
//!
//! Identity is taken from the `x-customer-id` and `x-customer-role` headers,
//! set by an upstream gateway that verified the caller. Handlers call the
//! capability functions below before touching the saga or the stores.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::OwnerId;

use crate::error::ApiError;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const CUSTOMER_ROLE_HEADER: &str = "x-customer-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub customer_id: OwnerId,
    pub role: Role,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let customer_id = headers
            .get(CUSTOMER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let role = match headers
            .get(CUSTOMER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            Some(role) if role.trim().eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        };

        Ok(Self {
            customer_id: OwnerId::new(customer_id),
            role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_headers(&parts.headers)
    }
}

pub fn require_admin(caller: &Caller) -> Result<(), ApiError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin capability required".to_string()))
    }
}

/// Allows the owner of a resource, or an admin.
pub fn require_owner_or_admin(caller: &Caller, owner_id: &OwnerId) -> Result<(), ApiError> {
    if caller.is_admin() || &caller.customer_id == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Not allowed to access another customer's data".to_string(),
        ))
    }
}
