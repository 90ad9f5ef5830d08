//! Caller identity.
//!
//! Bearer tokens are opaque keys into a [`Directory`] built from
//! configuration. Handlers ask for a [`CurrentUser`] or a [`CurrentCustomer`]
//! argument; both extractors run before the request body is touched, so a
//! rejected caller never reaches handler logic.

use crate::api::models::{AppError, AppState};
use crate::config::{ProviderEntry, UserEntry};
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl User {
    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }
}

#[derive(Debug, Clone)]
pub struct Provider {
    pub id: String,
    pub name: String,
}

/// Known users and providers
#[derive(Debug, Default)]
pub struct Directory {
    users_by_token: HashMap<String, User>,
    users_by_id: HashMap<String, User>,
    providers: HashMap<String, Provider>,
}

impl Directory {
    pub fn new(users: &[UserEntry], providers: &[ProviderEntry]) -> Self {
        let mut directory = Self::default();

        for entry in users {
            let user = User {
                id: entry.id.clone(),
                name: entry.name.clone(),
                avatar_url: entry.avatar_url.clone(),
                role: entry.role,
            };
            if directory.users_by_token.insert(entry.token.clone(), user.clone()).is_some() {
                warn!(user_id = %entry.id, "Duplicate token in user directory, last entry wins");
            }
            directory.users_by_id.insert(user.id.clone(), user);
        }

        for entry in providers {
            directory.providers.insert(
                entry.id.clone(),
                Provider {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                },
            );
        }

        directory
    }

    pub fn authenticate(&self, token: &str) -> Option<&User> {
        self.users_by_token.get(token)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users_by_id.get(id)
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    pub fn user_count(&self) -> usize {
        self.users_by_id.len()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

/// Any authenticated user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// An authenticated user holding the customer role
#[derive(Debug, Clone)]
pub struct CurrentCustomer(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(
                "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
            )
        })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)?;
        let user = state
            .directory
            .authenticate(token)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

        debug!(user_id = %user.id, "Authenticated request");
        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<AppState> for CurrentCustomer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_customer() {
            warn!(user_id = %user.id, role = ?user.role, "Customer-only route refused");
            return Err(AppError::Forbidden("Customer access required".to_string()));
        }

        Ok(CurrentCustomer(user))
    }
}
