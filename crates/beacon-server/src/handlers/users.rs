//! Signup, signin, and the current-user CRUD handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use beacon_auth::password;
use beacon_core::Role;
use beacon_store::{NewUser, StoreError, UserPatch, UserRow};

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::server::AppState;

const MIN_PASSWORD_LEN: usize = 8;

/// Public view of a user row; the stored hash never appears here.
#[derive(Debug, Serialize)]
pub struct UserBody {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<UserRow> for UserBody {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            role: row.role,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserBody,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SignupRequest {
    fn validate(&self) -> Result<Role, ApiError> {
        let mut errors: Vec<(&'static str, &'static str)> = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(("name", "must be provided"));
        }
        if self.email.is_empty() {
            errors.push(("email", "must be provided"));
        } else if !is_valid_email(&self.email) {
            errors.push(("email", "must be a valid email address"));
        }
        if self.password.is_empty() {
            errors.push(("password", "must be provided"));
        } else if self.password.len() < MIN_PASSWORD_LEN {
            errors.push(("password", "must be at least 8 characters"));
        }

        let role = match self.role.as_deref() {
            None => {
                errors.push(("role", "must be one of admin, collaborator, or user"));
                None
            }
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    errors.push(("role", "must be one of admin, collaborator, or user"));
                    None
                }
            },
        };

        match (errors.is_empty(), role) {
            (true, Some(role)) => Ok(role),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// POST /v1/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = payload.validate()?;
    let password_hash = password::hash_password(&payload.password)?;

    let row = state.users.insert(&NewUser {
        email: payload.email,
        password_hash,
        name: payload.name,
        role,
        image_url: payload.image_url,
    })?;

    let token = state.keys.issue(row.id, row.role)?;
    info!(user_id = row.id, "user created");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: row.into(),
            token,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SigninRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors: Vec<(&'static str, &'static str)> = Vec::new();
        if self.email.is_empty() {
            errors.push(("email", "must be provided"));
        } else if !is_valid_email(&self.email) {
            errors.push(("email", "must be a valid email address"));
        }
        if self.password.is_empty() {
            errors.push(("password", "must be provided"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// POST /v1/auth/signin
///
/// Unknown email and wrong password collapse into the same 401 so the
/// endpoint cannot be used to probe which emails exist.
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.validate()?;

    let row = state.users.get_by_email(&payload.email).map_err(|e| match e {
        StoreError::NotFound(_) => ApiError::Unauthorized("invalid credentials".into()),
        other => other.into(),
    })?;

    password::verify_password(&payload.password, &row.password_hash)?;

    let token = state.keys.issue(row.id, row.role)?;
    Ok(Json(AuthResponse {
        user: row.into(),
        token,
    }))
}

/// GET /v1/user
pub async fn current_user(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<Json<UserBody>, ApiError> {
    let row = state.users.get(principal.user_id)?;
    Ok(Json(row.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub image_url: Option<String>,
}

impl UpdateUserRequest {
    fn validate(&self) -> Result<Option<Role>, ApiError> {
        let mut errors: Vec<(&'static str, &'static str)> = Vec::new();

        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                errors.push(("email", "must be a valid email address"));
            }
        }
        if let Some(password) = &self.password {
            if password.len() < MIN_PASSWORD_LEN {
                errors.push(("password", "must be at least 8 characters"));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                errors.push(("name", "must not be blank"));
            }
        }

        let role = match self.role.as_deref() {
            None => None,
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    errors.push(("role", "must be one of admin, collaborator, or user"));
                    None
                }
            },
        };

        if errors.is_empty() {
            Ok(role)
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// PUT/PATCH /v1/user
pub async fn update_user(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserBody>, ApiError> {
    let role = payload.validate()?;

    let password_hash = match &payload.password {
        Some(password) => Some(password::hash_password(password)?),
        None => None,
    };

    let patch = UserPatch {
        email: payload.email,
        password_hash,
        name: payload.name,
        role,
        image_url: payload.image_url,
    };

    let row = state.users.update(principal.user_id, &patch)?;
    Ok(Json(row.into()))
}

/// DELETE /v1/user
pub async fn delete_user(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<StatusCode, ApiError> {
    state.users.delete(principal.user_id)?;
    info!(user_id = principal.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn is_valid_email(s: &str) -> bool {
    if s.len() > 254 {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
