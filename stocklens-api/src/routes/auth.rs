/// Authentication endpoints
///
/// Registration, email confirmation, login, and token refresh. Accounts
/// start unconfirmed and cannot sign in until confirmed: registration
/// issues a signed confirmation token which the client presents back to
/// `POST /v1/auth/confirm`. The token is returned in the registration
/// response; a mail delivery service would carry it to the user instead,
/// but mail transport is outside this service. The ledger row is created
/// lazily on first balance access, so registration touches only the users
/// table.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult, ValidationErrorDetail};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use stocklens_shared::auth::jwt::{
    create_token, refresh_access_token, validate_confirm_token, Claims, TokenType,
};
use stocklens_shared::auth::password::{
    hash_password, validate_password_strength, verify_password,
};
use stocklens_shared::models::user::{CreateUser, User};
use uuid::Uuid;
use validator::Validate;

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (at least 8 characters with a letter and a digit)
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Email confirmation request
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub confirmation_token: String,
}

/// Token refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Registered user summary
///
/// Carries the confirmation token the account needs before it can sign
/// in. With a mail sender in front, this field would be delivered
/// out-of-band instead of returned here.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub email_confirmed: bool,
    pub confirmation_token: String,
}

/// Confirmation result
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub email: String,
    pub email_confirmed: bool,
}

/// Token pair issued on login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// New access token issued on refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

fn validation_errors(errors: validator::ValidationErrors) -> ApiError {
    let details = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ValidationErrorDetail {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(details)
}

/// POST /v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    request.validate().map_err(validation_errors)?;

    validate_password_strength(&request.password).map_err(|msg| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message: msg,
        }])
    })?;

    let password_hash = hash_password(&request.password)?;
    let user = User::create(
        &state.db,
        CreateUser {
            email: request.email,
            password_hash,
        },
    )
    .await?;

    let confirmation_token = create_token(
        &Claims::new(user.id, &user.email, TokenType::Confirm),
        state.jwt_secret(),
    )?;

    tracing::info!(user_id = %user.id, "User registered, awaiting confirmation");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
            email_confirmed: user.email_confirmed,
            confirmation_token,
        }),
    ))
}

/// POST /v1/auth/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    let claims = validate_confirm_token(&request.confirmation_token, state.jwt_secret())?;

    let updated = User::mark_email_confirmed(&state.db, claims.sub).await?;
    if !updated {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }

    tracing::info!(user_id = %claims.sub, "Email confirmed");

    Ok(Json(ConfirmResponse {
        email: claims.email,
        email_confirmed: true,
    }))
}

/// POST /v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    request.validate().map_err(validation_errors)?;

    let user = User::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(&request.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.email_confirmed {
        return Err(ApiError::Unauthorized("Email not confirmed".to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    let access = create_token(
        &Claims::new(user.id, &user.email, TokenType::Access),
        state.jwt_secret(),
    )?;
    let refresh = create_token(
        &Claims::new(user.id, &user.email, TokenType::Refresh),
        state.jwt_secret(),
    )?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token: access,
        refresh_token: refresh,
        token_type: "Bearer".to_string(),
    }))
}

/// POST /v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = refresh_access_token(&request.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
    }))
}
