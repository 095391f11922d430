use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use bookshare_db::Database;
use bookshare_db::queries::users::NewUser;
use bookshare_types::api::{ApiResponse, AuthResponse, Claims, LoginRequest, RegisterRequest};
use bookshare_types::models::{Role, RoleProfile};

use crate::error::{ApiError, ApiResult};
use crate::payments::PaymentConfig;
use crate::uploads::Storage;
use crate::users::user_response;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub storage: Storage,
    pub payment: PaymentConfig,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // Validate input
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if !req.email.contains('@') {
        return Err(ApiError::validation("email is not valid"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }

    // Admin accounts are provisioned out of band, never via signup
    if req.profile.role() == Role::Admin {
        return Err(ApiError::validation("cannot register an admin account"));
    }

    // Check if email is taken
    if state.db.get_user_by_email(&req.email)?.is_some() {
        return Err(ApiError::conflict("an account with this email already exists"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();

    let (academic_interests, library_name, gst_number, location) = match &req.profile {
        RoleProfile::Student { academic_interests } => (
            serde_json::to_string(academic_interests)
                .map_err(|e| ApiError::Internal(e.into()))?,
            None,
            None,
            None,
        ),
        RoleProfile::Library {
            library_name,
            gst_number,
            location,
        } => (
            "[]".to_string(),
            Some(library_name.clone()),
            Some(gst_number.clone()),
            location
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| ApiError::Internal(e.into()))?,
        ),
        RoleProfile::Admin => ("[]".to_string(), None, None, None),
    };

    state.db.create_user(&NewUser {
        id: user_id.to_string(),
        name: req.name.trim().to_string(),
        email: req.email.to_lowercase(),
        phone: req.phone.clone(),
        password_hash,
        role: req.profile.role().as_str().to_string(),
        academic_interests,
        library_name,
        gst_number,
        location,
    })?;

    let token = create_token(&state.jwt_secret, user_id, &req.name, req.profile.role())?;

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AuthResponse {
            token,
            user: user_response(&user),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_email(&req.email.to_lowercase())?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {}", e)))?;
    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("corrupt role '{}'", user.role)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.name, role)?;

    Ok(Json(ApiResponse::ok(AuthResponse {
        token,
        user: user_response(&user),
    })))
}

fn create_token(secret: &str, user_id: Uuid, name: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
