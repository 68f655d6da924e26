use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use sudhaar_db::models::{NewUser, Registration, UserRow};
use sudhaar_types::api::{
    AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
};
use sudhaar_types::models::{Claims, Role, TokenType};

use crate::error::{AppError, FieldErrors};
use crate::extract::Json;
use crate::serialize::user_response;
use crate::state::{AppState, AuthConfig, blocking};
use crate::validators;

const BAD_CREDENTIALS: &str = "No active account found with the given credentials.";

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let errors = check_registration(&req);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let user = blocking(&state, move |db| {
        let password_hash = hash_password(&req.password)?;
        let phone = non_empty(&req.phone).map(validators::phone_number).transpose().ok().flatten();
        let cnic = non_empty(&req.cnic).map(validators::cnic).transpose().ok().flatten();
        let role = parse_role(req.role.as_deref()).unwrap_or(Role::Citizen);

        let registration = db.register_user(&NewUser {
            email: req.email.trim(),
            username: req.username.trim(),
            password_hash: &password_hash,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            phone: phone.as_deref(),
            cnic: cnic.as_deref(),
            role,
            organization_name: non_empty(&req.organization_name),
        })?;
        match registration {
            Registration::Created(user) => Ok(user),
            Registration::Taken { email, username } => {
                Err(AppError::Validation(taken_errors(email, username)))
            }
        }
    })
    .await?;

    info!("User {} registered as {}", user.email, user.role);
    let (access, refresh) = token_pair(&state.auth, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user_response(user),
            access,
            refresh,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Must include \"email\" and \"password\".".to_string(),
        ));
    }

    let user = blocking(&state, move |db| {
        let user = db
            .get_user_by_email(req.email.trim())?
            .ok_or_else(|| AppError::Unauthorized(BAD_CREDENTIALS.to_string()))?;
        if !verify_password(&user.password, &req.password) {
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
        Ok(user)
    })
    .await?;

    if !user.is_active {
        warn!("Login attempt for disabled account {}", user.id);
        return Err(AppError::Unauthorized("User account is disabled.".to_string()));
    }

    let (access, refresh) = token_pair(&state.auth, &user)?;
    Ok(Json(AuthResponse {
        user: user_response(user),
        access,
        refresh,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = decode_token(&state.auth.jwt_secret, &req.refresh)
        .filter(|c| c.token_type == TokenType::Refresh)
        .ok_or_else(|| AppError::Unauthorized("Token is invalid or expired".to_string()))?;

    let user = blocking(&state, move |db| Ok(db.get_user_by_id(claims.sub)?))
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Token is invalid or expired".to_string()))?;

    let access = create_token(&state.auth, &user, TokenType::Access)?;
    Ok(Json(RefreshResponse { access }))
}

/// Collects every field error that can be decided without the database.
fn check_registration(req: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if let Err(msg) = validators::email(req.email.trim()) {
        push(&mut errors, "email", msg);
    }
    if let Err(msg) = validators::required_text(&req.username) {
        push(&mut errors, "username", msg);
    } else if let Err(msg) = validators::max_length(req.username.trim(), 150) {
        push(&mut errors, "username", msg);
    }
    if let Err(msg) = validators::password_strength(&req.password) {
        push(&mut errors, "password", msg);
    }
    if req.password != req.password2 {
        push(&mut errors, "password", "Password fields didn't match.");
    }
    for (field, value) in [("first_name", &req.first_name), ("last_name", &req.last_name)] {
        if let Err(msg) = validators::name_length(value.trim()) {
            push(&mut errors, field, msg);
        }
    }
    if let Err(msg) = validators::full_name_length(req.first_name.trim(), req.last_name.trim()) {
        push(&mut errors, "first_name", msg);
    }
    if let Some(Err(msg)) = non_empty(&req.phone).map(validators::phone_number) {
        push(&mut errors, "phone", msg);
    }
    if let Some(Err(msg)) = non_empty(&req.cnic).map(validators::cnic) {
        push(&mut errors, "cnic", msg);
    }
    if let Err(msg) = parse_role(req.role.as_deref()) {
        push(&mut errors, "role", msg);
    }

    errors
}

fn parse_role(role: Option<&str>) -> Result<Role, String> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::Citizen),
        Some(text) => text
            .parse()
            .map_err(|_| format!("\"{}\" is not a valid choice.", text)),
    }
}

fn taken_errors(email: bool, username: bool) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if email {
        push(&mut errors, "email", "A user with that email already exists.");
    }
    if username {
        push(&mut errors, "username", "A user with that username already exists.");
    }
    errors
}

pub(crate) fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    // Argon2id with a random salt
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn token_pair(auth: &AuthConfig, user: &UserRow) -> anyhow::Result<(String, String)> {
    Ok((
        create_token(auth, user, TokenType::Access)?,
        create_token(auth, user, TokenType::Refresh)?,
    ))
}

pub fn create_token(auth: &AuthConfig, user: &UserRow, token_type: TokenType) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let ttl = match token_type {
        TokenType::Access => auth.access_ttl,
        TokenType::Refresh => auth.refresh_ttl,
    };
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        token_type,
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verifies signature and expiry. Any failure yields `None`.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "amna@example.com".into(),
            username: "amna".into(),
            password: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            cnic: None,
            role,
            organization_name: None,
            is_verified: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trips_with_type() {
        let auth = AuthConfig::default();
        let user = user(Role::Ngo);
        let token = create_token(&auth, &user, TokenType::Refresh).unwrap();
        let claims = decode_token(&auth.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Ngo);
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert!(decode_token("other-secret", &token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthConfig {
            access_ttl: chrono::Duration::minutes(-10),
            ..AuthConfig::default()
        };
        let token = create_token(&auth, &user(Role::Citizen), TokenType::Access).unwrap();
        assert!(decode_token(&auth.jwt_secret, &token).is_none());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22!").unwrap();
        assert!(verify_password(&hash, "hunter22!"));
        assert!(!verify_password(&hash, "hunter23!"));
        assert!(!verify_password("not-a-hash", "hunter22!"));
    }

    #[test]
    fn taken_fields_become_field_errors() {
        let errors = taken_errors(true, false);
        assert_eq!(
            errors["email"],
            vec!["A user with that email already exists.".to_string()]
        );
        assert!(!errors.contains_key("username"));
        assert_eq!(taken_errors(true, true).len(), 2);
    }

    #[test]
    fn registration_reports_every_bad_field() {
        let req = RegisterRequest {
            email: "nope".into(),
            username: "amna".into(),
            password: "short".into(),
            password2: "different".into(),
            first_name: String::new(),
            last_name: String::new(),
            phone: Some("12345".into()),
            cnic: Some("".into()),
            role: Some("admin".into()),
            organization_name: None,
        };
        let errors = check_registration(&req);
        assert!(errors.contains_key("email"));
        assert_eq!(errors["password"].len(), 2);
        assert!(errors.contains_key("phone"));
        assert!(!errors.contains_key("cnic"));
        assert_eq!(errors["role"], vec!["\"admin\" is not a valid choice.".to_string()]);
    }
}
