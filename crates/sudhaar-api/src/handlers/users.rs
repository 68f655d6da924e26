use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use sudhaar_db::Database;
use sudhaar_db::models::{ProfileChanges, UserRow};
use sudhaar_types::api::{UpdateProfileRequest, UserResponse};
use sudhaar_types::models::Caller;

use crate::auth::{non_empty, push};
use crate::error::{AppError, FieldErrors};
use crate::extract::{Json, Path};
use crate::serialize::user_response;
use crate::state::{AppState, blocking};
use crate::validators;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let rows = blocking(&state, |db| Ok(db.list_users()?)).await?;
    let users: Vec<UserResponse> = rows.into_iter().map(user_response).collect();
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let row = blocking(&state, move |db| Ok(db.get_user_by_id(user_id)?))
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(user_response(row)))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let row = blocking(&state, move |db| Ok(db.get_user_by_id(caller.id)?))
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(user_response(row)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let row = blocking(&state, move |db| update_profile(db, caller.id, req)).await?;
    Ok(Json(user_response(row)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != caller.id {
        return Err(AppError::Forbidden(
            "You can only update your own profile.".to_string(),
        ));
    }
    let row = blocking(&state, move |db| update_profile(db, user_id, req)).await?;
    Ok(Json(user_response(row)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != caller.id {
        return Err(AppError::Forbidden(
            "You can only delete your own account.".to_string(),
        ));
    }
    let deleted = blocking(&state, move |db| Ok(db.delete_user(user_id)?)).await?;
    if !deleted {
        return Err(AppError::not_found("User"));
    }
    info!("User {} deleted their account", caller.email);
    Ok(StatusCode::NO_CONTENT)
}

/// Validates a partial profile edit against the stored user and applies it.
fn update_profile(db: &Database, user_id: Uuid, req: UpdateProfileRequest) -> Result<UserRow, AppError> {
    let current = db
        .get_user_by_id(user_id)?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut errors = FieldErrors::new();
    let mut changes = ProfileChanges::default();

    if let Some(username) = req.username.as_deref().map(str::trim) {
        if let Err(msg) = validators::required_text(username) {
            push(&mut errors, "username", msg);
        } else if let Err(msg) = validators::max_length(username, 150) {
            push(&mut errors, "username", msg);
        } else if username != current.username {
            if db.get_user_by_username(username)?.is_some() {
                push(&mut errors, "username", "A user with that username already exists.");
            } else {
                changes.username = Some(username.to_string());
            }
        }
    }

    for (field, value, slot) in [
        ("first_name", &req.first_name, &mut changes.first_name),
        ("last_name", &req.last_name, &mut changes.last_name),
    ] {
        if let Some(value) = value.as_deref().map(str::trim) {
            match validators::name_length(value) {
                Ok(()) => *slot = Some(value.to_string()),
                Err(msg) => push(&mut errors, field, msg),
            }
        }
    }
    let first = changes.first_name.as_deref().unwrap_or(&current.first_name);
    let last = changes.last_name.as_deref().unwrap_or(&current.last_name);
    if let Err(msg) = validators::full_name_length(first, last) {
        push(&mut errors, "first_name", msg);
    }

    if let Some(phone) = non_empty(&req.phone) {
        match validators::phone_number(phone) {
            Ok(digits) => changes.phone = Some(digits),
            Err(msg) => push(&mut errors, "phone", msg),
        }
    }
    if let Some(cnic) = non_empty(&req.cnic) {
        match validators::cnic(cnic) {
            Ok(digits) => changes.cnic = Some(digits),
            Err(msg) => push(&mut errors, "cnic", msg),
        }
    }
    changes.organization_name = non_empty(&req.organization_name).map(str::to_string);

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let row = db
        .update_user_profile(user_id, &changes)?
        .ok_or_else(|| AppError::not_found("User"))?;
    info!("Profile of user {} updated", user_id);
    Ok(row)
}
