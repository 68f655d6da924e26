use std::collections::HashSet;

use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use sudhaar_db::Database;
use sudhaar_db::models::{IssueChanges, IssueFilter, IssueOrdering, IssueRow, NewIssue};
use sudhaar_types::api::{
    CommentResponse, CreateCommentRequest, CreateIssueRequest, DeleteCommentRequest,
    IssueResponse, IssueStats, MessageResponse, UpdateIssueRequest, UpdateStatusRequest,
    UpvoteResponse,
};
use sudhaar_types::models::{Caller, IssueCategory, IssueStatus, Priority};

use crate::auth::push;
use crate::error::{AppError, FieldErrors};
use crate::extract::{Json, Path, Query};
use crate::middleware::MaybeCaller;
use crate::serialize::{comment_response, issue_responses, resolution_rate};
use crate::state::{AppState, blocking};
use crate::validators;

use super::check_text;

const MAX_TITLE_LEN: usize = 255;
const MAX_LOCATION_LEN: usize = 255;

#[derive(Debug, Default, Deserialize)]
pub struct IssueQuery {
    /// One status or a comma-separated list.
    pub status: Option<String>,
    pub exclude_resolved: Option<String>,
    pub resolved_only: Option<String>,
    pub my_reports: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// A query flag is set by any non-empty value except `false` and `0`.
fn flag(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).is_some_and(|v| {
        !v.is_empty() && !v.eq_ignore_ascii_case("false") && v != "0"
    })
}

fn parse_choice<T>(field: &str, value: &str, errors: &mut FieldErrors) -> Option<T>
where
    T: std::str::FromStr<Err = sudhaar_types::models::UnknownVariant>,
{
    match value.trim().parse() {
        Ok(choice) => Some(choice),
        Err(e) => {
            push(errors, field, format!("{}.", e));
            None
        }
    }
}

impl IssueQuery {
    fn into_filter(self, caller: Option<&Caller>) -> Result<IssueFilter, AppError> {
        let mut errors = FieldErrors::new();
        let mut filter = IssueFilter {
            exclude_resolved: flag(&self.exclude_resolved),
            resolved_only: flag(&self.resolved_only),
            search: self.search.map(|s| s.trim().to_string()),
            ..Default::default()
        };

        if let Some(statuses) = self.status.as_deref() {
            filter.statuses = statuses
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| parse_choice::<IssueStatus>("status", s, &mut errors))
                .collect();
        }
        if flag(&self.my_reports) {
            let caller = caller.ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided.".to_string())
            })?;
            filter.author = Some(caller.id);
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            filter.category = parse_choice::<IssueCategory>("category", category, &mut errors);
        }
        if let Some(priority) = self.priority.as_deref().filter(|p| !p.is_empty()) {
            filter.priority = parse_choice::<Priority>("priority", priority, &mut errors);
        }
        filter.ordering = match self.ordering.as_deref() {
            Some("created_at") => IssueOrdering::OldestFirst,
            Some("upvotes") => IssueOrdering::LeastUpvoted,
            Some("-upvotes") => IssueOrdering::MostUpvoted,
            _ => IssueOrdering::NewestFirst,
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        Ok(filter)
    }
}

/// Attaches timelines and the caller's upvote flags to issue rows.
fn with_details(
    db: &Database,
    rows: Vec<IssueRow>,
    caller: Option<&Caller>,
) -> anyhow::Result<Vec<IssueResponse>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let timelines = db.get_timelines_for_issues(&ids)?;
    let upvoted = match caller {
        Some(caller) => db.upvoted_issue_ids(caller.id, &ids)?,
        None => HashSet::new(),
    };
    Ok(issue_responses(rows, timelines, &upvoted, chrono::Utc::now()))
}

fn single(db: &Database, row: IssueRow, caller: Option<&Caller>) -> Result<IssueResponse, AppError> {
    with_details(db, vec![row], caller)?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("issue response missing")))
}

fn load_issue(db: &Database, issue_id: Uuid) -> Result<IssueRow, AppError> {
    db.get_issue(issue_id)?
        .ok_or_else(|| AppError::not_found("Issue"))
}

/// Issue edits are open to the author and to officials.
fn ensure_can_manage(issue: &IssueRow, caller: &Caller) -> Result<(), AppError> {
    if issue.author_id == caller.id || caller.is_official() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

pub async fn list_issues(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    Query(query): Query<IssueQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = query.into_filter(caller.as_ref())?;
    let issues = blocking(&state, move |db| {
        let rows = db.list_issues(&filter)?;
        Ok(with_details(db, rows, caller.as_ref())?)
    })
    .await?;
    Ok(Json(issues))
}

pub async fn create_issue(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateIssueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = FieldErrors::new();
    check_text(&mut errors, "title", &req.title, Some(MAX_TITLE_LEN));
    check_text(&mut errors, "description", &req.description, None);
    check_text(&mut errors, "location", &req.location, Some(MAX_LOCATION_LEN));
    let category = parse_choice::<IssueCategory>("category", &req.category, &mut errors);
    let priority = req
        .priority
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .and_then(|p| parse_choice::<Priority>("priority", p, &mut errors));
    check_coordinates(&mut errors, req.latitude, req.longitude);
    let Some(category) = category.filter(|_| errors.is_empty()) else {
        return Err(AppError::Validation(errors));
    };

    let issue = blocking(&state, move |db| {
        let row = db.create_issue(
            caller.id,
            &NewIssue {
                title: req.title.trim(),
                description: req.description.trim(),
                location: req.location.trim(),
                category,
                priority,
                image_url: req.image_url.as_deref().filter(|u| !u.is_empty()),
                latitude: req.latitude,
                longitude: req.longitude,
            },
        )?;
        single(db, row, Some(&caller))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(issue)))
}

pub async fn get_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<impl IntoResponse, AppError> {
    let issue = blocking(&state, move |db| {
        let row = load_issue(db, issue_id)?;
        single(db, row, caller.as_ref())
    })
    .await?;
    Ok(Json(issue))
}

pub async fn update_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateIssueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = FieldErrors::new();
    if let Some(title) = &req.title {
        check_text(&mut errors, "title", title, Some(MAX_TITLE_LEN));
    }
    if let Some(description) = &req.description {
        check_text(&mut errors, "description", description, None);
    }
    if let Some(location) = &req.location {
        check_text(&mut errors, "location", location, Some(MAX_LOCATION_LEN));
    }
    check_coordinates(&mut errors, req.latitude, req.longitude);
    let changes = IssueChanges {
        category: req
            .category
            .as_deref()
            .and_then(|c| parse_choice("category", c, &mut errors)),
        priority: req
            .priority
            .as_deref()
            .and_then(|p| parse_choice("priority", p, &mut errors)),
        status: req
            .status
            .as_deref()
            .and_then(|s| parse_choice("status", s, &mut errors)),
        title: req.title.map(|t| t.trim().to_string()),
        description: req.description.map(|d| d.trim().to_string()),
        location: req.location.map(|l| l.trim().to_string()),
        image_url: req.image_url,
        latitude: req.latitude,
        longitude: req.longitude,
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let issue = blocking(&state, move |db| {
        let current = load_issue(db, issue_id)?;
        ensure_can_manage(&current, &caller)?;
        let row = db
            .update_issue(issue_id, &changes, caller.id)?
            .ok_or_else(|| AppError::not_found("Issue"))?;
        info!("Issue {} updated by {}", issue_id, caller.email);
        single(db, row, Some(&caller))
    })
    .await?;
    Ok(Json(issue))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    blocking(&state, move |db| {
        let current = load_issue(db, issue_id)?;
        ensure_can_manage(&current, &caller)?;
        db.delete_issue(issue_id)?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upvote(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = blocking(&state, move |db| Ok(db.upvote_issue(issue_id, caller.id)?))
        .await?
        .ok_or_else(|| AppError::not_found("Issue"))?;

    let message = if outcome.changed {
        "Upvoted successfully"
    } else {
        "Already upvoted"
    };
    Ok(Json(UpvoteResponse {
        message: message.to_string(),
        upvoted: true,
        upvotes: outcome.upvotes,
    }))
}

pub async fn remove_upvote(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = blocking(&state, move |db| Ok(db.remove_upvote(issue_id, caller.id)?))
        .await?
        .ok_or_else(|| AppError::not_found("Issue"))?;

    let message = if outcome.changed {
        "Upvote removed"
    } else {
        "No upvote to remove"
    };
    Ok(Json(UpvoteResponse {
        message: message.to_string(),
        upvoted: false,
        upvotes: outcome.upvotes,
    }))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<impl IntoResponse, AppError> {
    let comments = blocking(&state, move |db| {
        load_issue(db, issue_id)?;
        let rows = db.list_comments(issue_id)?;
        Ok(rows
            .into_iter()
            .map(|row| comment_response(row, caller.as_ref()))
            .collect::<Vec<CommentResponse>>())
    })
    .await?;
    Ok(Json(comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(msg) = validators::required_text(&req.text) {
        return Err(AppError::field("text", msg));
    }

    let comment = blocking(&state, move |db| {
        load_issue(db, issue_id)?;
        let row = db.create_comment(issue_id, caller.id, req.text.trim())?;
        Ok(comment_response(row, Some(&caller)))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Removes a comment. Allowed for the comment's author and for officials.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<DeleteCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment_id = req
        .comment_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("comment_id is required".to_string()))?;
    let comment_id: Uuid = comment_id
        .parse()
        .map_err(|_| AppError::not_found("Comment"))?;

    blocking(&state, move |db| {
        load_issue(db, issue_id)?;
        let comment = db
            .get_comment(issue_id, comment_id)?
            .ok_or_else(|| AppError::not_found("Comment"))?;
        if comment.user_id != caller.id && !caller.is_official() {
            return Err(AppError::Forbidden(
                "You do not have permission to delete this comment".to_string(),
            ));
        }
        db.delete_comment(comment_id)?;
        info!("Comment {} on issue {} deleted by {}", comment_id, issue_id, caller.email);
        Ok(())
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Comment deleted successfully".to_string(),
    }))
}

/// The explicit status action. Always records one timeline entry.
pub async fn update_status(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status: IssueStatus = req
        .status
        .as_deref()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| AppError::field("status", "Invalid status"))?;
    let note = req
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let issue = blocking(&state, move |db| {
        let current = load_issue(db, issue_id)?;
        ensure_can_manage(&current, &caller)?;
        let row = db
            .update_issue_status(issue_id, status, note.as_deref(), caller.id)?
            .ok_or_else(|| AppError::not_found("Issue"))?;
        info!(
            "Issue {} status {} -> {} by {}",
            issue_id, current.status, status, caller.email
        );
        single(db, row, Some(&caller))
    })
    .await?;
    Ok(Json(issue))
}

pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let counts = blocking(&state, |db| Ok(db.issue_counts()?)).await?;
    Ok(Json(IssueStats {
        total_reported: counts.total,
        issues_resolved: counts.resolved,
        in_progress: counts.in_progress,
        active_issues: counts.active,
        resolution_rate: resolution_rate(counts.resolved, counts.total),
    }))
}

fn check_coordinates(errors: &mut FieldErrors, latitude: Option<f64>, longitude: Option<f64>) {
    if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        push(errors, "latitude", "Latitude must be between -90 and 90.");
    }
    if longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        push(errors, "longitude", "Longitude must be between -180 and 180.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn flags_follow_query_truthiness() {
        for value in ["true", "1", "yes", "on", "True"] {
            assert!(flag(&set(value)), "{}", value);
        }
        for value in ["", "false", "FALSE", "0", "  "] {
            assert!(!flag(&set(value)), "{}", value);
        }
        assert!(!flag(&None));
    }

    #[test]
    fn filter_reads_loose_flags() {
        let query = IssueQuery {
            exclude_resolved: set("yes"),
            resolved_only: set("0"),
            ..Default::default()
        };
        let filter = query.into_filter(None).unwrap();
        assert!(filter.exclude_resolved);
        assert!(!filter.resolved_only);

        let mine = IssueQuery {
            my_reports: set("on"),
            ..Default::default()
        };
        assert!(matches!(mine.into_filter(None), Err(AppError::Unauthorized(_))));
    }
}
