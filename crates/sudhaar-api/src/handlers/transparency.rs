use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use sudhaar_db::models::NewReport;
use sudhaar_types::api::{CreateReportRequest, ReportResponse, TransparencySummary};
use sudhaar_types::models::Caller;
use sudhaar_types::money::from_cents;

use crate::auth::push;
use crate::error::{AppError, FieldErrors};
use crate::extract::{Json, Path, Query};
use crate::serialize::report_response;
use crate::state::{AppState, blocking};
use crate::validators;

use super::check_text;

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub campaign: Option<Uuid>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = blocking(&state, move |db| Ok(db.list_reports(query.campaign)?)).await?;
    let reports: Vec<ReportResponse> = rows.into_iter().map(report_response).collect();
    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let row = blocking(&state, move |db| Ok(db.get_report(report_id)?))
        .await?
        .ok_or_else(|| AppError::not_found("Report"))?;
    Ok(Json(report_response(row)))
}

/// Publishes a report for one of the caller's own campaigns.
pub async fn create_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = FieldErrors::new();
    if req.campaign.is_none() {
        push(&mut errors, "campaign", "This field is required.");
    }
    check_text(&mut errors, "title", &req.title, Some(MAX_TITLE_LEN));
    check_text(&mut errors, "description", &req.description, None);
    let mut amount = |field: &str, value: Decimal| match validators::amount_cents(value) {
        Ok(cents) => cents,
        Err(msg) => {
            push(&mut errors, field, msg);
            0
        }
    };
    let total_donated_cents = amount("total_funds_donated", req.total_funds_donated);
    let utilized_cents = amount("funds_utilized", req.funds_utilized);
    let balance_cents = amount("available_balance", req.available_balance);

    let Some(campaign_id) = req.campaign.filter(|_| errors.is_empty()) else {
        return Err(AppError::Validation(errors));
    };

    let report = blocking(&state, move |db| {
        let campaign = db.get_campaign(campaign_id)?.ok_or_else(|| {
            AppError::field(
                "campaign",
                format!("Invalid pk \"{}\" - object does not exist.", campaign_id),
            )
        })?;
        if campaign.ngo_id != caller.id {
            return Err(AppError::Forbidden(
                "You can only upload reports for your own campaigns.".to_string(),
            ));
        }

        let row = db.create_report(
            caller.id,
            &NewReport {
                campaign_id,
                title: req.title.trim(),
                description: req.description.trim(),
                total_donated_cents,
                utilized_cents,
                balance_cents,
            },
        )?;
        Ok(report_response(row))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    blocking(&state, move |db| {
        let row = db
            .get_report(report_id)?
            .ok_or_else(|| AppError::not_found("Report"))?;
        if row.created_by != Some(caller.id) {
            return Err(AppError::Forbidden(
                "You can only delete reports you published.".to_string(),
            ));
        }
        db.delete_report(report_id)?;
        info!("Transparency report {} deleted by {}", report_id, caller.email);
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Platform-wide funds: raised by verified campaigns, of which completed
/// campaigns count as utilized.
pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let totals = blocking(&state, |db| Ok(db.funds_totals()?)).await?;
    Ok(Json(TransparencySummary {
        total_funds_donated: from_cents(totals.raised_cents),
        funds_utilized: from_cents(totals.utilized_cents),
        available_balance: from_cents(totals.raised_cents - totals.utilized_cents),
    }))
}
