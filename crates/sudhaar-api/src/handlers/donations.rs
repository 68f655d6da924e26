use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use sudhaar_db::models::{DonationFilter, NewDonation};
use sudhaar_types::api::{CreateDonationRequest, DonationResponse};
use sudhaar_types::models::{Caller, CampaignStatus};

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::serialize::donation_response;
use crate::state::{AppState, blocking};
use crate::validators;

#[derive(Debug, Default, Deserialize)]
pub struct DonationQuery {
    pub campaign: Option<Uuid>,
    pub is_anonymous: Option<bool>,
}

/// The caller's own donations.
pub async fn list_donations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<DonationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = DonationFilter {
        donor: Some(caller.id),
        campaign: query.campaign,
        is_anonymous: query.is_anonymous,
    };
    let donations = blocking(&state, move |db| {
        let rows = db.list_donations(&filter)?;
        Ok(rows
            .into_iter()
            .map(|row| donation_response(row, Some(&caller)))
            .collect::<Vec<DonationResponse>>())
    })
    .await?;
    Ok(Json(donations))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let donation = blocking(&state, move |db| {
        let row = db
            .get_donation(donation_id)?
            .filter(|row| row.donor_id == caller.id)
            .ok_or_else(|| AppError::not_found("Donation"))?;
        Ok(donation_response(row, Some(&caller)))
    })
    .await?;
    Ok(Json(donation))
}

/// Records a donation to any campaign that has not been completed. The
/// campaign's raised total is re-derived from its donations in the same
/// transaction.
pub async fn create_donation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount_cents = validators::amount_cents(req.amount)
        .map_err(|msg| AppError::field("amount", msg))?;

    let donation = blocking(&state, move |db| {
        let campaign = db
            .get_campaign(req.campaign)?
            .ok_or_else(|| {
                AppError::field(
                    "campaign",
                    format!("Invalid pk \"{}\" - object does not exist.", req.campaign),
                )
            })?;
        if campaign.status == CampaignStatus::Completed {
            return Err(AppError::field(
                "campaign",
                "This campaign is completed and no longer accepts donations.",
            ));
        }

        let row = db
            .create_donation(&NewDonation {
                campaign_id: req.campaign,
                donor_id: caller.id,
                amount_cents,
                is_anonymous: req.is_anonymous,
                payment_method: req.payment_method.trim(),
                transaction_id: req.transaction_id.as_deref().filter(|t| !t.is_empty()),
            })?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        Ok(donation_response(row, Some(&caller)))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn delete_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    blocking(&state, move |db| {
        let row = db
            .get_donation(donation_id)?
            .ok_or_else(|| AppError::not_found("Donation"))?;
        if row.donor_id != caller.id {
            return Err(AppError::Forbidden(
                "You can only delete your own donations.".to_string(),
            ));
        }
        db.delete_donation(donation_id)?;
        info!("Donation {} withdrawn by {}", donation_id, caller.email);
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
