use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use sudhaar_db::Database;
use sudhaar_db::models::{
    CampaignChanges, CampaignFilter, CampaignRow, CampaignScope, DonationFilter, NewBudgetItem,
    NewCampaign,
};
use sudhaar_types::api::{
    CampaignResponse, CreateCampaignRequest, DonationResponse, UpdateCampaignRequest,
};
use sudhaar_types::models::{Caller, CampaignCategory, CampaignStatus};

use crate::auth::push;
use crate::error::{AppError, FieldErrors};
use crate::extract::{Json, Path, Query};
use crate::middleware::MaybeCaller;
use crate::serialize::{campaign_responses, donation_response};
use crate::state::{AppState, blocking};
use crate::validators;

use super::check_text;

const MAX_TITLE_LEN: usize = 200;
const MAX_ITEM_NAME_LEN: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct CampaignQuery {
    pub category: Option<String>,
    pub is_verified: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// Ngo accounts see their own campaigns, verified or not. Everyone else,
/// anonymous callers included, sees verified campaigns only.
fn scope_for(caller: Option<&Caller>) -> CampaignScope {
    match caller {
        Some(caller) if caller.is_ngo() => CampaignScope::OwnedBy(caller.id),
        _ => CampaignScope::Verified,
    }
}

fn is_visible(row: &CampaignRow, caller: Option<&Caller>) -> bool {
    match scope_for(caller) {
        CampaignScope::OwnedBy(ngo) => row.ngo_id == ngo,
        CampaignScope::Verified => row.is_verified,
    }
}

fn with_budget(db: &Database, rows: Vec<CampaignRow>) -> anyhow::Result<Vec<CampaignResponse>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let items = db.get_budget_items_for_campaigns(&ids)?;
    Ok(campaign_responses(rows, items))
}

fn single(db: &Database, row: CampaignRow) -> Result<CampaignResponse, AppError> {
    with_budget(db, vec![row])?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("campaign response missing")))
}

fn load_visible(db: &Database, campaign_id: Uuid, caller: Option<&Caller>) -> Result<CampaignRow, AppError> {
    db.get_campaign(campaign_id)?
        .filter(|row| is_visible(row, caller))
        .ok_or_else(|| AppError::not_found("Campaign"))
}

/// Loads a campaign for a change only its owning ngo may make.
fn load_owned(db: &Database, campaign_id: Uuid, caller: &Caller) -> Result<CampaignRow, AppError> {
    let row = db
        .get_campaign(campaign_id)?
        .ok_or_else(|| AppError::not_found("Campaign"))?;
    if row.ngo_id != caller.id {
        return Err(AppError::Forbidden(
            "You can only manage your own campaigns.".to_string(),
        ));
    }
    Ok(row)
}

fn parse_category(value: &str, errors: &mut FieldErrors) -> Option<CampaignCategory> {
    match value.trim().parse() {
        Ok(category) => Some(category),
        Err(e) => {
            push(errors, "category", format!("{}.", e));
            None
        }
    }
}

fn parse_amount(field: &str, value: rust_decimal::Decimal, errors: &mut FieldErrors) -> Option<i64> {
    match validators::amount_cents(value) {
        Ok(cents) => Some(cents),
        Err(msg) => {
            push(errors, field, msg);
            None
        }
    }
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    Query(query): Query<CampaignQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut filter = CampaignFilter::new(scope_for(caller.as_ref()));
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        let mut errors = FieldErrors::new();
        filter.category = parse_category(category, &mut errors);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
    }
    filter.is_verified = query.is_verified;
    filter.is_active = query.is_active;
    filter.search = query.search.map(|s| s.trim().to_string());

    let campaigns = blocking(&state, move |db| {
        let rows = db.list_campaigns(&filter)?;
        Ok(with_budget(db, rows)?)
    })
    .await?;
    Ok(Json(campaigns))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !caller.is_ngo() {
        return Err(AppError::Forbidden(
            "Only accounts with the NGO role can create campaigns.".to_string(),
        ));
    }

    let mut errors = FieldErrors::new();
    check_text(&mut errors, "title", &req.title, Some(MAX_TITLE_LEN));
    check_text(&mut errors, "description", &req.description, None);
    let category = parse_category(&req.category, &mut errors);
    let goal_cents = parse_amount("goal_amount", req.goal_amount, &mut errors);

    let mut budget_items = Vec::with_capacity(req.budget_items.len());
    for item in &req.budget_items {
        let name_ok = validators::required_text(&item.item_name).is_ok()
            && validators::max_length(item.item_name.trim(), MAX_ITEM_NAME_LEN).is_ok();
        if !name_ok {
            push(&mut errors, "budget_items", "Each budget item needs a name of at most 200 characters.");
        }
        let total = parse_amount("budget_items", item.total_cost, &mut errors);
        let funded = parse_amount(
            "budget_items",
            item.funded_amount.unwrap_or_default(),
            &mut errors,
        );
        if let (true, Some(total_cents), Some(funded_cents)) = (name_ok, total, funded) {
            budget_items.push(NewBudgetItem {
                item_name: item.item_name.trim().to_string(),
                total_cents,
                funded_cents,
            });
        }
    }

    let (Some(category), Some(goal_cents), true) = (category, goal_cents, errors.is_empty()) else {
        return Err(AppError::Validation(errors));
    };

    let campaign = blocking(&state, move |db| {
        let row = db.create_campaign(
            caller.id,
            &NewCampaign {
                title: req.title.trim(),
                description: req.description.trim(),
                category,
                image_url: req.image_url.as_deref().filter(|u| !u.is_empty()),
                goal_cents,
            },
            &budget_items,
        )?;
        single(db, row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<impl IntoResponse, AppError> {
    let campaign = blocking(&state, move |db| {
        let row = load_visible(db, campaign_id, caller.as_ref())?;
        single(db, row)
    })
    .await?;
    Ok(Json(campaign))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = FieldErrors::new();
    if let Some(title) = &req.title {
        check_text(&mut errors, "title", title, Some(MAX_TITLE_LEN));
    }
    if let Some(description) = &req.description {
        check_text(&mut errors, "description", description, None);
    }
    let changes = CampaignChanges {
        category: req
            .category
            .as_deref()
            .and_then(|c| parse_category(c, &mut errors)),
        goal_cents: req
            .goal_amount
            .and_then(|g| parse_amount("goal_amount", g, &mut errors)),
        title: req.title.map(|t| t.trim().to_string()),
        description: req.description.map(|d| d.trim().to_string()),
        image_url: req.image_url,
        is_active: req.is_active,
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let campaign = blocking(&state, move |db| {
        let current = load_owned(db, campaign_id, &caller)?;
        if current.status == CampaignStatus::Completed && changes.is_active == Some(true) {
            return Err(AppError::field(
                "is_active",
                "A completed campaign cannot be reactivated.",
            ));
        }
        let row = db
            .update_campaign(campaign_id, &changes)?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        info!("Campaign {} updated by {}", campaign_id, caller.email);
        single(db, row)
    })
    .await?;
    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    blocking(&state, move |db| {
        load_owned(db, campaign_id, &caller)?;
        db.delete_campaign(campaign_id)?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn campaign_donations(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<impl IntoResponse, AppError> {
    let donations = blocking(&state, move |db| {
        load_visible(db, campaign_id, caller.as_ref())?;
        let rows = db.list_donations(&DonationFilter {
            campaign: Some(campaign_id),
            ..Default::default()
        })?;
        Ok(rows
            .into_iter()
            .map(|row| donation_response(row, caller.as_ref()))
            .collect::<Vec<DonationResponse>>())
    })
    .await?;
    Ok(Json(donations))
}

/// Officials vouch for a campaign, which makes it publicly visible.
pub async fn verify_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    if !caller.is_official() {
        return Err(AppError::Forbidden(
            "Only officials can verify campaigns.".to_string(),
        ));
    }
    let campaign = blocking(&state, move |db| {
        let row = db
            .set_campaign_verified(campaign_id, true)?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        info!("Campaign {} verified by {}", campaign_id, caller.email);
        single(db, row)
    })
    .await?;
    Ok(Json(campaign))
}

pub async fn complete_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let campaign = blocking(&state, move |db| {
        load_owned(db, campaign_id, &caller)?;
        let row = db
            .complete_campaign(campaign_id)?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        single(db, row)
    })
    .await?;
    Ok(Json(campaign))
}
