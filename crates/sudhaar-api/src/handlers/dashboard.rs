use axum::{Extension, extract::State, response::IntoResponse};

use sudhaar_types::api::{
    DashboardCampaignStats, DashboardIssueStats, DashboardStats, DashboardUserStats,
};
use sudhaar_types::models::Caller;
use sudhaar_types::money::from_cents;

use crate::error::AppError;
use crate::extract::Json;
use crate::serialize::resolution_rate;
use crate::state::{AppState, blocking};

pub async fn stats(
    State(state): State<AppState>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let (issues, platform) =
        blocking(&state, |db| Ok((db.issue_counts()?, db.platform_totals()?))).await?;

    Ok(Json(DashboardStats {
        issues: DashboardIssueStats {
            total_reported: issues.total,
            resolved: issues.resolved,
            active: issues.active,
            resolution_rate: resolution_rate(issues.resolved, issues.total),
        },
        campaigns: DashboardCampaignStats {
            active_campaigns: platform.active_verified_campaigns,
            total_raised: from_cents(platform.donated_cents),
        },
        users: DashboardUserStats {
            total_users: platform.users,
        },
    }))
}
