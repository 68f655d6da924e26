use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CampaignCategory, CampaignStatus, IssueCategory, IssueStatus, Priority, Role};

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    pub cnic: Option<String>,
    pub role: Option<String>,
    pub organization_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub cnic: Option<String>,
    pub role: Role,
    pub organization_name: Option<String>,
    pub is_verified: bool,
}

/// Partial profile update. Role and verification cannot be changed here.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub cnic: Option<String>,
    pub organization_name: Option<String>,
}

// -- Issues --

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: String,
    pub priority: Option<String>,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: IssueCategory,
    pub status: IssueStatus,
    pub priority: Option<Priority>,
    pub author: Uuid,
    pub author_email: String,
    pub author_name: String,
    pub image_url: Option<String>,
    pub upvotes: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub timeline: Vec<TimelineEntryResponse>,
    pub time_text: String,
    pub user_has_upvoted: bool,
}

#[derive(Debug, Serialize)]
pub struct TimelineEntryResponse {
    pub id: Uuid,
    pub status: IssueStatus,
    pub description: String,
    pub created_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpvoteResponse {
    pub message: String,
    pub upvoted: bool,
    pub upvotes: i64,
}

#[derive(Debug, Serialize)]
pub struct IssueStats {
    pub total_reported: i64,
    pub issues_resolved: i64,
    pub in_progress: i64,
    pub active_issues: i64,
    pub resolution_rate: f64,
}

// -- Comments --

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    pub comment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub issue: Uuid,
    pub user: Uuid,
    pub user_name: String,
    pub user_avatar: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_own_comment: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Campaigns --

#[derive(Debug, Deserialize)]
pub struct BudgetItemRequest {
    pub item_name: String,
    pub total_cost: Decimal,
    pub funded_amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct BudgetItemResponse {
    pub id: Uuid,
    pub item_name: String,
    pub total_cost: Decimal,
    pub funded_amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: Option<String>,
    pub goal_amount: Decimal,
    #[serde(default)]
    pub budget_items: Vec<BudgetItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub goal_amount: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub ngo: Uuid,
    pub ngo_name: Option<String>,
    pub ngo_email: String,
    pub category: CampaignCategory,
    pub image_url: Option<String>,
    pub goal_amount: Decimal,
    pub raised_amount: Decimal,
    pub donor_count: i64,
    pub is_verified: bool,
    pub is_active: bool,
    pub status: CampaignStatus,
    pub budget_items: Vec<BudgetItemResponse>,
    pub progress_percentage: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Donations --

#[derive(Debug, Deserialize)]
pub struct CreateDonationRequest {
    pub campaign: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub payment_method: String,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DonationResponse {
    pub id: Uuid,
    pub campaign: Uuid,
    pub campaign_title: String,
    /// Hidden from everyone but the donor when the donation is anonymous.
    pub donor: Option<Uuid>,
    pub donor_email: Option<String>,
    pub donor_name: String,
    pub amount: Decimal,
    pub is_anonymous: bool,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Transparency --

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub campaign: Option<Uuid>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub total_funds_donated: Decimal,
    #[serde(default)]
    pub funds_utilized: Decimal,
    #[serde(default)]
    pub available_balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub campaign: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub total_funds_donated: Decimal,
    pub funds_utilized: Decimal,
    pub available_balance: Decimal,
    pub created_by: Option<Uuid>,
    pub created_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransparencySummary {
    pub total_funds_donated: Decimal,
    pub funds_utilized: Decimal,
    pub available_balance: Decimal,
}

// -- Dashboard --

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub issues: DashboardIssueStats,
    pub campaigns: DashboardCampaignStats,
    pub users: DashboardUserStats,
}

#[derive(Debug, Serialize)]
pub struct DashboardIssueStats {
    pub total_reported: i64,
    pub resolved: i64,
    pub active: i64,
    pub resolution_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardCampaignStats {
    pub active_campaigns: i64,
    pub total_raised: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DashboardUserStats {
    pub total_users: i64,
}
