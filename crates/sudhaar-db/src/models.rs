//! Database row types. These map directly to SQLite rows (joined with the
//! owning user where responses need it) and are distinct from the
//! sudhaar-types API records to keep the DB layer independent.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sudhaar_types::models::{
    CampaignCategory, CampaignStatus, IssueCategory, IssueStatus, Priority, Role,
};

pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub cnic: Option<String>,
    pub role: Role,
    pub organization_name: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub cnic: Option<&'a str>,
    pub role: Role,
    pub organization_name: Option<&'a str>,
}

/// Result of [`Database::register_user`](crate::Database::register_user).
pub enum Registration {
    Created(UserRow),
    Taken { email: bool, username: bool },
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub cnic: Option<String>,
    pub organization_name: Option<String>,
}

/// Display name parts of a joined user.
#[derive(Debug, Clone)]
pub struct PersonName {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct IssueRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: IssueCategory,
    pub status: IssueStatus,
    pub priority: Option<Priority>,
    pub author_id: Uuid,
    pub author_email: String,
    pub author_name: PersonName,
    pub image_url: Option<String>,
    pub upvotes: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

pub struct NewIssue<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub category: IssueCategory,
    pub priority: Option<Priority>,
    pub image_url: Option<&'a str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Field edits to an issue. A `status` that differs from the stored one goes
/// through the same transition as the explicit status action.
#[derive(Debug, Default)]
pub struct IssueChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<IssueCategory>,
    pub priority: Option<Priority>,
    pub status: Option<IssueStatus>,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssueOrdering {
    #[default]
    NewestFirst,
    OldestFirst,
    MostUpvoted,
    LeastUpvoted,
}

#[derive(Debug, Default)]
pub struct IssueFilter {
    /// Empty means any status.
    pub statuses: Vec<IssueStatus>,
    pub exclude_resolved: bool,
    pub resolved_only: bool,
    pub author: Option<Uuid>,
    pub category: Option<IssueCategory>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
    pub ordering: IssueOrdering,
}

pub struct TimelineRow {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub status: IssueStatus,
    pub description: String,
    pub created_by: Option<Uuid>,
    pub created_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct CommentRow {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub user_id: Uuid,
    pub user_name: PersonName,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an upvote or remove-upvote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvoteOutcome {
    /// Whether this call created (upvote) or deleted (remove) the link.
    pub changed: bool,
    pub upvotes: i64,
}

pub struct CampaignRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub ngo_id: Uuid,
    pub ngo_email: String,
    pub ngo_organization: Option<String>,
    pub category: CampaignCategory,
    pub image_url: Option<String>,
    pub goal_cents: i64,
    pub raised_cents: i64,
    pub donor_count: i64,
    pub is_verified: bool,
    pub is_active: bool,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewCampaign<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: CampaignCategory,
    pub image_url: Option<&'a str>,
    pub goal_cents: i64,
}

#[derive(Debug, Default)]
pub struct CampaignChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<CampaignCategory>,
    pub image_url: Option<String>,
    pub goal_cents: Option<i64>,
    pub is_active: Option<bool>,
}

/// Which campaigns a listing may include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignScope {
    /// Campaigns run by this ngo, verified or not.
    OwnedBy(Uuid),
    /// Verified campaigns only.
    Verified,
}

#[derive(Debug)]
pub struct CampaignFilter {
    pub scope: CampaignScope,
    pub category: Option<CampaignCategory>,
    pub is_verified: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl CampaignFilter {
    pub fn new(scope: CampaignScope) -> Self {
        Self {
            scope,
            category: None,
            is_verified: None,
            is_active: None,
            search: None,
        }
    }
}

pub struct BudgetItemRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub item_name: String,
    pub total_cents: i64,
    pub funded_cents: i64,
}

pub struct NewBudgetItem {
    pub item_name: String,
    pub total_cents: i64,
    pub funded_cents: i64,
}

pub struct DonationRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub campaign_title: String,
    pub donor_id: Uuid,
    pub donor_email: String,
    pub donor_name: PersonName,
    pub amount_cents: i64,
    pub is_anonymous: bool,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewDonation<'a> {
    pub campaign_id: Uuid,
    pub donor_id: Uuid,
    pub amount_cents: i64,
    pub is_anonymous: bool,
    pub payment_method: &'a str,
    pub transaction_id: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct DonationFilter {
    pub donor: Option<Uuid>,
    pub campaign: Option<Uuid>,
    pub is_anonymous: Option<bool>,
}

pub struct ReportRow {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub total_donated_cents: i64,
    pub utilized_cents: i64,
    pub balance_cents: i64,
    pub created_by: Option<Uuid>,
    pub created_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewReport<'a> {
    pub campaign_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub total_donated_cents: i64,
    pub utilized_cents: i64,
    pub balance_cents: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IssueCounts {
    pub total: i64,
    pub resolved: i64,
    pub in_progress: i64,
    pub active: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTotals {
    pub active_verified_campaigns: i64,
    pub donated_cents: i64,
    pub users: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FundsTotals {
    pub raised_cents: i64,
    pub utilized_cents: i64,
}
