//! Row to response mapping, including the fields computed at response time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sudhaar_db::models::{
    BudgetItemRow, CampaignRow, CommentRow, DonationRow, IssueRow, PersonName, ReportRow,
    TimelineRow, UserRow,
};
use sudhaar_types::api::{
    BudgetItemResponse, CampaignResponse, CommentResponse, DonationResponse, IssueResponse,
    ReportResponse, TimelineEntryResponse, UserResponse,
};
use sudhaar_types::models::Caller;
use sudhaar_types::money::from_cents;

/// Relative age of a record, e.g. "3 days ago".
pub fn time_text(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - created_at;
    let days = elapsed.num_days();
    let seconds = elapsed.num_seconds();

    if days > 0 {
        format!("{} day{} ago", days, plural(days))
    } else if seconds > 3600 {
        let hours = seconds / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if seconds > 60 {
        let minutes = seconds / 60;
        format!("{} minute{} ago", minutes, plural(minutes))
    } else {
        "Just now".to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n > 1 { "s" } else { "" }
}

/// Whole percent of the goal raised, capped at 100.
pub fn progress_percentage(raised_cents: i64, goal_cents: i64) -> i64 {
    if goal_cents <= 0 {
        return 0;
    }
    let percent = (raised_cents as i128 * 100) / goal_cents as i128;
    percent.clamp(0, 100) as i64
}

/// Resolved share of all issues, in percent to two places. Zero issues give 0.
pub fn resolution_rate(resolved: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = resolved as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

pub fn display_name(name: &PersonName) -> String {
    let full = format!("{} {}", name.first_name, name.last_name);
    let full = full.trim();
    if full.is_empty() {
        name.username.clone()
    } else {
        full.to_string()
    }
}

pub fn avatar(username: &str) -> String {
    username
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "U".to_string())
}

pub fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        email: row.email,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        cnic: row.cnic,
        role: row.role,
        organization_name: row.organization_name,
        is_verified: row.is_verified,
    }
}

/// Builds issue responses, attaching each issue's timeline and the caller's
/// upvote flag.
pub fn issue_responses(
    rows: Vec<IssueRow>,
    timelines: Vec<TimelineRow>,
    upvoted: &HashSet<Uuid>,
    now: DateTime<Utc>,
) -> Vec<IssueResponse> {
    let mut by_issue: HashMap<Uuid, Vec<TimelineEntryResponse>> = HashMap::new();
    for entry in timelines {
        by_issue
            .entry(entry.issue_id)
            .or_default()
            .push(TimelineEntryResponse {
                id: entry.id,
                status: entry.status,
                description: entry.description,
                created_by_email: entry.created_by_email,
                created_at: entry.created_at,
            });
    }

    rows.into_iter()
        .map(|row| IssueResponse {
            timeline: by_issue.remove(&row.id).unwrap_or_default(),
            time_text: time_text(row.created_at, now),
            user_has_upvoted: upvoted.contains(&row.id),
            author_name: display_name(&row.author_name),
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            category: row.category,
            status: row.status,
            priority: row.priority,
            author: row.author_id,
            author_email: row.author_email,
            image_url: row.image_url,
            upvotes: row.upvotes,
            latitude: row.latitude,
            longitude: row.longitude,
            created_at: row.created_at,
            updated_at: row.updated_at,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by,
        })
        .collect()
}

pub fn comment_response(row: CommentRow, caller: Option<&Caller>) -> CommentResponse {
    CommentResponse {
        user_name: display_name(&row.user_name),
        user_avatar: avatar(&row.user_name.username),
        is_own_comment: caller.is_some_and(|c| c.id == row.user_id),
        id: row.id,
        issue: row.issue_id,
        user: row.user_id,
        text: row.text,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Builds campaign responses with their budget breakdowns.
pub fn campaign_responses(
    rows: Vec<CampaignRow>,
    budget_items: Vec<BudgetItemRow>,
) -> Vec<CampaignResponse> {
    let mut by_campaign: HashMap<Uuid, Vec<BudgetItemResponse>> = HashMap::new();
    for item in budget_items {
        by_campaign
            .entry(item.campaign_id)
            .or_default()
            .push(BudgetItemResponse {
                id: item.id,
                item_name: item.item_name,
                total_cost: from_cents(item.total_cents),
                funded_amount: from_cents(item.funded_cents),
            });
    }

    rows.into_iter()
        .map(|row| CampaignResponse {
            budget_items: by_campaign.remove(&row.id).unwrap_or_default(),
            progress_percentage: progress_percentage(row.raised_cents, row.goal_cents),
            id: row.id,
            title: row.title,
            description: row.description,
            ngo: row.ngo_id,
            ngo_name: row.ngo_organization,
            ngo_email: row.ngo_email,
            category: row.category,
            image_url: row.image_url,
            goal_amount: from_cents(row.goal_cents),
            raised_amount: from_cents(row.raised_cents),
            donor_count: row.donor_count,
            is_verified: row.is_verified,
            is_active: row.is_active,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect()
}

/// Anonymous donations only reveal the donor to the donor.
pub fn donation_response(row: DonationRow, caller: Option<&Caller>) -> DonationResponse {
    let reveal = !row.is_anonymous || caller.is_some_and(|c| c.id == row.donor_id);
    let donor_name = if row.is_anonymous {
        "Anonymous".to_string()
    } else {
        display_name(&row.donor_name)
    };

    DonationResponse {
        id: row.id,
        campaign: row.campaign_id,
        campaign_title: row.campaign_title,
        donor: reveal.then_some(row.donor_id),
        donor_email: reveal.then_some(row.donor_email),
        donor_name,
        amount: from_cents(row.amount_cents),
        is_anonymous: row.is_anonymous,
        payment_method: row.payment_method,
        transaction_id: row.transaction_id,
        created_at: row.created_at,
    }
}

pub fn report_response(row: ReportRow) -> ReportResponse {
    ReportResponse {
        id: row.id,
        campaign: row.campaign_id,
        title: row.title,
        description: row.description,
        total_funds_donated: from_cents(row.total_donated_cents),
        funds_utilized: from_cents(row.utilized_cents),
        available_balance: from_cents(row.balance_cents),
        created_by: row.created_by,
        created_by_email: row.created_by_email,
        created_at: row.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sudhaar_types::models::Role;

    fn name(username: &str, first: &str, last: &str) -> PersonName {
        PersonName {
            username: username.into(),
            first_name: first.into(),
            last_name: last.into(),
        }
    }

    #[test]
    fn time_text_picks_the_largest_unit() {
        let now = Utc::now();
        assert_eq!(time_text(now, now), "Just now");
        assert_eq!(time_text(now - Duration::seconds(60), now), "Just now");
        assert_eq!(time_text(now - Duration::seconds(61), now), "1 minute ago");
        assert_eq!(time_text(now - Duration::minutes(59), now), "59 minutes ago");
        assert_eq!(time_text(now - Duration::seconds(3600), now), "60 minutes ago");
        assert_eq!(time_text(now - Duration::hours(2), now), "2 hours ago");
        assert_eq!(time_text(now - Duration::hours(25), now), "1 day ago");
        assert_eq!(time_text(now - Duration::days(3), now), "3 days ago");
    }

    #[test]
    fn progress_is_floored_and_capped() {
        assert_eq!(progress_percentage(0, 0), 0);
        assert_eq!(progress_percentage(500, 0), 0);
        assert_eq!(progress_percentage(3_333, 10_000), 33);
        assert_eq!(progress_percentage(9_999, 10_000), 99);
        assert_eq!(progress_percentage(25_000, 10_000), 100);
    }

    #[test]
    fn resolution_rate_rounds_to_two_places() {
        assert_eq!(resolution_rate(0, 0), 0.0);
        assert_eq!(resolution_rate(1, 3), 33.33);
        assert_eq!(resolution_rate(2, 3), 66.67);
        assert_eq!(resolution_rate(4, 4), 100.0);
    }

    #[test]
    fn display_name_falls_back_to_username() {
        assert_eq!(display_name(&name("amna", "Amna", "Khan")), "Amna Khan");
        assert_eq!(display_name(&name("amna", "Amna", "")), "Amna");
        assert_eq!(display_name(&name("amna", "", "")), "amna");
        assert_eq!(avatar("amna"), "A");
        assert_eq!(avatar(""), "U");
    }

    #[test]
    fn anonymous_donor_is_hidden_from_others() {
        let donor = Uuid::new_v4();
        let row = || DonationRow {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            campaign_title: "Clean water".into(),
            donor_id: donor,
            donor_email: "donor@example.com".into(),
            donor_name: name("donor", "Dua", ""),
            amount_cents: 50_000,
            is_anonymous: true,
            payment_method: String::new(),
            transaction_id: None,
            created_at: Utc::now(),
        };
        let stranger = Caller {
            id: Uuid::new_v4(),
            email: "s@example.com".into(),
            username: "s".into(),
            role: Role::Official,
        };
        let owner = Caller { id: donor, ..stranger.clone() };

        let seen = donation_response(row(), Some(&stranger));
        assert_eq!(seen.donor, None);
        assert_eq!(seen.donor_email, None);
        assert_eq!(seen.donor_name, "Anonymous");
        assert_eq!(seen.amount.to_string(), "500.00");

        let own = donation_response(row(), Some(&owner));
        assert_eq!(own.donor, Some(donor));
        assert_eq!(own.donor_name, "Anonymous");
    }
}
