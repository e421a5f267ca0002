//! Dashboard handlers.
//!
//! Aggregates are computed from the caller's ledger and usage history. The
//! aggregation functions are pure so they can be tested without a store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pixio_core::{Account, LedgerEntry, Plan, Tool, UsageRecord, UsageStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::load_account;
use crate::state::AppState;

/// Entries shown in recent activity.
const RECENT_ACTIVITY_LEN: usize = 5;

/// Days covered by the daily usage series.
const USAGE_SERIES_DAYS: i64 = 30;

/// Default page size.
const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size accepted.
const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// Query types
// ============================================================================

/// Pagination query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// One-based page number (default: 1).
    pub page: Option<usize>,
    /// Page size (default: 10, at most 100).
    pub limit: Option<usize>,
}

/// Usage history query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct UsageQuery {
    /// One-based page number (default: 1).
    pub page: Option<usize>,
    /// Page size (default: 10, at most 100).
    pub limit: Option<usize>,
    /// Restrict to one tool.
    #[serde(alias = "toolName")]
    pub tool: Option<String>,
}

/// Stats query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// `week`, `month`, `year` or `all` (default).
    pub period: Option<String>,
}

/// Reporting window for tool stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// The last seven days.
    Week,
    /// The last calendar month.
    Month,
    /// The last twelve months.
    Year,
    /// Everything.
    All,
}

impl Period {
    /// Parse a period name; anything unrecognized means `All`.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("week") => Self::Week,
            Some("month") => Self::Month,
            Some("year") => Self::Year,
            _ => Self::All,
        }
    }

    /// Earliest timestamp inside the window.
    #[must_use]
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => now.checked_sub_months(Months::new(1)),
            Self::Year => now.checked_sub_months(Months::new(12)),
            Self::All => None,
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// One-based page number.
    pub current_page: usize,
    /// Number of pages.
    pub total_pages: usize,
    /// Number of items across all pages.
    pub total: usize,
    /// Page size.
    pub limit: usize,
}

/// Profile block of the overview.
#[derive(Debug, Serialize)]
pub struct OverviewUser {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Current balance.
    pub current_credits: i64,
}

/// Totals block of the overview.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct OverviewStats {
    /// Settled purchases.
    pub total_transactions: usize,
    /// Credits bought across settled purchases.
    pub total_credits_purchased: i64,
    /// Recorded tool invocations.
    pub total_tools_used: usize,
    /// Current balance.
    pub current_credits: i64,
}

/// Per-tool counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolBreakdown {
    /// The tool.
    pub tool: Tool,
    /// Invocations recorded.
    pub count: usize,
    /// Credits charged.
    pub credits_spent: i64,
}

/// One usage record as shown on the dashboard.
#[derive(Debug, Serialize)]
pub struct UsageView {
    /// Record ID.
    pub id: String,
    /// The tool.
    pub tool: Tool,
    /// Credits charged.
    pub credits_used: i64,
    /// Prompt text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Outcome.
    pub status: UsageStatus,
    /// Timestamp.
    pub created_at: String,
}

impl From<&UsageRecord> for UsageView {
    fn from(record: &UsageRecord) -> Self {
        Self {
            id: record.id.to_string(),
            tool: record.tool,
            credits_used: record.credits_charged,
            prompt: record.prompt.clone(),
            status: record.status,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// One settled purchase as shown on the dashboard.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    /// Entry ID.
    pub id: String,
    /// The plan purchased.
    pub plan: Plan,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Credits granted.
    pub credits: i64,
    /// Gateway order reference.
    pub order_id: String,
    /// Gateway payment reference.
    pub payment_id: Option<String>,
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for TransactionView {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            plan: entry.plan,
            amount: entry.amount,
            currency: entry.currency.clone(),
            credits: entry.credits,
            order_id: entry.order_id.clone(),
            payment_id: entry.payment_id.clone(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Overview response.
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    /// Profile block.
    pub user: OverviewUser,
    /// Totals.
    pub stats: OverviewStats,
    /// Per-tool counts, most used first.
    pub tool_usage_breakdown: Vec<ToolBreakdown>,
    /// Latest invocations, newest first.
    pub recent_activity: Vec<UsageView>,
}

/// Transaction history response.
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    /// Settled purchases, newest first.
    pub transactions: Vec<TransactionView>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

/// Usage history response.
#[derive(Debug, Serialize)]
pub struct ToolUsageResponse {
    /// Invocations, newest first.
    pub tool_usages: Vec<UsageView>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

/// Per-tool stats for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStat {
    /// The tool.
    pub tool: Tool,
    /// Invocations in the period.
    pub count: usize,
    /// Credits charged in the period.
    pub total_credits_used: i64,
}

/// One day of the usage series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    /// Day (`YYYY-MM-DD`, UTC).
    pub date: NaiveDate,
    /// Invocations that day.
    pub count: usize,
    /// Credits charged that day.
    pub credits_used: i64,
}

/// Period totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    /// Invocations in the period.
    pub total_usages: usize,
    /// Credits charged in the period.
    pub total_credits_used: i64,
}

/// Tool stats response.
#[derive(Debug, Serialize)]
pub struct ToolStatsResponse {
    /// The period reported.
    pub period: Period,
    /// Per-tool stats, most used first.
    pub tool_stats: Vec<ToolStat>,
    /// Daily series over the last 30 days, oldest first.
    pub usage_over_time: Vec<DailyUsage>,
    /// Period totals.
    pub summary: StatsSummary,
}

/// Credits charged per tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCredits {
    /// The tool.
    pub tool: Tool,
    /// Credits charged.
    pub credits_used: i64,
}

/// Credit summary response.
#[derive(Debug, Serialize)]
pub struct CreditSummaryResponse {
    /// Current balance.
    pub current_balance: i64,
    /// Credits bought across settled purchases.
    pub credits_purchased: i64,
    /// Credits charged across all invocations.
    pub credits_used: i64,
    /// Credits left to spend.
    pub credits_remaining: i64,
    /// Credits charged per tool, largest first.
    pub credits_by_tool: Vec<ToolCredits>,
}

// ============================================================================
// Aggregation
// ============================================================================

fn settled(entries: &[LedgerEntry]) -> impl Iterator<Item = &LedgerEntry> {
    entries.iter().filter(|e| e.settled)
}

/// Credits bought across settled entries.
#[must_use]
pub fn credits_purchased(entries: &[LedgerEntry]) -> i64 {
    settled(entries).map(|e| e.credits).sum()
}

/// Credits charged across usage records.
#[must_use]
pub fn credits_used(usage: &[UsageRecord]) -> i64 {
    usage.iter().map(|r| r.credits_charged).sum()
}

fn group_by_tool<'a>(usage: impl Iterator<Item = &'a UsageRecord>) -> HashMap<Tool, (usize, i64)> {
    let mut groups: HashMap<Tool, (usize, i64)> = HashMap::new();
    for record in usage {
        let slot = groups.entry(record.tool).or_default();
        slot.0 += 1;
        slot.1 += record.credits_charged;
    }
    groups
}

/// Per-tool counts, most used first.
#[must_use]
pub fn tool_breakdown(usage: &[UsageRecord]) -> Vec<ToolBreakdown> {
    let mut rows: Vec<ToolBreakdown> = group_by_tool(usage.iter())
        .into_iter()
        .map(|(tool, (count, credits_spent))| ToolBreakdown {
            tool,
            count,
            credits_spent,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.tool.cmp(&b.tool)));
    rows
}

/// Per-tool stats, period series and totals.
#[must_use]
pub fn tool_stats(usage: &[UsageRecord], period: Period, now: DateTime<Utc>) -> ToolStatsResponse {
    let since = period.since(now);
    let in_period: Vec<&UsageRecord> = usage
        .iter()
        .filter(|r| since.map_or(true, |since| r.created_at >= since))
        .collect();

    let mut tool_stats: Vec<ToolStat> = group_by_tool(in_period.iter().copied())
        .into_iter()
        .map(|(tool, (count, total_credits_used))| ToolStat {
            tool,
            count,
            total_credits_used,
        })
        .collect();
    tool_stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.tool.cmp(&b.tool)));

    let series_start = now - Duration::days(USAGE_SERIES_DAYS);
    let mut days: BTreeMap<NaiveDate, (usize, i64)> = BTreeMap::new();
    for record in usage.iter().filter(|r| r.created_at >= series_start) {
        let slot = days.entry(record.created_at.date_naive()).or_default();
        slot.0 += 1;
        slot.1 += record.credits_charged;
    }
    let usage_over_time = days
        .into_iter()
        .map(|(date, (count, credits_used))| DailyUsage {
            date,
            count,
            credits_used,
        })
        .collect();

    let summary = StatsSummary {
        total_usages: in_period.len(),
        total_credits_used: in_period.iter().map(|r| r.credits_charged).sum(),
    };

    ToolStatsResponse {
        period,
        tool_stats,
        usage_over_time,
        summary,
    }
}

/// Credits charged per tool, largest first.
#[must_use]
pub fn credits_by_tool(usage: &[UsageRecord]) -> Vec<ToolCredits> {
    let mut rows: Vec<ToolCredits> = group_by_tool(usage.iter())
        .into_iter()
        .map(|(tool, (_, credits_used))| ToolCredits { tool, credits_used })
        .collect();
    rows.sort_by(|a, b| b.credits_used.cmp(&a.credits_used).then(a.tool.cmp(&b.tool)));
    rows
}

/// Slice one page out of `items`.
#[must_use]
pub fn paginate<T>(items: &[T], page: Option<usize>, limit: Option<usize>) -> (&[T], Pagination) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    let total = items.len();

    let start = (page - 1).saturating_mul(limit).min(total);
    let end = start.saturating_add(limit).min(total);

    (
        &items[start..end],
        Pagination {
            current_page: page,
            total_pages: total.div_ceil(limit),
            total,
            limit,
        },
    )
}

fn overview(account: &Account, ledger: &[LedgerEntry], usage: &[UsageRecord]) -> OverviewResponse {
    OverviewResponse {
        user: OverviewUser {
            name: account.name.clone(),
            email: account.email.clone(),
            current_credits: account.credit_balance,
        },
        stats: OverviewStats {
            total_transactions: settled(ledger).count(),
            total_credits_purchased: credits_purchased(ledger),
            total_tools_used: usage.len(),
            current_credits: account.credit_balance,
        },
        tool_usage_breakdown: tool_breakdown(usage),
        recent_activity: usage
            .iter()
            .take(RECENT_ACTIVITY_LEN)
            .map(UsageView::from)
            .collect(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Totals, per-tool breakdown and recent activity.
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<OverviewResponse>, ApiError> {
    let account = load_account(&state, &auth.account_id)?;
    let ledger = state.store.list_ledger_entries(&auth.account_id)?;
    let usage = state.store.list_usage(&auth.account_id)?;

    Ok(Json(overview(&account, &ledger, &usage)))
}

/// Settled purchases, paginated.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let entries: Vec<LedgerEntry> = state
        .store
        .list_ledger_entries(&auth.account_id)?
        .into_iter()
        .filter(|e| e.settled)
        .collect();

    let (page, pagination) = paginate(&entries, query.page, query.limit);
    Ok(Json(TransactionsResponse {
        transactions: page.iter().map(TransactionView::from).collect(),
        pagination,
    }))
}

/// Tool invocations, paginated and optionally filtered by tool.
pub async fn list_tool_usage(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ToolUsageResponse>, ApiError> {
    let tool = query
        .tool
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(str::parse::<Tool>)
        .transpose()?;

    let usage: Vec<UsageRecord> = state
        .store
        .list_usage(&auth.account_id)?
        .into_iter()
        .filter(|r| tool.map_or(true, |tool| r.tool == tool))
        .collect();

    let (page, pagination) = paginate(&usage, query.page, query.limit);
    Ok(Json(ToolUsageResponse {
        tool_usages: page.iter().map(UsageView::from).collect(),
        pagination,
    }))
}

/// Per-tool stats for a period.
pub async fn get_tool_stats(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ToolStatsResponse>, ApiError> {
    let usage = state.store.list_usage(&auth.account_id)?;
    let period = Period::parse(query.period.as_deref());

    Ok(Json(tool_stats(&usage, period, Utc::now())))
}

/// Purchased, used and remaining credits.
pub async fn get_credit_summary(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<CreditSummaryResponse>, ApiError> {
    let account = load_account(&state, &auth.account_id)?;
    let ledger = state.store.list_ledger_entries(&auth.account_id)?;
    let usage = state.store.list_usage(&auth.account_id)?;

    Ok(Json(CreditSummaryResponse {
        current_balance: account.credit_balance,
        credits_purchased: credits_purchased(&ledger),
        credits_used: credits_used(&usage),
        credits_remaining: account.credit_balance,
        credits_by_tool: credits_by_tool(&usage),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixio_core::AccountId;

    fn usage_at(tool: Tool, charged: bool, created_at: DateTime<Utc>) -> UsageRecord {
        let id = AccountId::generate();
        let mut record = if charged {
            UsageRecord::succeeded(id, tool, 1, None)
        } else {
            UsageRecord::failed(id, tool, None)
        };
        record.created_at = created_at;
        record
    }

    #[test]
    fn breakdown_is_sorted_by_count() {
        let now = Utc::now();
        let usage = vec![
            usage_at(Tool::Uncrop, true, now),
            usage_at(Tool::Generate, true, now),
            usage_at(Tool::Generate, false, now),
            usage_at(Tool::Generate, true, now),
        ];

        let rows = tool_breakdown(&usage);
        assert_eq!(rows[0].tool, Tool::Generate);
        assert_eq!(rows[0].count, 3);
        assert_eq!(rows[0].credits_spent, 2);
        assert_eq!(rows[1].tool, Tool::Uncrop);
    }

    #[test]
    fn pagination_counts_pages() {
        let items: Vec<u32> = (0..23).collect();

        let (page, meta) = paginate(&items, Some(3), Some(10));
        assert_eq!(page, &[20, 21, 22]);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total, 23);

        let (page, meta) = paginate(&items, Some(9), None);
        assert!(page.is_empty());
        assert_eq!(meta.current_page, 9);
        assert_eq!(meta.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn pagination_clamps_inputs() {
        let items: Vec<u32> = (0..5).collect();
        let (page, meta) = paginate(&items, Some(0), Some(0));
        assert_eq!(page, &[0]);
        assert_eq!(meta.current_page, 1);
        assert_eq!(meta.limit, 1);

        let (_, meta) = paginate(&items, None, Some(10_000));
        assert_eq!(meta.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn stats_respect_period() {
        let now = Utc::now();
        let usage = vec![
            usage_at(Tool::Enhance, true, now - Duration::days(2)),
            usage_at(Tool::Enhance, true, now - Duration::days(20)),
            usage_at(Tool::Cleanup, true, now - Duration::days(200)),
        ];

        let week = tool_stats(&usage, Period::Week, now);
        assert_eq!(week.summary.total_usages, 1);

        let all = tool_stats(&usage, Period::All, now);
        assert_eq!(all.summary.total_usages, 3);
        assert_eq!(all.summary.total_credits_used, 3);
        assert_eq!(all.tool_stats[0].tool, Tool::Enhance);

        // The daily series always covers the last 30 days, oldest first.
        assert_eq!(all.usage_over_time.len(), 2);
        assert!(all.usage_over_time[0].date < all.usage_over_time[1].date);
    }

    #[test]
    fn unknown_period_means_all() {
        assert_eq!(Period::parse(Some("decade")), Period::All);
        assert_eq!(Period::parse(None), Period::All);
        assert_eq!(Period::parse(Some("month")), Period::Month);
    }

    #[test]
    fn credit_totals() {
        let account = AccountId::generate();
        let now = Utc::now();
        let ledger = vec![
            LedgerEntry::settled(account, Plan::Basic, 1000, "INR", 100, "o1", "p1", now),
            LedgerEntry::settled(account, Plan::Advanced, 5000, "INR", 500, "o2", "p2", now),
        ];
        let usage = vec![
            usage_at(Tool::Generate, true, now),
            usage_at(Tool::Cleanup, true, now),
            usage_at(Tool::Cleanup, true, now),
            usage_at(Tool::Cleanup, false, now),
        ];

        assert_eq!(credits_purchased(&ledger), 600);
        assert_eq!(credits_used(&usage), 3);

        let by_tool = credits_by_tool(&usage);
        assert_eq!(
            by_tool[0],
            ToolCredits {
                tool: Tool::Cleanup,
                credits_used: 2
            }
        );
    }
}
