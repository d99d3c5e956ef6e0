//! Plain-text rendering for the CLI. Pure functions over snapshots; nothing
//! here touches the network or the cache.

use std::fmt::Write;

use crate::browse::PagerView;
use crate::filter::FilterState;
use crate::query_cache::QueryResult;
use crate::review::ReviewAction;
use crate::types::{
    AnalyticsDashboard, Collection, FilterOptions, Platform, Submission, SubmissionList, SubmissionStatus,
};

const DESCRIPTION_WIDTH: usize = 96;

/// Cut to `max_chars` characters, ending in "..." when shortened.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn names<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

pub fn platform_card(p: &Platform) -> String {
    let mut out = format!("{} ({})", p.name, p.slug);
    if !p.categories.is_empty() {
        let _ = write!(out, "  [{}]", names(p.categories.iter().map(|c| c.name.as_str())));
    }
    if let Some(desc) = p.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(out, "\n    {}", truncate(desc, DESCRIPTION_WIDTH));
    }
    if !p.tags.is_empty() {
        let tags: Vec<String> = p.tags.iter().map(|t| format!("#{}", t.name)).collect();
        let _ = write!(out, "\n    {}", tags.join(" "));
    }
    out
}

pub fn platform_detail(p: &Platform) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", p.name);
    if let Some(url) = &p.url {
        let _ = writeln!(out, "{url}");
    }
    if let Some(desc) = &p.description {
        let _ = writeln!(out, "\n{desc}");
    }
    if !p.categories.is_empty() {
        let _ = writeln!(out, "\nCategories: {}", names(p.categories.iter().map(|c| c.name.as_str())));
    }
    if !p.tags.is_empty() {
        let _ = writeln!(out, "Tags: {}", names(p.tags.iter().map(|t| t.name.as_str())));
    }
    let links = [("iOS", &p.links.ios), ("Android", &p.links.android), ("Web", &p.links.web)];
    if links.iter().any(|(_, l)| l.is_some()) {
        let _ = writeln!(out, "\nLinks:");
        for (label, link) in links {
            if let Some(link) = link {
                let _ = writeln!(out, "  {label:<8}{link}");
            }
        }
    }
    if !p.related_platforms.is_empty() {
        let _ = writeln!(out, "\nRelated:");
        for r in &p.related_platforms {
            let _ = writeln!(out, "  {} ({})", r.name, r.slug);
        }
    }
    out
}

pub fn pager(view: &PagerView) -> String {
    let prev = if view.prev_enabled { "< prev" } else { "      " };
    let next = if view.next_enabled { "next >" } else { "      " };
    format!("{prev}   {}   {next}", view.label)
}

/// Listing page: header, cards, or an inline error / empty notice.
pub fn platform_list(result: &QueryResult<Platform>, pager_view: Option<&PagerView>) -> String {
    let mut out = String::new();
    if result.is_loading {
        out.push_str("Loading platforms...\n");
        return out;
    }
    if let Some(p) = result.meta.as_ref().map(|m| m.pagination) {
        let _ = writeln!(out, "{} platforms · page {}/{}", p.total, p.page, p.pages.max(1));
    }
    if result.is_fetching {
        out.push_str("(refreshing)\n");
    }
    if let Some(err) = &result.error {
        let _ = writeln!(out, "! {}", err.user_message());
    }
    if result.has_results() {
        for p in &result.data {
            let _ = writeln!(out, "\n{}", platform_card(p));
        }
    } else if !result.is_error {
        out.push_str("\nNo platforms match these filters.\n");
    }
    if let Some(view) = pager_view {
        let _ = writeln!(out, "\n{}", pager(view));
    }
    out
}

/// Available categories and tags, selected ones marked with `*`.
pub fn filter_summary(options: &FilterOptions, state: &FilterState) -> String {
    let mark = |selected: bool| if selected { "*" } else { " " };
    let mut out = String::new();
    if !state.search().is_empty() {
        let _ = writeln!(out, "search: {}", state.search());
    }
    if !options.categories.is_empty() {
        out.push_str("categories:");
        for c in &options.categories {
            let _ = write!(out, " {}{}:{}", mark(state.category_ids().contains(&c.id)), c.id, c.name);
        }
        out.push('\n');
    }
    if !options.tags.is_empty() {
        out.push_str("tags:");
        for t in &options.tags {
            let _ = write!(out, " {}{}:{}", mark(state.tag_ids().contains(&t.id)), t.id, t.name);
        }
        out.push('\n');
    }
    let active = state.active_filter_count();
    if active > 0 {
        let _ = writeln!(out, "{active} active filter(s)");
    }
    out
}

pub fn collection_list(items: &[Collection]) -> String {
    if items.is_empty() {
        return "No collections yet.\n".to_string();
    }
    let mut out = String::new();
    for c in items {
        let star = if c.is_featured { "★ " } else { "" };
        let _ = writeln!(out, "{star}{} ({}) · {} platforms", c.title, c.slug, c.platforms.len());
        if let Some(h) = c.highlight.as_deref().or(c.description.as_deref()) {
            let _ = writeln!(out, "    {}", truncate(h, DESCRIPTION_WIDTH));
        }
    }
    out
}

pub fn collection_detail(c: &Collection) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", c.title);
    if let Some(h) = &c.highlight {
        let _ = writeln!(out, "{h}");
    }
    if let Some(d) = &c.description {
        let _ = writeln!(out, "\n{d}");
    }
    let _ = writeln!(
        out,
        "\nviews {} · clicks {} · trending {:.1}",
        c.metrics.views, c.metrics.clicks, c.metrics.trending_score
    );
    if !c.platforms.is_empty() {
        let _ = writeln!(out, "\nPlatforms:");
        for p in &c.platforms {
            let _ = writeln!(out, "  {} ({})", p.name, p.slug);
        }
    }
    out
}

pub fn status_label(status: SubmissionStatus) -> &'static str {
    match status {
        SubmissionStatus::Pending => "in review",
        SubmissionStatus::Approved => "approved",
        SubmissionStatus::Rejected => "rejected",
    }
}

fn submission_row(s: &Submission) -> String {
    let mut row = format!(
        "#{:<5} {:<10} {} <{}> by {}",
        s.id,
        status_label(s.status),
        s.platform_name,
        s.submitter_email,
        s.submitter_name
    );
    if let Some(reason) = &s.rejection_reason {
        let _ = write!(row, "\n        reason: {reason}");
    }
    let actions: Vec<&str> = s
        .status
        .available_actions()
        .iter()
        .map(|a| match a {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
        })
        .collect();
    if !actions.is_empty() {
        let _ = write!(row, "\n        actions: {}", actions.join(" | "));
    }
    row
}

pub fn submission_table(list: &SubmissionList) -> String {
    let mut out = format!("{} submission(s)\n", list.total);
    for s in &list.items {
        let _ = writeln!(out, "{}", submission_row(s));
    }
    out
}

pub fn dashboard(d: &AnalyticsDashboard) -> String {
    let mut out = String::new();
    let views: u64 = d.daily.iter().map(|p| p.views).sum();
    let clicks: u64 = d.daily.iter().map(|p| p.clicks).sum();
    let _ = writeln!(out, "Last {} day(s): {views} views, {clicks} clicks", d.daily.len());
    for p in &d.daily {
        let _ = writeln!(out, "  {}  {:>6} views {:>6} clicks", p.date, p.views, p.clicks);
    }
    if !d.top_collections.is_empty() {
        let _ = writeln!(out, "\nTop collections:");
        for (i, c) in d.top_collections.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} ({}) · {} views · {} clicks · score {:.1}",
                i + 1,
                c.title,
                c.slug,
                c.views,
                c.clicks,
                c.trending_score
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryRef, DailyMetricPoint, TagRef};
    use chrono::NaiveDate;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("번역 플랫폼 목록입니다", 6), "번역 ...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn card_shows_categories_and_tags() {
        let p = Platform {
            id: 1,
            slug: "papago".into(),
            name: "Papago".into(),
            description: Some("Translation".into()),
            categories: vec![CategoryRef { id: 1, name: "AI".into() }],
            tags: vec![TagRef { id: 2, name: "translate".into() }],
            ..Default::default()
        };
        assert_eq!(platform_card(&p), "Papago (papago)  [AI]\n    Translation\n    #translate");
    }

    #[test]
    fn pager_hides_disabled_arrows() {
        let view = PagerView {
            label: "1 / 3".into(),
            prev_enabled: false,
            next_enabled: true,
        };
        assert_eq!(pager(&view), "         1 / 3   next >");
    }

    #[test]
    fn empty_listing_notice() {
        let result: QueryResult<Platform> = QueryResult::idle();
        assert!(platform_list(&result, None).contains("No platforms match"));
    }

    #[test]
    fn dashboard_totals() {
        let d = AnalyticsDashboard {
            daily: vec![
                DailyMetricPoint {
                    date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    views: 10,
                    clicks: 2,
                },
                DailyMetricPoint {
                    date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                    views: 5,
                    clicks: 1,
                },
            ],
            top_collections: vec![],
        };
        assert!(dashboard(&d).starts_with("Last 2 day(s): 15 views, 3 clicks"));
    }
}
