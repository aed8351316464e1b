// ── Selectors ──
//
// Pure functions over collection snapshots plus filter settings. They
// never mutate their inputs and return freshly ordered vectors of the
// same `Arc`s, so equal inputs always yield equal output.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{Contract, ContractStatus, Event, ProposalStatus, Template};

// ── Filter settings ──────────────────────────────────────────────────

/// Named date windows relative to today, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateRange {
    #[default]
    All,
    Next30,
    Next60,
    Next90,
    Last30,
    Last60,
    Last90,
}

impl DateRange {
    /// Whether `date` falls in this window as seen from `today`.
    ///
    /// Future windows include today; past windows end the day before.
    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        let ahead = |days: i64| date >= today && date <= today + Duration::days(days);
        let behind = |days: i64| date < today && date >= today - Duration::days(days);
        match self {
            Self::All => true,
            Self::Next30 => ahead(30),
            Self::Next60 => ahead(60),
            Self::Next90 => ahead(90),
            Self::Last30 => behind(30),
            Self::Last60 => behind(60),
            Self::Last90 => behind(90),
        }
    }
}

/// Sort order for events and contracts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSort {
    /// Client name, case-insensitive.
    ClientName,
    /// Event date, ascending; undated records last.
    #[default]
    EventDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateSort {
    Name,
    /// Newest first.
    #[default]
    CreationDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    pub search_term: String,
    /// `None` shows every derived status.
    pub status: Option<ProposalStatus>,
    pub date_range: DateRange,
    pub sort: RecordSort,
    pub show_archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFilters {
    pub search_term: String,
    pub status: Option<ContractStatus>,
    pub date_range: DateRange,
    pub sort: RecordSort,
    pub show_archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilters {
    pub search_term: String,
    pub sort: TemplateSort,
}

// ── Date parsing ─────────────────────────────────────────────────────

/// Parse a stored date: `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn parse_millis(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
        .or_else(|| {
            parse_date(raw)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp_millis())
        })
}

fn matches_search(haystack: &str, term: &str) -> bool {
    term.is_empty() || haystack.to_lowercase().contains(&term.to_lowercase())
}

fn in_range(date: Option<&str>, range: DateRange, today: NaiveDate) -> bool {
    if range == DateRange::All {
        return true;
    }
    date.and_then(parse_date)
        .is_some_and(|d| range.contains(d, today))
}

fn sort_records<T>(
    items: &mut [Arc<T>],
    sort: RecordSort,
    name: impl Fn(&T) -> &str,
    date: impl Fn(&T) -> Option<&str>,
) {
    match sort {
        RecordSort::ClientName => {
            items.sort_by_cached_key(|item| name(item.as_ref()).to_lowercase());
        }
        RecordSort::EventDate => {
            // `None` sorts after every date.
            items.sort_by_cached_key(|item| {
                let parsed = date(item.as_ref()).and_then(parse_date);
                (parsed.is_none(), parsed)
            });
        }
    }
}

// ── Selectors ────────────────────────────────────────────────────────

/// Filter and sort events.
///
/// Archive visibility is a strict partition: archived events only when
/// `show_archived`, otherwise only active ones.
pub fn filter_events(events: &[Arc<Event>], filters: &EventFilters, today: NaiveDate) -> Vec<Arc<Event>> {
    let mut out: Vec<Arc<Event>> = events
        .iter()
        .filter(|e| e.is_archived == filters.show_archived)
        .filter(|e| matches_search(&e.client_name, &filters.search_term))
        .filter(|e| filters.status.is_none_or(|s| e.derived_status() == s))
        .filter(|e| in_range(e.event_date.as_deref(), filters.date_range, today))
        .cloned()
        .collect();
    sort_records(&mut out, filters.sort, |e| e.client_name.as_str(), |e| e.event_date.as_deref());
    out
}

pub fn filter_contracts(
    contracts: &[Arc<Contract>],
    filters: &ContractFilters,
    today: NaiveDate,
) -> Vec<Arc<Contract>> {
    let mut out: Vec<Arc<Contract>> = contracts
        .iter()
        .filter(|c| c.is_archived == filters.show_archived)
        .filter(|c| matches_search(&c.client_name, &filters.search_term))
        .filter(|c| filters.status.is_none_or(|s| c.status == s))
        .filter(|c| in_range(c.event_date.as_deref(), filters.date_range, today))
        .cloned()
        .collect();
    sort_records(&mut out, filters.sort, |c| c.client_name.as_str(), |c| c.event_date.as_deref());
    out
}

/// Creation time used for template ordering.
///
/// Falls back to the timestamp embedded in the id, then to epoch 0.
pub fn template_created_millis(template: &Template) -> i64 {
    template
        .created_at
        .as_deref()
        .and_then(parse_millis)
        .or_else(|| template.id.embedded_millis())
        .unwrap_or(0)
}

pub fn filter_templates(templates: &[Arc<Template>], filters: &TemplateFilters) -> Vec<Arc<Template>> {
    let mut out: Vec<Arc<Template>> = templates
        .iter()
        .filter(|t| matches_search(&t.name, &filters.search_term))
        .cloned()
        .collect();
    match filters.sort {
        TemplateSort::Name => out.sort_by_cached_key(|t| t.name.to_lowercase()),
        TemplateSort::CreationDate => {
            out.sort_by_key(|t| std::cmp::Reverse(template_created_millis(t)));
        }
    }
    out
}

// ── Reporting aggregates ─────────────────────────────────────────────

/// Contract counts per status, in lifecycle order, omitting empty statuses.
pub fn contract_status_counts(contracts: &[Arc<Contract>]) -> Vec<(ContractStatus, usize)> {
    ContractStatus::ALL
        .iter()
        .map(|s| (*s, contracts.iter().filter(|c| c.status == *s).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

/// Number of contracted events per month (January first) in `year`.
pub fn event_volume_by_month(contracts: &[Arc<Contract>], year: i32) -> [usize; 12] {
    let mut months = [0usize; 12];
    for date in contracts
        .iter()
        .filter_map(|c| c.event_date.as_deref().and_then(parse_date))
        .filter(|d| d.year() == year)
    {
        if let Some(slot) = usize::try_from(date.month0())
            .ok()
            .and_then(|m| months.get_mut(m))
        {
            *slot += 1;
        }
    }
    months
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemCount {
    pub id: String,
    pub name: String,
    pub count: usize,
}

/// Most frequently contracted menu items.
///
/// Only lines with an id count; group headers (lines with an `itemType`)
/// are skipped. Ties keep first-seen order.
pub fn top_menu_items(contracts: &[Arc<Contract>], limit: usize) -> Vec<MenuItemCount> {
    let mut order: Vec<MenuItemCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in contracts.iter().flat_map(|c| c.menu_items.iter()) {
        let Some(id) = line.id.as_deref() else { continue };
        if line.item_type.is_some() {
            continue;
        }
        if let Some(&pos) = index.get(id) {
            if let Some(entry) = order.get_mut(pos) {
                entry.count += 1;
            }
        } else {
            index.insert(id.to_owned(), order.len());
            order.push(MenuItemCount {
                id: id.to_owned(),
                name: line.name.clone().unwrap_or_default(),
                count: 1,
            });
        }
    }

    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(limit);
    order
}
