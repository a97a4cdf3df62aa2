//! Tender/user matching.
//!
//! [`MatchEngine::compute`] walks every (tender, user) pair, tender-major and
//! user-minor in ascending sheet order, and groups the pairs accepted by the
//! configured [`MatchPredicate`] under the user's contact key. The walk order
//! fixes the order of entries inside each group and of the groups themselves.
//!
//! Two predicates ship with the crate, both expressed as a [`Composite`]:
//! - **strict cohort**: normalized city, state and material all equal, with the
//!   tender's city and state split out of its `"city,state"` location;
//! - **date gated**: the tender's date cell must read today's date as
//!   `M/D/YYYY`, then the user's normalized state must occur inside the
//!   tender's normalized location and the materials must be equal.
//!
//! The date gate compares strings exactly, in the server's local timezone. A
//! sheet that writes `06/01/2026`, or a server running in another timezone
//! than the people filling the sheet, silently produces no matches.

use chrono::{Datelike, Local, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{LinkSegment, MatchPolicy, MatchingConfig};
use crate::row::{normalize, TenderRow, UserRow};

// ── Match output ────────────────────────────────────────────────────

/// One matched tender, as delivered to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEntry {
    pub link: String,
    pub tender_name: String,
    pub tender_location: String,
    pub tender_desc: String,
    pub tender_emd: String,
    /// Sheet row index of the matched user.
    pub user_id: usize,
}

/// Contact key → matched tenders, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchGroup(IndexMap<String, Vec<MatchEntry>>);

impl MatchGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, key: &str, entry: MatchEntry) {
        self.0.entry(key.to_string()).or_default().push(entry);
    }

    pub fn get(&self, key: &str) -> Option<&[MatchEntry]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MatchEntry])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct contact keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

// ── Predicates ──────────────────────────────────────────────────────

/// Decides whether a tender should be offered to a user.
pub trait MatchPredicate: Send + Sync {
    /// Cheap per-tender gate, checked once before the user loop.
    fn admits(&self, _tender: &TenderRow) -> bool {
        true
    }

    fn matches(&self, tender: &TenderRow, user: &UserRow) -> bool;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Only tenders whose date cell reads a given `M/D/YYYY` date pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateGate {
    /// The local system date, read when the gate is checked.
    SystemClock,
    /// A fixed, pre-rendered date.
    On(String),
}

impl DateGate {
    /// Gate on the local system date at match time.
    pub fn local() -> Self {
        Self::SystemClock
    }

    /// Gate on a fixed date.
    pub fn on(date: NaiveDate) -> Self {
        Self::On(format_sheet_date(date))
    }

    /// The date string tenders are compared against.
    pub fn date(&self) -> String {
        match self {
            Self::SystemClock => format_sheet_date(Local::now().date_naive()),
            Self::On(date) => date.clone(),
        }
    }

    pub fn admits(&self, tender: &TenderRow) -> bool {
        tender.qualifying_date.as_deref() == Some(self.date().as_str())
    }
}

/// Render a date as `M/D/YYYY` without zero padding.
pub fn format_sheet_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Geographic half of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoPredicate {
    /// Tender `"city,state"` split and compared to user city and state.
    ExactCityState,
    /// User state occurs anywhere in the tender location.
    StateInLocation,
}

impl GeoPredicate {
    pub fn matches(self, tender: &TenderRow, user: &UserRow) -> bool {
        match self {
            GeoPredicate::ExactCityState => match tender.city_state() {
                Some((city, state)) => {
                    normalize(city) == normalize(&user.city) && normalize(state) == normalize(&user.state)
                }
                None => false,
            },
            GeoPredicate::StateInLocation => {
                normalize(&tender.location).contains(&normalize(&user.state))
            }
        }
    }
}

/// Date gate × geographic predicate × material equality.
#[derive(Debug, Clone)]
pub struct Composite {
    name: String,
    date_gate: Option<DateGate>,
    geo: GeoPredicate,
}

impl Composite {
    pub fn new(name: impl Into<String>, date_gate: Option<DateGate>, geo: GeoPredicate) -> Self {
        Self {
            name: name.into(),
            date_gate,
            geo,
        }
    }

    pub fn strict_cohort() -> Self {
        Self::new(MatchPolicy::StrictCohort.to_string(), None, GeoPredicate::ExactCityState)
    }

    pub fn date_gated(gate: DateGate) -> Self {
        Self::new(MatchPolicy::DateGated.to_string(), Some(gate), GeoPredicate::StateInLocation)
    }

    /// Build the predicate for a configured policy, gating on the system
    /// date where the policy needs one.
    pub fn for_policy(policy: MatchPolicy) -> Self {
        match policy {
            MatchPolicy::StrictCohort => Self::strict_cohort(),
            MatchPolicy::DateGated => Self::date_gated(DateGate::local()),
        }
    }
}

impl MatchPredicate for Composite {
    fn admits(&self, tender: &TenderRow) -> bool {
        self.date_gate.as_ref().map_or(true, |gate| gate.admits(tender))
    }

    fn matches(&self, tender: &TenderRow, user: &UserRow) -> bool {
        self.geo.matches(tender, user) && normalize(&tender.material) == normalize(&user.material)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ── Links ───────────────────────────────────────────────────────────

/// Builds `{base}/{tender index}/{user segment}` links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base_url: String,
    segment: LinkSegment,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>, segment: LinkSegment) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, segment }
    }

    pub fn segment(&self) -> LinkSegment {
        self.segment
    }

    pub fn build(&self, tender: &TenderRow, user: &UserRow) -> String {
        let secondary = user.secondary_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        match (self.segment, secondary) {
            (LinkSegment::SecondaryId, Some(id)) => {
                format!("{}/{}/{}", self.base_url, tender.index, id)
            }
            _ => format!("{}/{}/{}", self.base_url, tender.index, user.index),
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Groups matched tenders per user contact key.
pub struct MatchEngine {
    predicate: Box<dyn MatchPredicate>,
    links: LinkBuilder,
}

impl MatchEngine {
    pub fn new(predicate: Box<dyn MatchPredicate>, links: LinkBuilder) -> Self {
        Self { predicate, links }
    }

    /// Engine for the configured policy and link layout.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(
            Box::new(Composite::for_policy(config.policy)),
            LinkBuilder::new(config.link_base_url.clone(), config.link_segment),
        )
    }

    pub fn predicate_name(&self) -> &str {
        self.predicate.name()
    }

    /// Match every tender against every user.
    ///
    /// Inputs are decoded rows (headers already removed). The result is
    /// rebuilt from scratch on every call.
    pub fn compute(&self, tenders: &[TenderRow], users: &[UserRow]) -> MatchGroup {
        let mut group = MatchGroup::new();

        for tender in tenders {
            if !self.predicate.admits(tender) {
                continue;
            }
            for user in users {
                if !self.predicate.matches(tender, user) {
                    continue;
                }
                group.push(
                    &user.contact,
                    MatchEntry {
                        link: self.links.build(tender, user),
                        tender_name: tender.name.clone(),
                        tender_location: tender.location.clone(),
                        tender_desc: tender.description.clone(),
                        tender_emd: tender.emd.clone(),
                        user_id: user.index,
                    },
                );
            }
        }

        tracing::debug!(
            predicate = self.predicate.name(),
            tenders = tenders.len(),
            users = users.len(),
            recipients = group.len(),
            entries = group.entry_count(),
            "Match computed"
        );

        group
    }
}
