use std::collections::HashSet;

use ego_tree::NodeId;
use url::Url;

use crate::detector::query_param;
use crate::dom::Page;
use crate::rules::{BADGE_URL_ATTR, ClassificationRuleset};

/// Rank of the result just before the first one on this page.
///
/// Signals are tried in order: `start` (verbatim), `page` (1-based, converted
/// with `results_per_page`), `offset`. Missing, non-positive or malformed
/// values fall through; the default is 0.
pub fn compute_base_offset(url: &Url, results_per_page: u64) -> u64 {
    if let Some(start) = positive_param(url, "start") {
        return start;
    }
    if let Some(page) = positive_param(url, "page").filter(|&p| p > 1) {
        return (page - 1).saturating_mul(results_per_page);
    }
    positive_param(url, "offset").unwrap_or(0)
}

fn positive_param(url: &Url, name: &str) -> Option<u64> {
    query_param(url, name)?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&v| v > 0)
}

/// Badge text is the label, possibly padded; only the digits count.
pub fn parse_label(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[derive(Debug, Clone)]
pub struct CounterState {
    cursor: u64,
    base_offset: u64,
    labeled_urls: HashSet<String>,
    results_per_page: u64,
}

impl CounterState {
    pub fn new(results_per_page: u64) -> Self {
        Self {
            cursor: 1,
            base_offset: 0,
            labeled_urls: HashSet::new(),
            results_per_page,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn labeled_urls(&self) -> &HashSet<String> {
        &self.labeled_urls
    }

    /// Recomputes the base offset from `url`. The cursor is left alone until
    /// the next reset or reconciliation.
    pub fn rebase(&mut self, url: &Url) -> u64 {
        self.base_offset = compute_base_offset(url, self.results_per_page);
        self.base_offset
    }

    /// Removes every badge from the page and restarts numbering at
    /// `base_offset + 1`. Returns the number of badges removed.
    pub fn reset_all(&mut self, page: &mut Page, rules: &ClassificationRuleset) -> usize {
        let removed = page.remove_matching(&rules.badge);
        self.labeled_urls.clear();
        self.cursor = self.base_offset.saturating_add(1);
        log::debug!(
            "counter reset: removed {removed} badges, next label {}",
            self.cursor
        );
        removed
    }

    /// Rebuilds the labeled set from the badges still on the page and moves the
    /// cursor past the highest label found (or past the base offset).
    ///
    /// URLs whose badges were removed by the page are dropped from the set.
    /// Their labels stay spent: the cursor keeps its value when it is already
    /// past the highest surviving label, so a label handed out once is never
    /// handed out again, and numbering may show gaps instead.
    pub fn reconcile_from_existing_badges(&mut self, page: &Page, rules: &ClassificationRuleset) {
        let mut max_label = self.base_offset;
        self.labeled_urls.clear();

        for badge in page.select(&rules.badge) {
            if let Some(label) = parse_label(&page.text(badge)) {
                max_label = max_label.max(label);
            }
            match badge_url(page, badge, rules) {
                Some(url) => {
                    self.labeled_urls.insert(url);
                }
                None => log::debug!("badge {badge:?} has no recoverable result url"),
            }
        }

        self.cursor = self.cursor.max(max_label.saturating_add(1));
        log::debug!(
            "counter reconciled: {} labeled, next label {}",
            self.labeled_urls.len(),
            self.cursor
        );
    }

    pub fn next_label(&mut self) -> u64 {
        let label = self.cursor;
        self.cursor = self.cursor.saturating_add(1);
        label
    }

    pub fn has(&self, url: &str) -> bool {
        self.labeled_urls.contains(url)
    }

    pub fn mark_labeled(&mut self, url: &str) {
        self.labeled_urls.insert(url.to_string());
    }
}

/// The result url a badge belongs to: its own marker attribute, or else the
/// link it sits in, or else the first link of the container it was appended to.
fn badge_url(page: &Page, badge: NodeId, rules: &ClassificationRuleset) -> Option<String> {
    if let Some(url) = page.attr(badge, BADGE_URL_ATTR) {
        return Some(url.to_string());
    }
    let link = page.closest(badge, &rules.link).or_else(|| {
        page.parent_element(badge)
            .and_then(|container| page.first_within(container, &rules.link))
    })?;
    page.resolve(page.attr(link, "href")?)
}
