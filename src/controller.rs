use std::cell::{Cell, Ref, RefCell, RefMut};

use ego_tree::NodeId;

use crate::classifier::Classifier;
use crate::config::EngineSettings;
use crate::counter::CounterState;
use crate::detector::{is_qualifying_page, query_param, search_query};
use crate::dom::Page;
use crate::error::Result;
use crate::renderer::{OverlayRenderer, detect_layout_mode};
use crate::rules::ClassificationRuleset;

/// Width changes smaller than this are treated as noise.
pub const VIEWPORT_DELTA: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// Why something asked for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    DocumentReady,
    PostLoad,
    SubtreeMutation,
    SearchInputChanged,
    QueryChanged,
    PaginationChanged,
    ViewportChanged,
    UserAgentChanged,
    Watchdog,
    Manual,
}

impl Trigger {
    /// A different query means numbering starts over.
    pub fn starts_new_search(self) -> bool {
        matches!(self, Trigger::SearchInputChanged | Trigger::QueryChanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Busy,
    NotQualifying,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub classified: usize,
    pub added: usize,
    pub fallback: usize,
    pub total_badges: usize,
    pub reconciled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Skipped(SkipReason),
    Completed(ScanReport),
}

/// Holds the controller in `Scanning` until dropped.
pub struct ScanGuard<'a> {
    state: &'a Cell<ScanState>,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.state.set(ScanState::Idle);
    }
}

/// What the page looked like at the last change check.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    url: String,
    query: Option<String>,
    start: Option<String>,
    search_input: Option<String>,
    viewport_width: u32,
    user_agent: String,
}

impl Observed {
    fn capture(page: &Page, rules: &ClassificationRuleset) -> Self {
        Self {
            url: page.location().to_string(),
            query: search_query(page.location(), rules),
            start: query_param(page.location(), "start"),
            search_input: page.search_input_value(&rules.search_input),
            viewport_width: page.viewport_width(),
            user_agent: page.user_agent().to_string(),
        }
    }
}

/// Owns the page, the counter and the re-entrancy state, and runs the
/// classify → reconcile → render pipeline.
///
/// Everything is single threaded. Interior mutability lets a trigger reach
/// [`RefreshController::scan`] while another scan holds the page; that call
/// sees `Scanning` and returns without touching anything.
pub struct RefreshController {
    page: RefCell<Page>,
    counter: RefCell<CounterState>,
    state: Cell<ScanState>,
    observed: RefCell<Observed>,
    rules: ClassificationRuleset,
    settings: EngineSettings,
}

impl RefreshController {
    pub fn new(page: Page, settings: EngineSettings) -> Result<Self> {
        Ok(Self::with_rules(page, ClassificationRuleset::google()?, settings))
    }

    pub fn with_rules(page: Page, rules: ClassificationRuleset, settings: EngineSettings) -> Self {
        let observed = Observed::capture(&page, &rules);
        Self {
            counter: RefCell::new(CounterState::new(settings.results_per_page)),
            page: RefCell::new(page),
            state: Cell::new(ScanState::Idle),
            observed: RefCell::new(observed),
            rules,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rules(&self) -> &ClassificationRuleset {
        &self.rules
    }

    pub fn state(&self) -> ScanState {
        self.state.get()
    }

    pub fn page(&self) -> Ref<'_, Page> {
        self.page.borrow()
    }

    /// Host-side access for simulating navigation and live DOM changes.
    pub fn page_mut(&self) -> RefMut<'_, Page> {
        self.page.borrow_mut()
    }

    pub fn counter(&self) -> Ref<'_, CounterState> {
        self.counter.borrow()
    }

    pub fn badge_count(&self) -> usize {
        self.page
            .try_borrow()
            .map(|page| page.count(&self.rules.badge))
            .unwrap_or(0)
    }

    pub fn try_begin_scan(&self) -> Option<ScanGuard<'_>> {
        if self.state.get() == ScanState::Scanning {
            return None;
        }
        self.state.set(ScanState::Scanning);
        Some(ScanGuard { state: &self.state })
    }

    /// Document-ready setup: clears stale badges, numbers from the URL's base
    /// offset and starts observing. Returns false (and stays inert) when the
    /// page is not a results page.
    pub fn initialize(&self) -> bool {
        let Some(_guard) = self.try_begin_scan() else {
            return false;
        };
        let mut page = self.page.borrow_mut();
        if !is_qualifying_page(&page, &self.rules) {
            log::info!("not a search results page, idle: {}", page.location());
            return false;
        }

        let mut counter = self.counter.borrow_mut();
        counter.rebase(page.location());
        counter.reset_all(&mut page, &self.rules);
        page.take_mutations();
        page.observe();
        *self.observed.borrow_mut() = Observed::capture(&page, &self.rules);
        log::info!(
            "result counter initialized at {} (base offset {})",
            page.location(),
            counter.base_offset()
        );
        true
    }

    /// Starts numbering over for a new search. No-op while a scan runs.
    pub fn reset(&self) -> bool {
        let Some(_guard) = self.try_begin_scan() else {
            return false;
        };
        let mut page = self.page.borrow_mut();
        let observing = page.is_observing();
        page.disconnect();

        let mut counter = self.counter.borrow_mut();
        counter.rebase(page.location());
        counter.reset_all(&mut page, &self.rules);

        if observing {
            page.observe();
        }
        true
    }

    /// One pass of the pipeline. Concurrent calls are dropped, not queued.
    pub fn scan(&self) -> ScanOutcome {
        let Some(_guard) = self.try_begin_scan() else {
            log::debug!("scan already in progress, dropping trigger");
            return ScanOutcome::Skipped(SkipReason::Busy);
        };
        let mut page = self.page.borrow_mut();
        if !is_qualifying_page(&page, &self.rules) {
            return ScanOutcome::Skipped(SkipReason::NotQualifying);
        }

        let observing = page.is_observing();
        page.disconnect();
        let report = self.run_pipeline(&mut page);
        if observing {
            page.observe();
        }

        log::debug!("scan finished: {report:?}");
        ScanOutcome::Completed(report)
    }

    /// Applies a batch of coalesced triggers: reset first if any of them
    /// started a new search, then scan.
    pub fn handle(&self, triggers: &[Trigger]) -> ScanOutcome {
        if triggers.iter().any(|t| t.starts_new_search()) {
            log::info!("new search detected, resetting counters");
            self.reset();
        }
        self.scan()
    }

    fn run_pipeline(&self, page: &mut Page) -> ScanReport {
        let mut counter = self.counter.borrow_mut();
        counter.rebase(page.location());

        // Badges still on the page mean this is a continuation (load more,
        // next page appended); otherwise start clean.
        let reconciled = page.first(&self.rules.badge).is_some();
        if reconciled {
            counter.reconcile_from_existing_badges(page, &self.rules);
        } else {
            counter.reset_all(page, &self.rules);
        }

        let classifier = Classifier::new(&self.rules);
        let renderer = OverlayRenderer::new(&self.rules);
        let layout = detect_layout_mode(page, &self.rules);
        let anchors = classifier.classify(page);

        let mut added = 0;
        let mut pending = 0;
        for anchor in &anchors {
            if !page.is_connected(anchor.node) || counter.has(&anchor.url) {
                continue;
            }
            pending += 1;
            if renderer
                .render(page, anchor, counter.cursor(), layout)
                .is_some()
            {
                counter.next_label();
                counter.mark_labeled(&anchor.url);
                added += 1;
            }
        }

        let mut fallback = 0;
        if added == 0 && (anchors.is_empty() || pending > 0) {
            fallback = renderer.render_heading_fallback(page, &classifier, &mut counter);
        }

        ScanReport {
            classified: anchors.len(),
            added,
            fallback,
            total_badges: page.count(&self.rules.badge),
            reconciled,
        }
    }

    /// Compares the page with what was seen last time and reports what changed.
    pub fn detect_changes(&self) -> Vec<Trigger> {
        let Ok(mut page) = self.page.try_borrow_mut() else {
            return Vec::new();
        };
        let mut triggers = Vec::new();

        let mutations = page.take_mutations();
        if mutations
            .iter()
            .any(|m| self.touches_results(&page, m.added))
        {
            triggers.push(Trigger::SubtreeMutation);
        }

        let current = Observed::capture(&page, &self.rules);
        let mut observed = self.observed.borrow_mut();

        if current.search_input != observed.search_input {
            triggers.push(Trigger::SearchInputChanged);
        }
        if current.url != observed.url || current.start != observed.start {
            if current.query != observed.query {
                triggers.push(Trigger::QueryChanged);
            } else {
                triggers.push(Trigger::PaginationChanged);
            }
        }
        if current.user_agent != observed.user_agent {
            log::info!(
                "user agent changed: {} -> {}",
                observed.user_agent,
                current.user_agent
            );
            triggers.push(Trigger::UserAgentChanged);
        }

        let viewport_width = if current.viewport_width.abs_diff(observed.viewport_width) > VIEWPORT_DELTA {
            log::info!(
                "viewport change: {} -> {}",
                observed.viewport_width,
                current.viewport_width
            );
            triggers.push(Trigger::ViewportChanged);
            current.viewport_width
        } else {
            observed.viewport_width
        };
        *observed = Observed {
            viewport_width,
            ..current
        };

        triggers
    }

    fn touches_results(&self, page: &Page, node: NodeId) -> bool {
        page.matches(node, &self.rules.mutation_targets)
            || page.first_within(node, &self.rules.mutation_targets).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(url: &str) -> RefreshController {
        let page = Page::parse(
            r#"<html><head></head><body>
                <textarea name="q">rust</textarea>
                <div id="search"><div id="rso">
                    <div class="g"><div class="yuRUbf"><a href="https://a.example/"><h3>Alpha title</h3></a></div></div>
                </div></div>
            </body></html>"#,
            url,
        )
        .unwrap();
        RefreshController::new(page, EngineSettings::default()).unwrap()
    }

    #[test]
    fn test_guard_blocks_reentry() {
        let controller = controller("https://www.google.com/search?q=rust");
        let guard = controller.try_begin_scan().unwrap();
        assert_eq!(controller.state(), ScanState::Scanning);
        assert!(controller.try_begin_scan().is_none());
        assert_eq!(controller.scan(), ScanOutcome::Skipped(SkipReason::Busy));
        assert!(!controller.reset());
        drop(guard);
        assert_eq!(controller.state(), ScanState::Idle);
        assert!(matches!(controller.scan(), ScanOutcome::Completed(_)));
    }

    #[test]
    fn test_non_qualifying_page_is_left_alone() {
        let controller = controller("https://www.example.com/search?q=rust");
        assert!(!controller.initialize());
        assert_eq!(controller.scan(), ScanOutcome::Skipped(SkipReason::NotQualifying));
        assert_eq!(controller.badge_count(), 0);
        assert!(!controller.page().is_observing());
    }

    #[test]
    fn test_scan_resumes_observer_without_recording_own_writes() {
        let controller = controller("https://www.google.com/search?q=rust");
        assert!(controller.initialize());
        assert!(matches!(controller.scan(), ScanOutcome::Completed(r) if r.added == 1));
        assert!(controller.page().is_observing());
        assert!(controller.detect_changes().is_empty());
    }

    #[test]
    fn test_detect_changes_classifies_navigation() {
        let controller = controller("https://www.google.com/search?q=rust");
        controller.initialize();

        controller
            .page_mut()
            .navigate("https://www.google.com/search?q=rust&start=10")
            .unwrap();
        assert_eq!(controller.detect_changes(), vec![Trigger::PaginationChanged]);

        controller
            .page_mut()
            .navigate("https://www.google.com/search?q=cargo")
            .unwrap();
        assert_eq!(controller.detect_changes(), vec![Trigger::QueryChanged]);
        assert!(controller.detect_changes().is_empty());
    }

    #[test]
    fn test_detect_changes_viewport_and_user_agent() {
        let controller = controller("https://www.google.com/search?q=rust");
        controller.initialize();

        controller.page_mut().set_viewport_width(1240);
        assert!(controller.detect_changes().is_empty());

        controller.page_mut().set_viewport_width(390);
        controller.page_mut().set_user_agent("Mozilla/5.0 (iPhone) Mobile");
        assert_eq!(
            controller.detect_changes(),
            vec![Trigger::UserAgentChanged, Trigger::ViewportChanged]
        );
    }

    #[test]
    fn test_detect_changes_search_input_and_mutations() {
        let controller = controller("https://www.google.com/search?q=rust");
        controller.initialize();

        {
            let mut page = controller.page_mut();
            let input = controller.rules().search_input.clone();
            page.set_search_input(&input, "cargo");
            page.append_html_to(
                "#rso",
                r#"<div class="g"><div class="yuRUbf"><a href="https://b.example/"><h3>Beta title</h3></a></div></div>"#,
            )
            .unwrap();
            page.append_html_to("body", "<p>footer noise</p>").unwrap();
        }
        assert_eq!(
            controller.detect_changes(),
            vec![Trigger::SubtreeMutation, Trigger::SearchInputChanged]
        );
    }
}
