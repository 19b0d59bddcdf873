use std::collections::HashSet;

use ego_tree::NodeId;

use crate::dom::Page;
use crate::rules::{CandidateRule, ClassificationRuleset, Scope};

/// An anchor accepted as an organic result title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAnchor {
    pub node: NodeId,
    pub href: String,
    /// Absolute target; the raw href when it does not resolve.
    pub url: String,
    pub container: Option<NodeId>,
}

/// Everything the exclusion filters look at, read once per candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub node: NodeId,
    pub href: Option<String>,
    pub url: Option<String>,
    pub text: String,
}

impl Candidate {
    pub fn inspect(page: &Page, node: NodeId) -> Self {
        let href = page.attr(node, "href").map(str::to_string);
        let url = href.as_deref().and_then(|h| page.resolve(h));
        Self {
            node,
            href,
            url,
            text: page.text(node),
        }
    }

    /// First occurrence of this key in a pass wins.
    pub fn dedup_key(&self) -> String {
        self.url
            .clone()
            .or_else(|| self.href.clone())
            .unwrap_or_else(|| self.text.trim().to_string())
    }

    fn target(&self) -> &str {
        self.url.as_deref().or(self.href.as_deref()).unwrap_or("")
    }
}

/// One exclusion test. A candidate survives only if no filter rejects it.
pub trait CandidateFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool;
}

/// Detached or not rendered.
pub struct DetachedFilter;

impl CandidateFilter for DetachedFilter {
    fn rejects(&self, page: &Page, _rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        !page.is_connected(candidate.node) || !page.is_rendered(candidate.node)
    }
}

/// Inside an ad, knowledge panel, local pack, spelling widget or carousel.
pub struct ExcludedContainerFilter;

impl CandidateFilter for ExcludedContainerFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        page.closest(candidate.node, &rules.excluded_containers)
            .is_some()
    }
}

/// "Did you mean" / "Showing results for" in the link or its title.
pub struct SuggestionTextFilter;

impl CandidateFilter for SuggestionTextFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        if rules.is_suggestion(&candidate.text) {
            return true;
        }
        page.first_within(candidate.node, &rules.title)
            .is_some_and(|title| rules.is_suggestion(page.text(title).trim()))
    }
}

/// Image, shopping, map, video and local targets, or media card markup.
pub struct MediaTargetFilter;

impl CandidateFilter for MediaTargetFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        if rules.is_media_url(candidate.target()) {
            return true;
        }
        if page.first_within(candidate.node, &rules.media_markers).is_some() {
            return true;
        }
        let (ved, img) = &rules.video_thumbnail;
        page.first_within(candidate.node, ved).is_some()
            && page.first_within(candidate.node, img).is_some()
    }
}

/// No target, same-page anchors, script urls, and links back into the
/// engine's own search and redirect endpoints.
pub struct InternalNavigationFilter;

impl CandidateFilter for InternalNavigationFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        let Some(href) = candidate.href.as_deref().map(str::trim) else {
            return true;
        };
        if href.is_empty() || rules.is_internal_url(href) {
            return true;
        }
        match candidate.url.as_deref() {
            Some(url) => rules.is_internal_url(url) || url == page.location().as_str(),
            None => false,
        }
    }
}

/// Local business cards: ratings next to opening hours.
pub struct BusinessListingFilter;

impl CandidateFilter for BusinessListingFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        let text = &candidate.text;
        if rules.has_opening_hours(text) && rules.has_rating(text) {
            return true;
        }
        let parent_text = page
            .parent_element(candidate.node)
            .map(|p| page.text(p))
            .unwrap_or_default();
        rules.has_full_opening_hours(&parent_text)
            || page
                .closest(candidate.node, &rules.business_containers)
                .is_some()
    }
}

pub struct MissingTitleFilter;

impl CandidateFilter for MissingTitleFilter {
    fn rejects(&self, page: &Page, rules: &ClassificationRuleset, candidate: &Candidate) -> bool {
        page.first_within(candidate.node, &rules.title).is_none()
    }
}

pub fn default_filters() -> Vec<Box<dyn CandidateFilter>> {
    vec![
        Box::new(DetachedFilter),
        Box::new(ExcludedContainerFilter),
        Box::new(SuggestionTextFilter),
        Box::new(MediaTargetFilter),
        Box::new(InternalNavigationFilter),
        Box::new(BusinessListingFilter),
        Box::new(MissingTitleFilter),
    ]
}

/// Produces organic result anchors in document order.
///
/// Holds no state between calls: classifying an unchanged page twice gives
/// the same list.
pub struct Classifier<'r> {
    rules: &'r ClassificationRuleset,
    filters: Vec<Box<dyn CandidateFilter>>,
}

impl<'r> Classifier<'r> {
    pub fn new(rules: &'r ClassificationRuleset) -> Self {
        Self::with_filters(rules, default_filters())
    }

    pub fn with_filters(
        rules: &'r ClassificationRuleset,
        filters: Vec<Box<dyn CandidateFilter>>,
    ) -> Self {
        Self { rules, filters }
    }

    pub fn rules(&self) -> &ClassificationRuleset {
        self.rules
    }

    pub fn classify(&self, page: &Page) -> Vec<ResultAnchor> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for node in self.candidates(page) {
            let candidate = Candidate::inspect(page, node);
            if self.rejects(page, &candidate) {
                continue;
            }
            if !seen.insert(candidate.dedup_key()) {
                continue;
            }
            let href = candidate.href.clone().unwrap_or_default();
            results.push(ResultAnchor {
                node,
                url: candidate.url.clone().unwrap_or_else(|| href.clone()),
                href,
                container: self.container_of(page, node),
            });
        }

        log::debug!("classified {} organic results", results.len());
        results
    }

    pub fn rejects(&self, page: &Page, candidate: &Candidate) -> bool {
        self.filters
            .iter()
            .any(|f| f.rejects(page, self.rules, candidate))
    }

    /// Raw candidates from the first rule of the chain that yields any.
    pub fn candidates(&self, page: &Page) -> Vec<NodeId> {
        for (idx, rule) in self.rules.candidate_chain.iter().enumerate() {
            let found = self.apply(page, rule);
            if !found.is_empty() {
                if idx > 0 {
                    log::debug!("candidate rule #{idx} matched {} anchors", found.len());
                }
                return found;
            }
        }
        Vec::new()
    }

    fn apply(&self, page: &Page, rule: &CandidateRule) -> Vec<NodeId> {
        match rule {
            CandidateRule::Anchors { scope, anchors } => {
                page.select_within(self.scope(page, *scope), anchors)
            }
            CandidateRule::Headings {
                scope,
                headings,
                excluded,
                own_host,
            } => page
                .select_within(self.scope(page, *scope), headings)
                .into_iter()
                .filter(|&h| page.is_connected(h) && page.is_rendered(h))
                .filter(|&h| page.closest(h, excluded).is_none())
                .filter_map(|h| {
                    page.closest(h, &self.rules.anchor)
                        .or_else(|| page.first_within(h, &self.rules.anchor))
                })
                .filter(|&a| {
                    page.attr(a, "href")
                        .and_then(|href| page.resolve(href))
                        .is_some_and(|url| !url.contains(own_host))
                })
                .collect(),
            CandidateRule::WrappedHeadings { scope, headings } => page
                .select_within(self.scope(page, *scope), headings)
                .into_iter()
                .filter_map(|h| page.closest(h, &self.rules.anchor))
                .collect(),
        }
    }

    fn scope(&self, page: &Page, scope: Scope) -> Option<NodeId> {
        let search = page.first(&self.rules.search_region);
        match scope {
            Scope::Search => search,
            Scope::Results => match search {
                Some(search) => page
                    .first_within(search, &self.rules.results_region)
                    .or(Some(search)),
                None => page.first(&self.rules.results_region),
            },
        }
    }

    /// Nearest known result wrapper, else the anchor's parent.
    pub fn container_of(&self, page: &Page, anchor: NodeId) -> Option<NodeId> {
        self.rules
            .containers
            .iter()
            .find_map(|sel| page.closest(anchor, sel))
            .or_else(|| page.parent_element(anchor))
    }
}

pub fn classify_organic_results(page: &Page, rules: &ClassificationRuleset) -> Vec<ResultAnchor> {
    Classifier::new(rules).classify(page)
}
