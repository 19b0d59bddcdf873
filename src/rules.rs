//! The site-specific half of the engine.
//!
//! Every selector, phrase and URL fragment that ties classification to one
//! search engine's markup lives here, so markup changes are data edits and
//! never touch the classifier or the refresh loop.

use regex::Regex;
use scraper::Selector;

use crate::dom::selector;
use crate::error::Result;

pub const BADGE_CLASS: &str = "search-counter";
pub const BADGE_URL_ATTR: &str = "data-counter-url";
pub const STYLESHEET_ID: &str = "counter-animations";

/// Where a candidate rule is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `#rso` inside `#search`, or the nearest of the two that exists.
    Results,
    /// `#search`, or the whole document.
    Search,
}

/// One link of the candidate fallback chain.
#[derive(Debug)]
pub enum CandidateRule {
    /// Anchors matched directly.
    Anchors { scope: Scope, anchors: Selector },
    /// Headings walked up to an enclosing anchor, or down to a nested one.
    Headings {
        scope: Scope,
        headings: Selector,
        excluded: Selector,
        own_host: &'static str,
    },
    /// Headings whose ancestor is an anchor; the anchor is the candidate.
    WrappedHeadings { scope: Scope, headings: Selector },
}

/// How a URL fragment is tested against a candidate's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPattern {
    Contains(&'static str),
    ContainsAll(&'static [&'static str]),
    Prefix(&'static str),
}

impl UrlPattern {
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Contains(needle) => url.contains(needle),
            UrlPattern::ContainsAll(needles) => needles.iter().all(|n| url.contains(n)),
            UrlPattern::Prefix(prefix) => url.starts_with(prefix),
        }
    }
}

#[derive(Debug)]
pub struct ClassificationRuleset {
    pub host: Regex,
    pub search_paths: &'static [&'static str],
    pub query_param: &'static str,
    pub search_region: Selector,
    pub results_region: Selector,

    pub candidate_chain: Vec<CandidateRule>,

    /// Ads, knowledge panels, local packs, spelling widgets and carousels.
    pub excluded_containers: Selector,
    /// Descendants that betray a media card (image thumbnails, durations).
    pub media_markers: Selector,
    pub video_thumbnail: (Selector, Selector),
    pub suggestion_phrases: &'static [&'static str],
    pub media_urls: Vec<UrlPattern>,
    pub internal_urls: Vec<UrlPattern>,
    pub business_containers: Selector,
    pub anchor: Selector,
    pub link: Selector,
    pub opening_hours: &'static [&'static str],
    pub rating: Regex,
    pub title: Selector,

    pub containers: Vec<Selector>,
    pub mobile_containers: Vec<Selector>,
    pub mobile_markers: Selector,
    pub mobile_user_agent: Regex,
    pub narrow_viewport: u32,

    pub fallback_headings: Selector,
    pub generic_headings: &'static [&'static str],
    pub min_heading_len: usize,

    pub badge: Selector,
    pub stylesheet: Selector,
    pub mutation_targets: Selector,
    pub search_input: Selector,
}

const EXCLUDED_CONTAINERS: &str = concat!(
    // ads and special modules
    "#topstuff, .kp-blk, .xpdopen, [data-text-ad], [data-overlay-ad], ",
    "[class*=\"commercial-unit-\"], [data-section-id*=\"local\"], ",
    ".local-results-container, .local-result, ",
    // spelling suggestions
    ".card-section, .spell, .spell-orig, [data-spell], .med, ",
    // images, shopping, videos, maps
    ".images_table, .images_area, .isch, .shopping-carousel, .pla-unit, ",
    ".commercial-unit-desktop-top, .mnr-c.xpd, .related-question-pair, ",
    ".video-carousel, .video-section, .video_results, .maps, .maps-results, ",
    ".local-results, .place-result, [aria-label*=\"location\"], ",
    "[data-local-result], [data-ved*=\"CAE\"]"
);

const HEADING_EXCLUDED: &str = "#topstuff, .kp-blk, .xpdopen, [data-text-ad], [data-overlay-ad], [class*=\"commercial-unit-\"]";

impl ClassificationRuleset {
    /// Rules for Google's web results markup.
    pub fn google() -> Result<Self> {
        Ok(Self {
            host: Regex::new(r"(?i)(^|\.)google\.")?,
            search_paths: &["/search", "/"],
            query_param: "q",
            search_region: selector("#search")?,
            results_region: selector("#rso")?,

            candidate_chain: vec![
                CandidateRule::Anchors {
                    scope: Scope::Results,
                    anchors: selector(
                        ".tF2Cxc .yuRUbf > a, .g:not(.g-blk) .yuRUbf > a, .MjjYud .yuRUbf > a",
                    )?,
                },
                CandidateRule::Anchors {
                    scope: Scope::Results,
                    anchors: selector(".yuRUbf > a")?,
                },
                CandidateRule::Anchors {
                    scope: Scope::Search,
                    anchors: selector(
                        "#search .MjjYud .yuRUbf > a, #search .g:not(.g-blk) .yuRUbf > a, #search .tF2Cxc .yuRUbf > a",
                    )?,
                },
                CandidateRule::Headings {
                    scope: Scope::Search,
                    headings: selector("#search h3, #rso h3")?,
                    excluded: selector(HEADING_EXCLUDED)?,
                    own_host: "google.com",
                },
                CandidateRule::WrappedHeadings {
                    scope: Scope::Search,
                    headings: selector("#search a h3, #rso a h3")?,
                },
            ],

            excluded_containers: selector(EXCLUDED_CONTAINERS)?,
            media_markers: selector("img[data-src*=\"encrypted\"], .video-duration")?,
            video_thumbnail: (selector("[data-ved*=\"6ahUKEwi\"]")?, selector("img")?),
            suggestion_phrases: &["did you mean", "showing results for"],
            media_urls: vec![
                UrlPattern::Contains("/imgres?"),
                UrlPattern::Contains("/shopping/"),
                UrlPattern::Contains("/maps/"),
                UrlPattern::Contains("tbm=lcl"),
                UrlPattern::ContainsAll(&["/search?", "tbm=isch"]),
                UrlPattern::Contains("tbm=vid"),
                UrlPattern::Contains("youtube.com/watch"),
                UrlPattern::Contains("youtu.be/"),
            ],
            internal_urls: vec![
                UrlPattern::Contains("google.com/search"),
                UrlPattern::Contains("google.com/url"),
                UrlPattern::Prefix("javascript:"),
                UrlPattern::Prefix("#"),
            ],
            business_containers: selector(".rllt__details, [data-attrid*=\"kc:/location\"]")?,
            anchor: selector("a")?,
            link: selector("a[href]")?,
            opening_hours: &["Open ·", "Closes "],
            rating: Regex::new(r"★|\d+\.\d+\s*\([\d,]+\)")?,
            title: selector("h3, div[role=\"heading\"]")?,

            containers: vec![selector(".yuRUbf")?, selector(".g")?, selector(".MjjYud")?],
            mobile_containers: vec![selector(".xpd")?, selector(".mnr-c")?],
            mobile_markers: selector(".mnr-c, .xpd, [data-ved*=\"mobile\"], body.mobile")?,
            mobile_user_agent: Regex::new(
                r"(?i)Mobile|Android|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini",
            )?,
            narrow_viewport: 768,

            fallback_headings: selector(
                "#search h3, #rso h3, .g h3, .MjjYud h3, .tF2Cxc h3, h3[role=\"heading\"], [role=\"heading\"]",
            )?,
            generic_headings: &[
                "People also ask",
                "Related topics",
                "Did you mean",
                "Showing results for",
                "Including results for",
                "Search instead for",
                "See also",
                "Overview",
                "Images",
                "Videos",
                "Locations",
                "More locations",
            ],
            min_heading_len: 5,

            badge: selector(&format!(".{BADGE_CLASS}"))?,
            stylesheet: selector(&format!("#{STYLESHEET_ID}"))?,
            mutation_targets: selector(
                "#search, #rso, .MjjYud, .g, .tF2Cxc, .yuRUbf, .AaVjTc",
            )?,
            search_input: selector("input[name=\"q\"], textarea[name=\"q\"], #APjFqb")?,
        })
    }

    pub fn is_suggestion(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.suggestion_phrases.iter().any(|p| text.contains(p))
    }

    pub fn is_media_url(&self, url: &str) -> bool {
        self.media_urls.iter().any(|p| p.matches(url))
    }

    pub fn is_internal_url(&self, url: &str) -> bool {
        self.internal_urls.iter().any(|p| p.matches(url))
    }

    pub fn has_opening_hours(&self, text: &str) -> bool {
        self.opening_hours.iter().any(|p| text.contains(p))
    }

    /// Both the "Open ·" and "Closes " halves of an hours line.
    pub fn has_full_opening_hours(&self, text: &str) -> bool {
        self.opening_hours.iter().all(|p| text.contains(p))
    }

    pub fn has_rating(&self, text: &str) -> bool {
        self.rating.is_match(text)
    }

    pub fn is_generic_heading(&self, text: &str) -> bool {
        text.chars().count() < self.min_heading_len
            || self.generic_headings.iter().any(|p| text.contains(p))
    }
}
