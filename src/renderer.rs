use ego_tree::NodeId;

use crate::classifier::{Candidate, Classifier, ResultAnchor};
use crate::counter::CounterState;
use crate::dom::{Page, escape_attr};
use crate::rules::{BADGE_CLASS, BADGE_URL_ATTR, ClassificationRuleset, STYLESHEET_ID};

/// How badges are placed. Both are valid renderings of the same label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Small pill pinned to the top-right corner of the result.
    Corner,
    /// Larger numeral for narrow, touch layouts.
    Inline,
}

/// Mobile user agent, or a narrow viewport showing mobile result markup.
pub fn detect_layout_mode(page: &Page, rules: &ClassificationRuleset) -> LayoutMode {
    let mobile_agent = rules.mobile_user_agent.is_match(page.user_agent());
    let narrow = page.viewport_width() <= rules.narrow_viewport;
    let mobile_markup = page.first(&rules.mobile_markers).is_some();
    if mobile_agent || (narrow && mobile_markup) {
        LayoutMode::Inline
    } else {
        LayoutMode::Corner
    }
}

const BADGE_BASE_STYLE: &str = concat!(
    "position: absolute; ",
    "background: linear-gradient(135deg, #ff6b6b 0%, #ee5a24 100%); ",
    "color: #ffffff; border: 2px solid rgba(255,255,255,0.3); border-radius: 20px; ",
    "line-height: 1.3; pointer-events: none; z-index: 2147483647; font-weight: 700; ",
    "font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; ",
    "box-shadow: 0 4px 12px rgba(238, 90, 36, 0.4), 0 2px 4px rgba(0,0,0,0.1); ",
    "text-shadow: 0 1px 2px rgba(0,0,0,0.4); letter-spacing: 0.5px; text-align: center; ",
    "min-width: 24px; animation: counterPulse 0.6s ease-out"
);

const CORNER_PLACEMENT: &str = "right: 0; top: -8px; padding: 3px 8px; font-size: 10px";
const INLINE_PLACEMENT: &str = "right: 8px; top: 4px; padding: 4px 10px; font-size: 12px";

const HEADING_BADGE_STYLE: &str = concat!(
    "display: inline-block !important; margin-left: 8px !important; ",
    "background: linear-gradient(135deg, #ff6b6b 0%, #ee5a24 100%) !important; ",
    "color: #ffffff !important; border-radius: 20px !important; padding: 4px 10px !important; ",
    "font-size: 12px !important; pointer-events: none !important; font-weight: 700 !important; ",
    "z-index: 2147483647 !important; animation: counterPulse 0.6s ease-out !important"
);

const ANIMATIONS: &str = r#"
@keyframes counterPulse {
  0% { transform: scale(0.8); opacity: 0; }
  50% { transform: scale(1.1); opacity: 0.8; }
  100% { transform: scale(1); opacity: 1; }
}
.search-counter:hover {
  transform: scale(1.05) !important;
}
"#;

fn badge_markup(label: u64, url: &str, style: &str) -> String {
    format!(
        r#"<span class="{BADGE_CLASS}" {BADGE_URL_ATTR}="{}" style="{style}">{label}</span>"#,
        escape_attr(url)
    )
}

pub struct OverlayRenderer<'r> {
    rules: &'r ClassificationRuleset,
}

impl<'r> OverlayRenderer<'r> {
    pub fn new(rules: &'r ClassificationRuleset) -> Self {
        Self { rules }
    }

    /// Attaches a badge with `label` to the anchor's container. Returns the
    /// badge node, or `None` when there is no container or it already holds a
    /// badge.
    pub fn render(
        &self,
        page: &mut Page,
        anchor: &ResultAnchor,
        label: u64,
        layout: LayoutMode,
    ) -> Option<NodeId> {
        let Some(mut container) = anchor.container.filter(|&c| page.is_connected(c)) else {
            log::debug!("no container for {}", anchor.url);
            return None;
        };
        if layout == LayoutMode::Inline {
            if let Some(mobile) = self
                .rules
                .mobile_containers
                .iter()
                .find_map(|sel| page.closest(anchor.node, sel))
            {
                container = mobile;
            }
        }

        if page.first_within(container, &self.rules.badge).is_some() {
            return None;
        }

        if page.computed_position(container) == "static"
            && !page.set_style_property(container, "position", "relative")
        {
            log::debug!("could not position container of {}", anchor.url);
        }

        self.ensure_stylesheet(page);

        let placement = match layout {
            LayoutMode::Corner => CORNER_PLACEMENT,
            LayoutMode::Inline => INLINE_PLACEMENT,
        };
        let style = format!("{BADGE_BASE_STYLE}; {placement}");
        page.append_html(container, &badge_markup(label, &anchor.url, &style))
            .into_iter()
            .next()
    }

    /// Last resort when no container accepted a badge: label qualifying
    /// headings directly. Each heading's link goes through the classifier's
    /// exclusion filters on its own. Returns the number of badges added.
    pub fn render_heading_fallback(
        &self,
        page: &mut Page,
        classifier: &Classifier<'_>,
        counter: &mut CounterState,
    ) -> usize {
        let mut added = 0;
        for heading in page.select(&self.rules.fallback_headings) {
            let Some(url) = self.heading_target(page, classifier, heading) else {
                continue;
            };
            if counter.has(&url) {
                continue;
            }

            self.ensure_stylesheet(page);
            let markup = badge_markup(counter.cursor(), &url, HEADING_BADGE_STYLE);
            if page.append_html(heading, &markup).is_empty() {
                continue;
            }
            counter.next_label();
            counter.mark_labeled(&url);
            added += 1;
        }
        if added > 0 {
            log::info!("heading fallback labeled {added} results");
        }
        added
    }

    fn heading_target(
        &self,
        page: &Page,
        classifier: &Classifier<'_>,
        heading: NodeId,
    ) -> Option<String> {
        if !page.is_connected(heading) || !page.is_rendered(heading) {
            return None;
        }
        if page.first_within(heading, &self.rules.badge).is_some() {
            return None;
        }
        let text = page.text(heading);
        let text = text.trim();
        if self.rules.is_generic_heading(text)
            || self.rules.has_opening_hours(text)
            || self.rules.has_rating(text)
        {
            return None;
        }

        let link = page.closest(heading, &self.rules.anchor)?;
        let candidate = Candidate::inspect(page, link);
        if classifier.rejects(page, &candidate) {
            return None;
        }
        candidate.url.or(candidate.href)
    }

    /// Injects the badge animation stylesheet once per document.
    pub fn ensure_stylesheet(&self, page: &mut Page) {
        if page.first(&self.rules.stylesheet).is_some() {
            return;
        }
        let Some(target) = page.head().or_else(|| page.body()) else {
            log::warn!("document has neither head nor body, skipping stylesheet");
            return;
        };
        page.append_html(
            target,
            &format!(r#"<style id="{STYLESHEET_ID}">{ANIMATIONS}</style>"#),
        );
    }
}
