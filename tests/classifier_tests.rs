use serp_counter::classifier::{Classifier, ResultAnchor, classify_organic_results};
use serp_counter::dom::Page;
use serp_counter::rules::ClassificationRuleset;

mod test_helpers {
    use super::*;

    pub const SEARCH_URL: &str = "https://www.google.com/search?q=rust";

    pub fn organic(href: &str, title: &str) -> String {
        format!(
            r#"<div class="MjjYud"><div class="g"><div class="tF2Cxc"><div class="yuRUbf"><a href="{href}"><h3>{title}</h3></a></div><div class="VwiC3b">Snippet for {title}</div></div></div></div>"#
        )
    }

    pub fn results_page(results: &str) -> Page {
        let markup = format!(
            r#"<html><head></head><body><div id="search"><div id="rso">{results}</div></div></body></html>"#
        );
        Page::parse(&markup, SEARCH_URL).unwrap()
    }

    pub fn urls(anchors: &[ResultAnchor]) -> Vec<String> {
        anchors.iter().map(|a| a.url.clone()).collect()
    }

    pub fn classify(page: &Page) -> Vec<String> {
        let rules = ClassificationRuleset::google().unwrap();
        urls(&classify_organic_results(page, &rules))
    }
}

use test_helpers::*;

#[cfg(test)]
mod ordering {
    use super::*;

    #[test]
    fn test_document_order_is_kept() {
        let page = results_page(
            &[
                organic("https://one.example/", "First result"),
                organic("https://two.example/", "Second result"),
                organic("https://three.example/", "Third result"),
            ]
            .concat(),
        );
        assert_eq!(
            classify(&page),
            vec![
                "https://one.example/",
                "https://two.example/",
                "https://three.example/"
            ]
        );
    }

    #[test]
    fn test_repeated_classification_is_stable() {
        let rules = ClassificationRuleset::google().unwrap();
        let page = results_page(
            &[
                organic("https://one.example/", "First result"),
                organic("https://www.youtube.com/watch?v=x", "Video result"),
                organic("https://two.example/", "Second result"),
            ]
            .concat(),
        );
        let classifier = Classifier::new(&rules);
        let first = classifier.classify(&page);
        let second = classifier.classify(&page);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_relative_hrefs_resolve_against_location() {
        let page = results_page(&organic("/relative/path", "Relative result"));
        assert_eq!(classify(&page), vec!["https://www.google.com/relative/path"]);
    }
}

#[cfg(test)]
mod exclusions {
    use super::*;

    #[test]
    fn test_spelling_suggestion_text() {
        let page = results_page(
            &[
                r#"<div class="g"><div class="yuRUbf"><a href="https://spell.example/"><h3>Did you mean: rust lang</h3></a></div></div>"#.to_string(),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_showing_results_for_in_link_text() {
        let page = results_page(
            &[
                r#"<div class="g"><div class="yuRUbf"><a href="https://x.example/"><span>Showing results for rust</span><h3>Rust</h3></a></div></div>"#.to_string(),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_video_hosting_targets() {
        let page = results_page(
            &[
                organic("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "A video"),
                organic("https://youtu.be/dQw4w9WgXcQ", "Another video"),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_image_map_and_shopping_targets() {
        let page = results_page(
            &[
                organic("https://www.google.com/imgres?imgurl=x", "Image"),
                organic("https://www.google.com/maps/place/x", "Map"),
                organic("https://www.google.com/shopping/product/1", "Product"),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_sponsored_container() {
        let page = results_page(
            &[
                format!(r#"<div data-text-ad="1">{}</div>"#, organic("https://ad.example/", "Sponsored result")),
                format!(r#"<div class="commercial-unit-desktop-rhs">{}</div>"#, organic("https://shop.example/", "Shopping unit")),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_knowledge_panel_and_local_pack() {
        let page = results_page(
            &[
                format!(r#"<div class="kp-blk">{}</div>"#, organic("https://panel.example/", "Panel link")),
                format!(r#"<div data-section-id="localpack">{}</div>"#, organic("https://local.example/", "Local link")),
                format!(r#"<div class="related-question-pair">{}</div>"#, organic("https://paa.example/", "Question link")),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_internal_navigation() {
        let page = results_page(
            &[
                organic("https://www.google.com/search?q=rust+book", "Related search"),
                organic("https://www.google.com/url?q=https://x.example/", "Redirect"),
                organic("javascript:void(0)", "Script link"),
                organic("#section", "Same page"),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_business_listing() {
        let page = results_page(
            &[
                r#"<div class="g"><div class="yuRUbf"><a href="https://pizza.example/"><h3>Joe's Pizza</h3><span>4.6 (1,024) · Open · Closes 11 PM</span></a></div></div>"#.to_string(),
                r#"<div class="g"><div class="yuRUbf"><a href="https://cafe.example/"><h3>Corner Cafe</h3></a><span>Open · Closes 6 PM</span></div></div>"#.to_string(),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_hidden_and_titleless_links() {
        let page = results_page(
            &[
                format!(r#"<div style="display: none">{}</div>"#, organic("https://hidden.example/", "Hidden result")),
                r#"<div class="g"><div class="yuRUbf"><a href="https://notitle.example/"><span>No heading here</span></a></div></div>"#.to_string(),
                organic("https://kept.example/", "Kept result"),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://kept.example/"]);
    }

    #[test]
    fn test_duplicate_href_yields_one_entry() {
        let page = results_page(
            &[
                organic("https://dup.example/", "First copy"),
                organic("https://dup.example/", "Second copy"),
            ]
            .concat(),
        );
        let rules = ClassificationRuleset::google().unwrap();
        let anchors = classify_organic_results(&page, &rules);
        assert_eq!(anchors.len(), 1);
        assert!(page.text(anchors[0].node).contains("First copy"));
    }
}

#[cfg(test)]
mod fallback_chain {
    use super::*;

    #[test]
    fn test_loose_title_wrapper() {
        // No .g / .tF2Cxc / .MjjYud ancestors: only the generic wrapper matches.
        let page = results_page(
            r#"<div class="yuRUbf"><a href="https://loose.example/"><h3>Loose result</h3></a></div>"#,
        );
        assert_eq!(classify(&page), vec!["https://loose.example/"]);
    }

    #[test]
    fn test_headings_inside_links() {
        let page = results_page(
            r#"<div class="xpd"><a href="https://mobile.example/"><div><h3>Mobile layout result</h3></div></a></div>
               <div class="kp-blk"><a href="https://panel.example/"><h3>Panel heading</h3></a></div>
               <div><a href="https://www.google.com/search?q=more"><h3>More searches</h3></a></div>"#,
        );
        assert_eq!(classify(&page), vec!["https://mobile.example/"]);
    }

    #[test]
    fn test_heading_with_nested_link() {
        let page = results_page(
            r#"<div><h3><a href="https://nested.example/"><span>Nested</span></a></h3></div>"#,
        );
        let rules = ClassificationRuleset::google().unwrap();
        let classifier = Classifier::new(&rules);
        // The nested link is a candidate, but it carries no title of its own.
        assert_eq!(classifier.candidates(&page).len(), 1);
        assert!(classifier.classify(&page).is_empty());
    }

    #[test]
    fn test_primary_rule_wins_over_fallbacks() {
        let page = results_page(
            &[
                organic("https://primary.example/", "Primary result"),
                r#"<div><a href="https://heading-only.example/"><h3>Heading only result</h3></a></div>"#.to_string(),
            ]
            .concat(),
        );
        assert_eq!(classify(&page), vec!["https://primary.example/"]);
    }

    #[test]
    fn test_no_results_region() {
        let page = Page::parse(
            r#"<html><body><a href="https://x.example/"><h3>Outside results</h3></a></body></html>"#,
            SEARCH_URL,
        )
        .unwrap();
        assert!(classify(&page).is_empty());
    }
}
