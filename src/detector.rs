use url::Url;

use crate::dom::Page;
use crate::rules::ClassificationRuleset;

/// True iff `page` is a web results page for the ruleset's search engine:
/// matching host, a non-empty query, and either a search route or results
/// markup in the document.
pub fn is_qualifying_page(page: &Page, rules: &ClassificationRuleset) -> bool {
    let location = page.location();
    let Some(host) = location.host_str() else {
        return false;
    };
    if !rules.host.is_match(host) {
        return false;
    }
    if search_query(location, rules).is_none_or(|q| q.trim().is_empty()) {
        return false;
    }

    let path = location.path();
    let search_route = rules
        .search_paths
        .iter()
        .any(|p| if *p == "/" { path == "/" } else { path.starts_with(p) });

    search_route
        || page.first(&rules.search_region).is_some()
        || page.first(&rules.results_region).is_some()
}

pub fn search_query(url: &Url, rules: &ClassificationRuleset) -> Option<String> {
    query_param(url, rules.query_param)
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"<html><body><div id="search"><div id="rso"></div></div></body></html>"#;
    const PLAIN: &str = "<html><body><p>hello</p></body></html>";

    fn qualifies(markup: &str, url: &str) -> bool {
        let rules = ClassificationRuleset::google().unwrap();
        let page = Page::parse(markup, url).unwrap();
        is_qualifying_page(&page, &rules)
    }

    #[test]
    fn test_search_route_with_query() {
        assert!(qualifies(PLAIN, "https://www.google.com/search?q=rust"));
        assert!(qualifies(PLAIN, "https://www.google.de/?q=rust"));
    }

    #[test]
    fn test_results_markup_on_other_route() {
        assert!(qualifies(RESULTS, "https://www.google.com/webhp?q=rust"));
        assert!(!qualifies(PLAIN, "https://www.google.com/webhp?q=rust"));
    }

    #[test]
    fn test_requires_non_empty_query() {
        assert!(!qualifies(RESULTS, "https://www.google.com/search"));
        assert!(!qualifies(RESULTS, "https://www.google.com/search?q="));
        assert!(!qualifies(RESULTS, "https://www.google.com/search?q=%20"));
    }

    #[test]
    fn test_other_hosts_are_ignored() {
        assert!(!qualifies(RESULTS, "https://www.bing.com/search?q=rust"));
        assert!(!qualifies(RESULTS, "https://notgoogle.com/search?q=rust"));
    }
}
