use ego_tree::{NodeId, NodeRef, Tree};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{CounterError, Result};

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CounterError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| CounterError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// A node inserted while the observer was connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub added: NodeId,
}

/// A live results page: the parsed document plus everything the engine reads
/// from the browsing context (location, viewport width, user agent).
///
/// The tree is mutated in place. Detached nodes stay in the arena but are no
/// longer reachable from the root, which is what [`Page::is_connected`] checks.
pub struct Page {
    html: Html,
    location: Url,
    viewport_width: u32,
    user_agent: String,
    observing: bool,
    mutations: Vec<Mutation>,
}

impl Page {
    pub fn parse(markup: &str, location: &str) -> Result<Page> {
        Ok(Page {
            html: Html::parse_document(markup),
            location: parse_url(location)?,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            observing: false,
            mutations: Vec::new(),
        })
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn navigate(&mut self, location: &str) -> Result<()> {
        self.location = parse_url(location)?;
        Ok(())
    }

    /// Resolves `href` the way `HTMLAnchorElement.href` does.
    pub fn resolve(&self, href: &str) -> Option<String> {
        self.location.join(href.trim()).ok().map(String::from)
    }

    pub fn viewport_width(&self) -> u32 {
        self.viewport_width
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.viewport_width = width;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn set_user_agent(&mut self, user_agent: &str) {
        self.user_agent = user_agent.to_string();
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn to_html(&self) -> String {
        self.html.html()
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.html.select(selector).map(|el| el.id()).collect()
    }

    /// Like `querySelectorAll` on `scope`, or on the whole document when the
    /// scope is gone.
    pub fn select_within(&self, scope: Option<NodeId>, selector: &Selector) -> Vec<NodeId> {
        match scope.and_then(|id| self.element(id)) {
            Some(el) => el.select(selector).map(|el| el.id()).collect(),
            None => self.select(selector),
        }
    }

    pub fn first(&self, selector: &Selector) -> Option<NodeId> {
        self.html.select(selector).next().map(|el| el.id())
    }

    pub fn first_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.element(scope)?
            .select(selector)
            .next()
            .map(|el| el.id())
    }

    pub fn count(&self, selector: &Selector) -> usize {
        self.html.select(selector).count()
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.element(id).is_some_and(|el| selector.matches(&el))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let node = self.html.tree.get(id)?;
        std::iter::once(node)
            .chain(node.ancestors())
            .filter_map(ElementRef::wrap)
            .find(|el| selector.matches(el))
            .map(|el| el.id())
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.html
            .tree
            .get(id)?
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| el.id())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.value().attr(name)
    }

    pub fn text(&self, id: NodeId) -> String {
        self.element(id)
            .map(|el| el.text().collect())
            .unwrap_or_default()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.named_child_of_root("body")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.named_child_of_root("head")
    }

    fn named_child_of_root(&self, name: &str) -> Option<NodeId> {
        self.html
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == name)
            .map(|el| el.id())
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        match self.html.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    /// Static stand-in for a non-null `offsetParent`: nothing on the ancestor
    /// chain is `hidden`, `display: none` or `visibility: hidden`.
    pub fn is_rendered(&self, id: NodeId) -> bool {
        let Some(node) = self.html.tree.get(id) else {
            return false;
        };
        !std::iter::once(node)
            .chain(node.ancestors())
            .filter_map(ElementRef::wrap)
            .any(|el| hides(el.value()))
    }

    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        self.attr(id, "style")
            .and_then(|style| style_property(style, property))
    }

    pub fn computed_position(&self, id: NodeId) -> String {
        self.style_property(id, "position")
            .unwrap_or_else(|| "static".to_string())
    }

    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) -> bool {
        let mut declarations: Vec<(String, String)> = self
            .attr(id, "style")
            .map(parse_declarations)
            .unwrap_or_default()
            .into_iter()
            .filter(|(name, _)| name != property)
            .collect();
        declarations.push((property.to_string(), value.to_string()));
        let style = declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attr(id, "style", &style)
    }

    /// Replaces (or adds) one attribute. Element attributes are immutable in
    /// the parsed tree, so the element value is rebuilt from markup and swapped
    /// in while its children stay in place. Works for any tag the tree builder
    /// can place, table parts and document sections included.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let Some(el) = self.element(id) else {
            return false;
        };
        let tag = el.value().name().to_string();
        let mut attrs: Vec<(String, String)> = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }

        match (rebuild_element(&tag, &attrs), self.html.tree.get_mut(id)) {
            (Some(element), Some(mut node)) => {
                *node.value() = Node::Element(element);
                true
            }
            _ => {
                log::debug!("cannot rewrite attributes of <{tag}>");
                false
            }
        }
    }

    /// Parses `fragment` and appends its top-level nodes under `parent`.
    /// Returns the ids of the appended top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, fragment: &str) -> Vec<NodeId> {
        let parsed = Html::parse_fragment(fragment);
        let mut added = Vec::new();
        for child in parsed.root_element().children() {
            let Some(id) = self
                .html
                .tree
                .get_mut(parent)
                .map(|mut p| p.append(child.value().clone()).id())
            else {
                break;
            };
            copy_children(&mut self.html.tree, id, child);
            added.push(id);
        }
        if self.observing {
            self.mutations
                .extend(added.iter().map(|&added| Mutation { added }));
        }
        added
    }

    pub fn append_html_to(&mut self, parent_css: &str, fragment: &str) -> Result<Vec<NodeId>> {
        let parent = self
            .first(&selector(parent_css)?)
            .ok_or_else(|| CounterError::MissingElement(parent_css.to_string()))?;
        Ok(self.append_html(parent, fragment))
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.html.tree.root().id() {
            return false;
        }
        match self.html.tree.get_mut(id) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    pub fn remove_matching(&mut self, selector: &Selector) -> usize {
        let ids = self.select(selector);
        ids.into_iter().filter(|&id| self.remove(id)).count()
    }

    pub fn search_input_value(&self, inputs: &Selector) -> Option<String> {
        let el = self.html.select(inputs).next()?;
        Some(match el.value().attr("value") {
            Some(value) => value.to_string(),
            None if el.value().name() == "textarea" => el.text().collect(),
            None => String::new(),
        })
    }

    pub fn set_search_input(&mut self, inputs: &Selector, value: &str) -> bool {
        match self.first(inputs) {
            Some(id) => self.set_attr(id, "value", value),
            None => false,
        }
    }

    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stops recording and drops records not yet taken.
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.mutations.clear();
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }
}

fn copy_children(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) {
    for child in source.children() {
        let Some(id) = tree
            .get_mut(parent)
            .map(|mut p| p.append(child.value().clone()).id())
        else {
            return;
        };
        copy_children(tree, id, child);
    }
}

fn hides(element: &Element) -> bool {
    if element.attr("hidden").is_some() {
        return true;
    }
    if element.name() == "input"
        && element
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    let Some(style) = element.attr("style") else {
        return false;
    };
    style_property(style, "display").as_deref() == Some("none")
        || style_property(style, "visibility").as_deref() == Some("hidden")
}

fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().to_string()))
        })
        .collect()
}

/// Last declaration wins, `!important` dropped, value lowercased.
pub fn style_property(style: &str, property: &str) -> Option<String> {
    parse_declarations(style)
        .into_iter()
        .rev()
        .find(|(name, _)| name == property)
        .map(|(_, value)| {
            value
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase()
        })
}

pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Parses `<tag attrs>` inside the smallest document where the tree builder
/// keeps that tag, then returns its element value.
fn rebuild_element(tag: &str, attrs: &[(String, String)]) -> Option<Element> {
    let element = format!("<{tag}{}></{tag}>", render_attrs(attrs));
    let markup = match tag {
        "html" => element,
        "head" | "body" => format!("<html>{element}</html>"),
        "caption" | "colgroup" | "thead" | "tbody" | "tfoot" => {
            format!("<table>{element}</table>")
        }
        "col" => format!("<table><colgroup>{element}</colgroup></table>"),
        "tr" => format!("<table><tbody>{element}</tbody></table>"),
        "td" | "th" => format!("<table><tbody><tr>{element}</tr></tbody></table>"),
        _ => format!("<html><body>{element}</body></html>"),
    };
    let document = Html::parse_document(&markup);
    let rebuilt = document
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
        .map(|el| el.value().clone());
    rebuilt
}

fn render_attrs(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!(" {k}=\"{}\"", escape_attr(v)))
        .collect()
}
