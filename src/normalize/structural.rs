//! Strict XML extraction of RSS items and Atom entries.
//!
//! The document is read with `quick-xml`'s namespace-aware reader into a
//! small element tree, then RSS `channel/item` and Atom `entry` elements
//! are mapped onto [`FeedItem`]s.
//!
//! `quick-xml` is a forgiving tokenizer, so well-formedness is enforced here:
//! a single root element, every element closed, no text outside the root,
//! no undeclared namespace prefixes, only the five predefined XML entities
//! plus numeric references, and no XML-1.0-illegal control characters. Any
//! violation rejects the whole document so the caller can try the next
//! extraction stage.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

use super::FeedItem;
use crate::util::{is_xml_illegal, normalize_whitespace};

const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";

/// Deepest element nesting accepted. Real feeds stay in single digits.
const MAX_DEPTH: usize = 256;

/// Reasons a document is not accepted by the strict parser.
#[derive(Debug, Error)]
enum TreeError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unbound namespace prefix '{0}'")]
    UnknownPrefix(String),

    #[error("Ill-formed document: {0}")]
    IllFormed(&'static str),
}

/// An element with its resolved namespace, attributes, leading text and
/// child elements.
///
/// `text` holds the text and CDATA that come before the first child
/// element; anything after a child is dropped.
#[derive(Debug, Default)]
struct Element {
    namespace: Option<Vec<u8>>,
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn is(&self, namespace: Option<&[u8]>, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == namespace
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, namespace: Option<&[u8]>, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    /// Leading text of the first matching child, empty when absent.
    fn child_text(&self, namespace: Option<&[u8]>, name: &str) -> &str {
        self.child(namespace, name).map_or("", |c| c.text.as_str())
    }
}

/// Extract feed items from a well-formed RSS or Atom document.
///
/// Returns `None` when `text` is not well-formed XML. A well-formed document
/// without items yields `Some(vec![])`.
pub fn extract_structural(text: &str) -> Option<Vec<FeedItem>> {
    let root = match parse_tree(text) {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!(error = %e, "Strict XML parse rejected document");
            return None;
        }
    };

    let mut items = Vec::new();
    collect_rss_items(&root, &mut items);
    collect_atom_entries(&root, &mut items);
    Some(items)
}

fn parse_tree(text: &str) -> Result<Element, TreeError> {
    if text.chars().any(is_xml_illegal) {
        return Err(TreeError::IllFormed("illegal control character"));
    }
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = NsReader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = match resolved {
            ResolveResult::Bound(Namespace(ns)) => Some(ns.to_vec()),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(TreeError::UnknownPrefix(
                    String::from_utf8_lossy(&prefix).into_owned(),
                ))
            }
        };

        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(TreeError::IllFormed("more than one root element"));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(TreeError::IllFormed("elements nested too deeply"));
                }
                stack.push(open_element(&reader, namespace, &start)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(TreeError::IllFormed("more than one root element"));
                }
                let element = open_element(&reader, namespace, &start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or(TreeError::IllFormed("end tag without start tag"))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                let content = t.unescape()?;
                match stack.last_mut() {
                    // Only text before the first child element counts
                    Some(top) if !top.children.is_empty() => {}
                    Some(top) => top.text.push_str(&content),
                    None if content.trim().is_empty() => {}
                    None => return Err(TreeError::IllFormed("text outside the root element")),
                }
            }
            Event::CData(c) => {
                let content = String::from_utf8_lossy(&c);
                match stack.last_mut() {
                    Some(top) if !top.children.is_empty() => {}
                    Some(top) => top.text.push_str(&content),
                    None => return Err(TreeError::IllFormed("CDATA outside the root element")),
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and DOCTYPE
            // carry nothing we compare
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(TreeError::IllFormed("unclosed element at end of input"));
    }
    root.ok_or(TreeError::IllFormed("no root element"))
}

fn open_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<Vec<u8>>,
    start: &BytesStart<'_>,
) -> Result<Element, TreeError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// RSS 2.0: every un-namespaced `item` directly under a `channel`.
fn collect_rss_items(element: &Element, out: &mut Vec<FeedItem>) {
    if element.is(None, "channel") {
        for item in element.children.iter().filter(|c| c.is(None, "item")) {
            out.push(FeedItem {
                title: normalize_whitespace(item.child_text(None, "title")),
                link: normalize_whitespace(item.child_text(None, "link")),
                id: normalize_whitespace(item.child_text(None, "guid")),
                date: normalize_whitespace(item.child_text(None, "pubDate")),
                body: normalize_whitespace(item.child_text(None, "description")),
            });
        }
    }
    for child in &element.children {
        collect_rss_items(child, out);
    }
}

/// Atom: every `entry` in the Atom namespace, at any depth.
fn collect_atom_entries(element: &Element, out: &mut Vec<FeedItem>) {
    if element.is(Some(ATOM_NS), "entry") {
        out.push(atom_entry(element));
    }
    for child in &element.children {
        collect_atom_entries(child, out);
    }
}

fn atom_entry(entry: &Element) -> FeedItem {
    let atom = Some(ATOM_NS);

    // First link whose rel is "alternate"; a missing rel means alternate
    let link = entry
        .children
        .iter()
        .filter(|c| c.is(atom, "link"))
        .find(|c| c.attribute("rel").unwrap_or("alternate") == "alternate")
        .and_then(|c| c.attribute("href"))
        .unwrap_or("");

    let date = non_empty(entry.child_text(atom, "updated"))
        .unwrap_or_else(|| entry.child_text(atom, "published"));
    let body = non_empty(entry.child_text(atom, "summary"))
        .unwrap_or_else(|| entry.child_text(atom, "content"));

    FeedItem {
        title: normalize_whitespace(entry.child_text(atom, "title")),
        link: normalize_whitespace(link),
        id: normalize_whitespace(entry.child_text(atom, "id")),
        date: normalize_whitespace(date),
        body: normalize_whitespace(body),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
