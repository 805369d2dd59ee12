//! Canonical rendering of OpenAPI YAML documents.
//!
//! The document is parsed as generic YAML straight into JSON, the top-level
//! `servers` list is put into a stable order, and the result is rendered as
//! key-sorted, 2-space-indented JSON. A key repeated within one mapping
//! keeps its last value. Every failure returns the input text unchanged.

use serde::de::{
    self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor,
};
use serde_json::{Map, Value as Json};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
enum CanonicalizeError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON render error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Canonicalize an OpenAPI YAML document.
///
/// Fails open: when the text is not YAML, or cannot be represented as JSON,
/// it is returned untouched so the comparison still has something to work
/// with.
///
/// # Examples
///
/// ```
/// use driftfeed::normalize::canonicalize_openapi;
///
/// let a = canonicalize_openapi("servers:\n  - url: b\n  - url: a\n");
/// let b = canonicalize_openapi("servers: [{url: a}, {url: b}]");
/// assert_eq!(a, b);
///
/// assert_eq!(canonicalize_openapi("{ not: [yaml"), "{ not: [yaml");
/// ```
pub fn canonicalize_openapi(text: &str) -> String {
    match try_canonicalize(text) {
        Ok(canonical) => canonical,
        Err(e) => {
            tracing::debug!(error = %e, "OpenAPI canonicalization failed, keeping raw text");
            text.to_string()
        }
    }
}

fn try_canonicalize(text: &str) -> Result<String, CanonicalizeError> {
    let Node(mut doc) = serde_yaml::from_str(text)?;

    if let Some(Json::Array(servers)) = doc.as_object_mut().and_then(|m| m.get_mut("servers")) {
        sort_servers(servers)?;
    }

    let mut rendered = serde_json::to_string_pretty(&doc)?;
    rendered.push('\n');
    Ok(rendered)
}

/// A YAML node read directly as JSON.
///
/// Objects have their keys inserted in sorted order, so the rendering is
/// key-sorted whether or not `serde_json` keeps insertion order. Tags are
/// dropped in favour of the value they wrap.
struct Node(Json);

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor).map(Node)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Json;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Json, E> {
        Ok(Json::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Json, E> {
        Ok(Json::from(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Json, E> {
        Ok(Json::from(u))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Json, E> {
        // NaN and infinities have no JSON form
        Ok(serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Json, E> {
        Ok(Json::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Json, E> {
        Ok(Json::String(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Json, E> {
        Ok(Json::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Json, E> {
        Ok(Json::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Json, D::Error> {
        Node::deserialize(deserializer).map(|Node(v)| v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Json, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(Node(v)) = seq.next_element()? {
            out.push(v);
        }
        Ok(Json::Array(out))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Json, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((Node(key), Node(value))) = map.next_entry()? {
            entries.insert(key_to_string(key).map_err(de::Error::custom)?, value);
        }

        let mut object = Map::new();
        for (key, value) in entries {
            object.insert(key, value);
        }
        Ok(Json::Object(object))
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Json, A::Error> {
        let (_tag, variant): (String, _) = data.variant()?;
        variant.newtype_variant::<Node>().map(|Node(v)| v)
    }
}

/// JSON object keys must be strings; scalars are rendered the way JSON
/// would print them.
fn key_to_string(key: Json) -> Result<String, &'static str> {
    match key {
        Json::String(s) => Ok(s),
        Json::Array(_) | Json::Object(_) => Err("mapping key is not a scalar"),
        scalar => Ok(scalar.to_string()),
    }
}

/// Order servers by `(url, whole entry)` so upstream reshuffles of the
/// server list do not register as changes.
fn sort_servers(servers: &mut [Json]) -> Result<(), CanonicalizeError> {
    let mut keyed = Vec::with_capacity(servers.len());
    for server in servers.iter() {
        let url = match server.get("url") {
            Some(Json::String(s)) => s.clone(),
            Some(other) => serde_json::to_string(other)?,
            None => String::new(),
        };
        keyed.push((url, serde_json::to_string(server)?));
    }

    let mut order: Vec<usize> = (0..servers.len()).collect();
    order.sort_by(|&a, &b| match keyed[a].0.cmp(&keyed[b].0) {
        Ordering::Equal => keyed[a].1.cmp(&keyed[b].1),
        other => other,
    });

    let sorted: Vec<Json> = order.iter().map(|&i| servers[i].clone()).collect();
    servers.clone_from_slice(&sorted);
    Ok(())
}
