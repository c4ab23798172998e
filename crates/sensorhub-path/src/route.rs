use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::path::normalize;
use crate::tree::PathTree;
use crate::validator::validate_route_document;

/// Message type carrying route documents from clients to the server.
pub const ROUTE_UPDATE_TYPE: &str = "sensorhub.route_update";

/// Maps an externally visible destination path to the source that feeds it.
///
/// In a route document the source is either a path string or a transform
/// object whose innermost `child` is the path; the object is kept verbatim
/// as `transform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDirective", into = "RawDirective")]
pub struct RouteDirective {
    pub destination: String,
    pub source: String,
    pub transform: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct RawDirective {
    #[serde(alias = "path")]
    destination: String,
    source: Value,
}

impl RouteDirective {
    pub fn new(destination: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: source.into(),
            transform: None,
        }
    }

    /// Attach a transform object. Its innermost `child` is set to this
    /// directive's source so the route text reads back the same; anything
    /// other than an object is ignored.
    pub fn with_transform(mut self, transform: Value) -> Self {
        self.transform = transform
            .is_object()
            .then(|| bind_innermost_child(transform, &self.source));
        self
    }
}

impl TryFrom<RawDirective> for RouteDirective {
    type Error = String;

    fn try_from(raw: RawDirective) -> std::result::Result<Self, Self::Error> {
        let source = innermost_child(&raw.source)
            .ok_or_else(|| format!("route for {} has no source path", raw.destination))?
            .to_string();
        let transform = raw.source.is_object().then_some(raw.source);
        Ok(Self {
            destination: raw.destination,
            source,
            transform,
        })
    }
}

impl From<RouteDirective> for RawDirective {
    fn from(directive: RouteDirective) -> Self {
        Self {
            destination: directive.destination,
            source: match directive.transform {
                Some(transform) if transform.is_object() => {
                    bind_innermost_child(transform, &directive.source)
                }
                _ => Value::String(directive.source),
            },
        }
    }
}

/// Point the deepest `child` of a transform chain at `source`.
fn bind_innermost_child(mut transform: Value, source: &str) -> Value {
    let mut node = &mut transform;
    while let Some(Value::Object(_)) = node.get("child") {
        node = &mut node["child"];
    }
    if let Value::Object(map) = node {
        map.insert("child".to_string(), Value::String(source.to_string()));
    }
    transform
}

fn innermost_child(source: &Value) -> Option<&str> {
    match source {
        Value::String(path) => Some(path),
        Value::Object(map) => map.get("child").and_then(innermost_child),
        _ => None,
    }
}

/// Parse a route document: a single directive or an array of them.
pub fn parse_routes(text: &str) -> Result<Vec<RouteDirective>> {
    let value: Value = serde_json::from_str(text)?;
    validate_route_document(&value)?;
    let directives = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(directives)
}

/// Insertion-ordered set of route directives, at most one per destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    routes: Vec<RouteDirective>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let mut table = Self::new();
        table.merge(parse_routes(text)?)?;
        Ok(table)
    }

    /// Add a directive. An existing directive for the same destination is
    /// replaced and the new one moves to the end.
    ///
    /// Returns `true` if the destination was not routed before.
    pub fn add(&mut self, mut directive: RouteDirective) -> Result<bool> {
        directive.destination = normalize(&directive.destination)?;
        let previous = self
            .routes
            .iter()
            .position(|r| r.destination == directive.destination);
        let is_new = match previous {
            Some(idx) => {
                self.routes.remove(idx);
                false
            }
            None => true,
        };
        info!(
            destination = %directive.destination,
            source = %directive.source,
            replaced = !is_new,
            "route added"
        );
        self.routes.push(directive);
        Ok(is_new)
    }

    /// Add every directive, returning how many destinations were new.
    pub fn merge(&mut self, directives: impl IntoIterator<Item = RouteDirective>) -> Result<usize> {
        let mut added = 0;
        for directive in directives {
            if self.add(directive)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// The directive routing `destination`, if any.
    pub fn find(&self, destination: &str) -> Option<&RouteDirective> {
        let destination = normalize(destination).ok()?;
        self.routes
            .iter()
            .rev()
            .find(|r| r.destination == destination)
    }

    /// Source path for `destination`, if routed.
    pub fn resolve_source(&self, destination: &str) -> Option<&str> {
        let found = self.find(destination).map(|r| r.source.as_str());
        debug!(destination, source = ?found, "route lookup");
        found
    }

    /// Serialize all directives as a JSON array.
    pub fn routes_as_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.routes)?)
    }

    /// Directives whose source does not resolve in `tree`.
    pub fn unresolved_sources<'a>(&'a self, tree: &PathTree) -> Vec<&'a RouteDirective> {
        self.routes
            .iter()
            .filter(|r| tree.resolve_alias(&r.source).is_err())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDirective> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteDirective;
    type IntoIter = std::slice::Iter<'a, RouteDirective>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::element::PathElement;
    use crate::error::PathError;

    #[test]
    fn latest_directive_wins_and_moves_to_end() {
        let mut table = RouteTable::new();
        assert!(table.add(RouteDirective::new("/me/head", "/a")).unwrap());
        assert!(table.add(RouteDirective::new("/me/hand", "/b")).unwrap());
        assert!(!table.add(RouteDirective::new("me/head/", "/c")).unwrap());

        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve_source("/me/head"), Some("/c"));
        let order: Vec<_> = table.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(order, vec!["/me/hand", "/me/head"]);
    }

    #[test]
    fn unrouted_destination_is_none() {
        let table = RouteTable::new();
        assert_eq!(table.resolve_source("/me/head"), None);
    }

    #[test]
    fn parse_single_and_array() {
        let one = parse_routes(r#"{"destination": "/me/head", "source": "/dev/t/0"}"#).unwrap();
        assert_eq!(one, vec![RouteDirective::new("/me/head", "/dev/t/0")]);

        let many = parse_routes(
            r#"[{"path": "/a", "source": "/x"}, {"destination": "/b", "source": "/y"}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].destination, "/a");
    }

    #[test]
    fn transform_source_keeps_object_and_finds_child() {
        let text = r#"{
            "destination": "/me/head",
            "source": {"rotate": {"axis": "x", "degrees": 90}, "child": {"scale": 2, "child": "/dev/t/0"}}
        }"#;
        let routes = parse_routes(text).unwrap();
        assert_eq!(routes[0].source, "/dev/t/0");
        let transform = routes[0].transform.as_ref().unwrap();
        assert_eq!(transform["rotate"]["degrees"], json!(90));
    }

    #[test]
    fn text_round_trip_preserves_order_and_transform() {
        let mut table = RouteTable::new();
        table
            .add(RouteDirective::new("/b", "/y").with_transform(json!({"child": "/y", "scale": 2})))
            .unwrap();
        table.add(RouteDirective::new("/a", "/x")).unwrap();

        let text = table.routes_as_text().unwrap();
        let reparsed = RouteTable::from_text(&text).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn transform_built_in_code_keeps_its_source() {
        let mut table = RouteTable::new();
        table
            .add(
                RouteDirective::new("/me/head", "/dev/t/0")
                    .with_transform(json!({"rotate": {"degrees": 90}})),
            )
            .unwrap();
        table
            .add(
                RouteDirective::new("/me/hand", "/dev/t/1")
                    .with_transform(json!({"scale": 2, "child": {"offset": 1, "child": "/elsewhere"}})),
            )
            .unwrap();

        let text = table.routes_as_text().unwrap();
        let reparsed = RouteTable::from_text(&text).unwrap();
        assert_eq!(reparsed, table);
        assert_eq!(reparsed.resolve_source("/me/head"), Some("/dev/t/0"));
        assert_eq!(reparsed.resolve_source("/me/hand"), Some("/dev/t/1"));
        let hand = reparsed.find("/me/hand").unwrap().transform.as_ref().unwrap();
        assert_eq!(hand["child"]["child"], json!("/dev/t/1"));
        assert_eq!(hand["child"]["offset"], json!(1));
    }

    #[test]
    fn source_edited_after_transform_is_what_gets_written() {
        let mut directive =
            RouteDirective::new("/me/head", "/dev/t/0").with_transform(json!({"child": "/dev/t/0"}));
        directive.source = "/dev/t/2".to_string();

        let text = serde_json::to_string(&directive).unwrap();
        let reparsed = parse_routes(&text).unwrap();
        assert_eq!(reparsed[0].source, "/dev/t/2");
    }

    #[test]
    fn non_object_transform_is_ignored() {
        let directive = RouteDirective::new("/a", "/x").with_transform(json!("/y"));
        assert_eq!(directive.transform, None);
    }

    #[test]
    fn invalid_documents_rejected() {
        assert!(matches!(
            parse_routes("not json"),
            Err(PathError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_routes(r#"{"destination": "/a"}"#),
            Err(PathError::InvalidRoute(_))
        ));
        assert!(matches!(
            parse_routes(r#"{"destination": "/a", "source": {"scale": 2}}"#),
            Err(PathError::InvalidRoute(_))
        ));
        assert!(matches!(
            parse_routes(r#"[{"destination": "/a", "source": 5}]"#),
            Err(PathError::InvalidRoute(_))
        ));
    }

    #[test]
    fn unresolved_sources_reported() {
        let mut tree = PathTree::new();
        tree.insert("/dev/t/0", PathElement::sensor(0)).unwrap();

        let mut table = RouteTable::new();
        table.add(RouteDirective::new("/me/head", "/dev/t/0")).unwrap();
        table.add(RouteDirective::new("/me/hand", "/dev/missing")).unwrap();

        let missing: Vec<_> = table
            .unresolved_sources(&tree)
            .into_iter()
            .map(|r| r.destination.as_str())
            .collect();
        assert_eq!(missing, vec!["/me/hand"]);
    }
}
