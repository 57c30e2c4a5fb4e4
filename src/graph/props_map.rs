//! Distinct property values observed among rendered objects
//!
//! Drives legends and color palettes. A property stops being tracked once it
//! shows a value that cannot sensibly be colored (an array, or a string of
//! [`MAX_TRACKED_LENGTH`] characters or more).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::graph::types::{ObjectKind, display_key, resolve_path};

/// Strings at least this long make a property untrackable
pub const MAX_TRACKED_LENGTH: usize = 50;

/// Sentinel recorded for objects that lack a tracked property
pub const NULL_KEY: &str = "null";

/// Observed values of one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropValues {
    Tracked(Vec<String>),
    /// Too many distinct values to be useful
    Untracked,
}

impl PropValues {
    pub fn values(&self) -> Option<&[String]> {
        match self {
            PropValues::Tracked(values) => Some(values),
            PropValues::Untracked => None,
        }
    }
}

/// Per-session index of observed property values, bucketed by object kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropsMap {
    #[serde(rename = "nodeProps")]
    node_props: BTreeMap<String, PropValues>,
    #[serde(rename = "linkProps")]
    link_props: BTreeMap<String, PropValues>,
}

impl PropsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_node(&mut self, data: &Map<String, Value>, props: &[String]) {
        load_object(&mut self.node_props, data, props);
    }

    pub fn load_link(&mut self, data: &Map<String, Value>, props: &[String]) {
        load_object(&mut self.link_props, data, props);
    }

    /// Rebuild the node bucket from the nodes that remain rendered
    ///
    /// Values cannot simply be decremented on removal because other objects
    /// may share them.
    pub fn recompute_nodes<'a, I>(&mut self, remaining: I, props: &[String])
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        self.node_props.clear();
        for data in remaining {
            load_object(&mut self.node_props, data, props);
        }
    }

    /// Rebuild the link bucket from the links that remain rendered
    pub fn recompute_links<'a, I>(&mut self, remaining: I, props: &[String])
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        self.link_props.clear();
        for data in remaining {
            load_object(&mut self.link_props, data, props);
        }
    }

    pub fn get(&self, kind: ObjectKind, prop: &str) -> Option<&PropValues> {
        self.bucket(kind).get(prop)
    }

    pub fn bucket(&self, kind: ObjectKind) -> &BTreeMap<String, PropValues> {
        match kind {
            ObjectKind::Node => &self.node_props,
            ObjectKind::Link => &self.link_props,
        }
    }
}

fn load_object(bucket: &mut BTreeMap<String, PropValues>, data: &Map<String, Value>, props: &[String]) {
    for prop in props {
        match resolve_path(data, prop) {
            Some(value) => {
                if bucket.get(prop) == Some(&PropValues::Untracked) {
                    continue;
                }
                let too_long = value
                    .as_str()
                    .is_some_and(|s| s.chars().count() >= MAX_TRACKED_LENGTH);
                if value.is_array() || too_long {
                    bucket.insert(prop.clone(), PropValues::Untracked);
                    continue;
                }
                let Some(key) = display_key(value) else {
                    continue;
                };
                if let PropValues::Tracked(values) = bucket
                    .entry(prop.clone())
                    .or_insert_with(|| PropValues::Tracked(Vec::new()))
                {
                    if !values.contains(&key) {
                        values.push(key);
                    }
                }
            }
            None => {
                if let Some(PropValues::Tracked(values)) = bucket.get_mut(prop) {
                    if !values.iter().any(|v| v == NULL_KEY) {
                        values.push(NULL_KEY.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props() -> Vec<String> {
        ["@class", "name", "source.name", "subsets"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn load_node_tracks_distinct_values() {
        let mut map = PropsMap::new();
        map.load_node(&object(json!({"@class": "Disease", "name": "cancer"})), &props());
        map.load_node(&object(json!({"@class": "Disease", "name": "glioma"})), &props());
        assert_eq!(
            map.get(ObjectKind::Node, "@class"),
            Some(&PropValues::Tracked(vec!["Disease".to_string()]))
        );
        assert_eq!(
            map.get(ObjectKind::Node, "name").and_then(PropValues::values),
            Some(&["cancer".to_string(), "glioma".to_string()][..])
        );
        assert!(map.get(ObjectKind::Link, "name").is_none());
    }

    #[test]
    fn missing_values_add_null_sentinel_once_tracked() {
        let mut map = PropsMap::new();
        map.load_node(&object(json!({"@class": "Disease"})), &props());
        // not yet tracked, so no sentinel
        assert!(map.get(ObjectKind::Node, "name").is_none());
        map.load_node(&object(json!({"@class": "Disease", "name": "cancer"})), &props());
        map.load_node(&object(json!({"@class": "Disease"})), &props());
        map.load_node(&object(json!({"@class": "Disease"})), &props());
        assert_eq!(
            map.get(ObjectKind::Node, "name"),
            Some(&PropValues::Tracked(vec!["cancer".to_string(), NULL_KEY.to_string()]))
        );
    }

    #[test]
    fn arrays_and_long_strings_stop_tracking() {
        let mut map = PropsMap::new();
        map.load_node(&object(json!({"subsets": "one"})), &props());
        map.load_node(&object(json!({"subsets": ["a", "b"]})), &props());
        assert_eq!(map.get(ObjectKind::Node, "subsets"), Some(&PropValues::Untracked));
        map.load_node(&object(json!({"subsets": "two"})), &props());
        assert_eq!(map.get(ObjectKind::Node, "subsets"), Some(&PropValues::Untracked));

        map.load_node(&object(json!({"name": "x".repeat(MAX_TRACKED_LENGTH)})), &props());
        assert_eq!(map.get(ObjectKind::Node, "name"), Some(&PropValues::Untracked));

        let mut short = PropsMap::new();
        short.load_node(&object(json!({"name": "x".repeat(MAX_TRACKED_LENGTH - 1)})), &props());
        assert!(matches!(short.get(ObjectKind::Node, "name"), Some(PropValues::Tracked(_))));
    }

    #[test]
    fn dotted_paths_use_linked_record_names() {
        let mut map = PropsMap::new();
        map.load_link(
            &object(json!({"@class": "AliasOf", "source": {"@rid": "#1:1", "name": "doid"}})),
            &props(),
        );
        assert_eq!(
            map.get(ObjectKind::Link, "source.name"),
            Some(&PropValues::Tracked(vec!["doid".to_string()]))
        );
    }

    #[test]
    fn load_then_recompute_restores_previous_state() {
        let siblings = [
            object(json!({"@class": "Disease", "name": "cancer", "source": {"name": "doid"}})),
            object(json!({"@class": "Therapy", "name": "drug"})),
        ];
        let extra = object(json!({"@class": "Feature", "name": "kras", "source": {"name": "hgnc"}}));

        let mut map = PropsMap::new();
        for sibling in &siblings {
            map.load_node(sibling, &props());
        }
        let before = map.clone();

        map.load_node(&extra, &props());
        assert_ne!(map, before);

        map.recompute_nodes(siblings.iter(), &props());
        assert_eq!(map, before);
    }

    #[test]
    fn serializes_untracked_as_null() {
        let mut map = PropsMap::new();
        map.load_node(&object(json!({"@class": "Disease", "subsets": ["a"]})), &props());
        insta::assert_json_snapshot!(map, @r###"
        {
          "nodeProps": {
            "@class": [
              "Disease"
            ],
            "subsets": null
          },
          "linkProps": {}
        }
        "###);
    }
}
