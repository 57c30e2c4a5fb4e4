//! Display options: labels, coloring and simulation settings

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::props_map::{NULL_KEY, PropsMap};
use crate::graph::types::{GraphObject, ObjectKind, display_key, resolve_path};

/// Fixed palette used while the number of keys fits in it
pub const PALETTE: [&str; 12] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#393b79", "#637939",
];

/// Color of objects whose key has no palette entry
pub const DEFAULT_COLOR: &str = "#999999";

/// `n` distinct colors: the fixed palette, or evenly spaced hues beyond it
pub fn palette(n: usize) -> Vec<String> {
    if n <= PALETTE.len() {
        return PALETTE[..n].iter().map(|c| c.to_string()).collect();
    }
    (0..n)
        .map(|i| format!("hsl({}, 65%, 50%)", i * 360 / n))
        .collect()
}

/// Force simulation parameters forwarded to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationSettings {
    /// Repulsion strength (negative = repulsion)
    pub charge_strength: f64,
    /// Link distance (rest length)
    pub link_distance: f64,
    pub link_strength: f64,
    pub collision_radius: f64,
    /// Grow the collision radius to fit node labels
    pub auto_collision_radius: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            charge_strength: -100.0,
            link_distance: 80.0,
            link_strength: 1.0,
            collision_radius: 16.0,
            auto_collision_radius: false,
        }
    }
}

/// Options controlling how graph objects are labelled and colored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
    /// Property path used as node label
    pub node_label_prop: Option<String>,
    pub link_label_prop: Option<String>,
    /// Property path whose values pick node colors
    pub node_color_prop: Option<String>,
    pub link_color_prop: Option<String>,
    pub default_color: String,
    pub simulation: SimulationSettings,
    /// Palettes computed by [`GraphOptions::load_colors`]
    #[serde(skip)]
    node_colors: BTreeMap<String, String>,
    #[serde(skip)]
    link_colors: BTreeMap<String, String>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            node_label_prop: Some("displayName".to_string()),
            link_label_prop: Some("@class".to_string()),
            node_color_prop: Some("@class".to_string()),
            link_color_prop: Some("@class".to_string()),
            default_color: DEFAULT_COLOR.to_string(),
            simulation: SimulationSettings::default(),
            node_colors: BTreeMap::new(),
            link_colors: BTreeMap::new(),
        }
    }
}

impl GraphOptions {
    fn color_prop(&self, kind: ObjectKind) -> Option<&str> {
        match kind {
            ObjectKind::Node => self.node_color_prop.as_deref(),
            ObjectKind::Link => self.link_color_prop.as_deref(),
        }
    }

    fn label_prop(&self, kind: ObjectKind) -> Option<&str> {
        match kind {
            ObjectKind::Node => self.node_label_prop.as_deref(),
            ObjectKind::Link => self.link_label_prop.as_deref(),
        }
    }

    fn colors_mut(&mut self, kind: ObjectKind) -> &mut BTreeMap<String, String> {
        match kind {
            ObjectKind::Node => &mut self.node_colors,
            ObjectKind::Link => &mut self.link_colors,
        }
    }

    /// Palette for the current color property, key to color
    pub fn colors(&self, kind: ObjectKind) -> &BTreeMap<String, String> {
        match kind {
            ObjectKind::Node => &self.node_colors,
            ObjectKind::Link => &self.link_colors,
        }
    }

    /// Recompute both palettes from the values observed so far
    ///
    /// An untracked color property gets an empty palette, so every object
    /// falls back to the default color.
    pub fn load_colors(&mut self, props_map: &PropsMap) {
        for kind in [ObjectKind::Node, ObjectKind::Link] {
            let keys: Vec<String> = self
                .color_prop(kind)
                .and_then(|prop| props_map.get(kind, prop))
                .and_then(|values| values.values())
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            let colors = palette(keys.len());
            let target = self.colors_mut(kind);
            target.clear();
            target.extend(keys.into_iter().zip(colors));
        }
    }

    /// Palette key of an object: its color property value, or `"null"`
    pub fn color_key<O: GraphObject + ?Sized>(&self, object: &O, kind: ObjectKind) -> String {
        self.color_prop(kind)
            .and_then(|prop| resolve_path(object.data(), prop))
            .and_then(display_key)
            .unwrap_or_else(|| NULL_KEY.to_string())
    }

    pub fn get_color<O: GraphObject + ?Sized>(&self, object: &O, kind: ObjectKind) -> String {
        let key = self.color_key(object, kind);
        self.colors(kind)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default_color.clone())
    }

    /// Label of an object, falling back to its id
    pub fn get_label<O: GraphObject + ?Sized>(&self, object: &O, kind: ObjectKind) -> String {
        self.label_prop(kind)
            .and_then(|prop| resolve_path(object.data(), prop))
            .and_then(display_key)
            .unwrap_or_else(|| object.id().to_string())
    }
}
