//! # Responsive Styles
//!
//! Block styles are grouped by category (`typography`, `spacing`, `border`,
//! `background`, `dimensions`, ...). Each category holds one property map per
//! breakpoint:
//!
//! ```text
//! { "spacing": { "desktop": { "padding": "16px" }, "mobile": { "padding": "8px" } } }
//! ```
//!
//! Breakpoints cascade from the largest down: a property not set at the
//! target breakpoint takes the value of the nearest larger breakpoint that
//! sets it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Responsive viewport tier, ordered smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Mobile,
    Tablet,
    Desktop,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 3] = [Breakpoint::Mobile, Breakpoint::Tablet, Breakpoint::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Breakpoint::Mobile => "mobile",
            Breakpoint::Tablet => "tablet",
            Breakpoint::Desktop => "desktop",
        }
    }
}

impl Default for Breakpoint {
    fn default() -> Self {
        Breakpoint::Desktop
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Breakpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(Breakpoint::Mobile),
            "tablet" => Ok(Breakpoint::Tablet),
            "desktop" => Ok(Breakpoint::Desktop),
            _ => Err(format!(
                "Invalid breakpoint: {}. Use: mobile, tablet, or desktop",
                s
            )),
        }
    }
}

/// Concrete CSS-like properties (`"fontSize" -> "16px"`)
pub type StyleProperties = BTreeMap<String, Value>;

/// One category's properties, keyed by breakpoint
pub type ResponsiveStyle = BTreeMap<Breakpoint, StyleProperties>;

/// Per-category responsive styles of a block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Styles(BTreeMap<String, ResponsiveStyle>);

impl Styles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn category(&self, name: &str) -> Option<&ResponsiveStyle> {
        self.0.get(name)
    }

    /// Set a single property at a breakpoint
    pub fn set(
        &mut self,
        category: impl Into<String>,
        breakpoint: Breakpoint,
        property: impl Into<String>,
        value: Value,
    ) {
        self.0
            .entry(category.into())
            .or_default()
            .entry(breakpoint)
            .or_default()
            .insert(property.into(), value);
    }

    /// Builder form of [`Styles::set`]
    pub fn with(
        mut self,
        category: impl Into<String>,
        breakpoint: Breakpoint,
        property: impl Into<String>,
        value: Value,
    ) -> Self {
        self.set(category, breakpoint, property, value);
        self
    }

    /// Remove a property, dropping maps left empty
    pub fn remove(&mut self, category: &str, breakpoint: Breakpoint, property: &str) -> Option<Value> {
        let responsive = self.0.get_mut(category)?;
        let properties = responsive.get_mut(&breakpoint)?;
        let removed = properties.remove(property);

        if properties.is_empty() {
            responsive.remove(&breakpoint);
        }
        if responsive.is_empty() {
            self.0.remove(category);
        }

        removed
    }

    /// Merge with inherited overrides.
    ///
    /// Categories on one side only are copied through. Categories on both
    /// sides are merged one level deep (per breakpoint entry) and our own
    /// entries win, so overrides only fill gaps.
    pub fn merged_with(&self, overrides: &Styles) -> Styles {
        let mut merged = overrides.0.clone();

        for (category, own) in &self.0 {
            let target = merged.entry(category.clone()).or_default();
            for (breakpoint, properties) in own {
                target.insert(*breakpoint, properties.clone());
            }
        }

        Styles(merged)
    }

    /// Properties of one category that apply at `breakpoint`
    pub fn resolve(&self, category: &str, breakpoint: Breakpoint) -> StyleProperties {
        let mut resolved = StyleProperties::new();

        let Some(responsive) = self.0.get(category) else {
            return resolved;
        };

        // Largest first, so each smaller tier overlays what it sets explicitly
        for (_, properties) in responsive.range(breakpoint..).rev() {
            for (property, value) in properties {
                resolved.insert(property.clone(), value.clone());
            }
        }

        resolved
    }

    /// Every category resolved at `breakpoint`; categories with nothing
    /// applicable are left out
    pub fn resolve_all(&self, breakpoint: Breakpoint) -> BTreeMap<String, StyleProperties> {
        self.0
            .keys()
            .filter_map(|category| {
                let resolved = self.resolve(category, breakpoint);
                (!resolved.is_empty()).then(|| (category.clone(), resolved))
            })
            .collect()
    }
}
