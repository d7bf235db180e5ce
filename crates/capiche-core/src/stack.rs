//! Stack description parsing and the validated layer graph.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layer::{Layer, Limits};
use crate::section::{CrossSection, Stratum};
use crate::units::EPSILON_0;

/// Name of the layer that terminates every stack upward.
pub const AIR: &str = "air";

/// A stack description as written on disk.
///
/// Layer order is significant: it breaks ties between metals at the same
/// height and fixes the order in which conductors are enumerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDescription {
    pub process: String,
    #[serde(deserialize_with = "unique_keys")]
    pub layers: IndexMap<String, Layer>,
    #[serde(default, deserialize_with = "unique_keys")]
    pub limits: IndexMap<String, Limits>,
    /// Internal layer name to extractor layer name.
    #[serde(default, deserialize_with = "unique_keys")]
    pub extractor_layers: IndexMap<String, String>,
    /// Published plate capacitances (aF/um^2), metal -> conductor -> value.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub platecap: IndexMap<String, IndexMap<String, f64>>,
}

/// Deserialize a map, rejecting repeated keys instead of keeping the last.
fn unique_keys<'de, D, V>(deserializer: D) -> std::result::Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueVisitor<V> {
        type Value = IndexMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
            let mut map = IndexMap::new();
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(serde::de::Error::custom(format!("duplicate name `{}`", key)));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueVisitor(PhantomData))
}

/// A validated stack.
///
/// Construction checks the whole reference graph, so every accessor can
/// rely on names resolving and chains terminating.
#[derive(Debug, Clone)]
pub struct StackModel {
    description: StackDescription,
}

impl StackModel {
    /// Parse and validate a JSON stack description.
    pub fn load(description: &str) -> Result<Self> {
        let description: StackDescription = serde_json::from_str(description)
            .map_err(|e| Error::InvalidStack(format!("malformed description: {}", e)))?;
        Self::from_description(description)
    }

    /// Read, parse and validate a stack description file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::load(&text)
    }

    /// Validate an already-parsed description.
    pub fn from_description(description: StackDescription) -> Result<Self> {
        validate(&description)?;
        let model = Self { description };
        log::debug!(
            "loaded stack {}: {} layers, {} metals",
            model.process(),
            model.description.layers.len(),
            model.metals().len()
        );
        Ok(model)
    }

    pub fn description(&self) -> &StackDescription {
        &self.description
    }

    pub fn process(&self) -> &str {
        &self.description.process
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.description.layers.get(name)
    }

    /// All layers in description order.
    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.description.layers.iter().map(|(n, l)| (n.as_str(), l))
    }

    /// Metal names in description order.
    pub fn metals(&self) -> Vec<&str> {
        self.layers()
            .filter(|(_, l)| matches!(l, Layer::Metal { .. }))
            .map(|(n, _)| n)
            .collect()
    }

    /// Diffusion names in description order.
    pub fn diffusions(&self) -> Vec<&str> {
        self.layers()
            .filter(|(_, l)| matches!(l, Layer::Diffusion { .. }))
            .map(|(n, _)| n)
            .collect()
    }

    /// The substrate: the first diffusion in the description.
    pub fn first_diffusion(&self) -> Option<&str> {
        self.diffusions().into_iter().next()
    }

    /// Metals listed before `metal` in the description, bottom up.
    pub fn lower_metals(&self, metal: &str) -> Vec<&str> {
        self.metals().into_iter().take_while(|m| *m != metal).collect()
    }

    /// Metals listed after `metal` in the description.
    pub fn upper_metals(&self, metal: &str) -> Vec<&str> {
        self.metals().into_iter().skip_while(|m| *m != metal).skip(1).collect()
    }

    /// Poly over an active diffusion is a transistor gate, not a parasitic.
    pub fn is_gate_pair(&self, metal: &str, conductor: &str) -> bool {
        metal == "poly" && self.is_diffusion(conductor) && conductor.contains("diff")
    }

    pub fn is_metal(&self, name: &str) -> bool {
        matches!(self.layer(name), Some(Layer::Metal { .. }))
    }

    pub fn is_diffusion(&self, name: &str) -> bool {
        matches!(self.layer(name), Some(Layer::Diffusion { .. }))
    }

    pub fn limits(&self, metal: &str) -> Option<Limits> {
        self.description.limits.get(metal).copied()
    }

    pub fn extractor_layer(&self, name: &str) -> Option<&str> {
        self.description.extractor_layers.get(name).map(String::as_str)
    }

    /// Published plate capacitance of `metal` over `conductor`, if listed.
    pub fn published_platecap(&self, metal: &str, conductor: &str) -> Option<f64> {
        self.description.platecap.get(metal)?.get(conductor).copied()
    }

    /// Absolute height of a metal base or a diffusion surface.
    pub fn resolve_height(&self, name: &str) -> Result<f64> {
        match self.layer(name) {
            Some(Layer::Metal { height, .. }) | Some(Layer::Diffusion { height, .. }) => Ok(*height),
            Some(other) => Err(Error::UnresolvedLayer(format!(
                "{} is a {}, not a metal or diffusion",
                name,
                other.kind_name()
            ))),
            None => Err(Error::UnresolvedLayer(name.to_string())),
        }
    }

    /// Top surface of a conductor (metal top or diffusion surface).
    pub fn conductor_top(&self, name: &str) -> Result<f64> {
        match self.layer(name) {
            Some(Layer::Metal {
                height, thickness, ..
            }) => Ok(height + thickness),
            _ => self.resolve_height(name),
        }
    }

    /// Dielectric constant of a dielectric layer.
    pub fn permittivity(&self, name: &str) -> Result<f64> {
        self.layer(name)
            .and_then(Layer::k)
            .ok_or_else(|| Error::UnresolvedLayer(format!("{} is not a dielectric", name)))
    }

    /// The single wrapping dielectric grown on `name`, if any.
    pub fn wrap_on(&self, name: &str) -> Option<(&str, &Layer)> {
        self.layers().find(|(_, l)| l.wraps() == Some(name))
    }

    /// Wrapping dielectrics around `name`, innermost first.
    pub fn wrap_chain(&self, name: &str) -> Vec<(&str, &Layer)> {
        let mut chain = Vec::new();
        let mut current = name;
        // validation guarantees wrap chains are linear and acyclic
        while let Some((wrap, layer)) = self.wrap_on(current) {
            chain.push((wrap, layer));
            current = wrap;
        }
        chain
    }

    /// Dielectric strata between two conductors, bottom to top.
    ///
    /// The arguments may be given in either order; the upper conductor must
    /// be a metal. Zero-thickness strata are kept as interface markers.
    pub fn dielectric_between(&self, a: &str, b: &str) -> Result<Vec<Stratum>> {
        let (lower, upper) = if self.resolve_height(a)? > self.resolve_height(b)? {
            (b, a)
        } else {
            (a, b)
        };
        if !self.is_metal(upper) {
            return Err(Error::UnresolvedLayer(format!(
                "no metal above {} to pair with {}",
                lower, upper
            )));
        }

        let mut section = self.cross_section(lower, &[upper])?;
        let below = section
            .wires
            .first()
            .map(|w| w.strata_below)
            .ok_or_else(|| Error::UnresolvedLayer(format!("{} is not above {}", upper, lower)))?;
        section.strata.truncate(below);
        Ok(section.strata)
    }

    /// Parallel-plate capacitance per unit area (aF/um^2) between a metal
    /// and a conductor beneath it.
    pub fn area_capacitance(&self, metal: &str, conductor: &str) -> Result<f64> {
        let strata = self.dielectric_between(metal, conductor)?;
        series_capacitance(&strata).ok_or_else(|| {
            Error::InvalidStack(format!(
                "no dielectric separates {} from {}",
                metal, conductor
            ))
        })
    }

    /// Bottom-to-top cross-section over `reference` with `drawn` metals
    /// present as wires.
    pub fn cross_section(&self, reference: &str, drawn: &[&str]) -> Result<CrossSection> {
        CrossSection::build(self, reference, drawn)
    }
}

/// Series combination `1 / sum(t_i / (eps0 * k_i))` of stacked dielectrics.
///
/// Zero-thickness strata contribute nothing. Returns `None` when no stratum
/// has positive thickness.
pub fn series_capacitance(strata: &[Stratum]) -> Option<f64> {
    let inverse: f64 = strata
        .iter()
        .filter(|s| s.thickness() > 0.0)
        .map(|s| s.thickness() / (EPSILON_0 * s.k))
        .sum();
    if inverse > 0.0 {
        Some(1.0 / inverse)
    } else {
        None
    }
}

fn validate(desc: &StackDescription) -> Result<()> {
    let layers = &desc.layers;

    match layers.get(AIR) {
        Some(Layer::Dielectric { .. }) => {}
        Some(other) => {
            return Err(Error::InvalidStack(format!(
                "`{}` must be a dielectric, found {}",
                AIR,
                other.kind_name()
            )))
        }
        None => return Err(Error::InvalidStack(format!("no `{}` layer terminates the stack", AIR))),
    }

    let mut wrapped = HashSet::new();
    for (name, layer) in layers {
        for (field, value) in layer.dimensions() {
            let ok = match field {
                "k" => value.is_finite() && value > 0.0,
                "thickness" if matches!(layer, Layer::Metal { .. }) => value.is_finite() && value > 0.0,
                _ => value.is_finite() && value >= 0.0,
            };
            if !ok {
                return Err(Error::InvalidStack(format!(
                    "{}: {} = {} is out of range",
                    name, field, value
                )));
            }
        }

        for (field, target) in layer.references() {
            if target == AIR {
                return Err(Error::InvalidStack(format!(
                    "{}: {} refers to `{}`, which must stay on top",
                    name, field, AIR
                )));
            }
            let Some(referenced) = layers.get(target) else {
                return Err(Error::InvalidStack(format!(
                    "{}: {} refers to unknown layer `{}`",
                    name, field, target
                )));
            };
            let fits = match (layer, field) {
                (Layer::Conformal { .. } | Layer::Sidewall { .. }, _) => {
                    matches!(referenced, Layer::Metal { .. }) || referenced.is_wrap()
                }
                _ => referenced.is_dielectric(),
            };
            if !fits {
                return Err(Error::InvalidStack(format!(
                    "{}: {} refers to {} `{}`",
                    name,
                    field,
                    referenced.kind_name(),
                    target
                )));
            }
        }

        if let Some(on) = layer.wraps() {
            if !wrapped.insert(on) {
                return Err(Error::InvalidStack(format!(
                    "more than one dielectric wraps `{}`",
                    on
                )));
            }
        }
    }

    // Every chain of `beneath` links must end at a terminator.
    for start in layers.keys() {
        let mut seen = HashSet::new();
        let mut current = start.as_str();
        while let Some(next) = layers.get(current).and_then(Layer::beneath) {
            if !seen.insert(current) {
                return Err(Error::InvalidStack(format!(
                    "reference chain from `{}` cycles through `{}`",
                    start, current
                )));
            }
            current = next;
        }
    }

    for metal in desc.limits.keys() {
        if !matches!(layers.get(metal), Some(Layer::Metal { .. })) {
            return Err(Error::InvalidStack(format!("limits given for non-metal `{}`", metal)));
        }
    }
    for (metal, limits) in &desc.limits {
        if !(limits.width > 0.0 && limits.space > 0.0) {
            return Err(Error::InvalidStack(format!(
                "{}: minimum width and space must be positive",
                metal
            )));
        }
    }
    for name in desc.extractor_layers.keys() {
        if !layers.contains_key(name) {
            return Err(Error::InvalidStack(format!(
                "extractor layer given for unknown layer `{}`",
                name
            )));
        }
    }

    Ok(())
}
