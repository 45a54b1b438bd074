//! Named per-particle scalar properties with declared physical
//! dimensions. Interactions resolve property names once at load time and
//! read values by particle id on the hot path.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Physical dimension of a property, declared in the configuration.
/// Internal storage is in simulation units (length, time, mass all 1),
/// so the unit only gates lookups against mismatched requests.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Unit {
    /// Dimensionless quantity (elasticity, lambda, ...).
    Dimensionless,
    /// A length.
    Length,
    /// A mass.
    Mass,
    /// An energy.
    Energy,
    /// A velocity.
    Velocity,
    /// A time.
    Time,
    /// Mass times length squared.
    MomentOfInertia,
}

/// Value payload of a property: one number for every particle, or a
/// per-particle table.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum PropertyValue {
    /// Every particle shares this value.
    Uniform(f64),
    /// Indexed by particle id.
    PerParticle(Vec<f64>),
}

/// A single named property.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PropertyDef {
    /// Lookup name used by interactions and locals.
    pub name: String,
    /// Declared dimension.
    pub unit: Unit,
    /// Values.
    pub value: PropertyValue,
}

/// Handle to a resolved property. Cheap to copy and valid for the
/// lifetime of the store it came from.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PropertyId(usize);

/// The property store.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PropertyStore {
    defs: Vec<PropertyDef>,
}

impl PropertyStore {
    /// Builds a store from definitions.
    #[must_use]
    pub fn new(defs: Vec<PropertyDef>) -> Self {
        Self { defs }
    }

    /// Resolves `name` to a handle, checking the declared unit.
    ///
    /// # Errors
    ///
    /// Fails when the name is unknown or carries a different unit than the
    /// caller expects.
    pub fn lookup(&self, name: &str, unit: Unit) -> Result<PropertyId> {
        let (idx, def) = self
            .defs
            .iter()
            .enumerate()
            .find(|(_, d)| d.name == name)
            .ok_or_else(|| Error::Configuration(format!("unknown property {name:?}")))?;

        if def.unit != unit {
            return Err(Error::Configuration(format!(
                "property {name:?} has unit {:?}, expected {unit:?}",
                def.unit
            )));
        }

        Ok(PropertyId(idx))
    }

    /// Value of the property for particle `id`.
    #[must_use]
    pub fn get(&self, prop: PropertyId, id: usize) -> f64 {
        match &self.defs[prop.0].value {
            PropertyValue::Uniform(v) => *v,
            PropertyValue::PerParticle(vs) => vs[id],
        }
    }

    /// Largest value the property takes over all particles. Used for cell
    /// sizing and capture-range bounds.
    #[must_use]
    pub fn max_value(&self, prop: PropertyId) -> f64 {
        match &self.defs[prop.0].value {
            PropertyValue::Uniform(v) => *v,
            PropertyValue::PerParticle(vs) => vs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Pairwise-averaged value, the convention every pair interaction uses
    /// for mixed-species pairs.
    #[must_use]
    pub fn pair_avg(&self, prop: PropertyId, id1: usize, id2: usize) -> f64 {
        0.5 * (self.get(prop, id1) + self.get(prop, id2))
    }
}
