//! The configuration document model and snapshot persistence. The
//! document holds, in order: simulation size, particles, properties,
//! genus, topology, then the typed source lists, every element carrying
//! a `name`. Property references are by name, resolved once when the
//! simulation is built.
//! Snapshots persist the live state (capture maps as pair lists, system
//! phases, the RNG) so a resumed run replays byte-identically.

use crate::boundary::{Boundary, BoundaryKind};
use crate::capture::{MultiCaptureMap, SingleCaptureMap};
use crate::dynamics::{DeformationTable, Liouvillean};
use crate::error::{Error, Result};
use crate::global::{Cells, Global, ParabolaSentinel, PbcSentinel};
use crate::interaction::{
    Dumbbells, HardSphere, Interaction, Lines, ParallelCubes, RoughHardSphere, SoftCore,
    SquareBond, SquareWell, Stepped,
};
use crate::local::{AndersenWall, CylinderWall, Local, OscillatingPlate, Wall};
use crate::observer::ObserverRegistry;
use crate::particle::{Orientation, Particle};
use crate::properties::{PropertyDef, PropertyStore, PropertyValue, Unit};
use crate::ranges::{PairRange, ParticleRange};
use crate::sampler::Sampler;
use crate::scheduler::Scheduler;
use crate::simulation::{Simulation, World};
use crate::system::{
    AndersenThermostat, CompressionCellFix, DsmcSpheres, Halt, Rescale, RingDsmc,
    SchedulerMaintainer, Sleep, System, Umbrella,
};
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// One particle of the configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParticleDef {
    /// Initial position.
    pub position: Vec3,
    /// Initial velocity.
    pub velocity: Vec3,
    /// Optional orientation: director and angular velocity.
    #[serde(default)]
    pub orientation: Option<(Vec3, Vec3)>,
}

/// A species: a particle range sharing property values.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpeciesDef {
    /// Species name.
    pub name: String,
    /// Members.
    pub range: ParticleRange,
    /// Property values this species contributes: `(name, unit, value)`.
    pub values: Vec<(String, Unit, f64)>,
}

/// A chain topology block, usable as a bond range by name.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TopologyDef {
    /// Topology name.
    pub name: String,
    /// First particle id of the block.
    pub start: usize,
    /// One past the last id.
    pub end: usize,
    /// Particles per chain.
    pub chain_length: usize,
}

/// A pair range in the document: the runtime ranges plus references to
/// named topologies.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum PairRangeDef {
    /// All pairs.
    All,
    /// One pair.
    Single(usize, usize),
    /// Pairs within an id span.
    Within {
        /// First id.
        start: usize,
        /// One past the last id.
        end: usize,
    },
    /// An explicit pair list.
    List(Vec<(usize, usize)>),
    /// The bonds of a named topology.
    Topology(String),
}

impl PairRangeDef {
    fn resolve(&self, topologies: &[TopologyDef]) -> Result<PairRange> {
        Ok(match self {
            Self::All => PairRange::All,
            Self::Single(i, j) => PairRange::Single(*i, *j),
            Self::Within { start, end } => PairRange::Within { start: *start, end: *end },
            Self::List(pairs) => PairRange::List(pairs.clone()),
            Self::Topology(name) => {
                let topology = topologies
                    .iter()
                    .find(|t| &t.name == name)
                    .ok_or_else(|| {
                        Error::Configuration(format!("unknown topology {name:?}"))
                    })?;
                PairRange::ChainBonds {
                    start: topology.start,
                    end: topology.end,
                    chain_length: topology.chain_length,
                }
            }
        })
    }
}

/// The flow between events.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum FlowDef {
    /// Free streaming.
    Newtonian,
    /// Free streaming plus gravity.
    NewtonianGravity {
        /// The acceleration vector.
        gravity: Vec3,
        /// Elastic-velocity floor.
        #[serde(default)]
        elastic_v: f64,
        /// The tc model window.
        #[serde(default)]
        tc: Option<f64>,
    },
    /// Linearly growing diameters.
    Compression {
        /// Growth rate.
        growth_rate: f64,
    },
    /// Uniform shear flow.
    Sllod {
        /// Shear rate.
        shear_rate: f64,
    },
    /// Multicanonical biasing.
    NewtonianMC {
        /// Energy bin width.
        energy_step: f64,
        /// Potential deformation table.
        #[serde(default)]
        deformation: DeformationTable,
    },
}

impl FlowDef {
    fn build(&self) -> Liouvillean {
        match self {
            Self::Newtonian => Liouvillean::Newtonian,
            Self::NewtonianGravity { gravity, elastic_v, tc } => {
                Liouvillean::NewtonianGravity {
                    gravity: *gravity,
                    elastic_v: *elastic_v,
                    tc: *tc,
                    tc_last: Vec::new(),
                }
            }
            Self::Compression { growth_rate } => {
                Liouvillean::Compression { growth_rate: *growth_rate }
            }
            Self::Sllod { shear_rate } => Liouvillean::Sllod { shear_rate: *shear_rate },
            Self::NewtonianMC { energy_step, deformation } => Liouvillean::NewtonianMC {
                energy_step: *energy_step,
                deformation: deformation.clone(),
            },
        }
    }
}

/// An interaction element. Property references are names into the
/// property list.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum InteractionDef {
    HardSphere {
        name: String,
        range: PairRangeDef,
        diameter: String,
        elasticity: String,
    },
    SquareWell {
        name: String,
        range: PairRangeDef,
        diameter: String,
        lambda: String,
        well_depth: String,
        elasticity: String,
        #[serde(default)]
        captures: Option<SingleCaptureMap>,
    },
    SquareBond {
        name: String,
        range: PairRangeDef,
        diameter: String,
        lambda: String,
        elasticity: String,
    },
    Stepped {
        name: String,
        range: PairRangeDef,
        steps: Vec<crate::interaction::Step>,
        #[serde(default)]
        captures: Option<MultiCaptureMap>,
    },
    SoftCore {
        name: String,
        range: PairRangeDef,
        diameter: String,
        well_depth: String,
        #[serde(default)]
        captures: Option<SingleCaptureMap>,
    },
    RoughHardSphere {
        name: String,
        range: PairRangeDef,
        diameter: String,
        elasticity: String,
        tangential_elasticity: String,
    },
    Lines {
        name: String,
        range: PairRangeDef,
        length: f64,
        elasticity: f64,
        #[serde(default)]
        captures: Option<SingleCaptureMap>,
    },
    Dumbbells {
        name: String,
        range: PairRangeDef,
        length: f64,
        diameter: f64,
        elasticity: f64,
        #[serde(default)]
        captures: Option<SingleCaptureMap>,
    },
    ParallelCubes {
        name: String,
        range: PairRangeDef,
        diameter: String,
        elasticity: String,
    },
}

/// A local element.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum LocalDef {
    Wall {
        name: String,
        range: ParticleRange,
        origin: Vec3,
        normal: Vec3,
        elasticity: f64,
        #[serde(default)]
        roughness: Option<(f64, f64)>,
    },
    AndersenWall {
        name: String,
        range: ParticleRange,
        origin: Vec3,
        normal: Vec3,
        temperature: f64,
    },
    CylinderWall {
        name: String,
        range: ParticleRange,
        origin: Vec3,
        axis: Vec3,
        radius: f64,
        elasticity: f64,
    },
    OscillatingPlate {
        name: String,
        range: ParticleRange,
        origin: Vec3,
        normal: Vec3,
        delta: f64,
        omega: f64,
        sigma: f64,
        mass: f64,
        elasticity: f64,
        #[serde(default)]
        strong: bool,
        #[serde(default)]
        recoil_fraction: Option<f64>,
    },
}

/// A global element.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum GlobalDef {
    Cells {
        name: String,
        #[serde(default)]
        overlink: Option<usize>,
        #[serde(default)]
        oversize: Option<f64>,
        #[serde(default)]
        shearing: bool,
    },
    PbcSentinel {
        name: String,
    },
    ParabolaSentinel {
        name: String,
    },
}

/// A system element.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum SystemDef {
    Andersen {
        name: String,
        range: ParticleRange,
        mean_free_time: f64,
        temperature: f64,
        #[serde(default)]
        set_point: Option<f64>,
        #[serde(default)]
        set_frequency: Option<u64>,
    },
    DsmcSpheres {
        name: String,
        range1: ParticleRange,
        range2: ParticleRange,
        tstep: f64,
        chi: f64,
        diameter: f64,
        elasticity: f64,
        #[serde(default)]
        max_prob: f64,
    },
    RingDsmc {
        name: String,
        range: ParticleRange,
        tstep: f64,
        chi12: f64,
        chi13: f64,
        diameter: f64,
        elasticity: f64,
    },
    Rescale {
        name: String,
        frequency: u64,
        temperature: f64,
    },
    Umbrella {
        name: String,
        range1: ParticleRange,
        range2: ParticleRange,
        a: f64,
        b: f64,
        del_u: f64,
        #[serde(default)]
        level: Option<i64>,
    },
    Sleep {
        name: String,
        range: ParticleRange,
        sleep_velocity: f64,
    },
    CompressionCellFix {
        name: String,
    },
    Halt {
        name: String,
        time: f64,
    },
    SchedulerMaintainer {
        name: String,
        period: f64,
    },
}

/// The configuration document.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Document {
    /// Extents of the primary image.
    pub simulation_size: Vec3,
    /// Boundary conditions.
    pub boundary: BoundaryKind,
    /// The flow.
    pub flow: FlowDef,
    /// The particles, in id order.
    pub particles: Vec<ParticleDef>,
    /// Named properties.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Species blocks contributing property values.
    #[serde(default)]
    pub genus: Vec<SpeciesDef>,
    /// Chain topologies.
    #[serde(default)]
    pub topology: Vec<TopologyDef>,
    /// The interactions.
    #[serde(default)]
    pub interactions: Vec<InteractionDef>,
    /// The locals.
    #[serde(default)]
    pub locals: Vec<LocalDef>,
    /// The globals.
    #[serde(default)]
    pub globals: Vec<GlobalDef>,
    /// The systems.
    #[serde(default)]
    pub systems: Vec<SystemDef>,
    /// RNG seed.
    #[serde(default)]
    pub seed: u64,
    /// Downgrade invariant violations to log messages.
    #[serde(default)]
    pub tolerate_invariants: bool,
}

impl Document {
    /// Parses a document from JSON.
    ///
    /// # Errors
    ///
    /// Malformed documents fail here.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn build_properties(&self) -> Result<PropertyStore> {
        let n = self.particles.len();
        let mut defs = self.properties.clone();

        // Species values overlay (or create) per-particle tables.
        for species in &self.genus {
            for (name, unit, value) in &species.values {
                let idx = match defs.iter().position(|d| &d.name == name) {
                    Some(idx) => {
                        if defs[idx].unit != *unit {
                            return Err(Error::Configuration(format!(
                                "species {:?} sets {name:?} as {unit:?}, already \
                                 declared {:?}",
                                species.name, defs[idx].unit
                            )));
                        }
                        idx
                    }
                    None => {
                        defs.push(PropertyDef {
                            name: name.clone(),
                            unit: *unit,
                            value: PropertyValue::PerParticle(vec![0.0; n]),
                        });
                        defs.len() - 1
                    }
                };
                let def = &mut defs[idx];
                // Promote uniform values before overlaying.
                if let PropertyValue::Uniform(base) = def.value {
                    def.value = PropertyValue::PerParticle(vec![base; n]);
                }
                if let PropertyValue::PerParticle(values) = &mut def.value {
                    for id in species.range.ids(n) {
                        values[id] = *value;
                    }
                }
            }
        }

        Ok(PropertyStore::new(defs))
    }

    fn build_interaction(def: &InteractionDef, properties: &PropertyStore,
        topologies: &[TopologyDef]) -> Result<Interaction> {
        let lookup = |name: &str, unit| properties.lookup(name, unit);
        Ok(match def {
            InteractionDef::HardSphere { name, range, diameter, elasticity } => {
                HardSphere::new(
                    name.clone(),
                    range.resolve(topologies)?,
                    lookup(diameter, Unit::Length)?,
                    lookup(elasticity, Unit::Dimensionless)?,
                )
                .into()
            }
            InteractionDef::SquareWell {
                name, range, diameter, lambda, well_depth, elasticity, captures,
            } => SquareWell::new(
                name.clone(),
                range.resolve(topologies)?,
                lookup(diameter, Unit::Length)?,
                lookup(lambda, Unit::Dimensionless)?,
                lookup(well_depth, Unit::Energy)?,
                lookup(elasticity, Unit::Dimensionless)?,
                captures.clone(),
            )
            .into(),
            InteractionDef::SquareBond { name, range, diameter, lambda, elasticity } => {
                SquareBond::new(
                    name.clone(),
                    range.resolve(topologies)?,
                    lookup(diameter, Unit::Length)?,
                    lookup(lambda, Unit::Dimensionless)?,
                    lookup(elasticity, Unit::Dimensionless)?,
                )
                .into()
            }
            InteractionDef::Stepped { name, range, steps, captures } => Stepped::new(
                name.clone(),
                range.resolve(topologies)?,
                steps.clone(),
                captures.clone(),
            )
            .into(),
            InteractionDef::SoftCore { name, range, diameter, well_depth, captures } => {
                SoftCore::new(
                    name.clone(),
                    range.resolve(topologies)?,
                    lookup(diameter, Unit::Length)?,
                    lookup(well_depth, Unit::Energy)?,
                    captures.clone(),
                )
                .into()
            }
            InteractionDef::RoughHardSphere {
                name, range, diameter, elasticity, tangential_elasticity,
            } => RoughHardSphere::new(
                name.clone(),
                range.resolve(topologies)?,
                lookup(diameter, Unit::Length)?,
                lookup(elasticity, Unit::Dimensionless)?,
                lookup(tangential_elasticity, Unit::Dimensionless)?,
            )
            .into(),
            InteractionDef::Lines { name, range, length, elasticity, captures } => {
                Lines::new(
                    name.clone(),
                    range.resolve(topologies)?,
                    *length,
                    *elasticity,
                    captures.clone(),
                )
                .into()
            }
            InteractionDef::Dumbbells {
                name, range, length, diameter, elasticity, captures,
            } => Dumbbells::new(
                name.clone(),
                range.resolve(topologies)?,
                *length,
                *diameter,
                *elasticity,
                captures.clone(),
            )
            .into(),
            InteractionDef::ParallelCubes { name, range, diameter, elasticity } => {
                ParallelCubes::new(
                    name.clone(),
                    range.resolve(topologies)?,
                    lookup(diameter, Unit::Length)?,
                    lookup(elasticity, Unit::Dimensionless)?,
                )
                .into()
            }
        })
    }

    fn build_local(def: &LocalDef) -> Local {
        match def {
            LocalDef::Wall { name, range, origin, normal, elasticity, roughness } => {
                let mut wall =
                    Wall::new(name.clone(), range.clone(), *origin, *normal, *elasticity);
                wall.roughness = *roughness;
                wall.into()
            }
            LocalDef::AndersenWall { name, range, origin, normal, temperature } => {
                AndersenWall::new(name.clone(), range.clone(), *origin, *normal,
                    *temperature)
                .into()
            }
            LocalDef::CylinderWall { name, range, origin, axis, radius, elasticity } => {
                CylinderWall::new(name.clone(), range.clone(), *origin, *axis, *radius,
                    *elasticity)
                .into()
            }
            LocalDef::OscillatingPlate {
                name, range, origin, normal, delta, omega, sigma, mass, elasticity,
                strong, recoil_fraction,
            } => {
                let mut plate = OscillatingPlate::new(name.clone(), range.clone(),
                    *origin, *normal, *delta, *omega, *sigma, *mass, *elasticity,
                    *strong);
                if let Some(fraction) = recoil_fraction {
                    plate.recoil_fraction = *fraction;
                }
                plate.into()
            }
        }
    }

    fn build_system(def: &SystemDef) -> System {
        match def {
            SystemDef::Andersen {
                name, range, mean_free_time, temperature, set_point, set_frequency,
            } => {
                let mut thermostat = AndersenThermostat::new(name.clone(), range.clone(),
                    *mean_free_time, *temperature);
                if let (Some(point), Some(frequency)) = (set_point, set_frequency) {
                    thermostat.tune = true;
                    thermostat.set_point = *point;
                    thermostat.set_frequency = *frequency;
                }
                thermostat.into()
            }
            SystemDef::DsmcSpheres {
                name, range1, range2, tstep, chi, diameter, elasticity, max_prob,
            } => {
                let mut dsmc = DsmcSpheres::new(name.clone(), range1.clone(),
                    range2.clone(), *tstep, *chi, *diameter, *elasticity);
                dsmc.max_prob = *max_prob;
                dsmc.into()
            }
            SystemDef::RingDsmc {
                name, range, tstep, chi12, chi13, diameter, elasticity,
            } => RingDsmc::new(name.clone(), range.clone(), *tstep, *chi12, *chi13,
                *diameter, *elasticity)
            .into(),
            SystemDef::Rescale { name, frequency, temperature } => {
                Rescale::new(name.clone(), *frequency, *temperature).into()
            }
            SystemDef::Umbrella { name, range1, range2, a, b, del_u, level } => {
                Umbrella::new(name.clone(), range1.clone(), range2.clone(), *a, *b,
                    *del_u, *level)
                .into()
            }
            SystemDef::Sleep { name, range, sleep_velocity } => {
                Sleep::new(name.clone(), range.clone(), *sleep_velocity).into()
            }
            SystemDef::CompressionCellFix { name } => {
                CompressionCellFix::new(name.clone()).into()
            }
            SystemDef::Halt { name, time } => Halt::new(name.clone(), *time).into(),
            SystemDef::SchedulerMaintainer { name, period } => {
                SchedulerMaintainer::new(name.clone(), *period).into()
            }
        }
    }

    /// Builds a runnable simulation from the document.
    ///
    /// # Errors
    ///
    /// Unknown names, unit mismatches and inconsistent orientation data
    /// fail here, before the run starts.
    pub fn build(&self) -> Result<Simulation> {
        let properties = self.build_properties()?;
        let mass = properties.lookup("Mass", Unit::Mass).map_err(|_| {
            Error::Configuration("every configuration needs a Mass property".into())
        })?;
        let inertia = properties.lookup("MomentOfInertia", Unit::MomentOfInertia).ok();

        let particles: Vec<Particle> = self
            .particles
            .iter()
            .enumerate()
            .map(|(id, def)| Particle::new(id, def.position, def.velocity))
            .collect();

        let any_orientation = self.particles.iter().any(|p| p.orientation.is_some());
        let orientations = if any_orientation {
            let all: Option<Vec<Orientation>> = self
                .particles
                .iter()
                .map(|p| {
                    p.orientation
                        .map(|(director, angular)| Orientation::new(director, angular))
                })
                .collect();
            Some(all.ok_or_else(|| {
                Error::Configuration(
                    "either every particle carries orientation data or none does".into(),
                )
            })?)
        } else {
            None
        };

        let world = World {
            particles,
            orientations,
            properties,
            boundary: Boundary::new(self.simulation_size, self.boundary),
            liouvillean: self.flow.build(),
            sampler: Sampler::from_seed(self.seed),
            time: 0.0,
            event_count: 0,
            mass,
            inertia,
            internal_energy: 0.0,
            last_collision: None,
            tolerate_invariants: self.tolerate_invariants,
        };

        let interactions = self
            .interactions
            .iter()
            .map(|def| Self::build_interaction(def, &world.properties, &self.topology))
            .collect::<Result<Vec<_>>>()?;
        let locals: Vec<Local> = self.locals.iter().map(Self::build_local).collect();
        let globals: Vec<Global> = self
            .globals
            .iter()
            .map(|def| match def {
                GlobalDef::Cells { name, overlink, oversize, shearing } => {
                    Cells::new(name.clone(), overlink.unwrap_or(1),
                        oversize.unwrap_or(1.0), *shearing)
                    .into()
                }
                GlobalDef::PbcSentinel { name } => PbcSentinel::new(name.clone()).into(),
                GlobalDef::ParabolaSentinel { name } => {
                    ParabolaSentinel::new(name.clone()).into()
                }
            })
            .collect();
        let systems: Vec<System> = self.systems.iter().map(Self::build_system).collect();

        let n = world.particles.len();
        Ok(Simulation {
            world,
            interactions,
            locals,
            globals,
            systems,
            scheduler: Scheduler::new(n),
            observers: ObserverRegistry::default(),
            max_events: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// A persisted run: everything needed to resume byte-identically.
#[derive(Deserialize, Serialize)]
pub struct Snapshot {
    /// Physical state (particles at their peculiar times, boundary
    /// slide, RNG state, time, energy ledger).
    pub world: World,
    /// Interactions with their capture maps.
    pub interactions: Vec<Interaction>,
    /// Locals with their live phases.
    pub locals: Vec<Local>,
    /// Globals.
    pub globals: Vec<Global>,
    /// Systems with their countdowns and accumulators.
    pub systems: Vec<System>,
}

impl Snapshot {
    /// Captures a simulation. Every particle is streamed to the current
    /// time first (streaming is exact), so a capture taken after a
    /// restore reproduces this one byte for byte.
    pub fn capture(simulation: &mut Simulation) -> Self {
        simulation.world.update_all();
        Self {
            world: simulation.world.clone(),
            interactions: simulation.interactions.clone(),
            locals: simulation.locals.clone(),
            globals: simulation.globals.clone(),
            systems: simulation.systems.clone(),
        }
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    ///
    /// Serialization failures.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses from JSON.
    ///
    /// # Errors
    ///
    /// Malformed snapshots fail here.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rebuilds a runnable simulation. The queue is re-predicted; the
    /// capture maps, energy ledger and system phases resume as
    /// persisted.
    ///
    /// # Errors
    ///
    /// Propagates capacity errors from the cell list.
    pub fn restore(self) -> Result<Simulation> {
        let n = self.world.particles.len();
        let mut simulation = Simulation {
            world: self.world,
            interactions: self.interactions,
            locals: self.locals,
            globals: self.globals,
            systems: self.systems,
            scheduler: Scheduler::new(n),
            observers: ObserverRegistry::default(),
            max_events: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        };
        simulation.initialise_resumed()?;
        Ok(simulation)
    }
}

/// Ready-made worlds for the unit tests of the source families.
#[cfg(test)]
pub mod test_fixtures {
    use super::*;

    /// A 100-cube periodic Newtonian world with the standard property
    /// set (`Mass` 1, `Diameter` 1, `Lambda` 1.5, `WellDepth` 1,
    /// `Elasticity` 1) and two particles on the x axis: particle 0 at
    /// the origin moving `+speed`, particle 1 at `(sep, 0, 0)` moving
    /// `-speed`.
    #[must_use]
    pub fn two_particle_world(sep: f64, speed: f64) -> World {
        let particles = vec![
            Particle::new(0, Vec3::zero(), Vec3::new(speed, 0.0, 0.0)),
            Particle::new(1, Vec3::new(sep, 0.0, 0.0), Vec3::new(-speed, 0.0, 0.0)),
        ];
        world_of(particles)
    }

    /// `n` still particles on a unit lattice about the origin, in the
    /// same 100-cube world.
    #[must_use]
    pub fn n_particle_world(n: usize) -> World {
        let side = (n as f64).cbrt().ceil() as usize;
        let particles = (0..n)
            .map(|id| {
                let (x, y, z) = (id % side, (id / side) % side, id / (side * side));
                let centre = |c: usize| c as f64 - (side as f64 - 1.0) / 2.0;
                Particle::new(id, Vec3::new(centre(x), centre(y), centre(z)), Vec3::zero())
            })
            .collect();
        world_of(particles)
    }

    fn world_of(particles: Vec<Particle>) -> World {
        let properties = PropertyStore::new(vec![
            PropertyDef {
                name: "Mass".into(),
                unit: Unit::Mass,
                value: PropertyValue::Uniform(1.0),
            },
            PropertyDef {
                name: "Diameter".into(),
                unit: Unit::Length,
                value: PropertyValue::Uniform(1.0),
            },
            PropertyDef {
                name: "Lambda".into(),
                unit: Unit::Dimensionless,
                value: PropertyValue::Uniform(1.5),
            },
            PropertyDef {
                name: "WellDepth".into(),
                unit: Unit::Energy,
                value: PropertyValue::Uniform(1.0),
            },
            PropertyDef {
                name: "Elasticity".into(),
                unit: Unit::Dimensionless,
                value: PropertyValue::Uniform(1.0),
            },
            PropertyDef {
                name: "MomentOfInertia".into(),
                unit: Unit::MomentOfInertia,
                value: PropertyValue::Uniform(0.1),
            },
        ]);
        let mass = properties.lookup("Mass", Unit::Mass).unwrap();
        let inertia = properties
            .lookup("MomentOfInertia", Unit::MomentOfInertia)
            .ok();

        World {
            particles,
            orientations: None,
            properties,
            boundary: Boundary::new(Vec3::new(100.0, 100.0, 100.0),
                BoundaryKind::Periodic),
            liouvillean: Liouvillean::Newtonian,
            sampler: Sampler::from_seed(12345),
            time: 0.0,
            event_count: 0,
            mass,
            inertia,
            internal_energy: 0.0,
            last_collision: None,
            tolerate_invariants: false,
        }
    }
}
