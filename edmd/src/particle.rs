//! The fundamental particle record and its optional orientation data.

use crate::vector::Vec3;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Particle state flags. `DYNAMIC` marks particles subject to the
    /// gravitational acceleration of the active flow; asleep particles
    /// have it cleared. `ALIVE` marks particles present in the system.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct StateFlags: u32 {
        /// Subject to gravity under the gravity flow.
        const DYNAMIC = 0x01;
        /// Present in the simulation.
        const ALIVE = 0x02;
    }
}

// Snapshots store the raw bits.
impl Serialize for StateFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for StateFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_bits_truncate(u32::deserialize(deserializer)?))
    }
}

impl Default for StateFlags {
    fn default() -> Self {
        Self::DYNAMIC | Self::ALIVE
    }
}

/// A single particle. The stored position and velocity are the values at
/// the particle's *peculiar time*, not at the current system time; the
/// delayed-states optimization streams a particle only when an event
/// involves it.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Particle {
    /// Dense, stable identifier; also the index into the particle store.
    pub id: usize,
    /// Position at the peculiar time.
    pub position: Vec3,
    /// Velocity at the peculiar time.
    pub velocity: Vec3,
    /// The particle's local clock. Invariant: equals the system time
    /// minus the time since this particle was last streamed.
    pub peculiar_time: f64,
    /// State flags.
    pub state: StateFlags,
}

impl Particle {
    /// Builds a particle at rest on its own clock.
    #[must_use]
    pub fn new(id: usize, position: Vec3, velocity: Vec3) -> Self {
        Self {
            id,
            position,
            velocity,
            peculiar_time: 0.0,
            state: StateFlags::default(),
        }
    }

    /// Tests a state flag.
    #[must_use]
    pub fn test_state(&self, flag: StateFlags) -> bool {
        self.state.contains(flag)
    }

    /// True when the particle feels gravity.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.test_state(StateFlags::DYNAMIC)
    }
}

/// Orientation data attached to particles when the active flow needs it
/// (lines, dumbbells, rough spheres).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Orientation {
    /// Unit director.
    pub director: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
}

impl Orientation {
    /// Builds orientation data, normalizing the director.
    #[must_use]
    pub fn new(director: Vec3, angular_velocity: Vec3) -> Self {
        Self {
            director: director.normalized(),
            angular_velocity,
        }
    }
}
