//! Fixed walls: specular, thermalizing (Andersen) and cylindrical.

use super::{local_event, plane_in_cell, LocalKind};
use crate::dynamics::Liouvillean;
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::ranges::ParticleRange;
use crate::simulation::World;
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// A fixed planar wall with elasticity `e`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Wall {
    name: String,
    range: ParticleRange,
    /// A point on the wall plane.
    pub origin: Vec3,
    /// Unit normal, pointing into the simulation volume.
    pub normal: Vec3,
    /// Elasticity of reflections.
    pub elasticity: f64,
    /// Optional rough-wall parameters `(tangential elasticity, contact
    /// radius)`; requires orientation data.
    pub roughness: Option<(f64, f64)>,
}

impl Wall {
    /// Builds a planar wall.
    #[must_use]
    pub fn new(name: String, range: ParticleRange, origin: Vec3, normal: Vec3,
        elasticity: f64) -> Self {
        Self {
            name,
            range,
            origin,
            normal: normal.normalized(),
            elasticity,
            roughness: None,
        }
    }
}

impl LocalKind for Wall {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &ParticleRange {
        &self.range
    }

    fn is_in_cell(&self, origin: Vec3, width: Vec3) -> bool {
        plane_in_cell(origin, width, self.origin, self.normal)
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (pos, vel) = world.folded_state(particle);
        let dt = world.liouvillean.wall_collision(pos, vel, self.origin, self.normal,
            world.particles[particle].is_dynamic());
        local_event(self_id, particle, dt, EventKind::WALL)
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let id = event.particle;
        let mass = world.mass_of(id);

        if let Some((et, radius)) = self.roughness {
            let inertia = world.inertia_of(id);
            let normal = self.normal;
            let e = self.elasticity;
            let orientations = world.orientations.as_mut().expect("rough wall orientation");
            let o = &mut orientations[id];
            let data = Liouvillean::run_rough_wall(&mut world.particles[id], o, normal, e,
                et, radius, mass, inertia);
            return Ok(NEventData::single(data));
        }

        let data = Liouvillean::run_wall_collision(&mut world.particles[id], self.normal,
            self.elasticity, mass);
        Ok(NEventData::single(data))
    }
}

/// A thermalizing wall: reflected particles leave with a fresh thermal
/// velocity at temperature `temperature`, tangential components
/// Gaussian, the normal component flux-weighted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AndersenWall {
    name: String,
    range: ParticleRange,
    /// A point on the wall plane.
    pub origin: Vec3,
    /// Unit normal, pointing into the simulation volume.
    pub normal: Vec3,
    /// Wall temperature.
    pub temperature: f64,
}

impl AndersenWall {
    /// Builds the wall.
    #[must_use]
    pub fn new(name: String, range: ParticleRange, origin: Vec3, normal: Vec3,
        temperature: f64) -> Self {
        Self {
            name,
            range,
            origin,
            normal: normal.normalized(),
            temperature,
        }
    }
}

impl LocalKind for AndersenWall {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &ParticleRange {
        &self.range
    }

    fn is_in_cell(&self, origin: Vec3, width: Vec3) -> bool {
        plane_in_cell(origin, width, self.origin, self.normal)
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (pos, vel) = world.folded_state(particle);
        let dt = world.liouvillean.wall_collision(pos, vel, self.origin, self.normal,
            world.particles[particle].is_dynamic());
        local_event(self_id, particle, dt, EventKind::WALL)
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let id = event.particle;
        let mass = world.mass_of(id);
        let sqrt_t = self.temperature.sqrt();
        let normal = self.normal;

        let data = Liouvillean::run_andersen_wall(&mut world.particles[id], normal, sqrt_t,
            mass, &mut world.sampler);
        Ok(NEventData::single(data))
    }
}

/// A cylindrical wall confining particles inside the given radius.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CylinderWall {
    name: String,
    range: ParticleRange,
    /// A point on the axis.
    pub origin: Vec3,
    /// Unit axis direction.
    pub axis: Vec3,
    /// Cylinder radius.
    pub radius: f64,
    /// Elasticity of reflections.
    pub elasticity: f64,
}

impl CylinderWall {
    /// Builds the wall.
    #[must_use]
    pub fn new(name: String, range: ParticleRange, origin: Vec3, axis: Vec3, radius: f64,
        elasticity: f64) -> Self {
        Self {
            name,
            range,
            origin,
            axis: axis.normalized(),
            radius,
            elasticity,
        }
    }
}

impl LocalKind for CylinderWall {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &ParticleRange {
        &self.range
    }

    fn is_in_cell(&self, origin: Vec3, width: Vec3) -> bool {
        // Distance of the cell centre to the axis against the half
        // diagonal: conservative, may include a few extra cells.
        let center = origin + width * 0.5;
        let mut rel = center - self.origin;
        rel -= self.axis * rel.dot(&self.axis);
        rel.nrm() - 0.5 * width.nrm() <= self.radius
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (pos, vel) = world.folded_state(particle);
        let dt = Liouvillean::cylinder_collision(pos, vel, self.origin, self.axis,
            self.radius);
        local_event(self_id, particle, dt, EventKind::WALL)
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let id = event.particle;
        let mass = world.mass_of(id);
        let data = Liouvillean::run_cylinder_collision(&mut world.particles[id],
            self.origin, self.axis, self.elasticity, mass);
        Ok(NEventData::single(data))
    }
}
