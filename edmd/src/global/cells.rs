//! The cell neighbour list. Space is partitioned into cells at least as
//! wide as the largest interaction distance; each particle belongs to
//! the cell containing its folded position and only tests pairs against
//! its own and adjacent cells. Cell-transit events drive maintenance.

use super::{global_event, GlobalKind, GlobalOutcome};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, NEventData};
use crate::interaction::Interaction;
use crate::local::{Local, LocalKind};
use crate::scheduler::Scheduler;
use crate::simulation::World;
use crate::vector::{Vec3, NDIM};
use serde::{Deserialize, Serialize};

/// Relative width margin between the lattice spacing and the maximum
/// interaction distance that is folded into the overlapping cell
/// dimension.
const LAMBDA: f64 = 0.99;

/// The cell list global.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Cells {
    name: String,
    /// Neighbourhood radius in cells.
    overlink: usize,
    /// Safety factor on the cell width.
    oversize: f64,
    /// Use the Lees-Edwards shearing paths.
    shearing: bool,
    /// Cells per dimension.
    counts: [usize; NDIM],
    /// Lattice spacing per dimension.
    lattice: Vec3,
    /// Overlapping cell extents (≥ lattice).
    dimension: Vec3,
    /// Grid offset centring the lattice on the origin.
    offset: Vec3,
    /// Head of each cell's resident list (`usize::MAX` = empty).
    heads: Vec<usize>,
    /// Doubly-linked resident list per particle.
    next: Vec<usize>,
    prev: Vec<usize>,
    /// Cell of each particle.
    member: Vec<usize>,
    /// Local ids incident on each cell.
    cell_locals: Vec<Vec<usize>>,
}

const NONE: usize = usize::MAX;

impl Cells {
    /// Builds an uninitialised cell list; [`GlobalKind::initialise`]
    /// constructs the lattice.
    #[must_use]
    pub fn new(name: String, overlink: usize, oversize: f64, shearing: bool) -> Self {
        Self {
            name,
            overlink: overlink.max(1),
            oversize: oversize.max(1.0),
            shearing,
            counts: [0; NDIM],
            lattice: Vec3::zero(),
            dimension: Vec3::zero(),
            offset: Vec3::zero(),
            heads: Vec::new(),
            next: Vec::new(),
            prev: Vec::new(),
            member: Vec::new(),
            cell_locals: Vec::new(),
        }
    }

    /// Total number of cells.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.counts.iter().product()
    }

    /// Largest interaction distance this lattice supports.
    #[must_use]
    pub fn max_supported_interaction_length(&self) -> f64 {
        (0..NDIM)
            .map(|dim| self.dimension[dim])
            .fold(f64::INFINITY, f64::min)
    }

    fn cell_id(&self, coords: [isize; NDIM]) -> usize {
        let mut id = 0;
        for dim in (0..NDIM).rev() {
            let count = self.counts[dim] as isize;
            let wrapped = coords[dim].rem_euclid(count) as usize;
            id = id * self.counts[dim] + wrapped;
        }
        id
    }

    fn coords_of(&self, mut id: usize) -> [isize; NDIM] {
        let mut coords = [0; NDIM];
        for (dim, c) in coords.iter_mut().enumerate() {
            *c = (id % self.counts[dim]) as isize;
            id /= self.counts[dim];
        }
        coords
    }

    /// Cell containing a folded position.
    #[must_use]
    pub fn cell_of_position(&self, world: &World, pos: Vec3) -> usize {
        let mut pos = pos;
        world.boundary.apply(&mut pos);
        let mut coords = [0; NDIM];
        for dim in 0..NDIM {
            let half = 0.5 * world.boundary.primary_image[dim];
            #[allow(clippy::cast_possible_truncation)]
            let c = ((pos[dim] + half - self.offset[dim]) / self.lattice[dim]).floor()
                as isize;
            coords[dim] = c;
        }
        self.cell_id(coords)
    }

    /// Current cell of a particle.
    #[must_use]
    pub fn cell_of(&self, particle: usize) -> usize {
        self.member[particle]
    }

    /// Corner of a cell in the primary image.
    fn cell_origin(&self, world: &World, cell: usize) -> Vec3 {
        let coords = self.coords_of(cell);
        let mut origin = Vec3::zero();
        for dim in 0..NDIM {
            #[allow(clippy::cast_precision_loss)]
            let c = coords[dim] as f64;
            origin[dim] = c * self.lattice[dim] - 0.5 * world.boundary.primary_image[dim]
                + self.offset[dim];
        }
        origin
    }

    /// The periodic image of the cell origin nearest the particle, so
    /// the relative position is valid even across the boundary.
    fn nearest_origin(&self, world: &World, cell: usize, pos: Vec3) -> Vec3 {
        let origin = self.cell_origin(world, cell);
        let mut image = origin;
        for dim in 0..NDIM {
            let primary = world.boundary.primary_image[dim];
            image[dim] -= primary * ((origin[dim] - pos[dim]) / primary).round();
        }
        image
    }

    fn insert(&mut self, particle: usize, cell: usize) {
        let head = self.heads[cell];
        self.next[particle] = head;
        self.prev[particle] = NONE;
        if head != NONE {
            self.prev[head] = particle;
        }
        self.heads[cell] = particle;
        self.member[particle] = cell;
    }

    fn remove(&mut self, particle: usize) {
        let (prev, next) = (self.prev[particle], self.next[particle]);
        if prev == NONE {
            self.heads[self.member[particle]] = next;
        } else {
            self.next[prev] = next;
        }
        if next != NONE {
            self.prev[next] = prev;
        }
    }

    fn residents(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(
            (self.heads[cell] != NONE).then_some(self.heads[cell]),
            move |&p| (self.next[p] != NONE).then_some(self.next[p]),
        )
    }

    /// Every particle that may interact with `particle`: the residents
    /// of its cell and the surrounding `(2 overlink + 1)^3` block, plus
    /// the Lees-Edwards strip when the particle sits in a boundary row.
    pub fn neighborhood(&self, particle: usize, mut visit: impl FnMut(usize)) {
        let coords = self.coords_of(self.member[particle]);
        let reach = self.overlink as isize;

        for dz in -reach..=reach {
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let cell =
                        self.cell_id([coords[0] + dx, coords[1] + dy, coords[2] + dz]);
                    for other in self.residents(cell) {
                        if other != particle {
                            visit(other);
                        }
                    }
                }
            }
        }

        if self.shearing
            && (coords[1] == 0 || coords[1] == self.counts[1] as isize - 1)
        {
            self.le_strip(particle, &mut visit);
        }
    }

    /// The extra Lees-Edwards neighbourhood: every x cell of the three
    /// z-rows around the particle on the opposite y boundary.
    fn le_strip(&self, particle: usize, visit: &mut impl FnMut(usize)) {
        let coords = self.coords_of(self.member[particle]);
        let opposite_y = if coords[1] > 0 {
            0
        } else {
            self.counts[1] as isize - 1
        };

        for dz in -1..=1 {
            for x in 0..self.counts[0] as isize {
                let cell = self.cell_id([x, opposite_y, coords[2] + dz]);
                for other in self.residents(cell) {
                    if other != particle {
                        visit(other);
                    }
                }
            }
        }
    }

    /// Local ids incident on the particle's current cell.
    #[must_use]
    pub fn locals_of(&self, particle: usize) -> &[usize] {
        &self.cell_locals[self.member[particle]]
    }

    fn transit_time(&self, world: &World, particle: usize) -> (f64, i32) {
        let (pos, vel) = world.folded_state(particle);
        let origin = self.nearest_origin(world, self.member[particle], pos);
        world.liouvillean.square_cell_transit_dir(
            pos - origin,
            vel,
            self.dimension,
            world.particles[particle].is_dynamic(),
        )
    }

    /// Rebuilds the lattice for the given maximum interaction distance
    /// and re-registers every particle and local.
    pub fn rebuild(&mut self, world: &mut World, locals: &[Local], max_dist: f64)
        -> Result<()> {
        let width = self.oversize * max_dist / self.overlink as f64;
        if width <= 0.0 {
            return Err(Error::Capacity(
                "cell list needs a positive interaction distance".into(),
            ));
        }

        let mut counts = [0usize; NDIM];
        for dim in 0..NDIM {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = (world.boundary.primary_image[dim]
                / (width * (1.0 + 10.0 * f64::EPSILON)))
                .floor() as usize;
            if count < 3 {
                return Err(Error::Capacity(format!(
                    "not enough cells in dimension {dim}: the primary image fits \
                     {count} cells of width {width}, need at least 3"
                )));
            }
            counts[dim] = count;
        }
        self.counts = counts;

        for dim in 0..NDIM {
            #[allow(clippy::cast_precision_loss)]
            let lattice = world.boundary.primary_image[dim] / counts[dim] as f64;
            self.lattice[dim] = lattice;
            self.dimension[dim] = lattice + (lattice - width) * LAMBDA;
            self.offset[dim] = -(lattice - width) * LAMBDA / 2.0;
        }

        log::info!(
            "cell list: {}x{}x{} cells, lattice ({:.4}, {:.4}, {:.4})",
            counts[0], counts[1], counts[2],
            self.lattice.x, self.lattice.y, self.lattice.z
        );

        let n_cells = self.n_cells();
        let n_particles = world.particles.len();
        self.heads = vec![NONE; n_cells];
        self.next = vec![NONE; n_particles];
        self.prev = vec![NONE; n_particles];
        self.member = vec![0; n_particles];

        world.update_all();
        for id in 0..n_particles {
            let cell = self.cell_of_position(world, world.particles[id].position);
            self.insert(id, cell);
        }

        // Register locals on every cell they touch, with a small margin
        // so objects on the boundary are included.
        self.cell_locals = vec![Vec::new(); n_cells];
        for cell in 0..n_cells {
            let origin = self.cell_origin(world, cell);
            for (lid, local) in locals.iter().enumerate() {
                if local.is_in_cell(origin - self.dimension * 0.0001,
                    self.dimension * 1.0002)
                {
                    self.cell_locals[cell].push(lid);
                }
            }
        }
        Ok(())
    }

    /// The destination cell of a shearing boundary wrap: the y row wraps
    /// and the x coordinate is displaced by the accumulated slide.
    fn shearing_wrap_cell(&self, world: &World, particle: usize, down: bool) -> usize {
        let (pos, _) = world.folded_state(particle);
        let mut shifted = pos;
        // Step into the next image so folding lands in the opposite row.
        shifted.y += if down { -0.5 } else { 0.5 } * self.dimension.y;
        let mut folded = shifted;
        world.boundary.apply(&mut folded);
        let mut coords = self.coords_of(self.cell_of_position(world, folded));
        let old = self.coords_of(self.member[particle]);
        coords[1] = (old[1] + if down { -1 } else { 1 })
            .rem_euclid(self.counts[1] as isize);
        coords[2] = old[2];
        self.cell_id(coords)
    }
}

impl GlobalKind for Cells {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (dt, _) = self.transit_time(world, particle);
        global_event(self_id, particle, dt, EventKind::CELL)
    }

    #[allow(clippy::too_many_lines)]
    fn run_event(&mut self, world: &mut World, scheduler: &mut Scheduler,
        interactions: &[Interaction], locals: &[Local], event: &Event)
        -> Result<GlobalOutcome> {
        let particle = event.particle;
        // The scheduler and all sources expect the particle up to date,
        // even though a transit changes no physical state.
        world.update_particle(particle);

        let (_, direction) = self.transit_time(world, particle);
        let dim = direction.unsigned_abs() as usize - 1;
        let positive = direction > 0;
        let old_coords = self.coords_of(self.member[particle]);
        let count = self.counts[dim] as isize;

        let at_boundary = old_coords[1] == if positive { count - 1 } else { 0 };
        let entering_boundary =
            old_coords[1] == if positive { count - 2 } else { 1 };

        if self.shearing && dim == 1 && at_boundary {
            // Wrapping through the sheared boundary: the destination x
            // cell depends on the accumulated slide, and the whole
            // neighbourhood is rescanned rather than just the new strip.
            let end_cell = self.shearing_wrap_cell(world, particle, !positive);
            self.remove(particle);
            self.insert(particle, end_cell);

            self.neighborhood(particle, |other| {
                scheduler.add_pair_event(world, interactions, particle, other);
            });
        } else if self.shearing && dim == 1 && entering_boundary {
            // Entering the boundary row: the newly visible cells are the
            // Lees-Edwards strip on the opposite side.
            let mut coords = old_coords;
            coords[dim] += if positive { 1 } else { -1 };
            let end_cell = self.cell_id(coords);
            self.remove(particle);
            self.insert(particle, end_cell);

            self.le_strip(particle, &mut |other| {
                scheduler.add_pair_event(world, interactions, particle, other);
            });
        } else {
            let mut coords = old_coords;
            coords[dim] += if positive { 1 } else { -1 };
            let end_cell = self.cell_id(coords);
            self.remove(particle);
            self.insert(particle, end_cell);

            // The newly visible wall of cells: overlink deep ahead in
            // the transit direction, full breadth in the other two.
            let reach = self.overlink as isize;
            let ahead = if positive { reach } else { -reach };
            let new_coords = self.coords_of(end_cell);
            let (dim1, dim2) = ((dim + 1) % NDIM, (dim + 2) % NDIM);

            for d1 in -reach..=reach {
                for d2 in -reach..=reach {
                    let mut coords = new_coords;
                    coords[dim] += ahead;
                    coords[dim1] += d1;
                    coords[dim2] += d2;
                    let cell = self.cell_id(coords);
                    for other in self.residents(cell) {
                        if other != particle {
                            scheduler.add_pair_event(world, interactions, particle, other);
                        }
                    }
                }
            }

            // A z transit within a boundary row re-exposes the strip.
            if self.shearing
                && dim == 2
                && (old_coords[1] == 0 || old_coords[1] == self.counts[1] as isize - 1)
            {
                self.le_strip(particle, &mut |other| {
                    scheduler.add_pair_event(world, interactions, particle, other);
                });
            }
        }

        // The locals of the destination cell.
        for &lid in &self.cell_locals[self.member[particle]] {
            scheduler.add_local_event(world, locals, particle, lid);
        }

        // Replace the consumed virtual event with a fresh transit.
        let source_id = match event.source {
            crate::event::EventSource::Global(id) => id,
            _ => unreachable!(),
        };
        let fresh = self.get_event(world, source_id, particle);
        scheduler.push(world, fresh);

        Ok((NEventData::default(), Vec::new()))
    }

    fn initialise(&mut self, world: &mut World, locals: &[Local], _self_id: usize,
        max_interaction_distance: f64) -> Result<()> {
        if self.shearing && self.overlink != 1 {
            return Err(Error::Configuration(
                "the shearing cell list cannot overlink".into(),
            ));
        }
        if self.shearing
            && !matches!(world.boundary.kind,
                crate::boundary::BoundaryKind::LeesEdwards { .. })
        {
            log::warn!("shearing cell list used without Lees-Edwards boundaries");
        }
        self.rebuild(world, locals, max_interaction_distance)
    }

    fn as_cells(&self) -> Option<&Cells> {
        Some(self)
    }

    fn as_cells_mut(&mut self) -> Option<&mut Cells> {
        Some(self)
    }
}
