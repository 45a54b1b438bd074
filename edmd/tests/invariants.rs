//! Universal invariants checked over whole runs: conservation laws,
//! overlap bounds, capture consistency, cell membership.

use edmd::boundary::BoundaryKind;
use edmd::config::{Document, FlowDef, GlobalDef, InteractionDef, PairRangeDef,
    ParticleDef};
use edmd::interaction::{Interaction, InteractionKind};
use edmd::properties::{PropertyDef, PropertyValue, Unit};
use edmd::simulation::{Simulation, Step};
use edmd::vector::Vec3;

fn uniform(name: &str, unit: Unit, value: f64) -> PropertyDef {
    PropertyDef {
        name: name.into(),
        unit,
        value: PropertyValue::Uniform(value),
    }
}

/// A small dense gas on a lattice with randomized velocities.
fn gas_document(n_side: usize, spacing: f64, well: bool) -> Document {
    let n = n_side * n_side * n_side;
    let side = n_side as f64 * spacing;

    let mut seed_state = 0x2545_F491_4F6C_DD1D_u64;
    let mut uniform01 = move || {
        seed_state ^= seed_state << 13;
        seed_state ^= seed_state >> 7;
        seed_state ^= seed_state << 17;
        (seed_state >> 11) as f64 / (1u64 << 53) as f64
    };

    let mut particles = Vec::new();
    let mut momentum = Vec3::zero();
    for id in 0..n {
        let (x, y, z) = (id % n_side, (id / n_side) % n_side, id / (n_side * n_side));
        let centre = |c: usize| (c as f64 + 0.5) * spacing - side / 2.0;
        let velocity = Vec3::new(uniform01() - 0.5, uniform01() - 0.5, uniform01() - 0.5);
        momentum += velocity;
        particles.push(ParticleDef {
            position: Vec3::new(centre(x), centre(y), centre(z)),
            velocity,
            orientation: None,
        });
    }
    // Remove the centre-of-mass drift so momentum conservation is
    // checked around zero.
    for p in &mut particles {
        p.velocity -= momentum / n as f64;
    }

    let interaction = if well {
        InteractionDef::SquareWell {
            name: "well".into(),
            range: PairRangeDef::All,
            diameter: "Diameter".into(),
            lambda: "Lambda".into(),
            well_depth: "WellDepth".into(),
            elasticity: "Elasticity".into(),
            captures: None,
        }
    } else {
        InteractionDef::HardSphere {
            name: "bulk".into(),
            range: PairRangeDef::All,
            diameter: "Diameter".into(),
            elasticity: "Elasticity".into(),
        }
    };

    Document {
        simulation_size: Vec3::new(side, side, side),
        boundary: BoundaryKind::Periodic,
        flow: FlowDef::Newtonian,
        particles,
        properties: vec![
            uniform("Mass", Unit::Mass, 1.0),
            uniform("Diameter", Unit::Length, 1.0),
            uniform("Lambda", Unit::Dimensionless, 1.5),
            uniform("WellDepth", Unit::Energy, 0.25),
            uniform("Elasticity", Unit::Dimensionless, 1.0),
        ],
        genus: Vec::new(),
        topology: Vec::new(),
        interactions: vec![interaction],
        locals: Vec::new(),
        globals: vec![
            GlobalDef::Cells { name: "cells".into(), overlink: None, oversize: None,
                shearing: false },
            GlobalDef::PbcSentinel { name: "pbc".into() },
        ],
        systems: Vec::new(),
        seed: 7,
        tolerate_invariants: false,
    }
}

fn total_momentum(sim: &Simulation) -> Vec3 {
    sim.world.particles.iter().map(|p| p.velocity).sum()
}

fn run_events(sim: &mut Simulation, events: u64) {
    sim.max_events = Some(sim.world.event_count + events);
    while sim.step().unwrap() == Step::Event {}
}

fn min_separation(sim: &Simulation) -> f64 {
    let n = sim.world.particles.len();
    let mut min = f64::INFINITY;
    for i in 0..n {
        for j in (i + 1)..n {
            min = min.min(sim.world.pair_data(i, j).r2.sqrt());
        }
    }
    min
}

#[test]
fn hard_sphere_gas_conserves_energy_and_momentum() {
    let mut sim = gas_document(4, 2.0, false).build().unwrap();
    sim.initialise().unwrap();

    let ke_before = sim.world.kinetic_energy();
    let p_before = total_momentum(&sim);

    run_events(&mut sim, 2000);
    assert!(sim.world.event_count >= 500, "gas too dilute to test anything");

    let ke_after = sim.world.kinetic_energy();
    let p_after = total_momentum(&sim);

    assert!((ke_after - ke_before).abs() < 1e-8, "KE drifted by {}",
        ke_after - ke_before);
    assert!((p_after - p_before).nrm() < 1e-9);

    // Time is monotone and no pair ended closer than the core.
    assert!(sim.world.time > 0.0);
    assert!(min_separation(&sim) >= 1.0 - 1e-9);
}

#[test]
fn square_well_gas_conserves_total_energy_and_capture_state() {
    let mut sim = gas_document(4, 2.0, true).build().unwrap();
    sim.initialise().unwrap();

    let total_before = sim.world.kinetic_energy() + sim.world.internal_energy;

    run_events(&mut sim, 2000);

    let total_after = sim.world.kinetic_energy() + sim.world.internal_energy;
    assert!((total_after - total_before).abs() < 1e-8,
        "total energy drifted by {}", total_after - total_before);

    // The capture map agrees with the geometry for every pair.
    let Interaction::SquareWell(well) = &sim.interactions[0] else {
        panic!("expected the square well");
    };
    let n = sim.world.particles.len();
    for i in 0..n {
        for j in (i + 1)..n {
            assert!(well.capture_consistent(&sim.world, i, j),
                "capture state of ({i}, {j}) disagrees with geometry");
        }
    }
}

#[test]
fn cell_membership_invariant_holds_throughout() {
    let mut sim = gas_document(3, 2.0, false).build().unwrap();
    sim.initialise().unwrap();

    for _ in 0..300 {
        if sim.step().unwrap() != Step::Event {
            break;
        }
        let cells = edmd::global::find_cells(&sim.globals).unwrap();
        for id in 0..sim.world.particles.len() {
            let position = sim.world.folded_position(id);
            assert_eq!(cells.cell_of(id),
                cells.cell_of_position(&sim.world, position),
                "particle {id} in the wrong cell at t = {}", sim.world.time);
        }
    }
}

#[test]
fn neighbourhood_and_dumb_schedulers_agree() {
    // The same gas with and without a cell list must produce the same
    // trajectory: the neighbourhood enumeration may not miss events. A
    // halt at a fixed time lands both runs on the identical state.
    let mut doc = gas_document(3, 2.0, false);
    doc.systems = vec![edmd::config::SystemDef::Halt { name: "halt".into(), time: 5.0 }];
    let mut with_cells = doc.clone().build().unwrap();
    with_cells.initialise().unwrap();

    doc.globals.clear();
    let mut dumb = doc.build().unwrap();
    dumb.initialise().unwrap();

    for sim in [&mut with_cells, &mut dumb] {
        sim.max_events = Some(100_000);
        sim.run().unwrap();
        assert!((sim.world.time - 5.0).abs() < 1e-12);
        sim.world.update_all();
    }

    for id in 0..with_cells.world.particles.len() {
        let a = with_cells.world.particles[id];
        let b = dumb.world.particles[id];
        assert!((a.position - b.position).nrm() < 1e-6,
            "particle {id} diverged: {:?} vs {:?}", a.position, b.position);
        assert!((a.velocity - b.velocity).nrm() < 1e-6);
    }
}
