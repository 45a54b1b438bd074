//! Shape closures for the non-polynomial predictors. Each shape exposes
//! the overlap function `F`, its first two time derivatives and bounds on
//! them, which is exactly what the Frenkel root search needs to bracket
//! a contact robustly.

mod dumbbells;
mod frenkel;
mod lines;
mod plate;
mod triangle;

pub use dumbbells::DumbbellsShape;
pub use frenkel::{frenkel_root_search, quad_root_hunter};
pub use lines::LinesShape;
pub use plate::OscillatingPlateShape;
pub use triangle::{sphere_triangle_root, TriangleRegion};

/// Contract between a moving contact function and the root search.
///
/// `f` is the signed separation measure: a root of `f` in time is a
/// candidate contact. `d2f_max` must bound `|f''|` over the whole search
/// window; the hunter uses it to grow the bracket without stepping over
/// sign changes.
pub trait Shape: Clone {
    /// Advances the shape state by `dt`.
    fn stream(&mut self, dt: f64);
    /// Separation measure at the current state.
    fn f(&self) -> f64;
    /// First time derivative of `f`.
    fn df(&self) -> f64;
    /// Upper bound on `|f'|` over the window.
    fn df_max(&self) -> f64;
    /// Second time derivative of `f`.
    fn d2f(&self) -> f64;
    /// Upper bound on `|f''|` over the window.
    fn d2f_max(&self) -> f64;
    /// Whether a root of `f` at the current state is a physical contact
    /// (e.g. the crossing point lies within the rod length).
    fn test_root(&self) -> bool;
}
