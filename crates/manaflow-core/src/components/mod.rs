//! Component definitions for the mana simulation.
//!
//! Components are plain data owned by the grid.
//! Behavior that spans cells lives in systems.

mod cell;
mod mana;
mod terrain;

pub use cell::*;
pub use mana::*;
pub use terrain::*;
