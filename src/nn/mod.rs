//! Parameter containers
//!
//! A [`Module`] exposes its parameters under dotted paths
//! (`encoder.0.weight`). Submodule names are derived from those paths, so
//! any dotted prefix of a parameter path names a submodule and the empty
//! string names the whole module.

mod linear;
mod module;


pub use linear::{Linear, Mlp};
pub use module::{prefixed, Module, StateDict};
