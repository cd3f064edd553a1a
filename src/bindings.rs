// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Defines binding types: uniform values, materials and samplers */

pub mod material;
pub mod sampler;
pub mod uniform;

pub use material::{Material, MaterialId};
pub use uniform::{Uniform, UniformMap};
