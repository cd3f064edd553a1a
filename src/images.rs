// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The rendering component of stages_and_passes */

pub use caps::Caps;
pub use device::Device;

pub mod bounds;
pub mod caps;
pub mod depth;
pub mod device;
pub mod frame;
pub mod index_algorithms;
pub mod instance;
pub mod mesh;
pub mod registry;
pub mod render_pass;
pub mod shader;
pub mod stage;
pub mod target;
pub mod texture;
pub mod vertex_algorithms;
pub mod vertex_layout;
