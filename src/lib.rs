// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! stages_and_passes is a staged rendering layer over an immediate-mode GPU API.

A caller describes a scene as textures, targets, passes, materials, meshes, stages and
instances.  Every frame, the [`images::Device`] turns that description into correctly
ordered, correctly bound draw calls, validating GPU-level invariants in software first and
rebuilding every native object after the context is lost.

Here is how the pieces relate:

| Resource   | Owns                                                      | Drawn by                                   |
|------------|-----------------------------------------------------------|--------------------------------------------|
| Texture    | A mip chain per face, with optional retained CPU sources  | Bound to sampler uniforms, or as a target color |
| Depth      | A depth(-stencil) surface, optionally readable            | Attached to targets, or sampled             |
| Target     | Ordered color mips plus an optional depth                 | Stages draw into it                         |
| Pass       | A linked program, render state and one sampler per slot    | Chosen per stage by a material              |
| Material   | Stage name → pass, plus shared uniforms                   | Instances reference it                      |
| Stage      | A target, view, projection, clear and stage uniforms      | `Device::frame`, in creation order          |
| Instance   | A mesh, a material, a transform and override uniforms     | Every stage its material has a pass for     |

# Uniform precedence

Uniforms are bound stage first, then material, then instance, so the most specific scope
wins for that draw without changing the broader scope's value.

# Context loss

Context loss is not an error.  While lost, [`images::Device::frame`] draws nothing and
reports it in its stats.  On restore the device re-creates textures (re-uploading every
mip whose source was retained), depths, targets and passes in that order, and meshes
re-upload at their next draw.

# Backends

The core talks to the GPU only through [`imp::Native`], a WebGL-shaped command trait.
[`imp::headless::HeadlessContext`] is a software implementation that needs no GPU and
is what the test suite runs against.  The `backend_glow` feature adds a backend over a
live OpenGL or WebGL context.
*/

pub mod bindings;
pub mod error;
pub mod images;
pub mod imp;
pub mod pixel_formats;

pub use error::{Error, Result};
pub use glam;
