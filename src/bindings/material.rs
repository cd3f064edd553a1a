// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Materials: which pass draws an instance in each stage, plus shared uniform values.

Passes are assigned per stage name, so a material can be set up before the stages it
will be drawn in exist.  A stage without an assignment simply does not draw the
material's instances.

```
use stages_and_passes::bindings::material::Material;
use stages_and_passes::bindings::uniform::Uniform;

let mut material = Material::new("glass");
assert!(material.pass("main").is_none());
material.set_uniform("uOpacity", Some(Uniform::Float(0.25)));
assert_eq!(material.uniform("uOpacity"), Some(&Uniform::Float(0.25)));
assert!(material.uniform("uUnset").is_none());
```
*/

use crate::bindings::uniform::{Uniform, UniformMap};
use crate::images::registry::{Handle, Kind};
use crate::images::render_pass::PassId;

pub type MaterialId = Handle<Material>;

#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    passes: Vec<(String, PassId)>,
    uniforms: UniformMap,
}

impl Kind for Material {
    const KIND: &'static str = "material";
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passes: Vec::new(),
            uniforms: UniformMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assigns `pass` for the stage named `stage`, or removes the assignment with `None`.
    ///
    /// Pass handles are checked by [`crate::images::Device::set_material_pass`].
    pub fn set_pass(&mut self, stage: &str, pass: Option<PassId>) {
        let position = self.passes.iter().position(|(s, _)| s == stage);
        match (position, pass) {
            (Some(i), Some(p)) => self.passes[i].1 = p,
            (None, Some(p)) => self.passes.push((stage.to_string(), p)),
            (Some(i), None) => {
                self.passes.remove(i);
            }
            (None, None) => {}
        }
    }

    pub fn set_passes(&mut self, stages: &[&str], pass: Option<PassId>) {
        for stage in stages {
            self.set_pass(stage, pass);
        }
    }

    /// The pass for `stage`; unknown stages have none.
    pub fn pass(&self, stage: &str) -> Option<PassId> {
        self.passes
            .iter()
            .find(|(s, _)| s == stage)
            .map(|(_, p)| *p)
    }

    /// `(stage name, pass)` assignments in the order they were made.
    pub fn passes(&self) -> impl Iterator<Item = (&str, PassId)> {
        self.passes.iter().map(|(s, p)| (s.as_str(), *p))
    }

    pub(crate) fn forget_pass(&mut self, pass: PassId) -> bool {
        let before = self.passes.len();
        self.passes.retain(|(_, p)| *p != pass);
        before != self.passes.len()
    }

    pub fn set_uniform(&mut self, name: &str, value: Option<Uniform>) {
        self.uniforms.set(name, value);
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> &UniformMap {
        &self.uniforms
    }

    pub(crate) fn uniforms_mut(&mut self) -> &mut UniformMap {
        &mut self.uniforms
    }
}
