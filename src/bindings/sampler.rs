// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Per-slot texture sampling configuration.

Each sampler uniform a pass declares gets one [`Sampler`], holding the addressing,
filtering and anisotropy applied to whatever texture is bound to that slot.

```
use stages_and_passes::bindings::sampler::{Address, Filter, SamplerAddress};
# use stages_and_passes::bindings::sampler::Sampler;
# fn configure(sampler: &mut Sampler) {
sampler.set_address(Address::Repeat);
assert_eq!(sampler.address(), SamplerAddress { u: Address::Repeat, v: Address::Repeat });
sampler.set_address_uv(Address::Clamp, Address::Mirror);
sampler.set_filter(Filter::Trilinear);
# }
```
*/

use crate::error::{Result, ensure_config};
use crate::images::caps::Caps;
use crate::imp::{Native, gl};
use crate::pixel_formats::Format;

/// Wrap mode along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Address {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

impl Address {
    pub const fn native(self) -> u32 {
        match self {
            Address::Clamp => gl::CLAMP_TO_EDGE,
            Address::Repeat => gl::REPEAT,
            Address::Mirror => gl::MIRRORED_REPEAT,
        }
    }
}

/// Per-axis wrap modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerAddress {
    pub u: Address,
    pub v: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    /// Nearest texel.
    None,
    #[default]
    Bilinear,
    /// Bilinear within and linear between mip levels.
    Trilinear,
}

impl Filter {
    /// Native (min, mag) filters.  Mip-aware minification only when `mipmapped`.
    pub const fn native(self, mipmapped: bool) -> (u32, u32) {
        match (self, mipmapped) {
            (Filter::None, false) => (gl::NEAREST, gl::NEAREST),
            (Filter::None, true) => (gl::NEAREST_MIPMAP_NEAREST, gl::NEAREST),
            (Filter::Bilinear, false) | (Filter::Trilinear, false) => (gl::LINEAR, gl::LINEAR),
            (Filter::Bilinear, true) => (gl::LINEAR_MIPMAP_NEAREST, gl::LINEAR),
            (Filter::Trilinear, true) => (gl::LINEAR_MIPMAP_LINEAR, gl::LINEAR),
        }
    }
}

/// The texture dimension a sampler uniform expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerDimension {
    D2,
    Cube,
}

impl SamplerDimension {
    pub const fn native_target(self) -> u32 {
        match self {
            SamplerDimension::D2 => gl::TEXTURE_2D,
            SamplerDimension::Cube => gl::TEXTURE_CUBE_MAP,
        }
    }
}

/// What a sampler is about to sample, as far as validation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SampledImage {
    pub(crate) format: Format,
    pub(crate) power_of_two: bool,
    pub(crate) cube: bool,
    pub(crate) mipmapped: bool,
    /// `Some(readable)` for depth surfaces.
    pub(crate) depth_readable: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Sampler {
    name: String,
    dimension: SamplerDimension,
    unit: u32,
    address: SamplerAddress,
    filter: Filter,
    anisotropy: f32,
    max_anisotropy: f32,
}

impl Sampler {
    pub(crate) fn new(name: &str, dimension: SamplerDimension, unit: u32, caps: &Caps) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            unit,
            address: SamplerAddress::default(),
            filter: Filter::default(),
            anisotropy: 1.0,
            max_anisotropy: caps.sampler_max_anisotropy.max(1.0),
        }
    }

    /// The sampler uniform's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> SamplerDimension {
        self.dimension
    }

    /// Texture unit, assigned in declaration order.
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// Sets both axes.
    pub fn set_address(&mut self, mode: Address) {
        self.address = SamplerAddress { u: mode, v: mode };
    }

    pub fn set_address_uv(&mut self, u: Address, v: Address) {
        self.address = SamplerAddress { u, v };
    }

    pub fn address(&self) -> SamplerAddress {
        self.address
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Requests anisotropic filtering, clamped to `[1, caps.sampler_max_anisotropy]`.
    ///
    /// Without hardware support the level stays at 1.
    pub fn set_anisotropy(&mut self, level: f32) {
        if self.max_anisotropy <= 1.0 && level > 1.0 {
            logwise::warn_sync!(
                "anisotropic filtering unsupported; sampler {name} stays at 1",
                name = self.name.as_str()
            );
        }
        self.anisotropy = if level.is_nan() {
            1.0
        } else {
            level.clamp(1.0, self.max_anisotropy)
        };
    }

    pub fn anisotropy(&self) -> f32 {
        self.anisotropy
    }

    /// Rejects combinations that would silently sample black or garbage.
    pub(crate) fn check(&self, image: &SampledImage, caps: &Caps) -> Result<()> {
        let name = &self.name;
        if let Some(readable) = image.depth_readable {
            ensure_config!(
                readable && caps.readable_depth,
                "sampler {name}: depth was not created readable"
            );
        }
        let wants_cube = self.dimension == SamplerDimension::Cube;
        ensure_config!(
            image.cube == wants_cube,
            "sampler {name} expects a {} texture",
            if wants_cube { "cube" } else { "2D" }
        );
        let wraps = self.address.u != Address::Clamp || self.address.v != Address::Clamp;
        ensure_config!(
            image.power_of_two || !wraps,
            "sampler {name}: repeat addressing needs a power-of-two texture"
        );
        ensure_config!(
            image.power_of_two || !image.mipmapped,
            "sampler {name}: mipmapped textures must be power-of-two sized"
        );
        if image.depth_readable.is_none() && self.filter != Filter::None {
            ensure_config!(
                image.format.filterable(caps),
                "sampler {name}: {:?} cannot be filtered on this device; use Filter::None",
                image.format
            );
        }
        Ok(())
    }

    /// Writes this configuration into the texture bound to `target` on the active unit.
    pub(crate) fn apply<N: Native>(&self, native: &mut N, image: &SampledImage) {
        let target = self.dimension.native_target();
        let (min, mag) = if image.depth_readable.is_some() {
            (gl::NEAREST, gl::NEAREST)
        } else {
            self.filter.native(image.mipmapped)
        };
        native.tex_parameter_i32(target, gl::TEXTURE_WRAP_S, self.address.u.native() as i32);
        native.tex_parameter_i32(target, gl::TEXTURE_WRAP_T, self.address.v.native() as i32);
        native.tex_parameter_i32(target, gl::TEXTURE_MIN_FILTER, min as i32);
        native.tex_parameter_i32(target, gl::TEXTURE_MAG_FILTER, mag as i32);
        if self.max_anisotropy > 1.0 {
            native.tex_parameter_f32(target, gl::TEXTURE_MAX_ANISOTROPY_EXT, self.anisotropy);
        }
    }
}
