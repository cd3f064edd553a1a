// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Textures and their mip levels.

A [`Texture`] is an array of [`Mip`]s: one per face (six for cube maps) per level.  Each
mip may retain the [`MipSource`] it was last uploaded from, which is what lets the device
rebuild the texture after context loss.  Flushing a mip drops that source to save
memory; after a loss its contents are undefined.
*/

use crate::error::{Error, Result, ensure_config};
use crate::images::caps::Caps;
use crate::images::registry::{Handle, Kind};
use crate::imp::{Native, NativeObject, created, gl};
use crate::pixel_formats::{Format, FormatClass, Image, f16};
use std::sync::Arc;

pub type TextureId = Handle<Texture>;

/// How a texture's levels beyond 0 are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipMode {
    /// A single level.
    #[default]
    None,
    /// Levels are regenerated from level 0 after each upload.
    Generate,
    /// Every level is supplied by the caller.
    Explicit,
}

/**
Describes a texture to create.

```
use stages_and_passes::images::texture::{MipMode, TextureDescriptor};
use stages_and_passes::pixel_formats::Format;

let d = TextureDescriptor::new(Format::Rgba, 256, 64).with_mipmaps(MipMode::Generate);
assert_eq!(d.level_count(), 9);
```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub cube: bool,
    pub mipmaps: MipMode,
}

impl TextureDescriptor {
    pub fn new(format: Format, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            cube: false,
            mipmaps: MipMode::None,
        }
    }

    pub fn with_cube(mut self, cube: bool) -> Self {
        self.cube = cube;
        self
    }

    pub fn with_mipmaps(mut self, mipmaps: MipMode) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    pub fn face_count(&self) -> u32 {
        if self.cube { 6 } else { 1 }
    }

    pub fn level_count(&self) -> u32 {
        match self.mipmaps {
            MipMode::None => 1,
            MipMode::Generate | MipMode::Explicit => {
                self.width.max(self.height).max(1).ilog2() + 1
            }
        }
    }

    /// Size of `level`; never smaller than 1×1.
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        (
            (self.width >> level).max(1),
            (self.height >> level).max(1),
        )
    }

    pub(crate) fn validate(&self, caps: &Caps) -> Result<()> {
        let format = self.format;
        ensure_config!(
            !format.is_depth(),
            "{format:?} is a depth format; create a readable depth instead"
        );
        ensure_config!(
            format.supported(caps),
            "{format:?} textures are not supported on this device"
        );
        ensure_config!(
            self.width > 0 && self.height > 0,
            "texture size {}x{} is empty",
            self.width,
            self.height
        );
        let max = if self.cube {
            caps.cube_max_size
        } else {
            caps.texture_max_size
        };
        ensure_config!(
            self.width <= max && self.height <= max,
            "texture size {}x{} exceeds the maximum of {max}",
            self.width,
            self.height
        );
        if self.cube {
            ensure_config!(
                self.width == self.height,
                "cube map faces must be square, not {}x{}",
                self.width,
                self.height
            );
        }
        if self.mipmaps != MipMode::None {
            ensure_config!(
                self.width.is_power_of_two() && self.height.is_power_of_two(),
                "mipmapped texture size {}x{} is not a power of two",
                self.width,
                self.height
            );
        }
        ensure_config!(
            !(format.is_compressed() && self.mipmaps == MipMode::Generate),
            "{format:?} levels cannot be generated; supply them explicitly"
        );
        Ok(())
    }

    fn native_target(&self) -> u32 {
        if self.cube {
            gl::TEXTURE_CUBE_MAP
        } else {
            gl::TEXTURE_2D
        }
    }

    fn face_target(&self, face: u32) -> u32 {
        if self.cube {
            gl::TEXTURE_CUBE_MAP_POSITIVE_X + face
        } else {
            gl::TEXTURE_2D
        }
    }
}

/// CPU data for one mip.  Cloning shares the underlying allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum MipSource {
    /// Integer or block-compressed bytes.
    Bytes(Arc<[u8]>),
    Half(Arc<[f16]>),
    Float(Arc<[f32]>),
    Image(Arc<Image>),
}

impl MipSource {
    /// Whether both sources share one allocation.
    pub fn ptr_eq(&self, other: &MipSource) -> bool {
        match (self, other) {
            (MipSource::Bytes(a), MipSource::Bytes(b)) => Arc::ptr_eq(a, b),
            (MipSource::Half(a), MipSource::Half(b)) => Arc::ptr_eq(a, b),
            (MipSource::Float(a), MipSource::Float(b)) => Arc::ptr_eq(a, b),
            (MipSource::Image(a), MipSource::Image(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Converts to upload bytes for a `width`×`height` mip of `format`.
    pub(crate) fn to_bytes(&self, format: Format, width: u32, height: u32) -> Result<Vec<u8>> {
        let class = format.class();
        let expected = format.element_len(width, height);
        let (bytes, len) = match (self, class) {
            (MipSource::Bytes(b), FormatClass::Integer | FormatClass::Compressed) => {
                (b.to_vec(), b.len())
            }
            (MipSource::Half(h), FormatClass::Half) => {
                (h.iter().flat_map(|v| v.to_ne_bytes()).collect(), h.len())
            }
            (MipSource::Float(f), FormatClass::Float) => {
                (f.iter().flat_map(|v| v.to_ne_bytes()).collect(), f.len())
            }
            (MipSource::Image(image), FormatClass::Integer) => {
                ensure_config!(
                    image.width() == width && image.height() == height,
                    "image is {}x{} but the mip is {width}x{height}",
                    image.width(),
                    image.height()
                );
                let bytes = image
                    .pixels_as(format)
                    .ok_or_else(|| Error::config(format!("images cannot fill {format:?}")))?;
                let len = bytes.len();
                (bytes, len)
            }
            (source, class) => {
                return Err(Error::config(format!(
                    "{} source does not match {class:?} format {format:?}",
                    source.kind()
                )));
            }
        };
        ensure_config!(
            len == expected,
            "source has {len} elements but a {width}x{height} {format:?} mip needs {expected}"
        );
        Ok(bytes)
    }

    fn kind(&self) -> &'static str {
        match self {
            MipSource::Bytes(_) => "byte",
            MipSource::Half(_) => "half float",
            MipSource::Float(_) => "float",
            MipSource::Image(_) => "image",
        }
    }
}

impl From<Vec<u8>> for MipSource {
    fn from(value: Vec<u8>) -> Self {
        MipSource::Bytes(value.into())
    }
}

impl From<Vec<f32>> for MipSource {
    fn from(value: Vec<f32>) -> Self {
        MipSource::Float(value.into())
    }
}

impl From<Vec<f16>> for MipSource {
    fn from(value: Vec<f16>) -> Self {
        MipSource::Half(value.into())
    }
}

impl From<Image> for MipSource {
    fn from(value: Image) -> Self {
        MipSource::Image(Arc::new(value))
    }
}

/// Names one face × level image of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MipRef {
    pub texture: TextureId,
    pub face: u32,
    pub level: u32,
}

impl MipRef {
    pub fn new(texture: TextureId, face: u32, level: u32) -> Self {
        Self {
            texture,
            face,
            level,
        }
    }
}

impl From<TextureId> for MipRef {
    fn from(texture: TextureId) -> Self {
        MipRef::new(texture, 0, 0)
    }
}

/// One face × level image.
#[derive(Debug, Clone)]
pub struct Mip {
    face: u32,
    level: u32,
    width: u32,
    height: u32,
    source: Option<MipSource>,
    uploaded: bool,
}

impl Mip {
    pub fn face(&self) -> u32 {
        self.face
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The retained source, if not flushed.
    pub fn source(&self) -> Option<&MipSource> {
        self.source.as_ref()
    }

    /// Whether data was uploaded since the native object was (re)created.
    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }
}

#[derive(Debug)]
pub struct Texture {
    descriptor: TextureDescriptor,
    mips: Vec<Mip>,
    native: Option<NativeObject>,
}

impl Kind for Texture {
    const KIND: &'static str = "texture";
}

impl Texture {
    pub(crate) fn create<N: Native>(
        native: &mut N,
        caps: &Caps,
        descriptor: TextureDescriptor,
    ) -> Result<Texture> {
        descriptor.validate(caps)?;
        let levels = descriptor.level_count();
        let mips = (0..descriptor.face_count())
            .flat_map(|face| {
                (0..levels).map(move |level| {
                    let (width, height) = descriptor.level_size(level);
                    Mip {
                        face,
                        level,
                        width,
                        height,
                        source: None,
                        uploaded: false,
                    }
                })
            })
            .collect();
        let mut texture = Texture {
            descriptor,
            mips,
            native: None,
        };
        texture.allocate(native)?;
        Ok(texture)
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn format(&self) -> Format {
        self.descriptor.format
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn is_cube(&self) -> bool {
        self.descriptor.cube
    }

    pub fn level_count(&self) -> u32 {
        self.descriptor.level_count()
    }

    pub fn face_count(&self) -> u32 {
        self.descriptor.face_count()
    }

    /// Whether sampling may use more than one level.
    pub fn has_mipmaps(&self) -> bool {
        self.level_count() > 1
    }

    pub fn is_power_of_two(&self) -> bool {
        self.width().is_power_of_two() && self.height().is_power_of_two()
    }

    pub fn mip(&self, face: u32, level: u32) -> Option<&Mip> {
        self.index(face, level).map(|i| &self.mips[i])
    }

    pub fn mips(&self) -> impl Iterator<Item = &Mip> {
        self.mips.iter()
    }

    pub fn native(&self) -> Option<NativeObject> {
        self.native
    }

    pub(crate) fn native_target(&self) -> u32 {
        self.descriptor.native_target()
    }

    pub(crate) fn face_target(&self, face: u32) -> u32 {
        self.descriptor.face_target(face)
    }

    fn index(&self, face: u32, level: u32) -> Option<usize> {
        let levels = self.level_count();
        (face < self.face_count() && level < levels).then_some((face * levels + level) as usize)
    }

    pub(crate) fn checked_index(&self, face: u32, level: u32) -> Result<usize> {
        self.index(face, level).ok_or_else(|| {
            Error::config(format!(
                "texture has {} face(s) and {} level(s); there is no mip ({face}, {level})",
                self.face_count(),
                self.level_count()
            ))
        })
    }

    /// Creates the native object and defines storage for every level that can be
    /// defined without data.
    fn allocate<N: Native>(&mut self, native: &mut N) -> Result<()> {
        let object = created(native.create_texture(), "create texture")?;
        self.native = Some(object);
        let d = self.descriptor;
        let target = d.native_target();
        native.bind_texture(target, Some(object));
        native.tex_parameter_i32(target, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
        native.tex_parameter_i32(target, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        native.tex_parameter_i32(target, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32);
        native.tex_parameter_i32(target, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
        if !d.format.is_compressed() {
            let defined_levels = match d.mipmaps {
                MipMode::Explicit => d.level_count(),
                MipMode::None | MipMode::Generate => 1,
            };
            for face in 0..d.face_count() {
                for level in 0..defined_levels {
                    let (w, h) = d.level_size(level);
                    native.tex_image_2d(
                        d.face_target(face),
                        level,
                        d.format.native_format(),
                        w,
                        h,
                        d.format.native_format(),
                        d.format.native_type(),
                        None,
                    );
                }
            }
            if d.mipmaps == MipMode::Generate {
                native.generate_mipmap(target);
            }
        }
        for mip in &mut self.mips {
            mip.uploaded = false;
        }
        Ok(())
    }

    /// Validates, uploads and retains `source` as the data of `(face, level)`.
    pub(crate) fn set_source<N: Native>(
        &mut self,
        native: &mut N,
        face: u32,
        level: u32,
        source: MipSource,
    ) -> Result<()> {
        let index = self.checked_index(face, level)?;
        ensure_config!(
            !(self.descriptor.mipmaps == MipMode::Generate && level > 0),
            "level {level} of a texture with generated mipmaps cannot be set"
        );
        let (width, height) = self.mips[index].size();
        let bytes = source.to_bytes(self.format(), width, height)?;
        self.upload(native, index, &bytes);
        self.mips[index].source = Some(source);
        self.generate_if_complete(native);
        Ok(())
    }

    fn upload<N: Native>(&mut self, native: &mut N, index: usize, bytes: &[u8]) {
        let Some(object) = self.native else {
            return;
        };
        let d = self.descriptor;
        let mip = &mut self.mips[index];
        native.bind_texture(d.native_target(), Some(object));
        if d.format.is_compressed() {
            native.compressed_tex_image_2d(
                d.face_target(mip.face),
                mip.level,
                d.format.native_format(),
                mip.width,
                mip.height,
                bytes,
            );
        } else {
            native.tex_image_2d(
                d.face_target(mip.face),
                mip.level,
                d.format.native_format(),
                mip.width,
                mip.height,
                d.format.native_format(),
                d.format.native_type(),
                Some(bytes),
            );
        }
        mip.uploaded = true;
    }

    /// Generates levels once every face has a level 0 upload.
    fn generate_if_complete<N: Native>(&mut self, native: &mut N) {
        if self.descriptor.mipmaps != MipMode::Generate {
            return;
        }
        let complete = self.mips.iter().filter(|m| m.level == 0).all(|m| m.uploaded);
        if let (true, Some(object)) = (complete, self.native) {
            native.bind_texture(self.native_target(), Some(object));
            native.generate_mipmap(self.native_target());
        }
    }

    /// Drops the retained source of one mip.
    pub(crate) fn flush(&mut self, face: u32, level: u32) -> Result<()> {
        let index = self.checked_index(face, level)?;
        self.mips[index].source = None;
        Ok(())
    }

    pub(crate) fn flush_all(&mut self) {
        for mip in &mut self.mips {
            mip.source = None;
        }
    }

    /// Recreates the native object after context loss and re-uploads retained sources.
    pub(crate) fn restore<N: Native>(&mut self, native: &mut N) -> Result<()> {
        self.native = None;
        self.allocate(native)?;
        let format = self.format();
        for index in 0..self.mips.len() {
            let Some(source) = self.mips[index].source.clone() else {
                continue;
            };
            let (width, height) = self.mips[index].size();
            let bytes = source.to_bytes(format, width, height)?;
            self.upload(native, index, &bytes);
        }
        self.generate_if_complete(native);
        Ok(())
    }

    pub(crate) fn release<N: Native>(&mut self, native: &mut N) {
        if let Some(object) = self.native.take() {
            native.delete_texture(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::headless::{HeadlessConfig, HeadlessContext};

    fn setup(config: HeadlessConfig) -> (HeadlessContext, Caps) {
        let mut ctx = HeadlessContext::new(config);
        let caps = Caps::query(&mut ctx);
        (ctx, caps)
    }

    #[test]
    fn mipmaps_require_power_of_two() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgba, 100, 64).with_mipmaps(MipMode::Generate);
        assert!(Texture::create(&mut ctx, &caps, d).unwrap_err().is_config());
        let npot = TextureDescriptor::new(Format::Rgba, 100, 64);
        assert!(Texture::create(&mut ctx, &caps, npot).is_ok());
    }

    #[test]
    fn float_needs_capability() {
        let (mut ctx, caps) = setup(HeadlessConfig::minimal(8, 8));
        let d = TextureDescriptor::new(Format::Rgba32F, 4, 4);
        assert!(Texture::create(&mut ctx, &caps, d).unwrap_err().is_config());
    }

    #[test]
    fn mip_sizes_shrink_to_one() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgba, 8, 2).with_mipmaps(MipMode::Explicit);
        let t = Texture::create(&mut ctx, &caps, d).unwrap();
        assert_eq!(t.level_count(), 4);
        assert_eq!(t.mip(0, 1).unwrap().size(), (4, 1));
        assert_eq!(t.mip(0, 3).unwrap().size(), (1, 1));
        assert!(t.mip(0, 4).is_none());
        assert!(t.mip(1, 0).is_none());
    }

    #[test]
    fn source_class_and_length_checked() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgba, 2, 2);
        let mut t = Texture::create(&mut ctx, &caps, d).unwrap();
        let floats = MipSource::from(vec![0.0f32; 16]);
        assert!(t.set_source(&mut ctx, 0, 0, floats).unwrap_err().is_config());
        let short = MipSource::from(vec![0u8; 15]);
        assert!(t.set_source(&mut ctx, 0, 0, short).unwrap_err().is_config());
        let good = MipSource::from(vec![7u8; 16]);
        t.set_source(&mut ctx, 0, 0, good).unwrap();
        let object = t.native().unwrap();
        assert_eq!(ctx.texture_data(object, gl::TEXTURE_2D, 0), Some(&[7u8; 16][..]));
        assert_eq!(ctx.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn half_source_uploads() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgba16F, 1, 1);
        let mut t = Texture::create(&mut ctx, &caps, d).unwrap();
        let half = MipSource::from(vec![f16::from_f32(0.5); 4]);
        t.set_source(&mut ctx, 0, 0, half).unwrap();
        assert_eq!(ctx.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn image_source_repacks() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgb, 1, 1);
        let mut t = Texture::create(&mut ctx, &caps, d).unwrap();
        let image = Image::from_rgba(1, 1, vec![1, 2, 3, 4]).unwrap();
        t.set_source(&mut ctx, 0, 0, image.into()).unwrap();
        let object = t.native().unwrap();
        assert_eq!(ctx.texture_data(object, gl::TEXTURE_2D, 0), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn generated_levels_follow_level_zero() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgba, 4, 4).with_mipmaps(MipMode::Generate);
        let mut t = Texture::create(&mut ctx, &caps, d).unwrap();
        assert!(
            t.set_source(&mut ctx, 0, 1, vec![0u8; 16].into())
                .unwrap_err()
                .is_config()
        );
        t.set_source(&mut ctx, 0, 0, vec![0u8; 64].into()).unwrap();
        let object = t.native().unwrap();
        assert_eq!(ctx.texture_level_size(object, gl::TEXTURE_2D, 2), Some((1, 1)));
        assert_eq!(ctx.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn cube_faces_must_be_square() {
        let (mut ctx, caps) = setup(HeadlessConfig::default());
        let d = TextureDescriptor::new(Format::Rgba, 8, 4).with_cube(true);
        assert!(Texture::create(&mut ctx, &caps, d).is_err());
        let d = TextureDescriptor::new(Format::Rgba, 8, 8).with_cube(true);
        let t = Texture::create(&mut ctx, &caps, d).unwrap();
        assert_eq!(t.face_count(), 6);
        assert_eq!(t.face_target(2), gl::TEXTURE_CUBE_MAP_POSITIVE_X + 2);
    }
}
