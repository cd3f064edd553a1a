// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The device: owner of the native context, the capability table and every resource.

Resources are created through `make_*` factories, addressed by generation-checked handles,
reconfigured through the device (which can see everything an operation must validate
against), and released with `free_*`.  [`Device::frame`] runs every enabled stage.

```
use stages_and_passes::images::Device;
use stages_and_passes::imp::ContextSettings;
use stages_and_passes::imp::headless::{HeadlessConfig, HeadlessContext};

let native = HeadlessContext::new(HeadlessConfig::default());
let mut device = Device::new(native, ContextSettings::default());
let main = device.make_stage("main", device.default_target()).unwrap();
let stats = device.frame().unwrap();
assert!(!stats.lost);
assert_eq!(stats.stages.len(), 1);
# let _ = main;
```
*/

use crate::bindings::material::{Material, MaterialId};
use crate::bindings::uniform::Uniform;
use crate::error::{Error, Result, ensure_config};
use crate::images::bounds::Aabb;
use crate::images::caps::Caps;
use crate::images::depth::{Depth, DepthId};
use crate::images::frame::{FrameStats, StageStats};
use crate::images::instance::{Instance, InstanceId};
use crate::images::mesh::{Mesh, MeshId};
use crate::images::registry::Registry;
use crate::images::render_pass::{BindContext, Pass, PassDescriptor, PassId};
use crate::images::stage::{Stage, StageId};
use crate::images::target::{NativeColor, Target, TargetId};
use crate::images::texture::{MipRef, MipSource, Texture, TextureDescriptor, TextureId};
use crate::imp::{ContextSettings, Native, gl};
use crate::pixel_formats::Format;
use glam::Mat4;

/// Errors drained before a frame are reported, not raised; this bounds the drain.
const STALE_ERROR_LIMIT: usize = 32;

enum StageOutcome {
    Skipped,
    Drawn(StageStats),
    Lost,
}

struct Draw {
    instance: InstanceId,
    mesh: MeshId,
    material: MaterialId,
    pass: PassId,
    transform: Mat4,
}

pub struct Device<N: Native> {
    native: N,
    settings: ContextSettings,
    caps: Caps,
    lost: bool,
    default_target: TargetId,
    textures: Registry<Texture>,
    depths: Registry<Depth>,
    targets: Registry<Target>,
    passes: Registry<Pass>,
    materials: Registry<Material>,
    stages: Registry<Stage>,
    stage_order: Vec<StageId>,
    meshes: Registry<Mesh>,
    instances: Registry<Instance>,
}

impl<N: Native> Device<N> {
    /// Takes ownership of a native context and queries its capabilities.
    pub fn new(mut native: N, settings: ContextSettings) -> Self {
        let caps = Caps::query(&mut native);
        let (width, height) = native.drawing_buffer_size();
        let lost = native.is_context_lost();
        let mut targets = Registry::default();
        let default_target = targets.insert(Target::drawing_buffer(width, height));
        logwise::info_sync!(
            "device created over a {width}x{height} surface; caps {caps}",
            width = width,
            height = height,
            caps = logwise::privacy::LogIt(&caps)
        );
        Device {
            native,
            settings,
            caps,
            lost,
            default_target,
            textures: Registry::default(),
            depths: Registry::default(),
            targets,
            passes: Registry::default(),
            materials: Registry::default(),
            stages: Registry::default(),
            stage_order: Vec::new(),
            meshes: Registry::default(),
            instances: Registry::default(),
        }
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    /// Direct access to the native context.  State changed behind the device's back is
    /// not tracked.
    pub fn native_mut(&mut self) -> &mut N {
        &mut self.native
    }

    /// The drawing buffer.  It cannot be re-attached or freed.
    pub fn default_target(&self) -> TargetId {
        self.default_target
    }

    /// Updates the default target to a new surface size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Ok(target) = self.targets.get_mut(self.default_target) {
            target.set_default_size(width, height);
        }
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    // factories

    pub fn make_texture(&mut self, descriptor: TextureDescriptor) -> Result<TextureId> {
        let texture = Texture::create(&mut self.native, &self.caps, descriptor)?;
        Ok(self.textures.insert(texture))
    }

    /// Creates a depth surface.  `readable` depths are textures samplers can bind.
    pub fn make_depth(
        &mut self,
        format: Format,
        width: u32,
        height: u32,
        readable: bool,
    ) -> Result<DepthId> {
        let depth = Depth::create(&mut self.native, &self.caps, format, width, height, readable)?;
        Ok(self.depths.insert(depth))
    }

    /// Creates a target with nothing attached.
    pub fn make_target(&mut self) -> Result<TargetId> {
        let target = Target::create(&mut self.native)?;
        Ok(self.targets.insert(target))
    }

    /**
    Creates a target together with its attachments: one texture per entry of `colors`
    and, optionally, a write-only depth.

    On failure every resource created so far is freed again.
    */
    pub fn make_target_with(
        &mut self,
        colors: &[Format],
        width: u32,
        height: u32,
        depth: Option<Format>,
    ) -> Result<TargetId> {
        self.build_target(colors, width, height, depth.map(|f| (f, false)))
    }

    fn build_target(
        &mut self,
        colors: &[Format],
        width: u32,
        height: u32,
        depth: Option<(Format, bool)>,
    ) -> Result<TargetId> {
        ensure_config!(
            colors.len() as u32 <= self.caps.color_target_count,
            "{} color attachments requested but the device supports {}",
            colors.len(),
            self.caps.color_target_count
        );
        for format in colors {
            ensure_config!(
                format.renderable(&self.caps),
                "{format:?} is not renderable on this device"
            );
        }
        if let Some((format, readable)) = depth {
            Depth::validate(&self.caps, format, width, height, readable)?;
        }
        let mut textures = Vec::new();
        let mut depth_id = None;
        let result = self.attach_new(colors, width, height, depth, &mut textures, &mut depth_id);
        if result.is_err() {
            for texture in textures {
                let _ = self.free_texture(texture);
            }
            if let Some(depth) = depth_id {
                let _ = self.free_depth(depth);
            }
        }
        result
    }

    /// Allocates attachments into `textures` and `depth_id` so the caller can undo them.
    fn attach_new(
        &mut self,
        colors: &[Format],
        width: u32,
        height: u32,
        depth: Option<(Format, bool)>,
        textures: &mut Vec<TextureId>,
        depth_id: &mut Option<DepthId>,
    ) -> Result<TargetId> {
        for format in colors {
            textures.push(self.make_texture(TextureDescriptor::new(*format, width, height))?);
        }
        if let Some((format, readable)) = depth {
            *depth_id = Some(self.make_depth(format, width, height, readable)?);
        }
        let target = self.make_target()?;
        let mips: Vec<MipRef> = textures.iter().map(|t| MipRef::from(*t)).collect();
        let attached = self
            .set_target_color(target, &mips)
            .and_then(|()| self.set_target_depth(target, *depth_id));
        if let Err(e) = attached {
            let _ = self.free_target(target);
            return Err(e);
        }
        Ok(target)
    }

    /// Compiles and links a pass.
    pub fn make_pass(&mut self, descriptor: PassDescriptor) -> Result<PassId> {
        let pass = Pass::create(&mut self.native, &self.caps, descriptor)?;
        Ok(self.passes.insert(pass))
    }

    /// Creates a material.  Names are unique per device.
    pub fn make_material(&mut self, name: &str) -> Result<MaterialId> {
        ensure_config!(
            self.material_by_name(name).is_none(),
            "a material named {name} already exists"
        );
        Ok(self.materials.insert(Material::new(name)))
    }

    /// Creates a stage drawing into `target`.  Names are unique per device; stages run in
    /// creation order.
    pub fn make_stage(&mut self, name: &str, target: TargetId) -> Result<StageId> {
        ensure_config!(
            self.stage_by_name(name).is_none(),
            "a stage named {name} already exists"
        );
        self.targets.get(target)?;
        let id = self.stages.insert(Stage::new(name, target));
        self.stage_order.push(id);
        Ok(id)
    }

    pub fn make_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// Creates an instance.  Without both a material and a mesh it is inert.
    pub fn make_instance(
        &mut self,
        material: Option<MaterialId>,
        mesh: Option<MeshId>,
    ) -> Result<InstanceId> {
        if let Some(material) = material {
            self.materials.get(material)?;
        }
        if let Some(mesh) = mesh {
            self.meshes.get(mesh)?;
        }
        Ok(self.instances.insert(Instance::new(material, mesh)))
    }

    // lookups

    pub fn material_by_name(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .find(|(_, m)| m.name() == name)
            .map(|(id, _)| id)
    }

    pub fn stage_by_name(&self, name: &str) -> Option<StageId> {
        self.stage_order
            .iter()
            .copied()
            .find(|id| self.stages.get(*id).is_ok_and(|s| s.name() == name))
    }

    /// Stages in the order `frame()` runs them.
    pub fn stages(&self) -> &[StageId] {
        &self.stage_order
    }

    pub fn texture(&self, id: TextureId) -> Result<&Texture> {
        self.textures.get(id)
    }

    pub fn depth(&self, id: DepthId) -> Result<&Depth> {
        self.depths.get(id)
    }

    pub fn target(&self, id: TargetId) -> Result<&Target> {
        self.targets.get(id)
    }

    pub fn pass(&self, id: PassId) -> Result<&Pass> {
        self.passes.get(id)
    }

    /// Samplers and render state stay mutable after linking.
    pub fn pass_mut(&mut self, id: PassId) -> Result<&mut Pass> {
        self.passes.get_mut(id)
    }

    pub fn material(&self, id: MaterialId) -> Result<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Result<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn stage(&self, id: StageId) -> Result<&Stage> {
        self.stages.get(id)
    }

    pub fn stage_mut(&mut self, id: StageId) -> Result<&mut Stage> {
        self.stages.get_mut(id)
    }

    pub fn mesh(&self, id: MeshId) -> Result<&Mesh> {
        self.meshes.get(id)
    }

    /// Changes made through the returned mesh are uploaded at the next draw.
    pub fn mesh_mut(&mut self, id: MeshId) -> Result<&mut Mesh> {
        self.meshes.get_mut(id)
    }

    pub fn instance(&self, id: InstanceId) -> Result<&Instance> {
        self.instances.get(id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Result<&mut Instance> {
        self.instances.get_mut(id)
    }

    // configuration that crosses resources

    /// Assigns `pass` (or, with `None`, no pass) to `stages` in `material`.
    pub fn set_material_pass(
        &mut self,
        material: MaterialId,
        stages: &[&str],
        pass: Option<PassId>,
    ) -> Result<()> {
        if let Some(pass) = pass {
            self.passes.get(pass)?;
        }
        self.materials.get_mut(material)?.set_passes(stages, pass);
        Ok(())
    }

    pub fn set_stage_target(&mut self, stage: StageId, target: TargetId) -> Result<()> {
        self.targets.get(target)?;
        self.stages.get_mut(stage)?.set_target(target);
        Ok(())
    }

    pub fn set_instance_mesh(&mut self, instance: InstanceId, mesh: Option<MeshId>) -> Result<()> {
        if let Some(mesh) = mesh {
            self.meshes.get(mesh)?;
        }
        self.instances.get_mut(instance)?.set_mesh(mesh);
        Ok(())
    }

    pub fn set_instance_material(
        &mut self,
        instance: InstanceId,
        material: Option<MaterialId>,
    ) -> Result<()> {
        if let Some(material) = material {
            self.materials.get(material)?;
        }
        self.instances.get_mut(instance)?.set_material(material);
        Ok(())
    }

    /// World-space bounds: the mesh bounds under the instance transform.
    pub fn instance_bounds(&self, instance: InstanceId) -> Result<Option<Aabb>> {
        let instance = self.instances.get(instance)?;
        let Some(mesh) = instance.mesh() else {
            return Ok(None);
        };
        let transform = instance.transform();
        Ok(self
            .meshes
            .get(mesh)?
            .bounds()
            .map(|b| b.transformed(&transform)))
    }

    /**
    Replaces the color attachments of `target`.

    Every mip must exist, be renderable and share one size, which must also match an
    attached depth.  An empty slice detaches all colors.
    */
    pub fn set_target_color(&mut self, target: TargetId, colors: &[MipRef]) -> Result<()> {
        let t = self.targets.get(target)?;
        ensure_config!(!t.is_default(), "the default target cannot be re-attached");
        ensure_config!(
            colors.len() as u32 <= self.caps.color_target_count,
            "{} color attachments requested but the device supports {}",
            colors.len(),
            self.caps.color_target_count
        );
        let depth_size = match t.depth() {
            Some(d) => Some(self.depths.get(d)?.size()),
            None => None,
        };
        let mut size = None;
        let mut resolved = Vec::with_capacity(colors.len());
        for (i, mip) in colors.iter().enumerate() {
            let texture = self.textures.get(mip.texture)?;
            let index = texture.checked_index(mip.face, mip.level)?;
            let format = texture.format();
            ensure_config!(
                format.renderable(&self.caps),
                "color attachment {i}: {format:?} is not renderable on this device"
            );
            let mip_size = texture
                .mips()
                .nth(index)
                .map(|m| m.size())
                .unwrap_or((0, 0));
            match size {
                None => size = Some(mip_size),
                Some(s) => ensure_config!(
                    s == mip_size,
                    "color attachment {i} is {}x{} but attachment 0 is {}x{}",
                    mip_size.0,
                    mip_size.1,
                    s.0,
                    s.1
                ),
            }
            if let Some(d) = depth_size {
                ensure_config!(
                    d == mip_size,
                    "color attachment {i} is {}x{} but the depth is {}x{}",
                    mip_size.0,
                    mip_size.1,
                    d.0,
                    d.1
                );
            }
            let Some(object) = texture.native() else {
                return Err(Error::config(format!(
                    "color attachment {i} has no native texture"
                )));
            };
            resolved.push(NativeColor {
                texture: object,
                face_target: texture.face_target(mip.face),
                level: mip.level,
            });
        }
        let t = self.targets.get_mut(target)?;
        t.attach_colors(&mut self.native, colors.to_vec(), &resolved, size, depth_size)
    }

    /// Replaces (or with `None` removes) the depth attachment of `target`.
    pub fn set_target_depth(&mut self, target: TargetId, depth: Option<DepthId>) -> Result<()> {
        let t = self.targets.get(target)?;
        ensure_config!(!t.is_default(), "the default target cannot be re-attached");
        let color_size = if t.colors().is_empty() {
            None
        } else {
            t.size()
        };
        if let Some(d) = depth {
            let size = self.depths.get(d)?.size();
            if let Some(c) = color_size {
                ensure_config!(
                    c == size,
                    "depth is {}x{} but the color attachments are {}x{}",
                    size.0,
                    size.1,
                    c.0,
                    c.1
                );
            }
        }
        let old = t.depth().and_then(|d| self.depths.get(d).ok());
        let new = match depth {
            Some(d) => Some((d, self.depths.get(d)?)),
            None => None,
        };
        let Ok(t) = self.targets.get_mut(target) else {
            return Ok(());
        };
        t.attach_depth(&mut self.native, old, new, color_size)
    }

    /**
    Creates a new target with the same attachment formats as `target`, scaled by `scale`
    (each edge at least 1).

    Cloning the default target yields a single `Rgba` color attachment.
    */
    pub fn clone_target(&mut self, target: TargetId, scale: f32) -> Result<TargetId> {
        ensure_config!(
            scale.is_finite() && scale > 0.0,
            "target scale {scale} must be positive"
        );
        let t = self.targets.get(target)?;
        let Some((width, height)) = t.size() else {
            return Err(Error::config("cannot clone a target with nothing attached"));
        };
        let scaled = |edge: u32| ((edge as f32 * scale).round() as u32).max(1);
        let mut formats = Vec::new();
        for mip in t.colors() {
            formats.push(self.textures.get(mip.texture)?.format());
        }
        if t.is_default() {
            formats.push(Format::Rgba);
        }
        let depth = match t.depth() {
            Some(d) => {
                let d = self.depths.get(d)?;
                Some((d.format(), d.readable()))
            }
            None => None,
        };
        self.build_target(&formats, scaled(width), scaled(height), depth)
    }

    // mips

    /// Uploads `source` to a mip and keeps it for restoring after context loss.
    pub fn set_mip_source(&mut self, mip: MipRef, source: impl Into<MipSource>) -> Result<()> {
        self.textures.get_mut(mip.texture)?.set_source(
            &mut self.native,
            mip.face,
            mip.level,
            source.into(),
        )
    }

    /// The retained source of a mip; `None` when never set or flushed.
    pub fn mip_source(&self, mip: MipRef) -> Result<Option<&MipSource>> {
        let texture = self.textures.get(mip.texture)?;
        texture.checked_index(mip.face, mip.level)?;
        Ok(texture.mip(mip.face, mip.level).and_then(|m| m.source()))
    }

    /// Drops a mip's retained source.  Its contents are undefined after a restore.
    pub fn flush_mip(&mut self, mip: MipRef) -> Result<()> {
        self.textures.get_mut(mip.texture)?.flush(mip.face, mip.level)
    }

    pub fn flush_texture(&mut self, texture: TextureId) -> Result<()> {
        self.textures.get_mut(texture)?.flush_all();
        Ok(())
    }

    // freeing

    /// Frees a texture.  Targets drop its mips; uniforms naming it are removed.
    pub fn free_texture(&mut self, id: TextureId) -> Result<()> {
        self.textures.get(id)?;
        let users: Vec<(TargetId, Vec<MipRef>)> = self
            .targets
            .iter()
            .filter(|(_, t)| t.colors().iter().any(|m| m.texture == id))
            .map(|(tid, t)| {
                let remaining = t.colors().iter().copied().filter(|m| m.texture != id);
                (tid, remaining.collect())
            })
            .collect();
        for (target, remaining) in users {
            if self.set_target_color(target, &remaining).is_err() {
                if let Ok(t) = self.targets.get_mut(target) {
                    t.forget_colors(id);
                }
            }
        }
        self.forget_uniforms(|u| match u {
            Uniform::Texture(t) => *t != id,
            Uniform::Mip(m) => m.texture != id,
            _ => true,
        });
        let mut texture = self.textures.remove(id)?;
        texture.release(&mut self.native);
        Ok(())
    }

    /// Frees a depth.  Targets detach it; uniforms naming it are removed.
    pub fn free_depth(&mut self, id: DepthId) -> Result<()> {
        self.depths.get(id)?;
        let users: Vec<TargetId> = self
            .targets
            .iter()
            .filter(|(_, t)| t.depth() == Some(id))
            .map(|(tid, _)| tid)
            .collect();
        for target in users {
            if self.set_target_depth(target, None).is_err() {
                if let Ok(t) = self.targets.get_mut(target) {
                    t.forget_depth(id);
                }
            }
        }
        self.forget_uniforms(|u| !matches!(u, Uniform::Depth(d) if *d == id));
        let mut depth = self.depths.remove(id)?;
        depth.release(&mut self.native);
        Ok(())
    }

    /// Frees a target.  Its attachments stay alive.  A target a stage draws into cannot be
    /// freed until the stage is retargeted or freed.
    pub fn free_target(&mut self, id: TargetId) -> Result<()> {
        let t = self.targets.get(id)?;
        ensure_config!(!t.is_default(), "the default target cannot be freed");
        if let Some(stage) = self.stages.iter().find(|(_, s)| s.target() == id) {
            return Err(Error::config(format!(
                "target is drawn into by stage {}",
                stage.1.name()
            )));
        }
        let mut target = self.targets.remove(id)?;
        target.release(&mut self.native);
        Ok(())
    }

    /// Frees a pass and removes it from every material.
    pub fn free_pass(&mut self, id: PassId) -> Result<()> {
        let mut pass = self.passes.remove(id)?;
        for (_, material) in self.materials.iter_mut() {
            material.forget_pass(id);
        }
        pass.release(&mut self.native);
        Ok(())
    }

    /// Frees a material.  Its instances become inert.
    pub fn free_material(&mut self, id: MaterialId) -> Result<()> {
        self.materials.remove(id)?;
        for (_, instance) in self.instances.iter_mut() {
            if instance.material() == Some(id) {
                instance.set_material(None);
            }
        }
        Ok(())
    }

    pub fn free_stage(&mut self, id: StageId) -> Result<()> {
        self.stages.remove(id)?;
        self.stage_order.retain(|s| *s != id);
        Ok(())
    }

    /// Frees a mesh.  Its instances become inert.
    pub fn free_mesh(&mut self, id: MeshId) -> Result<()> {
        let mut mesh = self.meshes.remove(id)?;
        for (_, instance) in self.instances.iter_mut() {
            if instance.mesh() == Some(id) {
                instance.set_mesh(None);
            }
        }
        mesh.release(&mut self.native);
        Ok(())
    }

    pub fn free_instance(&mut self, id: InstanceId) -> Result<()> {
        self.instances.remove(id)?;
        Ok(())
    }

    fn forget_uniforms(&mut self, keep: impl Fn(&Uniform) -> bool) {
        for (_, stage) in self.stages.iter_mut() {
            stage.uniforms_mut().retain(&keep);
        }
        for (_, material) in self.materials.iter_mut() {
            material.uniforms_mut().retain(&keep);
        }
        for (_, instance) in self.instances.iter_mut() {
            instance.uniforms_mut().retain(&keep);
        }
    }

    // context loss

    /// Forces a context loss, where the native context supports it.
    pub fn lose_context(&mut self) -> bool {
        let lost = self.native.lose_context();
        if lost {
            self.notify_context_lost();
        }
        lost
    }

    /// Marks the device lost.  `frame()` draws nothing until the context is restored.
    pub fn notify_context_lost(&mut self) {
        if self.lost {
            return;
        }
        self.lost = true;
        logwise::warn_sync!(
            "context lost; {textures} textures, {passes} passes and {meshes} meshes await restore",
            textures = self.textures.len(),
            passes = self.passes.len(),
            meshes = self.meshes.len()
        );
    }

    /**
    Re-creates the native context if needed and rebuilds every native object.

    Textures are restored first, then depths, then the targets that attach them, then
    passes.  Meshes re-upload at their next draw.  Mips whose source was flushed come
    back with undefined contents.
    */
    pub fn notify_context_restored(&mut self) -> Result<()> {
        if !self.lost {
            return Ok(());
        }
        if self.native.is_context_lost() && !self.native.restore_context(&self.settings) {
            logwise::error_sync!("native context could not be restored");
            return Err(Error::Native {
                code: gl::CONTEXT_LOST_WEBGL,
                during: "restore context",
            });
        }
        self.caps = Caps::query(&mut self.native);
        let (width, height) = self.native.drawing_buffer_size();
        self.resize(width, height);
        for (_, texture) in self.textures.iter_mut() {
            texture.restore(&mut self.native)?;
        }
        for (_, depth) in self.depths.iter_mut() {
            depth.restore(&mut self.native)?;
        }
        let Device {
            native,
            textures,
            depths,
            targets,
            ..
        } = self;
        for (_, target) in targets.iter_mut() {
            let resolved: Vec<NativeColor> = target
                .colors()
                .iter()
                .filter_map(|mip| {
                    let texture = textures.get(mip.texture).ok()?;
                    Some(NativeColor {
                        texture: texture.native()?,
                        face_target: texture.face_target(mip.face),
                        level: mip.level,
                    })
                })
                .collect();
            let depth = target.depth().and_then(|d| depths.get(d).ok());
            target.restore(native, &resolved, depth)?;
        }
        for (_, pass) in self.passes.iter_mut() {
            pass.restore(&mut self.native)?;
        }
        for (_, mesh) in self.meshes.iter_mut() {
            mesh.forget_native();
        }
        self.lost = false;
        logwise::info_sync!(
            "context restored: {textures} textures, {depths} depths, {targets} targets, {passes} passes",
            textures = self.textures.len(),
            depths = self.depths.len(),
            targets = self.targets.len(),
            passes = self.passes.len()
        );
        Ok(())
    }

    // frame

    /**
    Runs every enabled stage in creation order.

    Within a stage, instances draw in slot order: creation order until one is freed, after
    which the next new instance takes the most recently freed slot.  Blending that depends
    on draw order should not assume creation order.

    While the context is lost this draws nothing and returns stats with `lost` set; a loss
    noticed mid-frame ends the frame the same way.  An incomplete target or a native
    error ends the frame with an error.
    */
    pub fn frame(&mut self) -> Result<FrameStats> {
        if self.native.is_context_lost() {
            self.notify_context_lost();
        } else if self.lost {
            self.notify_context_restored()?;
        }
        if self.lost {
            return Ok(FrameStats::lost());
        }
        self.drain_stale_errors();
        let (width, height) = self.native.drawing_buffer_size();
        self.resize(width, height);
        let mut stats = FrameStats::default();
        for stage in self.stage_order.clone() {
            match self.run_stage(stage)? {
                StageOutcome::Skipped => {}
                StageOutcome::Drawn(stage_stats) => {
                    let name = self.stages.get(stage)?.name().to_string();
                    stats.push(&name, stage_stats);
                }
                StageOutcome::Lost => {
                    self.notify_context_lost();
                    return Ok(FrameStats::lost());
                }
            }
        }
        Ok(stats)
    }

    fn drain_stale_errors(&mut self) {
        for _ in 0..STALE_ERROR_LIMIT {
            let code = self.native.get_error();
            if code == gl::NO_ERROR {
                return;
            }
            logwise::warn_sync!(
                "native error 0x{code} was raised outside a frame",
                code = format!("{code:04X}").as_str()
            );
        }
    }

    fn run_stage(&mut self, id: StageId) -> Result<StageOutcome> {
        let stage = self.stages.get_mut(id)?;
        if !stage.is_enabled() {
            return Ok(StageOutcome::Skipped);
        }
        stage.refresh();
        let Device {
            native,
            caps,
            textures,
            depths,
            targets,
            passes,
            materials,
            stages,
            meshes,
            instances,
            ..
        } = self;
        let stage = stages.get(id)?;
        let target = targets.get(stage.target())?;

        native.bind_framebuffer(target.native());
        if !target.is_default() {
            let status = native.check_framebuffer_status();
            if status != gl::FRAMEBUFFER_COMPLETE {
                if native.is_context_lost() {
                    return Ok(StageOutcome::Lost);
                }
                logwise::error_sync!(
                    "stage {stage} draws into an incomplete target",
                    stage = stage.name()
                );
                return Err(Error::Native {
                    code: status,
                    during: "bind stage target",
                });
            }
        }
        if let Some((width, height)) = target.size() {
            native.viewport(0, 0, width, height);
        }
        stage.begin(native);
        if poll(native, "clear")? {
            return Ok(StageOutcome::Lost);
        }

        let mut stats = StageStats::default();
        let frustum = stage.frustum();
        let mut draws = Vec::new();
        for (instance_id, instance) in instances.iter() {
            stats.instance_total += 1;
            let mesh = instance.mesh().and_then(|m| meshes.get(m).ok().map(|mesh| (m, mesh)));
            if let Some((_, mesh)) = mesh {
                let count = mesh.draw_count() as u32;
                stats.vertex_total += u64::from(count);
                stats.primitive_total += u64::from(mesh.primitive().primitive_count(count));
            }
            let (Some((mesh_id, mesh)), Some(material_id)) = (mesh, instance.material()) else {
                continue;
            };
            if !instance.is_visible() {
                continue;
            }
            let transform = instance.transform();
            if instance.culls() {
                if let Some(bounds) = mesh.bounds() {
                    if !frustum.intersects(&bounds.transformed(&transform)) {
                        continue;
                    }
                }
            }
            let Some(pass) = materials.get(material_id)?.pass(stage.name()) else {
                continue;
            };
            draws.push(Draw {
                instance: instance_id,
                mesh: mesh_id,
                material: material_id,
                pass,
                transform,
            });
        }

        for draw in draws {
            let mesh = meshes.get_mut(draw.mesh)?;
            mesh.upload(native, &*caps)?;
            let mesh = &*mesh;
            let count = mesh.draw_count() as u32;
            if count == 0 {
                continue;
            }
            let pass = passes.get(draw.pass)?;
            pass.use_program(native, &stage.write_mask());
            let context = BindContext {
                caps: &*caps,
                textures: &*textures,
                depths: &*depths,
                stage,
                model: &draw.transform,
            };
            let scopes = [
                stage.uniforms(),
                materials.get(draw.material)?.uniforms(),
                instances.get(draw.instance)?.uniforms(),
            ];
            pass.bind_draw(native, &scopes, &context)?;
            if !pass.bind_attributes(native, mesh) {
                continue;
            }
            let mode = mesh.primitive().native_mode();
            match mesh.indices() {
                Some(indices) => {
                    native.draw_elements(mode, count, indices.index().native_type(), 0)
                }
                None => native.draw_arrays(mode, 0, count),
            }
            if poll(native, "draw")? {
                return Ok(StageOutcome::Lost);
            }
            logwise::trace_sync!(
                "stage {stage} drew {count} vertices with pass {pass}",
                stage = stage.name(),
                count = count,
                pass = pass.name()
            );
            stats.instance_drawn += 1;
            stats.vertex_drawn += u64::from(count);
            stats.primitive_drawn += u64::from(mesh.primitive().primitive_count(count));
        }
        Ok(StageOutcome::Drawn(stats))
    }
}

/// Reads one native error.  Returns whether it reported context loss.
fn poll<N: Native>(native: &mut N, during: &'static str) -> Result<bool> {
    match native.get_error() {
        gl::NO_ERROR => Ok(false),
        gl::CONTEXT_LOST_WEBGL => Ok(true),
        code => {
            logwise::error_sync!(
                "native error 0x{code} during {during}",
                code = format!("{code:04X}").as_str(),
                during = during
            );
            Err(Error::Native { code, during })
        }
    }
}
