// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! GLSL shader sources consumed by [`crate::images::render_pass::PassDescriptor`].

use crate::error::Result;
use crate::imp::{Native, NativeObject, created, gl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentShader {
    pub(crate) glsl_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexShader {
    pub(crate) glsl_code: String,
}

impl FragmentShader {
    pub fn new(glsl_code: impl Into<String>) -> Self {
        Self {
            glsl_code: glsl_code.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.glsl_code
    }
}

impl VertexShader {
    pub fn new(glsl_code: impl Into<String>) -> Self {
        Self {
            glsl_code: glsl_code.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.glsl_code
    }
}

/// Compiles one stage.  A compile failure is a configuration error carrying the info log.
pub(crate) fn compile<N: Native>(
    native: &mut N,
    kind: u32,
    source: &str,
    pass: &str,
) -> Result<NativeObject> {
    let shader = created(native.create_shader(kind), "create shader")?;
    native.shader_source(shader, source);
    native.compile_shader(shader);
    if !native.get_shader_compile_status(shader) {
        let log = native.get_shader_info_log(shader);
        native.delete_shader(shader);
        let stage = if kind == gl::VERTEX_SHADER {
            "vertex"
        } else {
            "fragment"
        };
        logwise::warn_sync!(
            "pass {pass}: {stage} shader failed to compile",
            pass = pass,
            stage = stage
        );
        return Err(crate::error::Error::config(format!(
            "pass {pass}: {stage} shader failed to compile: {log}"
        )));
    }
    Ok(shader)
}
