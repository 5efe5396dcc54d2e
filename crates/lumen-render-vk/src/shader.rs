// SPDX-License-Identifier: CEPL-1.0
use crate::error::VkError;
use lumen_render::{ShaderFormat, ShaderStage};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a whole shader binary. Only SPIR-V is accepted, and the format is
/// checked before the file is touched.
pub fn load_shader(path: &Path, format: ShaderFormat) -> Result<Vec<u8>, VkError> {
    if format != ShaderFormat::SpirV {
        return Err(VkError::UnsupportedShaderFormat(format));
    }
    let bytes = std::fs::read(path).map_err(|source| VkError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(VkError::ShaderEmpty {
            path: path.to_path_buf(),
        });
    }
    debug!("loaded {} bytes of SPIR-V from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Path of the bundled shader compiled by the build script.
pub fn default_shader_path(stage: ShaderStage) -> PathBuf {
    let dir = Path::new(env!("OUT_DIR"));
    match stage {
        ShaderStage::Vertex => dir.join("tri.vert.spv"),
        ShaderStage::Fragment => dir.join("tri.frag.spv"),
    }
}

/// Vertex and fragment bytecode for one pipeline.
#[derive(Clone, Debug, Default)]
pub struct ShaderSet {
    vertex: Vec<u8>,
    fragment: Vec<u8>,
}

impl ShaderSet {
    /// Replaces the stage's bytes only when the load succeeds.
    pub fn load(
        &mut self,
        path: &Path,
        stage: ShaderStage,
        format: ShaderFormat,
    ) -> Result<(), VkError> {
        let bytes = load_shader(path, format)?;
        *self.slot_mut(stage) = bytes;
        Ok(())
    }

    /// Installs bytecode that is already in memory, e.g. from `include_bytes!`.
    pub fn set_spirv(&mut self, stage: ShaderStage, bytes: Vec<u8>) {
        *self.slot_mut(stage) = bytes;
    }

    pub fn bytes(&self, stage: ShaderStage) -> &[u8] {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    pub fn is_loaded(&self, stage: ShaderStage) -> bool {
        !self.bytes(stage).is_empty()
    }

    fn slot_mut(&mut self, stage: ShaderStage) -> &mut Vec<u8> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
