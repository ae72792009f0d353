/// Loading shader bytecode and creating shader modules once a device exists
pub mod loader;
pub mod shader;

pub use loader::{FsShaderLoader, ShaderLoader};
pub use shader::{Shader, ShaderBuilder, SpecializationInfo};
