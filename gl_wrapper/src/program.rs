use std::ffi::{CString, NulError};
use std::fmt;

use log::{debug, error};
use thiserror::Error;

use crate::api::{GlApi, GlId, ShaderStage};

/// GLSL version directive prepended to sources that lack one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GlslVersion {
    pub number: u16,
    pub core: bool,
}

impl GlslVersion {
    pub const CORE_330: Self = Self {
        number: 330,
        core: true,
    };

    pub fn directive(&self) -> String {
        if self.core {
            format!("#version {} core", self.number)
        } else {
            format!("#version {}", self.number)
        }
    }

    fn apply(&self, src: &str) -> String {
        if skip_leading_comments(src).starts_with("#version") {
            src.to_string()
        } else {
            format!("{}\n{}", self.directive(), src)
        }
    }
}

/// `src` without its leading whitespace and comments. `#version` may only be
/// preceded by these.
pub(crate) fn skip_leading_comments(mut src: &str) -> &str {
    loop {
        src = src.trim_start();
        if let Some(rest) = src.strip_prefix("//") {
            src = rest.find('\n').map_or("", |n| &rest[n..]);
        } else if let Some(rest) = src.strip_prefix("/*") {
            src = rest.find("*/").map_or("", |n| &rest[n + 2..]);
        } else {
            return src;
        }
    }
}

impl Default for GlslVersion {
    fn default() -> Self {
        Self::CORE_330
    }
}

pub struct ProgramBuilder {
    vert: String,
    frag: String,
    version: GlslVersion,
}

impl ProgramBuilder {
    pub fn new(vert_src: &str, frag_src: &str) -> Self {
        Self {
            vert: vert_src.to_string(),
            frag: frag_src.to_string(),
            version: GlslVersion::default(),
        }
    }

    pub fn with_version(mut self, version: GlslVersion) -> Self {
        self.version = version;
        self
    }

    /// Compiles both stages and links them.
    ///
    /// The stage objects are dropped, and so deleted, on every return path.
    pub fn build<'gl>(self, gl: &'gl dyn GlApi) -> Result<Program<'gl>, PBError> {
        let vert = Shader::compile(gl, ShaderStage::Vertex, &self.version.apply(&self.vert))?;
        let frag = Shader::compile(gl, ShaderStage::Fragment, &self.version.apply(&self.frag))?;

        Program::link(gl, &vert, &frag)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BuildStage {
    Vertex,
    Fragment,
    Link,
}

impl From<ShaderStage> for BuildStage {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => BuildStage::Vertex,
            ShaderStage::Fragment => BuildStage::Fragment,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStage::Vertex => write!(f, "Vertex shader compilation"),
            BuildStage::Fragment => write!(f, "Fragment shader compilation"),
            BuildStage::Link => write!(f, "Shader linking"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PBError {
    #[error("{stage} failed: {diagnostic}")]
    ShaderBuildFailed {
        stage: BuildStage,
        diagnostic: String,
    },
    #[error("Shader source contains a nul byte")]
    InvalidSource(#[from] NulError),
    #[error("Expected a {expected} shader, got a {found} shader")]
    StageMismatch {
        expected: ShaderStage,
        found: ShaderStage,
    },
}

fn diagnostic_or_default(log: String) -> String {
    if log.is_empty() {
        "driver reported no diagnostic".to_string()
    } else {
        log
    }
}

/// A successfully compiled shader stage. Deleted on drop.
pub struct Shader<'gl> {
    gl: &'gl dyn GlApi,
    id: GlId,
    stage: ShaderStage,
}

impl<'gl> Shader<'gl> {
    pub fn compile(gl: &'gl dyn GlApi, stage: ShaderStage, src: &str) -> Result<Self, PBError> {
        let src = CString::new(src)?;

        let shader = Self {
            gl,
            id: gl.create_shader(stage),
            stage,
        };

        gl.shader_source(shader.id, &src);
        gl.compile_shader(shader.id);

        if !gl.shader_compile_status(shader.id) {
            let diagnostic = diagnostic_or_default(gl.shader_info_log(shader.id));
            error!("{stage} shader compilation failed: {diagnostic}");

            return Err(PBError::ShaderBuildFailed {
                stage: stage.into(),
                diagnostic,
            });
        }

        Ok(shader)
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn get_id(&self) -> GlId {
        self.id
    }
}

impl Drop for Shader<'_> {
    fn drop(&mut self) {
        self.gl.delete_shader(self.id)
    }
}

pub struct Program<'gl> {
    gl: &'gl dyn GlApi,
    id: GlId,
}

impl<'gl> Program<'gl> {
    /// Links a vertex and a fragment stage. Both are detached again before
    /// returning, so the program holds no reference to them.
    pub fn link(
        gl: &'gl dyn GlApi,
        vert: &Shader<'gl>,
        frag: &Shader<'gl>,
    ) -> Result<Self, PBError> {
        for (shader, expected) in [(vert, ShaderStage::Vertex), (frag, ShaderStage::Fragment)] {
            if shader.stage() != expected {
                return Err(PBError::StageMismatch {
                    expected,
                    found: shader.stage(),
                });
            }
        }

        let program = Self {
            gl,
            id: gl.create_program(),
        };

        gl.attach_shader(program.id, vert.id);
        gl.attach_shader(program.id, frag.id);
        gl.link_program(program.id);

        let linked = gl.program_link_status(program.id);

        gl.detach_shader(program.id, vert.id);
        gl.detach_shader(program.id, frag.id);

        if !linked {
            let diagnostic = diagnostic_or_default(gl.program_info_log(program.id));
            error!("Shader linking failed: {diagnostic}");

            return Err(PBError::ShaderBuildFailed {
                stage: BuildStage::Link,
                diagnostic,
            });
        }

        debug!("Linked program {}", program.id);

        Ok(program)
    }

    pub fn get_id(&self) -> GlId {
        self.id
    }

    pub fn bind(&self) {
        self.gl.use_program(self.id)
    }
}

impl Drop for Program<'_> {
    fn drop(&mut self) {
        self.gl.delete_program(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGl, ObjectKind};

    const VERTEX: &str = "#version 330 core
layout (location = 0) in vec3 position;
void main()
{
gl_Position = vec4(position.x, position.y, position.z, 1.0);
}";

    const FRAGMENT: &str = "#version 330 core
out vec4 color;
void main()
{
color = vec4(1.0f, 0.5f, 0.2f, 1.0f);
}";

    #[test]
    fn valid_pair_links_and_releases_stages() {
        let gl = MockGl::new();
        let program = ProgramBuilder::new(VERTEX, FRAGMENT).build(&gl).unwrap();

        assert_ne!(program.get_id(), 0);
        assert_eq!(gl.created(ObjectKind::Shader), 2);
        assert_eq!(gl.deleted(ObjectKind::Shader), 2);
        assert_eq!(gl.live(), 1);

        program.bind();
        assert_eq!(gl.current_program(), program.get_id());

        drop(program);
        assert_eq!(gl.deleted(ObjectKind::Program), 1);
        assert_eq!(gl.double_deletes(), 0);
    }

    #[test]
    fn vertex_syntax_error_stops_before_link() {
        let gl = MockGl::new();
        let broken = "#version 330 core\nvoid main()\n{\ngl_Position = vec4(0.0);\n";

        let err = ProgramBuilder::new(broken, FRAGMENT)
            .build(&gl)
            .err()
            .unwrap();

        match err {
            PBError::ShaderBuildFailed { stage, diagnostic } => {
                assert_eq!(stage, BuildStage::Vertex);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(gl.created(ObjectKind::Program), 0);
        assert_eq!(gl.created(ObjectKind::Shader), 1);
        assert_eq!(gl.live(), 0);
    }

    #[test]
    fn fragment_failure_releases_vertex_stage() {
        let gl = MockGl::new();
        let broken = "#version 330 core\nout vec4 color;\n}";

        let err = ProgramBuilder::new(VERTEX, broken).build(&gl).err().unwrap();

        assert!(matches!(
            err,
            PBError::ShaderBuildFailed {
                stage: BuildStage::Fragment,
                ..
            }
        ));
        assert_eq!(gl.created(ObjectKind::Shader), 2);
        assert_eq!(gl.deleted(ObjectKind::Shader), 2);
        assert_eq!(gl.live(), 0);
    }

    #[test]
    fn mismatched_interface_fails_link() {
        let gl = MockGl::new();
        let frag = "#version 330 core
in vec2 uv;
out vec4 color;
void main()
{
color = vec4(uv, 0.0, 1.0);
}";

        let err = ProgramBuilder::new(VERTEX, frag).build(&gl).err().unwrap();

        match err {
            PBError::ShaderBuildFailed { stage, diagnostic } => {
                assert_eq!(stage, BuildStage::Link);
                assert!(diagnostic.contains("uv"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(gl.created(ObjectKind::Program), 1);
        assert_eq!(gl.deleted(ObjectKind::Program), 1);
        assert_eq!(gl.deleted(ObjectKind::Shader), 2);
        assert_eq!(gl.live(), 0);
    }

    #[test]
    fn swapped_stages_are_rejected() {
        let gl = MockGl::new();
        let vert = Shader::compile(&gl, ShaderStage::Vertex, VERTEX).unwrap();
        let frag = Shader::compile(&gl, ShaderStage::Fragment, FRAGMENT).unwrap();

        let err = Program::link(&gl, &frag, &vert).err().unwrap();

        assert!(matches!(
            err,
            PBError::StageMismatch {
                expected: ShaderStage::Vertex,
                found: ShaderStage::Fragment
            }
        ));
        assert_eq!(gl.created(ObjectKind::Program), 0);
    }

    #[test]
    fn version_is_prepended_when_missing() {
        let gl = MockGl::new();
        let vert = VERTEX.trim_start_matches("#version 330 core\n");
        let frag = FRAGMENT.trim_start_matches("#version 330 core\n");

        assert!(ProgramBuilder::new(vert, frag).build(&gl).is_ok());
        assert_eq!(
            GlslVersion::CORE_330.apply(vert),
            format!("#version 330 core\n{vert}")
        );
    }

    #[test]
    fn version_directive() {
        let compat = GlslVersion {
            number: 150,
            core: false,
        };
        assert_eq!(compat.directive(), "#version 150");
        assert_eq!(GlslVersion::CORE_330.directive(), "#version 330 core");
        assert_eq!(GlslVersion::CORE_330.apply(VERTEX), VERTEX);
    }

    #[test]
    fn version_after_leading_comments_is_kept() {
        let line = "// quad\n#version 330 core\nvoid main() {}";
        let block = "/* quad\n * shader */\n\n#version 330 core\nvoid main() {}";

        for src in [line, block] {
            let applied = GlslVersion::CORE_330.apply(src);
            assert_eq!(applied, src);
            assert_eq!(applied.matches("#version").count(), 1);
        }

        let unversioned = "// quad\nvoid main() {}";
        assert_eq!(
            GlslVersion::CORE_330.apply(unversioned),
            format!("#version 330 core\n{unversioned}")
        );
    }

    #[test]
    fn commented_sources_build() {
        let gl = MockGl::new();
        let vert = format!("// passthrough\n{VERTEX}");
        let frag = format!("/* solid orange */\n{FRAGMENT}");

        let program = ProgramBuilder::new(&vert, &frag).build(&gl);

        assert!(program.is_ok());
        assert_eq!(gl.deleted(ObjectKind::Shader), 2);
    }

    #[test]
    fn nul_in_source_is_an_error() {
        let gl = MockGl::new();
        let res = Shader::compile(&gl, ShaderStage::Vertex, "#version 330 core\0");

        assert!(matches!(res, Err(PBError::InvalidSource(_))));
        assert_eq!(gl.created(ObjectKind::Shader), 0);
    }

    #[test]
    fn build_failure_message() {
        let err = PBError::ShaderBuildFailed {
            stage: BuildStage::Link,
            diagnostic: "error".to_string(),
        };
        assert_eq!(err.to_string(), "Shader linking failed: error");
    }
}
