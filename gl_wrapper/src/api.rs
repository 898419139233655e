use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::marker::PhantomData;

use gl::types::{GLenum, GLint, GLuint};
use thiserror::Error;

use crate::geometry::{AttributeDescriptor, ComponentType};

pub type GlId = GLuint;

/// The subset of OpenGL this crate issues.
///
/// Every GPU object in the crate goes through this trait, so the owning
/// wrappers can run against [`NativeGl`] or a recording double in tests.
/// All calls are expected on the thread that owns the current context.
pub trait GlApi {
    fn create_shader(&self, stage: ShaderStage) -> GlId;
    fn shader_source(&self, shader: GlId, source: &CStr);
    fn compile_shader(&self, shader: GlId);
    fn shader_compile_status(&self, shader: GlId) -> bool;
    fn shader_info_log(&self, shader: GlId) -> String;
    fn delete_shader(&self, shader: GlId);

    fn create_program(&self) -> GlId;
    fn attach_shader(&self, program: GlId, shader: GlId);
    fn detach_shader(&self, program: GlId, shader: GlId);
    fn link_program(&self, program: GlId);
    fn program_link_status(&self, program: GlId) -> bool;
    fn program_info_log(&self, program: GlId) -> String;
    fn use_program(&self, program: GlId);
    fn delete_program(&self, program: GlId);

    fn gen_vertex_array(&self) -> GlId;
    fn bind_vertex_array(&self, vao: GlId);
    fn delete_vertex_array(&self, vao: GlId);

    fn gen_buffer(&self) -> GlId;
    fn bind_buffer(&self, target: BufferTarget, buffer: GlId);
    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn delete_buffer(&self, buffer: GlId);

    fn vertex_attrib_pointer(&self, attribute: &AttributeDescriptor);
    fn enable_vertex_attrib_array(&self, index: u32);

    fn draw_arrays(&self, mode: Primitive, first: i32, count: i32);
    /// Indices are read from the bound element buffer as `u32`, starting at 0.
    fn draw_elements(&self, mode: Primitive, count: i32);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: ClearMask);
    fn enable_depth_test(&self, func: DepthFunc);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

impl BufferTarget {
    pub fn gl_enum(self) -> GLenum {
        match self {
            BufferTarget::Array => gl::ARRAY_BUFFER,
            BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
}

impl BufferUsage {
    pub fn gl_enum(self) -> GLenum {
        match self {
            BufferUsage::Static => gl::STATIC_DRAW,
            BufferUsage::Dynamic => gl::DYNAMIC_DRAW,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    pub fn gl_enum(self) -> GLenum {
        match self {
            Primitive::Points => gl::POINTS,
            Primitive::Lines => gl::LINES,
            Primitive::LineStrip => gl::LINE_STRIP,
            Primitive::Triangles => gl::TRIANGLES,
            Primitive::TriangleStrip => gl::TRIANGLE_STRIP,
            Primitive::TriangleFan => gl::TRIANGLE_FAN,
        }
    }
}

/// Depth comparison function. Only these values are accepted by `glDepthFunc`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DepthFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl DepthFunc {
    pub fn gl_enum(self) -> GLenum {
        match self {
            DepthFunc::Never => gl::NEVER,
            DepthFunc::Less => gl::LESS,
            DepthFunc::Equal => gl::EQUAL,
            DepthFunc::LessEqual => gl::LEQUAL,
            DepthFunc::Greater => gl::GREATER,
            DepthFunc::NotEqual => gl::NOTEQUAL,
            DepthFunc::GreaterEqual => gl::GEQUAL,
            DepthFunc::Always => gl::ALWAYS,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
    };
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };

    pub fn bits(self) -> GLenum {
        let mut bits = 0;
        if self.color {
            bits |= gl::COLOR_BUFFER_BIT;
        }
        if self.depth {
            bits |= gl::DEPTH_BUFFER_BIT;
        }
        bits
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("OpenGL function {0} could not be loaded")]
    MissingFunction(&'static str),
}

/// [`GlApi`] backed by the driver through the `gl` crate.
///
/// Only obtainable through [`NativeGl::load_with`], so holding one means the
/// function pointers are loaded.
pub struct NativeGl {
    // GL calls are bound to the context's thread.
    _not_send: PhantomData<*const ()>,
}

impl NativeGl {
    pub fn load_with<F>(loader: F) -> Result<Self, LoadError>
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);

        let required = [
            ("glCreateShader", gl::CreateShader::is_loaded()),
            ("glCreateProgram", gl::CreateProgram::is_loaded()),
            ("glGenVertexArrays", gl::GenVertexArrays::is_loaded()),
            ("glGenBuffers", gl::GenBuffers::is_loaded()),
            ("glVertexAttribPointer", gl::VertexAttribPointer::is_loaded()),
            ("glDrawElements", gl::DrawElements::is_loaded()),
            ("glDepthFunc", gl::DepthFunc::is_loaded()),
        ];

        if let Some((name, _)) = required.iter().find(|(_, loaded)| !*loaded) {
            return Err(LoadError::MissingFunction(*name));
        }

        Ok(Self {
            _not_send: PhantomData,
        })
    }

    pub fn version(&self) -> String {
        unsafe {
            let ptr = gl::GetString(gl::VERSION);
            if ptr.is_null() {
                return String::new();
            }

            CStr::from_ptr(ptr as *const c_char)
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// Reads an info log of `len` bytes through `fill(capacity, written, buffer)`.
fn read_info_log(len: GLint, fill: impl FnOnce(GLint, *mut GLint, *mut c_char)) -> String {
    let capacity = len.max(1);
    let mut buf = vec![0_u8; capacity as usize];
    let mut written: GLint = 0;

    fill(capacity, &mut written, buf.as_mut_ptr() as *mut c_char);

    buf.truncate(written.clamp(0, capacity) as usize);
    String::from_utf8_lossy(&buf).trim_end().to_string()
}

impl GlApi for NativeGl {
    fn create_shader(&self, stage: ShaderStage) -> GlId {
        unsafe { gl::CreateShader(stage.gl_enum()) }
    }

    fn shader_source(&self, shader: GlId, source: &CStr) {
        unsafe {
            gl::ShaderSource(
                shader,
                1,
                (&source.as_ptr()) as *const *const c_char,
                std::ptr::null(),
            );
        }
    }

    fn compile_shader(&self, shader: GlId) {
        unsafe { gl::CompileShader(shader) }
    }

    fn shader_compile_status(&self, shader: GlId) -> bool {
        let mut success: GLint = 0;
        unsafe { gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success) };
        success == gl::TRUE as GLint
    }

    fn shader_info_log(&self, shader: GlId) -> String {
        let mut len: GLint = 0;
        unsafe { gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len) };

        read_info_log(len, |capacity, written, buf| unsafe {
            gl::GetShaderInfoLog(shader, capacity, written, buf)
        })
    }

    fn delete_shader(&self, shader: GlId) {
        unsafe { gl::DeleteShader(shader) }
    }

    fn create_program(&self) -> GlId {
        unsafe { gl::CreateProgram() }
    }

    fn attach_shader(&self, program: GlId, shader: GlId) {
        unsafe { gl::AttachShader(program, shader) }
    }

    fn detach_shader(&self, program: GlId, shader: GlId) {
        unsafe { gl::DetachShader(program, shader) }
    }

    fn link_program(&self, program: GlId) {
        unsafe { gl::LinkProgram(program) }
    }

    fn program_link_status(&self, program: GlId) -> bool {
        let mut success: GLint = 0;
        unsafe { gl::GetProgramiv(program, gl::LINK_STATUS, &mut success) };
        success == gl::TRUE as GLint
    }

    fn program_info_log(&self, program: GlId) -> String {
        let mut len: GLint = 0;
        unsafe { gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len) };

        read_info_log(len, |capacity, written, buf| unsafe {
            gl::GetProgramInfoLog(program, capacity, written, buf)
        })
    }

    fn use_program(&self, program: GlId) {
        unsafe { gl::UseProgram(program) }
    }

    fn delete_program(&self, program: GlId) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn gen_vertex_array(&self) -> GlId {
        let mut vao = 0;
        unsafe { gl::GenVertexArrays(1, &mut vao) };
        vao
    }

    fn bind_vertex_array(&self, vao: GlId) {
        unsafe { gl::BindVertexArray(vao) }
    }

    fn delete_vertex_array(&self, vao: GlId) {
        unsafe { gl::DeleteVertexArrays(1, &vao) }
    }

    fn gen_buffer(&self) -> GlId {
        let mut buffer = 0;
        unsafe { gl::GenBuffers(1, &mut buffer) };
        buffer
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: GlId) {
        unsafe { gl::BindBuffer(target.gl_enum(), buffer) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        unsafe {
            gl::BufferData(
                target.gl_enum(),
                data.len() as isize,
                data.as_ptr() as *const c_void,
                usage.gl_enum(),
            );
        }
    }

    fn delete_buffer(&self, buffer: GlId) {
        unsafe { gl::DeleteBuffers(1, &buffer) }
    }

    fn vertex_attrib_pointer(&self, attribute: &AttributeDescriptor) {
        let component_type = match attribute.component_type {
            ComponentType::Float => gl::FLOAT,
        };

        unsafe {
            gl::VertexAttribPointer(
                attribute.index,
                attribute.components as GLint,
                component_type,
                gl::FALSE,
                attribute.stride as GLint,
                attribute.offset as *const c_void,
            );
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { gl::EnableVertexAttribArray(index) }
    }

    fn draw_arrays(&self, mode: Primitive, first: i32, count: i32) {
        unsafe { gl::DrawArrays(mode.gl_enum(), first, count) }
    }

    fn draw_elements(&self, mode: Primitive, count: i32) {
        unsafe {
            gl::DrawElements(
                mode.gl_enum(),
                count,
                gl::UNSIGNED_INT,
                std::ptr::null(),
            );
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { gl::Viewport(x, y, width, height) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { gl::ClearColor(r, g, b, a) }
    }

    fn clear(&self, mask: ClearMask) {
        unsafe { gl::Clear(mask.bits()) }
    }

    fn enable_depth_test(&self, func: DepthFunc) {
        unsafe {
            gl::Enable(gl::DEPTH_TEST);
            gl::DepthFunc(func.gl_enum());
        }
    }
}
