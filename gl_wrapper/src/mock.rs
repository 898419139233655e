//! Recording [`GlApi`] double.
//!
//! Hands out handles, counts creations and deletions per object kind, tracks
//! bindings the way a GL 3.3 context does, and records every state-changing
//! call. Compilation and linking are simulated with a few textual checks that
//! are strict enough to tell a valid shader pair from a broken one.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::CStr;

use crate::api::{
    BufferTarget, BufferUsage, ClearMask, DepthFunc, GlApi, GlId, Primitive, ShaderStage,
};
use crate::geometry::AttributeDescriptor;
use crate::program::skip_leading_comments;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Shader,
    Program,
    VertexArray,
    Buffer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UseProgram(GlId),
    BindVertexArray(GlId),
    BindBuffer(BufferTarget, GlId),
    BufferData {
        target: BufferTarget,
        buffer: GlId,
        len: usize,
        usage: BufferUsage,
    },
    AttribPointer(AttributeDescriptor),
    EnableAttrib(u32),
    DrawArrays {
        mode: Primitive,
        first: i32,
        count: i32,
        vao: GlId,
        program: GlId,
    },
    DrawElements {
        mode: Primitive,
        count: i32,
        vao: GlId,
        element_buffer: GlId,
        program: GlId,
    },
    Viewport(i32, i32, i32, i32),
    ClearColor([f32; 4]),
    Clear(ClearMask),
    DepthTest(DepthFunc),
}

struct ShaderState {
    stage: ShaderStage,
    source: String,
    compiled: Option<Result<(), String>>,
}

#[derive(Default)]
struct ProgramState {
    attached: Vec<GlId>,
    linked: Option<Result<(), String>>,
}

#[derive(Default)]
struct State {
    next_id: GlId,
    live: HashMap<GlId, ObjectKind>,
    created: HashMap<ObjectKind, usize>,
    deleted: HashMap<ObjectKind, usize>,
    double_deletes: usize,
    shaders: HashMap<GlId, ShaderState>,
    programs: HashMap<GlId, ProgramState>,
    vao: GlId,
    array_buffer: GlId,
    element_buffer: GlId,
    vao_elements: HashMap<GlId, GlId>,
    enabled_attribs: HashSet<(GlId, u32)>,
    program: GlId,
    calls: Vec<Call>,
}

impl State {
    fn alloc(&mut self, kind: ObjectKind) -> GlId {
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        *self.created.entry(kind).or_default() += 1;
        self.next_id
    }

    fn release(&mut self, id: GlId, kind: ObjectKind) -> bool {
        if id == 0 {
            return false;
        }

        if self.live.get(&id) == Some(&kind) {
            self.live.remove(&id);
            *self.deleted.entry(kind).or_default() += 1;
            true
        } else {
            self.double_deletes += 1;
            false
        }
    }

    fn element_binding(&self) -> GlId {
        if self.vao == 0 {
            self.element_buffer
        } else {
            self.vao_elements.get(&self.vao).copied().unwrap_or(0)
        }
    }
}

#[derive(Default)]
pub struct MockGl {
    state: RefCell<State>,
}

impl MockGl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self, kind: ObjectKind) -> usize {
        self.state.borrow().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn deleted(&self, kind: ObjectKind) -> usize {
        self.state.borrow().deleted.get(&kind).copied().unwrap_or(0)
    }

    /// Objects created and not yet deleted, of any kind.
    pub fn live(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn double_deletes(&self) -> usize {
        self.state.borrow().double_deletes
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn draw_calls(&self) -> Vec<Call> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::DrawArrays { .. } | Call::DrawElements { .. }))
            .cloned()
            .collect()
    }

    pub fn bound_vertex_array(&self) -> GlId {
        self.state.borrow().vao
    }

    pub fn bound_array_buffer(&self) -> GlId {
        self.state.borrow().array_buffer
    }

    /// `ELEMENT_ARRAY_BUFFER` as seen right now, through the bound vertex array if any.
    pub fn bound_element_buffer(&self) -> GlId {
        self.state.borrow().element_binding()
    }

    pub fn element_buffer_of(&self, vao: GlId) -> GlId {
        self.state
            .borrow()
            .vao_elements
            .get(&vao)
            .copied()
            .unwrap_or(0)
    }

    pub fn current_program(&self) -> GlId {
        self.state.borrow().program
    }

    pub fn is_attrib_enabled(&self, vao: GlId, index: u32) -> bool {
        self.state.borrow().enabled_attribs.contains(&(vao, index))
    }
}

fn check_source(source: &str) -> Result<(), String> {
    if !skip_leading_comments(source).starts_with("#version") {
        return Err("0:1(1): error: missing #version directive".to_string());
    }

    let mut depth = 0_i32;
    let mut last_line = 1;

    for (n, line) in source.lines().enumerate() {
        last_line = n + 1;
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!(
                            "0:{last_line}(1): error: syntax error, unexpected '}}'"
                        ));
                    }
                }
                _ => (),
            }
        }
    }

    if depth != 0 {
        return Err(format!(
            "0:{last_line}(1): error: syntax error, unexpected end of file"
        ));
    }

    if !source.contains("void main") {
        return Err("error: entry point `main` is not defined".to_string());
    }

    Ok(())
}

/// `(type, name)` of every plain `<qualifier> <type> <name>;` declaration.
fn interface(source: &str, qualifier: &str) -> Vec<(String, String)> {
    source
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.trim().trim_end_matches(';').split_whitespace().collect();
            match tokens.as_slice() {
                [q, ty, name] if *q == qualifier => Some((ty.to_string(), name.to_string())),
                _ => None,
            }
        })
        .collect()
}

fn check_link(shaders: &[&ShaderState]) -> Result<(), String> {
    for shader in shaders {
        match &shader.compiled {
            Some(Ok(())) => (),
            _ => {
                return Err(format!(
                    "error: linking with uncompiled/unsuccessfully compiled {} shader",
                    shader.stage
                ))
            }
        }
    }

    let vertex: Vec<_> = shaders
        .iter()
        .filter(|s| s.stage == ShaderStage::Vertex)
        .collect();
    let fragment: Vec<_> = shaders
        .iter()
        .filter(|s| s.stage == ShaderStage::Fragment)
        .collect();

    let (vertex, fragment) = match (vertex.as_slice(), fragment.as_slice()) {
        ([v], [f]) => (v, f),
        _ => return Err("error: program needs one vertex and one fragment shader".to_string()),
    };

    let outputs = interface(&vertex.source, "out");

    for (ty, name) in interface(&fragment.source, "in") {
        if !outputs.iter().any(|(t, n)| *t == ty && *n == name) {
            return Err(format!(
                "error: fragment shader input `{name}` of type {ty} has no matching vertex shader output"
            ));
        }
    }

    Ok(())
}

impl GlApi for MockGl {
    fn create_shader(&self, stage: ShaderStage) -> GlId {
        let mut state = self.state.borrow_mut();
        let id = state.alloc(ObjectKind::Shader);
        state.shaders.insert(
            id,
            ShaderState {
                stage,
                source: String::new(),
                compiled: None,
            },
        );
        id
    }

    fn shader_source(&self, shader: GlId, source: &CStr) {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            s.source = source.to_string_lossy().into_owned();
        }
    }

    fn compile_shader(&self, shader: GlId) {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            s.compiled = Some(check_source(&s.source));
        }
    }

    fn shader_compile_status(&self, shader: GlId) -> bool {
        matches!(
            self.state.borrow().shaders.get(&shader).map(|s| &s.compiled),
            Some(Some(Ok(())))
        )
    }

    fn shader_info_log(&self, shader: GlId) -> String {
        match self.state.borrow().shaders.get(&shader).map(|s| &s.compiled) {
            Some(Some(Err(log))) => log.clone(),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, shader: GlId) {
        let mut state = self.state.borrow_mut();
        if state.release(shader, ObjectKind::Shader) {
            state.shaders.remove(&shader);
        }
    }

    fn create_program(&self) -> GlId {
        let mut state = self.state.borrow_mut();
        let id = state.alloc(ObjectKind::Program);
        state.programs.insert(id, ProgramState::default());
        id
    }

    fn attach_shader(&self, program: GlId, shader: GlId) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.push(shader);
        }
    }

    fn detach_shader(&self, program: GlId, shader: GlId) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.retain(|s| *s != shader);
        }
    }

    fn link_program(&self, program: GlId) {
        let mut state = self.state.borrow_mut();

        let result = match state.programs.get(&program) {
            Some(p) => {
                let shaders: Vec<&ShaderState> = p
                    .attached
                    .iter()
                    .filter_map(|id| state.shaders.get(id))
                    .collect();
                check_link(&shaders)
            }
            None => return,
        };

        if let Some(p) = state.programs.get_mut(&program) {
            p.linked = Some(result);
        }
    }

    fn program_link_status(&self, program: GlId) -> bool {
        matches!(
            self.state.borrow().programs.get(&program).map(|p| &p.linked),
            Some(Some(Ok(())))
        )
    }

    fn program_info_log(&self, program: GlId) -> String {
        match self.state.borrow().programs.get(&program).map(|p| &p.linked) {
            Some(Some(Err(log))) => log.clone(),
            _ => String::new(),
        }
    }

    fn use_program(&self, program: GlId) {
        let mut state = self.state.borrow_mut();
        state.program = program;
        state.calls.push(Call::UseProgram(program));
    }

    fn delete_program(&self, program: GlId) {
        let mut state = self.state.borrow_mut();
        if state.release(program, ObjectKind::Program) {
            state.programs.remove(&program);
            if state.program == program {
                state.program = 0;
            }
        }
    }

    fn gen_vertex_array(&self) -> GlId {
        self.state.borrow_mut().alloc(ObjectKind::VertexArray)
    }

    fn bind_vertex_array(&self, vao: GlId) {
        let mut state = self.state.borrow_mut();
        state.vao = vao;
        state.calls.push(Call::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: GlId) {
        let mut state = self.state.borrow_mut();
        if state.release(vao, ObjectKind::VertexArray) {
            state.vao_elements.remove(&vao);
            state.enabled_attribs.retain(|(v, _)| *v != vao);
            if state.vao == vao {
                state.vao = 0;
            }
        }
    }

    fn gen_buffer(&self) -> GlId {
        self.state.borrow_mut().alloc(ObjectKind::Buffer)
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: GlId) {
        let mut state = self.state.borrow_mut();
        match target {
            BufferTarget::Array => state.array_buffer = buffer,
            BufferTarget::ElementArray => {
                if state.vao == 0 {
                    state.element_buffer = buffer;
                } else {
                    let vao = state.vao;
                    state.vao_elements.insert(vao, buffer);
                }
            }
        }
        state.calls.push(Call::BindBuffer(target, buffer));
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        let buffer = match target {
            BufferTarget::Array => state.array_buffer,
            BufferTarget::ElementArray => state.element_binding(),
        };
        state.calls.push(Call::BufferData {
            target,
            buffer,
            len: data.len(),
            usage,
        });
    }

    fn delete_buffer(&self, buffer: GlId) {
        let mut state = self.state.borrow_mut();
        if state.release(buffer, ObjectKind::Buffer) {
            if state.array_buffer == buffer {
                state.array_buffer = 0;
            }
            if state.element_buffer == buffer {
                state.element_buffer = 0;
            }
        }
    }

    fn vertex_attrib_pointer(&self, attribute: &AttributeDescriptor) {
        self.state
            .borrow_mut()
            .calls
            .push(Call::AttribPointer(*attribute));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        let mut state = self.state.borrow_mut();
        let vao = state.vao;
        state.enabled_attribs.insert((vao, index));
        state.calls.push(Call::EnableAttrib(index));
    }

    fn draw_arrays(&self, mode: Primitive, first: i32, count: i32) {
        let mut state = self.state.borrow_mut();
        let (vao, program) = (state.vao, state.program);
        state.calls.push(Call::DrawArrays {
            mode,
            first,
            count,
            vao,
            program,
        });
    }

    fn draw_elements(&self, mode: Primitive, count: i32) {
        let mut state = self.state.borrow_mut();
        let (vao, program) = (state.vao, state.program);
        let element_buffer = state.element_binding();
        state.calls.push(Call::DrawElements {
            mode,
            count,
            vao,
            element_buffer,
            program,
        });
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state
            .borrow_mut()
            .calls
            .push(Call::Viewport(x, y, width, height));
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state
            .borrow_mut()
            .calls
            .push(Call::ClearColor([r, g, b, a]));
    }

    fn clear(&self, mask: ClearMask) {
        self.state.borrow_mut().calls.push(Call::Clear(mask));
    }

    fn enable_depth_test(&self, func: DepthFunc) {
        self.state.borrow_mut().calls.push(Call::DepthTest(func));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_delete_is_counted() {
        let gl = MockGl::new();
        let buffer = gl.gen_buffer();

        gl.delete_buffer(buffer);
        gl.delete_buffer(buffer);

        assert_eq!(gl.deleted(ObjectKind::Buffer), 1);
        assert_eq!(gl.double_deletes(), 1);
    }

    #[test]
    fn deleting_zero_is_ignored() {
        let gl = MockGl::new();
        gl.delete_vertex_array(0);
        assert_eq!(gl.double_deletes(), 0);
    }

    #[test]
    fn unbalanced_braces_fail_to_compile() {
        let err = check_source("#version 330 core\nvoid main()\n{\n").unwrap_err();
        assert!(err.contains("syntax error"));
    }

    #[test]
    fn interface_ignores_layout_qualified_inputs() {
        let src = "#version 330 core\nlayout (location = 0) in vec3 position;\nin vec2 uv;\n";
        assert_eq!(
            interface(src, "in"),
            vec![("vec2".to_string(), "uv".to_string())]
        );
    }
}
