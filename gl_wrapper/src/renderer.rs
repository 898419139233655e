use crate::api::{ClearMask, DepthFunc, GlApi, Primitive};
use crate::geometry::{GBError, Geometry};
use crate::program::Program;

pub struct GlRenderer<'gl> {
    gl: &'gl dyn GlApi,
}

impl<'gl> GlRenderer<'gl> {
    pub fn new(gl: &'gl dyn GlApi) -> Self {
        Self { gl }
    }

    /// Draws every element of `geometry` as triangles.
    pub fn draw(&self, geometry: &Geometry, program: &Program) -> Result<(), GBError> {
        self.draw_primitives(geometry, program, Primitive::Triangles, geometry.element_count())
    }

    /// Binds `program`, then issues one draw call of `count` elements.
    pub fn draw_primitives(
        &self,
        geometry: &Geometry,
        program: &Program,
        primitive: Primitive,
        count: usize,
    ) -> Result<(), GBError> {
        program.bind();
        geometry.draw(primitive, count)
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    pub fn clear_color(&self, r: f32, g: f32, b: f32) {
        self.gl.clear_color(r, g, b, 1.0);
        self.gl.clear(ClearMask::COLOR);
    }

    pub fn clear_color_depth(&self, r: f32, g: f32, b: f32) {
        self.gl.clear_color(r, g, b, 1.0);
        self.gl.clear(ClearMask::COLOR_DEPTH);
    }

    pub fn enable_depth_test(&self, func: DepthFunc) {
        self.gl.enable_depth_test(func);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeometryBuilder, VertexAttribute};
    use crate::mock::{Call, MockGl, ObjectKind};
    use crate::program::ProgramBuilder;
    use crate::QUAD_INDICES;

    const VERTEX: &str = "#version 330 core
layout (location = 0) in vec2 position;
void main()
{
gl_Position = vec4(position, 0.0, 1.0);
}";

    const FRAGMENT: &str = "#version 330 core
out vec4 color;
void main()
{
color = vec4(1.0f, 0.5f, 0.2f, 1.0f);
}";

    #[rustfmt::skip]
    const QUAD_2D: [f32; 8] = [
        -0.5, -0.5,
        0.5, -0.5,
        0.5, 0.5,
        -0.5, 0.5,
    ];

    #[test]
    fn quad_is_one_indexed_draw() {
        let gl = MockGl::new();
        let program = ProgramBuilder::new(VERTEX, FRAGMENT).build(&gl).unwrap();
        let quad = GeometryBuilder::new(&QUAD_2D)
            .with_attribute(VertexAttribute::Vec2)
            .with_indices(&QUAD_INDICES)
            .build(&gl)
            .unwrap();

        let renderer = GlRenderer::new(&gl);
        renderer.clear_color(0.2, 0.3, 0.3);
        renderer
            .draw_primitives(&quad, &program, Primitive::Triangles, 6)
            .unwrap();

        let draws = gl.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(
            draws[0],
            Call::DrawElements {
                mode: Primitive::Triangles,
                count: 6,
                vao: quad.vao(),
                element_buffer: gl.element_buffer_of(quad.vao()),
                program: program.get_id(),
            }
        );
        assert!(gl.is_attrib_enabled(quad.vao(), 0));

        // the vertex array is unbound again after the draw
        assert_eq!(gl.bound_vertex_array(), 0);
    }

    #[test]
    fn each_frame_binds_program_then_draws() {
        let gl = MockGl::new();
        let program = ProgramBuilder::new(VERTEX, FRAGMENT).build(&gl).unwrap();
        let quad = GeometryBuilder::new(&QUAD_2D)
            .with_attribute(VertexAttribute::Vec2)
            .with_indices(&QUAD_INDICES)
            .build(&gl)
            .unwrap();

        let renderer = GlRenderer::new(&gl);
        for _ in 0..3 {
            renderer.clear_color(0.2, 0.3, 0.3);
            renderer.draw(&quad, &program).unwrap();
        }

        let frame = |c: &Call| {
            matches!(
                c,
                Call::Clear(_)
                    | Call::UseProgram(_)
                    | Call::BindVertexArray(_)
                    | Call::DrawElements { .. }
            )
        };
        let calls: Vec<Call> = gl.calls().into_iter().filter(|c| frame(c)).collect();
        let upload_end = calls
            .iter()
            .position(|c| matches!(c, Call::Clear(_)))
            .unwrap();

        let one_frame = vec![
            Call::Clear(ClearMask::COLOR),
            Call::UseProgram(program.get_id()),
            Call::BindVertexArray(quad.vao()),
            Call::DrawElements {
                mode: Primitive::Triangles,
                count: 6,
                vao: quad.vao(),
                element_buffer: gl.element_buffer_of(quad.vao()),
                program: program.get_id(),
            },
            Call::BindVertexArray(0),
        ];
        let expected: Vec<Call> = (0..3).flat_map(|_| one_frame.clone()).collect();
        assert_eq!(calls[upload_end..], expected[..]);
    }

    #[test]
    fn clear_and_viewport() {
        let gl = MockGl::new();
        let renderer = GlRenderer::new(&gl);

        renderer.resize(1600, 1200);
        renderer.clear_color_depth(0.2, 0.3, 0.3);
        renderer.enable_depth_test(DepthFunc::Less);

        assert_eq!(
            gl.calls(),
            vec![
                Call::Viewport(0, 0, 1600, 1200),
                Call::ClearColor([0.2, 0.3, 0.3, 1.0]),
                Call::Clear(ClearMask::COLOR_DEPTH),
                Call::DepthTest(DepthFunc::Less),
            ]
        );
    }

    #[test]
    fn teardown_releases_everything() {
        let gl = MockGl::new();
        {
            let program = ProgramBuilder::new(VERTEX, FRAGMENT).build(&gl).unwrap();
            let quad = GeometryBuilder::new(&QUAD_2D)
                .with_attribute(VertexAttribute::Vec2)
                .with_indices(&QUAD_INDICES)
                .build(&gl)
                .unwrap();
            let renderer = GlRenderer::new(&gl);
            renderer.draw(&quad, &program).unwrap();
        }

        assert_eq!(gl.live(), 0);
        assert_eq!(gl.deleted(ObjectKind::Program), 1);
        assert_eq!(gl.deleted(ObjectKind::VertexArray), 1);
        assert_eq!(gl.deleted(ObjectKind::Buffer), 2);
        assert_eq!(gl.double_deletes(), 0);
    }
}
