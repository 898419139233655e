use log::debug;
use thiserror::Error;

use crate::api::{BufferTarget, BufferUsage, GlApi, GlId, Primitive};

pub struct GeometryBuilder<'a> {
    attributes: Vec<VertexAttribute>,
    data: &'a [f32],
    indices: Option<&'a [u32]>,
    usage: BufferUsage,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(data: &'a [f32]) -> Self {
        Self {
            data,
            attributes: Vec::new(),
            indices: None,
            usage: BufferUsage::Static,
        }
    }

    pub fn with_attribute(mut self, attr: VertexAttribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn with_indices(mut self, indices: &'a [u32]) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Uploads the vertex data (and indices, if any) and records the layout.
    ///
    /// Every precondition is checked before the first GL call, so a rejected
    /// upload creates no GL objects. Nothing is left bound on return.
    pub fn build<'gl>(self, gl: &'gl dyn GlApi) -> Result<Geometry<'gl>, GBError> {
        if self.attributes.is_empty() {
            return Err(GBError::EmptyLayout);
        }

        if self.data.is_empty() {
            return Err(GBError::EmptyData);
        }

        let total_len: usize = self.attributes.iter().map(|a| a.size()).sum();

        if self.data.len() % total_len != 0 {
            return Err(GBError::InvalidDataLength {
                len: self.data.len(),
                components: total_len,
            });
        }

        let vertices = self.data.len() / total_len;

        if let Some(indices) = self.indices {
            if indices.is_empty() {
                return Err(GBError::EmptyIndices);
            }

            if let Some((position, &index)) = indices
                .iter()
                .enumerate()
                .find(|(_, &i)| i as usize >= vertices)
            {
                return Err(GBError::IndexOutOfRange {
                    index,
                    position,
                    vertices,
                });
            }
        }

        let layout = describe_layout(&self.attributes);

        let vao = gl.gen_vertex_array();
        let vbo = gl.gen_buffer();
        let ebo = self.indices.map(|_| gl.gen_buffer());

        gl.bind_vertex_array(vao);

        gl.bind_buffer(BufferTarget::Array, vbo);
        gl.buffer_data(
            BufferTarget::Array,
            bytemuck::cast_slice(self.data),
            self.usage,
        );

        if let (Some(ebo), Some(indices)) = (ebo, self.indices) {
            // recorded in the vertex array, so it is not unbound below
            gl.bind_buffer(BufferTarget::ElementArray, ebo);
            gl.buffer_data(
                BufferTarget::ElementArray,
                bytemuck::cast_slice(indices),
                self.usage,
            );
        }

        for attr in &layout {
            gl.vertex_attrib_pointer(attr);
            gl.enable_vertex_attrib_array(attr.index);
        }

        gl.bind_buffer(BufferTarget::Array, 0);
        gl.bind_vertex_array(0);

        debug!(
            "Uploaded geometry: vao {vao}, {vertices} vertices, {} indices",
            self.indices.map_or(0, |i| i.len())
        );

        Ok(Geometry {
            gl,
            vao,
            vbo,
            ebo,
            vertices,
            indices: self.indices.map_or(0, |i| i.len()),
            layout,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GBError {
    #[error("No vertex attributes were given")]
    EmptyLayout,
    #[error("No vertex data was given")]
    EmptyData,
    #[error("Invalid data length {len} for attributes with {components} components per vertex")]
    InvalidDataLength { len: usize, components: usize },
    #[error("Index list is empty")]
    EmptyIndices,
    #[error("Index {index} at position {position} is out of range for {vertices} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertices: usize,
    },
    #[error("Cannot draw {count} elements, geometry has {available}")]
    CountOutOfRange { count: usize, available: usize },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexAttribute {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl VertexAttribute {
    pub fn size(&self) -> usize {
        match self {
            VertexAttribute::Float => 1,
            VertexAttribute::Vec2 => 2,
            VertexAttribute::Vec3 => 3,
            VertexAttribute::Vec4 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ComponentType {
    Float,
}

impl ComponentType {
    pub fn size_bytes(&self) -> usize {
        match self {
            ComponentType::Float => std::mem::size_of::<f32>(),
        }
    }
}

/// One `glVertexAttribPointer` declaration. `stride` and `offset` are in bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub index: u32,
    pub components: usize,
    pub component_type: ComponentType,
    pub stride: usize,
    pub offset: usize,
}

/// Lays the attributes out tightly packed, in order, one location each.
pub fn describe_layout(attributes: &[VertexAttribute]) -> Vec<AttributeDescriptor> {
    let component_type = ComponentType::Float;
    let stride = attributes.iter().map(|a| a.size()).sum::<usize>() * component_type.size_bytes();

    let mut offset = 0;

    attributes
        .iter()
        .enumerate()
        .map(|(i, attr)| {
            let descriptor = AttributeDescriptor {
                index: i as u32,
                components: attr.size(),
                component_type,
                stride,
                offset,
            };
            offset += attr.size() * component_type.size_bytes();
            descriptor
        })
        .collect()
}

pub struct Geometry<'gl> {
    gl: &'gl dyn GlApi,
    vao: GlId,
    vbo: GlId,
    ebo: Option<GlId>,
    vertices: usize,
    indices: usize,
    layout: Vec<AttributeDescriptor>,
}

impl<'gl> Geometry<'gl> {
    pub fn vao(&self) -> GlId {
        self.vao
    }

    pub fn vertices(&self) -> usize {
        self.vertices
    }

    pub fn indices(&self) -> usize {
        self.indices
    }

    pub fn is_indexed(&self) -> bool {
        self.ebo.is_some()
    }

    /// Number of elements a full draw covers: indices if present, vertices otherwise.
    pub fn element_count(&self) -> usize {
        if self.is_indexed() {
            self.indices
        } else {
            self.vertices
        }
    }

    pub fn layout(&self) -> &[AttributeDescriptor] {
        &self.layout
    }

    /// Issues a single draw call over the first `count` elements.
    ///
    /// A program must be active when this is called; the result is
    /// undefined otherwise. [`crate::renderer::GlRenderer`] binds one first.
    pub fn draw(&self, primitive: Primitive, count: usize) -> Result<(), GBError> {
        let available = self.element_count();
        if count > available {
            return Err(GBError::CountOutOfRange { count, available });
        }

        self.gl.bind_vertex_array(self.vao);

        if self.is_indexed() {
            self.gl.draw_elements(primitive, count as i32);
        } else {
            self.gl.draw_arrays(primitive, 0, count as i32);
        }

        self.gl.bind_vertex_array(0);

        Ok(())
    }
}

impl Drop for Geometry<'_> {
    fn drop(&mut self) {
        self.gl.delete_buffer(self.vbo);
        if let Some(ebo) = self.ebo {
            self.gl.delete_buffer(ebo);
        }
        self.gl.delete_vertex_array(self.vao);
    }
}
