/// Unit quad as three-component positions, drawn with [`QUAD_INDICES`].
#[rustfmt::skip]
pub const QUAD: [f32; 12] = [
    -0.5, -0.5, 0.0,
    0.5, -0.5, 0.0,
    0.5, 0.5, 0.0,
    -0.5, 0.5, 0.0,
];

#[rustfmt::skip]
pub const QUAD_INDICES: [u32; 6] = [
    0, 1, 2,
    0, 2, 3,
];

pub mod api;
pub mod frame_loop;
pub mod geometry;
pub mod program;
pub mod renderer;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
