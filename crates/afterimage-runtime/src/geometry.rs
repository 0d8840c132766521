//! Full-screen quad shared by both passes.

/// Floats per vertex: `a_pos.xy`, `a_uv.xy`.
pub const QUAD_FLOATS_PER_VERTEX: usize = 4;

/// Byte stride of one vertex.
pub const QUAD_STRIDE: i32 = (QUAD_FLOATS_PER_VERTEX * core::mem::size_of::<f32>()) as i32;

/// Byte offset of `a_uv` inside a vertex.
pub const QUAD_UV_OFFSET: i32 = (2 * core::mem::size_of::<f32>()) as i32;

/// Clip-space corners with their texture coordinates.
///
/// Order: top-left, bottom-left, bottom-right, top-right.
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 16] = [
    -1.0,  1.0, 0.0, 1.0,
    -1.0, -1.0, 0.0, 0.0,
     1.0, -1.0, 1.0, 0.0,
     1.0,  1.0, 1.0, 1.0,
];

/// Two counter-clockwise triangles.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Vertex `i` as `(position, uv)`.
pub fn quad_vertex(i: usize) -> ([f32; 2], [f32; 2]) {
    let v = &QUAD_VERTICES[i * QUAD_FLOATS_PER_VERTEX..(i + 1) * QUAD_FLOATS_PER_VERTEX];
    ([v[0], v[1]], [v[2], v[3]])
}
