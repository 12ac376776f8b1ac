//! CPU-side mesh description validated before any GPU upload.

use std::mem::size_of;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has {floats} vertex floats, not a multiple of the {format:?} stride ({stride})")]
    StrideMismatch {
        format: VertexFormat,
        floats: usize,
        stride: usize,
    },
    #[error("index {index} at position {position} references vertex beyond count {vertex_count}")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// Interleaved vertex layout. Position is always attribute 0; color then
/// texture coordinate follow in that order when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Position,
    PositionColor,
    PositionUv,
    PositionColorUv,
}

impl VertexFormat {
    pub fn floats_per_vertex(self) -> usize {
        match self {
            VertexFormat::Position => 3,
            VertexFormat::PositionColor => 6,
            VertexFormat::PositionUv => 5,
            VertexFormat::PositionColorUv => 8,
        }
    }

    /// Byte stride of one vertex.
    pub fn stride(self) -> u64 {
        (self.floats_per_vertex() * size_of::<f32>()) as u64
    }

    pub fn has_color(self) -> bool {
        matches!(
            self,
            VertexFormat::PositionColor | VertexFormat::PositionColorUv
        )
    }

    pub fn has_uv(self) -> bool {
        matches!(self, VertexFormat::PositionUv | VertexFormat::PositionColorUv)
    }

    /// Tightly packed attribute list with sequential shader locations.
    pub fn attributes(self) -> Vec<wgpu::VertexAttribute> {
        let mut formats = vec![wgpu::VertexFormat::Float32x3];
        if self.has_color() {
            formats.push(wgpu::VertexFormat::Float32x3);
        }
        if self.has_uv() {
            formats.push(wgpu::VertexFormat::Float32x2);
        }

        let mut offset = 0u64;
        formats
            .into_iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = wgpu::VertexAttribute {
                    format,
                    offset,
                    shader_location: location as u32,
                };
                offset += format.size();
                attribute
            })
            .collect()
    }
}

/// Immutable static mesh: interleaved vertex floats plus `u32` indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    format: VertexFormat,
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl MeshData {
    pub fn new(
        format: VertexFormat,
        vertices: Vec<f32>,
        indices: Vec<u32>,
    ) -> Result<Self, MeshError> {
        let stride = format.floats_per_vertex();
        if vertices.len() % stride != 0 {
            return Err(MeshError::StrideMismatch {
                format,
                floats: vertices.len(),
                stride,
            });
        }

        let vertex_count = vertices.len() / stride;
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|(_, index)| **index as usize >= vertex_count)
        {
            return Err(MeshError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            });
        }

        Ok(Self {
            format,
            vertices,
            indices,
        })
    }

    /// The screen-filling quad in normalized device coordinates with texture
    /// coordinates whose origin is the top-left corner.
    pub fn fullscreen_quad() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            // position         uv
             1.0,  1.0, 0.0,    1.0, 0.0,
             1.0, -1.0, 0.0,    1.0, 1.0,
            -1.0, -1.0, 0.0,    0.0, 1.0,
            -1.0,  1.0, 0.0,    0.0, 0.0,
        ];
        Self {
            format: VertexFormat::PositionUv,
            vertices,
            indices: vec![0, 1, 3, 1, 2, 3],
        }
    }

    pub fn format(&self) -> VertexFormat {
        self.format
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.format.floats_per_vertex()
    }

    /// Derived from the index byte length, never stored independently.
    pub fn index_count(&self) -> u32 {
        index_count_for_bytes(std::mem::size_of_val(self.indices.as_slice()))
    }
}

pub(crate) fn index_count_for_bytes(byte_len: usize) -> u32 {
    (byte_len / size_of::<u32>()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_has_six_indices() {
        let quad = MeshData::fullscreen_quad();
        assert_eq!(quad.index_count(), 6);
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.indices(), &[0, 1, 3, 1, 2, 3]);
    }

    #[test]
    fn empty_index_list_is_valid() {
        let mesh = MeshData::new(VertexFormat::Position, vec![0.0; 9], Vec::new())
            .expect("mesh without indices");
        assert_eq!(mesh.index_count(), 0);
    }

    #[test]
    fn rejects_partial_vertex() {
        let err = MeshData::new(VertexFormat::PositionUv, vec![0.0; 7], vec![0])
            .expect_err("stride mismatch");
        assert_eq!(
            err,
            MeshError::StrideMismatch {
                format: VertexFormat::PositionUv,
                floats: 7,
                stride: 5,
            }
        );
    }

    #[test]
    fn rejects_dangling_index() {
        let err = MeshData::new(VertexFormat::Position, vec![0.0; 6], vec![0, 1, 2])
            .expect_err("index out of range");
        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                position: 2,
                index: 2,
                vertex_count: 2,
            }
        );
    }

    #[test]
    fn attributes_are_packed_in_order() {
        let attributes = VertexFormat::PositionColorUv.attributes();
        let layout: Vec<_> = attributes
            .iter()
            .map(|a| (a.shader_location, a.offset, a.format))
            .collect();
        assert_eq!(
            layout,
            vec![
                (0, 0, wgpu::VertexFormat::Float32x3),
                (1, 12, wgpu::VertexFormat::Float32x3),
                (2, 24, wgpu::VertexFormat::Float32x2),
            ]
        );
        assert_eq!(VertexFormat::PositionColorUv.stride(), 32);

        let uv_only = VertexFormat::PositionUv.attributes();
        assert_eq!(uv_only[1].shader_location, 1);
        assert_eq!(uv_only[1].offset, 12);
        assert_eq!(VertexFormat::PositionUv.stride(), 20);
    }
}
