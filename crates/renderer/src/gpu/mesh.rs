use wgpu::util::DeviceExt;

use crate::ledger::{LedgerEntry, ResourceKind, ResourceLedger};
use crate::mesh::{index_count_for_bytes, MeshData, VertexFormat};

use super::program::DisplayProgram;

/// One texture plus one program, borrowed for a single draw.
pub(crate) struct MeshMaterial<'a> {
    pub texture: &'a wgpu::BindGroup,
    pub program: &'a DisplayProgram,
}

/// Static vertex and index buffers uploaded from a [`MeshData`].
pub(crate) struct MeshBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    format: VertexFormat,
    index_count: u32,
    _ledger: LedgerEntry,
}

impl MeshBuffers {
    pub(crate) fn create(device: &wgpu::Device, ledger: &ResourceLedger, mesh: MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh vertices"),
            contents: bytemuck::cast_slice(mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_bytes: &[u8] = bytemuck::cast_slice(mesh.indices());
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh indices"),
            contents: index_bytes,
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            format: mesh.format(),
            index_count: index_count_for_bytes(index_bytes.len()),
            _ledger: ledger.acquire(ResourceKind::MeshBuffers, "mesh"),
        }
    }

    pub(crate) fn index_count(&self) -> u32 {
        self.index_count
    }

    pub(crate) fn format(&self) -> VertexFormat {
        self.format
    }

    /// Selects the material's program and texture, then draws every index.
    pub(crate) fn bind_and_draw(&self, pass: &mut wgpu::RenderPass<'_>, material: &MeshMaterial<'_>) {
        pass.set_pipeline(&material.program.pipeline);
        pass.set_bind_group(0, material.texture, &[]);
        if self.index_count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    pub(crate) fn destroy(self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}
