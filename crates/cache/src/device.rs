//! Device-resident tiles and the GPU binding they are created through.
//!
//! The cache never talks to a graphics API directly. It creates and deletes
//! textures and vertex buffers through a [`GpuBinding`], on the owner thread
//! only. [`HeadlessGpu`] implements the binding without a device.

use crate::projection::Projection;
use bytemuck::{Pod, Zeroable};
use relief_pyramid::{HostTile, LatLonBox, SampleType, TileKey};
use std::collections::HashMap;
use std::fmt;

/// Single-channel texel formats used for tile samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// Signed 16-bit, normalized to [-1, 1] when sampled
    R16Snorm,
    /// 32-bit float
    R32Float,
}

impl TextureFormat {
    pub fn for_sample_type(sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::I16 => TextureFormat::R16Snorm,
            SampleType::F32 => TextureFormat::R32Float,
        }
    }
}

/// A 2D texture to create, rows north to south.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Native-endian texels, `width * height` of them
    pub bytes: &'a [u8],
}

/// One corner of a tile quad: plot position and texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub xy: [f32; 2],
    pub st: [f32; 2],
}

impl QuadVertex {
    /// Raw bytes of a vertex slice, for buffer uploads
    pub fn as_bytes(vertices: &[QuadVertex]) -> &[u8] {
        bytemuck::cast_slice(vertices)
    }
}

/// GPU resource creation and deletion.
///
/// All calls happen on the owner thread. Handles are opaque to the cache.
pub trait GpuBinding {
    type Texture: fmt::Debug;
    type Buffer: fmt::Debug;

    fn create_texture(&mut self, upload: TextureUpload<'_>) -> Self::Texture;

    /// Create a vertex buffer holding a triangle-strip quad.
    fn create_vertex_buffer(&mut self, vertices: &[QuadVertex]) -> Self::Buffer;

    fn delete_texture(&mut self, texture: Self::Texture);

    fn delete_buffer(&mut self, buffer: Self::Buffer);
}

/// A tile resident on the GPU.
///
/// Owns one texture and one vertex buffer, released together by
/// [`DeviceTile::release`].
pub struct DeviceTile<G: GpuBinding> {
    key: TileKey,
    bounds: LatLonBox,
    border_deg: f64,
    sample_type: SampleType,
    texture: G::Texture,
    vertex_buffer: G::Buffer,
    vertex_count: usize,
    /// Frame number of the last update that needed this tile
    pub last_used_frame: u64,
}

impl<G: GpuBinding> fmt::Debug for DeviceTile<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTile")
            .field("key", &self.key)
            .field("bounds", &self.bounds)
            .field("sample_type", &self.sample_type)
            .field("texture", &self.texture)
            .field("vertex_buffer", &self.vertex_buffer)
            .field("last_used_frame", &self.last_used_frame)
            .finish()
    }
}

impl<G: GpuBinding> DeviceTile<G> {
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Bounds including the border
    pub fn bounds(&self) -> &LatLonBox {
        &self.bounds
    }

    /// Bounds the quad covers
    pub fn visible_bounds(&self) -> LatLonBox {
        self.bounds.inset(self.border_deg)
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn texture(&self) -> &G::Texture {
        &self.texture
    }

    pub fn vertex_buffer(&self) -> &G::Buffer {
        &self.vertex_buffer
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Free the GPU resources.
    pub fn release(self, gpu: &mut G) {
        gpu.delete_texture(self.texture);
        gpu.delete_buffer(self.vertex_buffer);
    }
}

/// Plot y of a visible edge, clamped to the usable range of `projection`.
fn edge_y(projection: &dyn Projection, lat_deg: f64) -> f64 {
    if lat_deg >= 90.0 {
        projection.max_usable_y()
    } else if lat_deg <= -90.0 {
        projection.min_usable_y()
    } else {
        projection
            .lat_to_y(lat_deg)
            .clamp(projection.min_usable_y(), projection.max_usable_y())
    }
}

/// Upload a host tile to the GPU.
///
/// The texture holds every sample including the border. The quad covers the
/// visible bounds only, and its texture coordinates skip the border texels.
/// Vertex order is north-west, south-west, north-east, south-east.
///
/// The caller must not already hold a device tile for `key`.
pub fn upload_tile<G: GpuBinding>(
    gpu: &mut G,
    key: TileKey,
    host: &HostTile,
    projection: &dyn Projection,
) -> DeviceTile<G> {
    let width = host.data_cols();
    let height = host.data_rows();
    let texture = gpu.create_texture(TextureUpload {
        width: width as u32,
        height: height as u32,
        format: TextureFormat::for_sample_type(host.sample_type()),
        bytes: host.samples().as_bytes(),
    });

    let visible = host.visible_bounds();
    let y_north = edge_y(projection, visible.north_deg) as f32;
    let y_south = edge_y(projection, visible.south_deg) as f32;
    let x_west = projection.lon_to_x(visible.west_deg) as f32;
    let x_east = projection.lon_to_x(visible.east_deg) as f32;

    let border = host.border_cells() as f32;
    let s_west = border / width as f32;
    let s_east = 1.0 - s_west;
    let t_north = border / height as f32;
    let t_south = 1.0 - t_north;

    let vertices = [
        QuadVertex {
            xy: [x_west, y_north],
            st: [s_west, t_north],
        },
        QuadVertex {
            xy: [x_west, y_south],
            st: [s_west, t_south],
        },
        QuadVertex {
            xy: [x_east, y_north],
            st: [s_east, t_north],
        },
        QuadVertex {
            xy: [x_east, y_south],
            st: [s_east, t_south],
        },
    ];
    let vertex_buffer = gpu.create_vertex_buffer(&vertices);

    DeviceTile {
        key,
        bounds: *host.bounds(),
        border_deg: host.border_deg(),
        sample_type: host.sample_type(),
        texture,
        vertex_buffer,
        vertex_count: vertices.len(),
        last_used_frame: host.last_used_frame,
    }
}

/// Texture handle issued by [`HeadlessGpu`]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct HeadlessTexture(u64);

/// Buffer handle issued by [`HeadlessGpu`]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct HeadlessBuffer(u64);

/// What [`HeadlessGpu`] remembers about a live texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub byte_len: usize,
}

/// A [`GpuBinding`] with no device behind it.
///
/// Tracks live handles so leaks and double deletes are observable.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_id: u64,
    textures: HashMap<u64, TextureInfo>,
    buffers: HashMap<u64, Vec<QuadVertex>>,
    textures_created: u64,
    bytes_uploaded: u64,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Textures created over the binding's lifetime
    pub fn textures_created(&self) -> u64 {
        self.textures_created
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    pub fn texture_info(&self, texture: &HeadlessTexture) -> Option<TextureInfo> {
        self.textures.get(&texture.0).copied()
    }

    pub fn vertices(&self, buffer: &HeadlessBuffer) -> Option<&[QuadVertex]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBinding for HeadlessGpu {
    type Texture = HeadlessTexture;
    type Buffer = HeadlessBuffer;

    fn create_texture(&mut self, upload: TextureUpload<'_>) -> HeadlessTexture {
        let id = self.next_id();
        self.textures.insert(
            id,
            TextureInfo {
                width: upload.width,
                height: upload.height,
                format: upload.format,
                byte_len: upload.bytes.len(),
            },
        );
        self.textures_created += 1;
        self.bytes_uploaded += upload.bytes.len() as u64;
        HeadlessTexture(id)
    }

    fn create_vertex_buffer(&mut self, vertices: &[QuadVertex]) -> HeadlessBuffer {
        let id = self.next_id();
        self.buffers.insert(id, vertices.to_vec());
        HeadlessBuffer(id)
    }

    fn delete_texture(&mut self, texture: HeadlessTexture) {
        assert!(
            self.textures.remove(&texture.0).is_some(),
            "texture {} deleted twice",
            texture.0
        );
    }

    fn delete_buffer(&mut self, buffer: HeadlessBuffer) {
        assert!(
            self.buffers.remove(&buffer.0).is_some(),
            "buffer {} deleted twice",
            buffer.0
        );
    }
}
