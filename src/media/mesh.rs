/// Triangle mesh ready for the sink.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedMesh {
    pub vertex_positions: Vec<[f32; 3]>,
    pub vertex_normals: Option<Vec<[f32; 3]>>,
    pub triangle_indices: Vec<[u32; 3]>,
}

impl DecodedMesh {
    pub fn is_empty(&self) -> bool {
        self.vertex_positions.is_empty()
    }
}

/// Decodes one Draco-compressed sub-mesh. Without a decoder the stream logs
/// the compressed bytes as an encoded blob instead.
pub trait MeshDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> anyhow::Result<DecodedMesh>;
}
