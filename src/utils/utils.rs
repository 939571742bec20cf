/// u8_to_f32_vec decodes little-endian f32 values. Trailing bytes that do not form a full value are ignored.
pub fn u8_to_f32_vec(v: &[u8]) -> Vec<f32> {
    v.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
