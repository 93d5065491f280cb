/// Turns integer mask planes into overlay indices.
///
/// Every set bit of the selection becomes one overlay, numbered in bit
/// order. A pixel takes the index of the lowest selected bit it has set;
/// pixels with none of them, and blank pixels, get the transparent index,
/// which equals the number of overlays.
#[derive(Clone, Debug)]
pub struct MaskMapper {
    bits: Vec<u32>,
}

impl MaskMapper {
    pub fn new(selection: u64) -> Self {
        let bits = (0..64).filter(|b| selection & (1u64 << b) != 0).collect();
        Self { bits }
    }

    pub fn overlay_count(&self) -> usize {
        self.bits.len()
    }

    pub fn transparent(&self) -> u8 {
        self.bits.len() as u8
    }

    pub fn byte(&self, v: f32) -> u8 {
        if !v.is_finite() || v < 0.0 {
            return self.transparent();
        }
        let word = v as u64;
        self.bits
            .iter()
            .position(|&b| word & (1u64 << b) != 0)
            .map_or(self.transparent(), |i| i as u8)
    }
}
