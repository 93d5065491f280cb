//! Color tables that turn 8-bit stretch output into RGB for previews.

/// 256 RGB entries.
pub type ColorTable = [[u8; 3]; 256];

/// Known tables, by id.
pub const TABLE_NAMES: &[&str] = &["gray", "reverse-gray", "heat", "cool", "rainbow"];

/// Table for `id`, or grayscale for unknown ids.
pub fn color_table(id: u32) -> ColorTable {
    let mut table = [[0u8; 3]; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let v = i as u8;
        let t = i as f32 / 255.0;
        *entry = match id {
            1 => [255 - v, 255 - v, 255 - v],
            2 => [
                channel(t * 3.0),
                channel(t * 3.0 - 1.0),
                channel(t * 3.0 - 2.0),
            ],
            3 => [v, 255 - v, 255],
            4 => rainbow(t),
            _ => [v, v, v],
        };
    }
    table
}

pub fn name(id: u32) -> &'static str {
    TABLE_NAMES.get(id as usize).copied().unwrap_or("gray")
}

fn channel(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn rainbow(t: f32) -> [u8; 3] {
    // Violet through red along the hue circle.
    let h = (1.0 - t) * 270.0 / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        _ => (x, 0.0, 1.0),
    };
    [channel(r), channel(g), channel(b)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_is_identity() {
        let t = color_table(0);
        assert_eq!(t[0], [0, 0, 0]);
        assert_eq!(t[200], [200, 200, 200]);
        assert_eq!(color_table(99), t);
    }

    #[test]
    fn heat_runs_black_to_white() {
        let t = color_table(2);
        assert_eq!(t[0], [0, 0, 0]);
        assert_eq!(t[255], [255, 255, 255]);
    }
}
