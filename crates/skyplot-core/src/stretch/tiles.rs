/// One tile of the display-oriented image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileDef {
    pub index: usize,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Cut a `width` x `height` image into `tile_size` squares, columns of
/// tiles first. Tiles on the right and bottom edges are truncated.
pub fn tile_grid(width: usize, height: usize, tile_size: usize) -> Vec<TileDef> {
    let ts = tile_size.max(1);
    let x_tiles = width.div_ceil(ts);
    let y_tiles = height.div_ceil(ts);
    let mut tiles = Vec::with_capacity(x_tiles * y_tiles);
    for i in 0..x_tiles {
        let tile_w = if i < x_tiles - 1 { ts } else { (width - 1) % ts + 1 };
        for j in 0..y_tiles {
            let tile_h = if j < y_tiles - 1 { ts } else { (height - 1) % ts + 1 };
            tiles.push(TileDef {
                index: tiles.len(),
                x: i * ts,
                y: j * ts,
                width: tile_w,
                height: tile_h,
            });
        }
    }
    tiles
}

/// Copy a finished tile into the full buffer at its own offset.
pub fn place_tile(full: &mut [u8], image_width: usize, channels: usize, tile: &TileDef, bytes: &[u8]) {
    let row_len = tile.width * channels;
    for r in 0..tile.height {
        let dst = ((tile.y + r) * image_width + tile.x) * channels;
        full[dst..dst + row_len].copy_from_slice(&bytes[r * row_len..(r + 1) * row_len]);
    }
}

/// Average `factor` x `factor` blocks of a reassembled buffer. Partial
/// blocks on the edges average what they cover.
pub fn decimate(full: &[u8], width: usize, height: usize, channels: usize, factor: usize) -> (Vec<u8>, usize, usize) {
    let out_w = width.div_ceil(factor);
    let out_h = height.div_ceil(factor);
    let mut out = vec![0u8; out_w * out_h * channels];
    for oy in 0..out_h {
        for ox in 0..out_w {
            let y_end = ((oy + 1) * factor).min(height);
            let x_end = ((ox + 1) * factor).min(width);
            for ch in 0..channels {
                let mut sum = 0u32;
                let mut n = 0u32;
                for y in oy * factor..y_end {
                    for x in ox * factor..x_end {
                        sum += full[(y * width + x) * channels + ch] as u32;
                        n += 1;
                    }
                }
                out[(oy * out_w + ox) * channels + ch] = ((sum + n / 2) / n) as u8;
            }
        }
    }
    (out, out_w, out_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_tiles_are_truncated() {
        let tiles = tile_grid(100, 100, 64);
        assert_eq!(tiles.len(), 4);
        let sizes: Vec<_> = tiles.iter().map(|t| (t.x, t.y, t.width, t.height)).collect();
        assert_eq!(
            sizes,
            vec![(0, 0, 64, 64), (0, 64, 64, 36), (64, 0, 36, 64), (64, 64, 36, 36)]
        );
    }

    #[test]
    fn exact_multiple_has_no_partial_tiles() {
        let tiles = tile_grid(128, 64, 64);
        assert_eq!(tiles.len(), 2);
        assert!(tiles.iter().all(|t| t.width == 64 && t.height == 64));
    }

    #[test]
    fn decimate_averages_blocks() {
        let full = [0, 100, 200, 50, 10, 30];
        let (half, w, h) = decimate(&full, 3, 2, 1, 2);
        assert_eq!((w, h), (2, 1));
        assert_eq!(half, vec![40u8, 115]);
    }
}
