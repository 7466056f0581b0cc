use image::Rgba;

/// How the transparency of 15-bit colors is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlphaMode {
    /// The all-zero word is the transparent key; every other word, including
    /// black with the semi-transparency bit set, is opaque.
    #[default]
    Keyed,
    /// Every color is opaque. Early builds did not use the key color.
    Opaque,
}

/// Expand a 5-bit channel to 8 bits.
fn expand5(v: u16) -> u8 {
    ((u32::from(v) * 527 + 23) >> 6) as u8
}

/// Decode a PS1 15-bit color word (`TBBBBBGG GGGRRRRR`, little-endian).
pub fn decode_high_color(word: u16, alpha: AlphaMode) -> Rgba<u8> {
    let r = expand5(word & 0x1F);
    let g = expand5((word >> 5) & 0x1F);
    let b = expand5((word >> 10) & 0x1F);
    let a = match alpha {
        AlphaMode::Keyed if word == 0 => 0,
        _ => 255,
    };
    Rgba([r, g, b, a])
}

/// Read a palette of `len` colors starting at byte `offset` of `data`.
///
/// Entries past the end of `data` decode as the transparent key.
pub fn read_palette(data: &[u8], offset: usize, len: usize, alpha: AlphaMode) -> Vec<Rgba<u8>> {
    (0..len)
        .map(|i| {
            let at = offset + i * 2;
            let word = match data.get(at..at + 2) {
                Some(b) => u16::from_le_bytes([b[0], b[1]]),
                None => 0,
            };
            decode_high_color(word, alpha)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_expansion() {
        assert_eq!(expand5(0), 0);
        assert_eq!(expand5(31), 255);
        assert_eq!(expand5(16), 132);
    }

    #[test]
    fn color_layout() {
        // Pure red, green, blue.
        assert_eq!(decode_high_color(0x001F, AlphaMode::Keyed), Rgba([255, 0, 0, 255]));
        assert_eq!(decode_high_color(0x03E0, AlphaMode::Keyed), Rgba([0, 255, 0, 255]));
        assert_eq!(decode_high_color(0x7C00, AlphaMode::Keyed), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn transparency_key() {
        assert_eq!(decode_high_color(0, AlphaMode::Keyed)[3], 0);
        assert_eq!(decode_high_color(0x8000, AlphaMode::Keyed), Rgba([0, 0, 0, 255]));
        assert_eq!(decode_high_color(0, AlphaMode::Opaque)[3], 255);
    }

    #[test]
    fn palette_reads_from_offset() {
        let mut data = vec![0u8; 8];
        data[4..6].copy_from_slice(&0x001Fu16.to_le_bytes());
        let palette = read_palette(&data, 4, 3, AlphaMode::Keyed);
        assert_eq!(palette.len(), 3);
        assert_eq!(palette[0], Rgba([255, 0, 0, 255]));
        assert_eq!(palette[1][3], 0);
        assert_eq!(palette[2][3], 0);
    }
}
