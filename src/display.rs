use bitvec::{BitArr, array::BitArray};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const SPRITE_WIDTH: usize = 8;

/// Built-in hexadecimal glyphs, 5 rows each, digits 0 through F.
pub const FONT_SET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawOutcome {
    /// A lit pixel was switched off.
    pub collision: bool,
    /// At least one pixel flipped.
    pub changed: bool,
}

/// 64x32 monochrome frame, row-major, `true` meaning lit.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT),
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: BitArray::ZERO,
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// Panics if `(x, y)` lies outside the frame.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        assert!(x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT);
        self.pixels[y * DISPLAY_WIDTH + x]
    }

    pub fn row(&self, y: usize) -> impl Iterator<Item = bool> + '_ {
        let start = y * DISPLAY_WIDTH;
        self.pixels[start..start + DISPLAY_WIDTH].iter().by_vals()
    }

    pub fn lit_count(&self) -> usize {
        self.pixels[..DISPLAY_WIDTH * DISPLAY_HEIGHT].count_ones()
    }

    /// XORs an 8-pixel-wide sprite onto the frame with its top-left corner at
    /// `(x, y)`. Both coordinates and every target pixel wrap around the edges.
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8]) -> DrawOutcome {
        let mut outcome = DrawOutcome::default();

        for (row, &byte) in sprite.iter().enumerate() {
            let pixel_y = (y + row) % DISPLAY_HEIGHT;
            for bit in 0..SPRITE_WIDTH {
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let pixel_x = (x + bit) % DISPLAY_WIDTH;
                let index = pixel_y * DISPLAY_WIDTH + pixel_x;
                let current_pixel = self.pixels[index];

                if current_pixel {
                    outcome.collision = true;
                }
                self.pixels.set(index, !current_pixel);
                outcome.changed = true;
            }
        }
        outcome
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for y in 0..DISPLAY_HEIGHT {
            let line: String = self.row(y).map(|lit| if lit { '#' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
