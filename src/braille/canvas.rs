use crate::plot::catalog::Rgb;

const BLANK: char = '\u{2800}';

/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell represents a 2x4 pixel grid (8 dots) and carries one
/// foreground color: the color of the last dot written into it.
/// Unicode Braille patterns: U+2800 to U+28FF
#[derive(Debug, Clone)]
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    pixels: Vec<Vec<u8>>, // Bit patterns per char
    colors: Vec<Vec<Option<Rgb>>>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![vec![0u8; width]; height],
            colors: vec![vec![None; width]; height],
        }
    }

    /// Width in characters
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in characters
    pub fn height(&self) -> usize {
        self.height
    }

    /// Width in dots
    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    /// Height in dots
    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    /// Wipe every dot and color, keeping dimensions
    pub fn clear(&mut self) {
        for row in &mut self.pixels {
            row.fill(0);
        }
        for row in &mut self.colors {
            row.fill(None);
        }
    }

    /// Set a pixel at the given coordinates.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        let cx = x / 2;
        let cy = y / 4;

        if cx >= self.width || cy >= self.height {
            return;
        }

        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };

        self.pixels[cy][cx] |= bit;
        self.colors[cy][cx] = Some(color);
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    #[inline(always)]
    pub fn set_pixel_signed(&mut self, x: i32, y: i32, color: Rgb) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    /// True if the dot at (x, y) is set
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.width || cy >= self.height {
            return false;
        }
        let bit = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]][x % 2][y % 4];
        self.pixels[cy][cx] & bit != 0
    }

    /// Glyph and color of one character cell; `None` color means empty
    pub fn cell(&self, cx: usize, cy: usize) -> (char, Option<Rgb>) {
        match self.pixels.get(cy).and_then(|row| row.get(cx)) {
            Some(&bits) => (
                char::from_u32(0x2800 + bits as u32).unwrap_or(' '),
                self.colors[cy][cx],
            ),
            None => (BLANK, None),
        }
    }

    /// Count of dots set anywhere on the canvas
    pub fn lit_dots(&self) -> usize {
        self.pixels
            .iter()
            .flatten()
            .map(|b| b.count_ones() as usize)
            .sum()
    }

    /// Get a specific row as a string
    #[cfg(test)]
    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.height {
            return String::new();
        }
        self.pixels[row]
            .iter()
            .map(|&b| char::from_u32(0x2800 + b as u32).unwrap_or(' '))
            .collect()
    }

    /// Convert the canvas to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        (0..self.height)
            .map(|i| self.row_to_string(i))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    #[test]
    fn test_single_pixel() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0, RED);
        assert_eq!(canvas.to_string(), "⠁"); // U+2801
        assert_eq!(canvas.cell(0, 0), ('⠁', Some(RED)));
    }

    #[test]
    fn test_all_dots() {
        let mut canvas = BrailleCanvas::new(1, 1);
        // Set all 8 dots
        for x in 0..2 {
            for y in 0..4 {
                canvas.set_pixel(x, y, RED);
            }
        }
        assert_eq!(canvas.to_string(), "⣿"); // U+28FF (all dots)
        assert_eq!(canvas.lit_dots(), 8);
    }

    #[test]
    fn test_diagonal() {
        let mut canvas = BrailleCanvas::new(2, 1);
        canvas.set_pixel(0, 0, RED);
        canvas.set_pixel(1, 1, RED);
        canvas.set_pixel(2, 2, RED);
        canvas.set_pixel(3, 3, RED);
        // First char: (0,0) and (1,1) = 0x01 | 0x10 = 0x11
        // Second char: (0,2) and (1,3) = 0x04 | 0x80 = 0x84
        assert_eq!(canvas.to_string(), "⠑⢄");
    }

    #[test]
    fn test_last_writer_colors_cell() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0, RED);
        canvas.set_pixel(1, 3, BLUE);
        assert_eq!(canvas.cell(0, 0).1, Some(BLUE));
        assert!(canvas.is_set(1, 3));
        assert!(!canvas.is_set(1, 2));
    }

    #[test]
    fn test_clear_and_out_of_bounds() {
        let mut canvas = BrailleCanvas::new(2, 2);
        canvas.set_pixel_signed(-1, 0, RED);
        canvas.set_pixel(100, 100, RED);
        assert_eq!(canvas.lit_dots(), 0);
        canvas.set_pixel(3, 7, RED);
        canvas.clear();
        assert_eq!(canvas.lit_dots(), 0);
        assert_eq!(canvas.cell(1, 1), (BLANK, None));
        assert_eq!(canvas.cell(9, 9), (BLANK, None));
    }
}
