use bitflags::bitflags;

bitflags! {
    /// Display attributes of a character cell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        const BOLD = 1;
        const UNDERLINE = 2;
        const REVERSE = 4;
        const BLINK = 8;
    }
}

/// One character cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub attr: Attr,
}

impl Cell {
    pub const BLANK: Cell = Cell {
        ch: ' ',
        attr: Attr::empty(),
    };

    pub fn new(ch: char, attr: Attr) -> Self {
        Self { ch, attr }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

/// Convert text into cells of a single attribute
pub fn styled(text: &str, attr: Attr) -> Vec<Cell> {
    text.chars().map(|ch| Cell::new(ch, attr)).collect()
}

/// A full page of character cells representing what should be
/// visible on the terminal, plus the cursor position.  Views draw
/// into it through a [`Region`], which clips to its bounds.
/// Coordinates are `i32`, row-first, with (0,0) as top-left, so that
/// display items can be partially off the edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sy: i32,
    sx: i32,
    cells: Vec<Cell>,
    cursor: Option<(i32, i32)>,
}

impl Frame {
    /// Create a blank frame of `sy` rows by `sx` columns with the
    /// cursor hidden
    pub fn new(sy: i32, sx: i32) -> Self {
        let sy = sy.max(0);
        let sx = sx.max(0);
        Self {
            sy,
            sx,
            cells: vec![Cell::BLANK; (sy * sx) as usize],
            cursor: None,
        }
    }

    /// Size: (rows, columns)
    pub fn size(&self) -> (i32, i32) {
        (self.sy, self.sx)
    }

    pub fn get(&self, y: i32, x: i32) -> Option<Cell> {
        if y < 0 || x < 0 || y >= self.sy || x >= self.sx {
            return None;
        }
        Some(self.cells[(y * self.sx + x) as usize])
    }

    /// Row `y` as a slice of cells
    pub fn row(&self, y: i32) -> &[Cell] {
        let start = (y * self.sx) as usize;
        &self.cells[start..start + self.sx as usize]
    }

    /// Set one cell, ignoring coordinates off the page
    pub fn set(&mut self, y: i32, x: i32, cell: Cell) {
        if y >= 0 && x >= 0 && y < self.sy && x < self.sx {
            self.cells[(y * self.sx + x) as usize] = cell;
        }
    }

    /// Blank the whole frame and hide the cursor
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = Cell::BLANK);
        self.cursor = None;
    }

    /// Cursor position, or `None` if hidden
    pub fn cursor(&self) -> Option<(i32, i32)> {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Option<(i32, i32)>) {
        self.cursor = cursor.filter(|&(y, x)| y >= 0 && x >= 0 && y < self.sy && x < self.sx);
    }

    /// Region covering the whole frame
    pub fn full(&mut self) -> Region<'_> {
        let (sy, sx) = (self.sy, self.sx);
        self.region(0, 0, sy, sx)
    }

    /// Generate a region that may be any size, inside or outside the
    /// actual frame.  When drawn to, only the part of the region that
    /// overlaps the frame will be affected.
    pub fn region(&mut self, y: i32, x: i32, sy: i32, sx: i32) -> Region<'_> {
        let (page_sy, page_sx) = (self.sy, self.sx);
        Region {
            frame: self,
            oy: y,
            ox: x,
            sy,
            sx,
            cy0: y.max(0),
            cx0: x.max(0),
            cy1: (y + sy).min(page_sy),
            cx1: (x + sx).min(page_sx),
        }
    }
}

/// Temporary view of a frame that allows writing to a rectangle of
/// it, with clipping
pub struct Region<'a> {
    frame: &'a mut Frame,
    // Offset to add to region coords to get to frame coords
    oy: i32,
    ox: i32,
    // Size of region
    sy: i32,
    sx: i32,
    // Clip rectangle in frame coords, from (cy0,cx0) to (cy1,cx1)
    cy0: i32,
    cx0: i32,
    cy1: i32,
    cx1: i32,
}

impl Region<'_> {
    /// Size: (rows, columns)
    pub fn size(&self) -> (i32, i32) {
        (self.sy, self.sx)
    }

    /// Generate a sub-region.  Drawing is clipped to this region and
    /// all its parents.
    pub fn region(&mut self, y: i32, x: i32, sy: i32, sx: i32) -> Region<'_> {
        let oy = self.oy + y;
        let ox = self.ox + x;
        Region {
            frame: self.frame,
            oy,
            ox,
            sy,
            sx,
            cy0: self.cy0.max(oy),
            cx0: self.cx0.max(ox),
            cy1: self.cy1.min(oy + sy),
            cx1: self.cx1.min(ox + sx),
        }
    }

    /// Fill the whole region with spaces of the given attribute
    pub fn clear(&mut self, attr: Attr) {
        for y in self.cy0..self.cy1 {
            for x in self.cx0..self.cx1 {
                self.frame.set(y, x, Cell::new(' ', attr));
            }
        }
    }

    /// Write text rightwards from the given location, clipped.
    /// Returns the X-position after the text, whether or not it was
    /// visible.
    pub fn write(&mut self, y: i32, x: i32, attr: Attr, text: &str) -> i32 {
        let mut x = x;
        for ch in text.chars() {
            self.put(y, x, Cell::new(ch, attr));
            x += 1;
        }
        x
    }

    /// Write pre-styled cells rightwards from the given location
    pub fn cells(&mut self, y: i32, x: i32, cells: &[Cell]) -> i32 {
        let mut x = x;
        for cell in cells {
            self.put(y, x, *cell);
            x += 1;
        }
        x
    }

    /// Move the frame cursor to a location within this region
    pub fn cursor(&mut self, y: i32, x: i32) {
        self.frame.set_cursor(Some((y + self.oy, x + self.ox)));
    }

    fn put(&mut self, y: i32, x: i32, cell: Cell) {
        let y = y + self.oy;
        let x = x + self.ox;
        if y >= self.cy0 && y < self.cy1 && x >= self.cx0 && x < self.cx1 {
            self.frame.set(y, x, cell);
        }
    }
}
