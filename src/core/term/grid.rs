//! Screen buffer and cursor
//!
//! A fixed-size character matrix plus the clamped cursor that walks over it.
//! Nothing here knows about escape sequences; the emulator drives both.

use std::fmt;

use thiserror::Error;

/// Grid geometry, fixed for the lifetime of an emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub rows: usize,
    pub cols: usize,
}

impl GridSize {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

impl Default for GridSize {
    /// The control panel's screen: 24 rows of 120 columns
    fn default() -> Self {
        Self::new(24, 120)
    }
}

/// Zero-based (row, col) cell address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A direct grid write that would break the grid invariants.
///
/// The cursor is clamped before every write, so hitting one of these means
/// a logic defect in the caller, not bad input from the instrument.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundsViolation {
    #[error("row overflow: row {row} outside {rows} rows")]
    RowOverflow { row: usize, rows: usize },

    #[error("column overflow: column {col} outside {cols} columns")]
    ColOverflow { col: usize, cols: usize },

    #[error("refusing to store non-printable character {0:?}")]
    NotPrintable(char),
}

/// Fixed rows x cols character matrix
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    size: GridSize,
    cells: Vec<Vec<char>>,
}

impl Grid {
    /// A blank grid of the given size
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![vec![' '; size.cols]; size.rows],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Write one character. Out-of-range positions and control characters
    /// are rejected and leave the grid untouched.
    pub fn put(&mut self, ch: char, pos: Position) -> Result<(), BoundsViolation> {
        if pos.row >= self.size.rows {
            return Err(BoundsViolation::RowOverflow {
                row: pos.row,
                rows: self.size.rows,
            });
        }
        if pos.col >= self.size.cols {
            return Err(BoundsViolation::ColOverflow {
                col: pos.col,
                cols: self.size.cols,
            });
        }
        if ch.is_control() {
            return Err(BoundsViolation::NotPrintable(ch));
        }
        self.cells[pos.row][pos.col] = ch;
        Ok(())
    }

    pub fn get(&self, pos: Position) -> Option<char> {
        self.cells.get(pos.row)?.get(pos.col).copied()
    }

    /// Set every cell to `ch`. Control characters are replaced by a space.
    pub fn fill(&mut self, ch: char) {
        let ch = if ch.is_control() { ' ' } else { ch };
        for row in &mut self.cells {
            row.fill(ch);
        }
    }

    pub fn erase(&mut self) {
        self.fill(' ');
    }

    /// Blank `pos.row` from `pos.col` to the end of the row.
    /// A column at or past the right edge blanks nothing.
    pub fn erase_line_from(&mut self, pos: Position) {
        if let Some(row) = self.cells.get_mut(pos.row) {
            let start = pos.col.min(row.len());
            row[start..].fill(' ');
        }
    }

    pub fn row_text(&self, row: usize) -> Option<String> {
        self.cells.get(row).map(|cells| cells.iter().collect())
    }

    /// Rows joined by newline, in row/column order
    pub fn as_text(&self) -> String {
        self.cells
            .iter()
            .map(|cells| cells.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.size.rows)
            .field("cols", &self.size.cols)
            .finish()
    }
}

/// Cursor position, always inside the grid.
///
/// `pending_overflow` records that the last Print landed on the final
/// column, so the logical column is one past the right edge even though the
/// stored column never leaves the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    row: usize,
    col: usize,
    pending_overflow: bool,
    size: GridSize,
}

impl Cursor {
    pub fn new(size: GridSize) -> Self {
        Self {
            row: 0,
            col: 0,
            pending_overflow: false,
            size,
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }

    pub fn pending_overflow(&self) -> bool {
        self.pending_overflow
    }

    fn last_row(&self) -> usize {
        self.size.rows.saturating_sub(1)
    }

    fn last_col(&self) -> usize {
        self.size.cols.saturating_sub(1)
    }

    pub fn reset(&mut self) {
        self.row = 0;
        self.col = 0;
        self.pending_overflow = false;
    }

    /// Move to an absolute position, clamping both axes.
    /// Signed so that 1-based arithmetic can go below zero before clamping.
    pub fn set(&mut self, row: i64, col: i64) {
        self.set_row(row);
        self.set_col(col);
    }

    pub fn set_row(&mut self, row: i64) {
        self.row = clamp_axis(row, self.last_row());
    }

    pub fn set_col(&mut self, col: i64) {
        self.col = clamp_axis(col, self.last_col());
        self.pending_overflow = false;
    }

    pub fn up(&mut self, n: usize) {
        self.row = self.row.saturating_sub(n);
    }

    pub fn down(&mut self, n: usize) {
        self.row = self.row.saturating_add(n).min(self.last_row());
    }

    pub fn back(&mut self, n: usize) {
        if self.pending_overflow && n > 0 {
            // logical column is one past the edge
            self.col = self.size.cols.saturating_sub(n);
            self.pending_overflow = false;
        } else {
            self.col = self.col.saturating_sub(n);
        }
    }

    pub fn forward(&mut self, n: usize) {
        self.col = self.col.saturating_add(n).min(self.last_col());
        self.pending_overflow = false;
    }

    /// Step past a freshly written cell. On the last column the cursor stays
    /// put and flags the overflow instead.
    pub fn advance(&mut self) {
        if self.col < self.last_col() {
            self.col += 1;
        } else {
            self.pending_overflow = true;
        }
    }
}

fn clamp_axis(value: i64, last: usize) -> usize {
    if value <= 0 {
        0
    } else {
        usize::try_from(value).map_or(last, |v| v.min(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> GridSize {
        GridSize::new(4, 6)
    }

    #[test]
    fn test_put_then_get() {
        let mut grid = Grid::new(small());
        for row in 0..4 {
            for col in 0..6 {
                let pos = Position::new(row, col);
                grid.put('x', pos).unwrap();
                assert_eq!(grid.get(pos), Some('x'));
            }
        }
    }

    #[test]
    fn test_put_out_of_range_is_rejected() {
        let mut grid = Grid::new(small());
        grid.put('a', Position::new(0, 0)).unwrap();
        let before = grid.clone();

        assert_eq!(
            grid.put('z', Position::new(4, 0)),
            Err(BoundsViolation::RowOverflow { row: 4, rows: 4 })
        );
        assert_eq!(
            grid.put('z', Position::new(0, 6)),
            Err(BoundsViolation::ColOverflow { col: 6, cols: 6 })
        );
        assert_eq!(
            grid.put('\x07', Position::new(1, 1)),
            Err(BoundsViolation::NotPrintable('\x07'))
        );
        assert_eq!(grid, before);
    }

    #[test]
    fn test_erase_renders_blank_rows() {
        let mut grid = Grid::new(GridSize::default());
        grid.fill('#');
        grid.erase();

        let text = grid.as_text();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 24);
        for line in lines {
            assert_eq!(line, " ".repeat(120));
        }
    }

    #[test]
    fn test_erase_line_from() {
        let mut grid = Grid::new(small());
        grid.fill('x');
        grid.erase_line_from(Position::new(2, 3));

        assert_eq!(grid.row_text(2).unwrap(), "xxx   ");
        assert_eq!(grid.row_text(1).unwrap(), "xxxxxx");
        assert_eq!(grid.row_text(3).unwrap(), "xxxxxx");

        grid.erase_line_from(Position::new(0, 6));
        assert_eq!(grid.row_text(0).unwrap(), "xxxxxx");
    }

    #[test]
    fn test_fill_never_stores_controls() {
        let mut grid = Grid::new(small());
        grid.fill('\0');
        assert_eq!(grid.get(Position::new(3, 5)), Some(' '));
    }

    #[test]
    fn test_cursor_clamps_large_moves() {
        let mut cursor = Cursor::new(small());
        cursor.down(usize::MAX);
        cursor.forward(usize::MAX);
        assert_eq!(cursor.position(), Position::new(3, 5));

        cursor.up(usize::MAX);
        cursor.back(usize::MAX);
        assert_eq!(cursor.position(), Position::new(0, 0));

        cursor.set(i64::MAX, i64::MIN);
        assert_eq!(cursor.position(), Position::new(3, 0));
        cursor.set(-5, 1_000_000);
        assert_eq!(cursor.position(), Position::new(0, 5));
    }

    #[test]
    fn test_advance_flags_overflow_on_last_column() {
        let mut cursor = Cursor::new(small());
        cursor.set_col(5);
        cursor.advance();
        assert_eq!(cursor.col(), 5);
        assert!(cursor.pending_overflow());

        cursor.down(1);
        assert!(cursor.pending_overflow());

        cursor.back(2);
        assert_eq!(cursor.col(), 4);
        assert!(!cursor.pending_overflow());
    }
}
