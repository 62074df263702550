use crate::error::{ReportError, Result};
use crate::types::{Color, Rect, Size};

/// Extra width granted to grid-cell values beyond the cell width; values
/// run past the padding box the way the print template expects.
pub const GRID_VALUE_WIDTH_EXTRA: f64 = 26.3;

/// Rotation applied to report content inside a grid cell, clockwise degrees.
pub const GRID_CONTENT_ROTATION: f64 = 270.0;

/// Rounds to three decimals, matching the precision grid lines are placed at.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Page and cell geometry for a `cols` x `rows` sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page_width: f64,
    pub page_height: f64,
    pub cols: u32,
    pub rows: u32,
    pub border_width: f64,
    pub border_color: Color,
    pub cell_width: f64,
    pub cell_height: f64,
    /// x offsets of the `cols + 1` vertical hairlines.
    pub vertical_lines: Vec<f64>,
    /// y offsets (from the top) of the `rows + 1` horizontal hairlines.
    pub horizontal_lines: Vec<f64>,
}

impl PageLayout {
    pub fn new(page: Size, cols: u32, rows: u32, border_width: f64, border_color: Color) -> Result<Self> {
        Self::from_points(
            page.width.to_f64(),
            page.height.to_f64(),
            cols,
            rows,
            border_width,
            border_color,
        )
    }

    pub fn from_pixels(
        width_px: u32,
        height_px: u32,
        dpi: u32,
        cols: u32,
        rows: u32,
        border_width: f64,
    ) -> Result<Self> {
        if dpi == 0 {
            return Err(ReportError::InvalidConfiguration("dpi must be > 0".to_string()));
        }
        let width = width_px as f64 / dpi as f64 * 72.0;
        let height = height_px as f64 / dpi as f64 * 72.0;
        Self::from_points(width, height, cols, rows, border_width, Color::BLACK)
    }

    pub fn from_points(
        page_width: f64,
        page_height: f64,
        cols: u32,
        rows: u32,
        border_width: f64,
        border_color: Color,
    ) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(ReportError::InvalidConfiguration(format!(
                "grid must have at least one column and row (got {cols}x{rows})"
            )));
        }
        if !page_width.is_finite() || !page_height.is_finite() || page_width <= 0.0 || page_height <= 0.0 {
            return Err(ReportError::InvalidConfiguration(format!(
                "page size must be positive (got {page_width}x{page_height})"
            )));
        }
        if !border_width.is_finite() || border_width < 0.0 {
            return Err(ReportError::InvalidConfiguration(format!(
                "border width must be >= 0 (got {border_width})"
            )));
        }

        let total_border_x = (cols + 1) as f64 * border_width;
        let total_border_y = (rows + 1) as f64 * border_width;
        let cell_width = (page_width - total_border_x) / cols as f64;
        let cell_height = (page_height - total_border_y) / rows as f64;
        if cell_width <= 0.0 || cell_height <= 0.0 {
            return Err(ReportError::InvalidConfiguration(format!(
                "borders leave no room for {cols}x{rows} cells"
            )));
        }

        let vertical_lines = (0..=cols)
            .map(|i| round3(i as f64 * (cell_width + border_width)))
            .collect();
        let horizontal_lines = (0..=rows)
            .map(|i| round3(i as f64 * (cell_height + border_width)))
            .collect();

        Ok(Self {
            page_width,
            page_height,
            cols,
            rows,
            border_width,
            border_color,
            cell_width,
            cell_height,
            vertical_lines,
            horizontal_lines,
        })
    }

    pub fn page_size(&self) -> Size {
        Size::new(self.page_width, self.page_height)
    }

    /// Records per page.
    pub fn capacity(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Footprint of the `index`-th cell in row-major order. Cells flow
    /// edge to edge from the page origin; hairlines are drawn over them.
    pub fn cell_rect(&self, index: usize) -> Rect {
        let col = index % self.cols as usize;
        let row = index / self.cols as usize;
        Rect::new(
            col as f64 * self.cell_width,
            row as f64 * self.cell_height,
            self.cell_width,
            self.cell_height,
        )
    }

    /// Unrotated size of the report content placed in a cell: the cell with
    /// its sides swapped, so the rotated content covers the cell exactly.
    pub fn content_size(&self) -> (f64, f64) {
        (self.cell_height, self.cell_width)
    }

    pub fn value_width(&self) -> f64 {
        self.cell_width + GRID_VALUE_WIDTH_EXTRA
    }

    /// Full-page hairlines, vertical first.
    pub fn line_rects(&self) -> Vec<Rect> {
        let mut out = Vec::with_capacity(self.vertical_lines.len() + self.horizontal_lines.len());
        for x in &self.vertical_lines {
            out.push(Rect::new(*x, 0.0, self.border_width, self.page_height));
        }
        for y in &self.horizontal_lines {
            out.push(Rect::new(0.0, *y, self.page_width, self.border_width));
        }
        out
    }
}

/// PDF matrix placing a `content_width` x `content_height` box, rotated
/// clockwise by `degrees` about its centre, at the centre of `cell`.
///
/// The matrix maps the content's bottom-left PDF space into page PDF space
/// for a page of height `page_height`.
pub fn rotated_content_matrix(
    cell: Rect,
    content_width: f64,
    content_height: f64,
    degrees: f64,
    page_height: f64,
) -> [f32; 6] {
    let theta = degrees.to_radians();
    let cos = snap(libm::cos(theta));
    let sin = snap(libm::sin(theta));
    let center_x = cell.x.to_f64() + cell.width.to_f64() / 2.0;
    let center_y = cell.y.to_f64() + cell.height.to_f64() / 2.0;
    let half_w = content_width / 2.0;
    let half_h = content_height / 2.0;

    let e = center_x - half_w * cos - half_h * sin;
    let f = page_height - center_y + half_w * sin - half_h * cos;
    [
        cos as f32,
        -sin as f32,
        sin as f32,
        cos as f32,
        round3(e) as f32,
        round3(f) as f32,
    ]
}

// Drops the 1e-16 residue trigonometry leaves on right angles.
fn snap(value: f64) -> f64 {
    let rounded = (value * 1e9).round() / 1e9;
    if rounded == 0.0 { 0.0 } else { rounded }
}
