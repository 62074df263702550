use fixed::types::I32F32;

/// Length in PDF points, stored at milli-point precision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        Pt::from_f64(value as f64)
    }

    pub fn from_f64(value: f64) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f64(self) -> f64 {
        self.to_milli_i64() as f64 / 1000.0
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let milli = milli as i128;
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }

    /// Scales by `num / 1000`, used for font units.
    pub fn mul_per_mille(self, num: i64) -> Pt {
        let milli = self.to_milli_i64() as i128;
        let scaled = milli.saturating_mul(num as i128);
        let adj = if scaled >= 0 { 500 } else { -500 };
        Pt::from_milli_i64(((scaled + adj) / 1000) as i64)
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_add(rhs.to_milli_i64()))
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_sub(rhs.to_milli_i64()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: Pt::from_f64(width),
            height: Pt::from_f64(height),
        }
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self::new(612.0, 792.0)
    }

    /// Page size of a raster source printed at `dpi`.
    pub fn from_pixels(width_px: u32, height_px: u32, dpi: u32) -> Self {
        let dpi = dpi.max(1) as f64;
        Self::new(
            width_px as f64 / dpi * 72.0,
            height_px as f64 / dpi * 72.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: Pt::from_f64(x),
            y: Pt::from_f64(y),
            width: Pt::from_f64(width),
            height: Pt::from_f64(height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const RED: Color = Color {
        r: 1.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_page_matches_print_size() {
        let size = Size::from_pixels(2480, 3508, 300);
        assert_eq!(size.width.to_milli_i64(), 595_200);
        assert_eq!(size.height.to_milli_i64(), 841_920);
    }

    #[test]
    fn per_mille_scaling_rounds_half_away() {
        let size = Pt::from_f32(6.0);
        assert_eq!(size.mul_per_mille(500).to_milli_i64(), 3_000);
        assert_eq!(Pt::from_f32(0.003).mul_per_mille(500).to_milli_i64(), 2);
    }
}
