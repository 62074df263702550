use crate::font::{FontFamily, FontWeight};
use crate::types::{Color, Rect};

/// Which of the three calibrated looks a report is drawn with.
///
/// Grid cells ignore the electronic-copy flag; only the single full-page
/// layout has a distinct electronic-copy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutVariant {
    Grid,
    Single,
    SingleElectronicCopy,
}

impl LayoutVariant {
    pub fn select(single: bool, electronic_copy: bool) -> Self {
        match (single, electronic_copy) {
            (false, _) => LayoutVariant::Grid,
            (true, false) => LayoutVariant::Single,
            (true, true) => LayoutVariant::SingleElectronicCopy,
        }
    }

    pub fn is_single(&self) -> bool {
        !matches!(self, LayoutVariant::Grid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutVariant::Grid => "grid",
            LayoutVariant::Single => "single",
            LayoutVariant::SingleElectronicCopy => "single-ecopy",
        }
    }

    pub fn style(&self) -> &'static VariantStyle {
        match self {
            LayoutVariant::Grid => &GRID,
            LayoutVariant::Single => &SINGLE,
            LayoutVariant::SingleElectronicCopy => &SINGLE_ECOPY,
        }
    }
}

/// An absolute length or a fraction of the containing box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Len {
    Pt(f64),
    Percent(f64),
}

impl Len {
    pub fn resolve(&self, basis: f64) -> f64 {
        match self {
            Len::Pt(value) => *value,
            Len::Percent(value) => basis * value / 100.0,
        }
    }
}

/// Absolutely positioned box inside the report content. Exactly one of
/// `top`/`bottom` and one of `left`/`right` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub top: Option<Len>,
    pub bottom: Option<Len>,
    pub left: Option<Len>,
    pub right: Option<Len>,
    pub width: Len,
    pub height: Len,
}

impl Placement {
    pub fn resolve(&self, container_width: f64, container_height: f64) -> Rect {
        let width = self.width.resolve(container_width);
        let height = self.height.resolve(container_height);
        let x = match (self.left, self.right) {
            (Some(left), _) => left.resolve(container_width),
            (None, Some(right)) => container_width - right.resolve(container_width) - width,
            (None, None) => 0.0,
        };
        let y = match (self.top, self.bottom) {
            (Some(top), _) => top.resolve(container_height),
            (None, Some(bottom)) => container_height - bottom.resolve(container_height) - height,
            (None, None) => 0.0,
        };
        Rect::new(x, y, width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSizes {
    pub title: f64,
    pub jewelry_title: f64,
    pub label: f64,
    pub value: f64,
    pub footer: f64,
    pub bottom_date: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderStyle {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    /// Offset of the three-line institute block.
    pub column_margin_top: f64,
    pub line_letter_spacing: f64,
    pub gemological_margin_top: f64,
    pub institute_margin_top: f64,
    pub india_letter_spacing: f64,
    pub title_margin_top: f64,
    pub title_margin_right: f64,
    pub title_letter_spacing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldsStyle {
    pub margin_left: f64,
    pub margin_top: f64,
    pub row_margin_bottom: f64,
    /// Visual shift of each row, in row order: report number, description,
    /// shape and cut, weight, color, clarity, comments.
    pub row_offsets: [f64; 7],
    pub label_width: f64,
    pub label_padding_right: f64,
    pub label_uppercase: bool,
    /// Label takes up room in the row instead of sitting under the value.
    pub label_inline: bool,
    pub value_width_reduction: f64,
    pub value_text_indent: f64,
    pub value_margin_top: f64,
    pub value_line_height: f64,
    pub colon_margin_left: f64,
    pub style_number_letter_spacing: f64,
    pub ecopy_second_line_margin_top: f64,
    pub style_line_margin_top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FooterStyle {
    pub margin_left: f64,
    pub letter_spacing: f64,
    pub notice_letter_spacing: f64,
    pub bold_margin_top: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BottomDateStyle {
    pub bottom: Len,
    pub right: Len,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcopyLabelStyle {
    pub top: Len,
    pub left: Len,
    pub margin_top: f64,
    pub text: &'static str,
    pub size: f64,
    pub family: FontFamily,
    pub letter_spacing: f64,
    pub color: Color,
}

/// Every print-calibrated constant one variant draws with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantStyle {
    pub padding_horizontal: f64,
    pub padding_vertical: f64,
    pub fonts: FontSizes,
    pub header: HeaderStyle,
    pub fields: FieldsStyle,
    pub labels: [&'static str; 7],
    pub footer: FooterStyle,
    pub bottom_date: Option<BottomDateStyle>,
    pub qr_watermark: Option<Placement>,
    pub photo: Placement,
    pub institution_logo: Option<Placement>,
    pub notice_background: Option<Placement>,
    pub company_logo: Option<Placement>,
    pub ecopy_label: Option<EcopyLabelStyle>,
}

impl VariantStyle {
    /// Size of the `: ` separator drawn before each value.
    pub fn colon_size(&self) -> f64 {
        (self.fonts.value - 1.0).max(6.0)
    }
}

/// Family and weight a field value is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueFont {
    pub family: FontFamily,
    pub weight: FontWeight,
}

/// Value fonts, in field row order.
pub const VALUE_FONTS: [ValueFont; 7] = [
    ValueFont { family: FontFamily::IbmPlexSans, weight: FontWeight::Normal },
    ValueFont { family: FontFamily::ItcAvantGardeCondensed, weight: FontWeight::Normal },
    ValueFont { family: FontFamily::ItcAvantGardeCondensed, weight: FontWeight::Normal },
    ValueFont { family: FontFamily::IbmPlexSans, weight: FontWeight::Bold },
    ValueFont { family: FontFamily::Arimo, weight: FontWeight::Normal },
    ValueFont { family: FontFamily::Arimo, weight: FontWeight::Normal },
    ValueFont { family: FontFamily::ItcAvantGardeCondensed, weight: FontWeight::Normal },
];

pub const LABEL_FAMILY: FontFamily = FontFamily::ItcAvantGardeCondensed;
pub const COLON_FAMILY: FontFamily = FontFamily::IbmPlexSans;
pub const HEADER_FAMILY: FontFamily = FontFamily::Arimo;
pub const TITLE_FAMILY: FontFamily = FontFamily::CanvaSans;
pub const FOOTER_FAMILY: FontFamily = FontFamily::ItcAvantGardeCondensed;

const LABEL_WIDTH: f64 = 53.4;
const LABEL_GAP: f64 = 0.0;

const LABELS: [&str; 7] = [
    "Report No",
    "Description",
    "Shape and Cut",
    "Tot. Est.Weight",
    "Color",
    "Clarity",
    "Comments",
];

const ECOPY_LABELS: [&str; 7] = [
    "summary no",
    "Description",
    "Shape and Cut",
    "Tot. Est.Weight",
    "Color",
    "Clarity",
    "Comments",
];

const fn header(
    top: f64,
    left: f64,
    right: f64,
    column_margin_top: f64,
    title_margin_top: f64,
    title_margin_right: f64,
) -> HeaderStyle {
    HeaderStyle {
        top,
        left,
        right,
        column_margin_top,
        line_letter_spacing: -0.3,
        gemological_margin_top: 1.0,
        institute_margin_top: 1.2,
        india_letter_spacing: 0.3,
        title_margin_top,
        title_margin_right,
        title_letter_spacing: 0.1,
    }
}

const fn photo(top: Len, right: f64, width: f64, height: f64) -> Placement {
    Placement {
        top: Some(top),
        bottom: None,
        left: None,
        right: Some(Len::Pt(right)),
        width: Len::Pt(width),
        height: Len::Pt(height),
    }
}

const fn top_left_square(top: Len, left: f64, size: f64) -> Placement {
    Placement {
        top: Some(top),
        bottom: None,
        left: Some(Len::Pt(left)),
        right: None,
        width: Len::Pt(size),
        height: Len::Pt(size),
    }
}

const fn top_right_square(top: Len, right: f64, size: f64) -> Placement {
    Placement {
        top: Some(top),
        bottom: None,
        left: None,
        right: Some(Len::Pt(right)),
        width: Len::Pt(size),
        height: Len::Pt(size),
    }
}

pub static GRID: VariantStyle = VariantStyle {
    padding_horizontal: 26.3,
    padding_vertical: 25.3,
    fonts: FontSizes {
        title: 6.0,
        jewelry_title: 6.3,
        label: 6.0,
        value: 6.0,
        footer: 2.9,
        bottom_date: 3.0,
    },
    header: header(7.5, 36.0, 19.3, 0.0, 2.7, 3.4),
    fields: FieldsStyle {
        margin_left: 0.0,
        margin_top: 43.5,
        row_margin_bottom: -0.6,
        row_offsets: [0.0, 0.6, 3.5, 4.5, 3.8, 3.4, 10.5],
        label_width: LABEL_WIDTH,
        label_padding_right: 4.0,
        label_uppercase: false,
        label_inline: false,
        value_width_reduction: 0.0,
        value_text_indent: LABEL_WIDTH + LABEL_GAP,
        value_margin_top: -1.3,
        value_line_height: 1.6,
        colon_margin_left: -10.0,
        style_number_letter_spacing: -0.2,
        ecopy_second_line_margin_top: 0.1,
        style_line_margin_top: -2.0,
    },
    labels: LABELS,
    footer: FooterStyle {
        margin_left: -3.4,
        letter_spacing: -0.1,
        notice_letter_spacing: 0.1,
        bold_margin_top: 1.0,
        bottom: 30.3,
        left: 26.5,
    },
    bottom_date: Some(BottomDateStyle {
        bottom: Len::Percent(16.0),
        right: Len::Percent(11.6),
    }),
    qr_watermark: Some(Placement {
        top: Some(Len::Percent(15.0)),
        bottom: None,
        left: Some(Len::Percent(41.0)),
        right: None,
        width: Len::Pt(26.3),
        height: Len::Pt(27.0),
    }),
    photo: photo(Len::Percent(44.5), 25.0, 46.0, 46.0),
    institution_logo: None,
    notice_background: Some(Placement {
        top: None,
        bottom: Some(Len::Percent(13.0)),
        left: Some(Len::Pt(11.0)),
        right: None,
        width: Len::Percent(95.0),
        height: Len::Pt(15.0),
    }),
    company_logo: None,
    ecopy_label: None,
};

pub static SINGLE: VariantStyle = VariantStyle {
    padding_horizontal: 6.0,
    padding_vertical: 0.0,
    fonts: FontSizes {
        title: 6.0,
        jewelry_title: 6.3,
        label: 5.5,
        value: 5.0,
        footer: 2.9,
        bottom_date: 3.0,
    },
    header: header(0.0, 38.0, 11.0, 5.0, 0.0, 0.0),
    fields: FieldsStyle {
        margin_left: 2.1,
        margin_top: 42.0,
        row_margin_bottom: -0.6,
        row_offsets: [0.0, 0.7, 5.5, 7.0, 7.0, 7.5, 8.5],
        label_width: LABEL_WIDTH,
        label_padding_right: 4.0,
        label_uppercase: false,
        label_inline: false,
        value_width_reduction: 0.0,
        value_text_indent: LABEL_WIDTH + LABEL_GAP,
        value_margin_top: -1.5,
        value_line_height: 1.8,
        colon_margin_left: -10.0,
        style_number_letter_spacing: -0.2,
        ecopy_second_line_margin_top: 0.1,
        style_line_margin_top: -2.0,
    },
    labels: LABELS,
    footer: FooterStyle {
        margin_left: -3.4,
        letter_spacing: -0.1,
        notice_letter_spacing: 0.1,
        bold_margin_top: 1.0,
        bottom: 3.0,
        left: 11.0,
    },
    bottom_date: None,
    qr_watermark: None,
    photo: photo(Len::Percent(40.0), 6.0, 44.0, 44.0),
    institution_logo: Some(top_left_square(Len::Percent(1.0), 11.0, 31.0)),
    notice_background: None,
    company_logo: Some(top_right_square(Len::Percent(8.0), 18.0, 31.0)),
    ecopy_label: Some(EcopyLabelStyle {
        top: Len::Pt(0.0),
        left: Len::Percent(40.3),
        margin_top: -1.0,
        text: "E-COPY",
        size: 6.0,
        family: FontFamily::CanvaSans,
        letter_spacing: 0.0,
        color: Color::RED,
    }),
};

pub static SINGLE_ECOPY: VariantStyle = VariantStyle {
    padding_horizontal: 4.0,
    padding_vertical: 0.0,
    fonts: FontSizes {
        title: 6.0,
        jewelry_title: 4.5,
        label: 4.8,
        value: 4.8,
        footer: 2.9,
        bottom_date: 3.0,
    },
    header: header(0.0, 44.0, 11.0, 5.0, 2.7, 2.0),
    fields: FieldsStyle {
        margin_left: 2.1,
        margin_top: 44.5,
        row_margin_bottom: -0.6,
        row_offsets: [0.0, 1.2, 1.0, 2.4, 4.0, 5.3, 6.4],
        label_width: 57.0,
        label_padding_right: 4.0,
        label_uppercase: true,
        label_inline: true,
        value_width_reduction: 50.0,
        value_text_indent: -5.0,
        value_margin_top: -2.0,
        value_line_height: 1.6,
        colon_margin_left: -10.0,
        style_number_letter_spacing: -0.2,
        ecopy_second_line_margin_top: 0.1,
        style_line_margin_top: -2.0,
    },
    labels: ECOPY_LABELS,
    footer: FooterStyle {
        margin_left: -3.4,
        letter_spacing: 0.1,
        notice_letter_spacing: 0.1,
        bold_margin_top: 1.0,
        bottom: 1.0,
        left: 11.0,
    },
    bottom_date: None,
    qr_watermark: None,
    photo: photo(Len::Percent(45.0), 6.0, 52.0, 41.9),
    institution_logo: Some(top_left_square(Len::Percent(1.0), 11.0, 29.0)),
    notice_background: None,
    company_logo: Some(top_right_square(Len::Percent(3.0), 59.0, 29.0)),
    ecopy_label: Some(EcopyLabelStyle {
        top: Len::Percent(24.9),
        left: Len::Percent(62.4),
        margin_top: -1.0,
        text: "ELECTRONIC COPY",
        size: 5.2,
        family: FontFamily::IbmPlexSans,
        letter_spacing: 1.0,
        color: Color::RED,
    }),
};
