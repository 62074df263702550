use crate::error::{ReportError, Result};
use crate::geometry::PageLayout;
use crate::types::{Color, Size};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "GEMREPORT_BASE_URL";

/// Where the sheet's page size comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSource {
    /// A scanned template of `width` x `height` pixels printed at `dpi`.
    Pixels { width: u32, height: u32, dpi: u32 },
    Letter,
    Points { width: f64, height: f64 },
}

impl PageSource {
    /// The A4 print template the sheet was calibrated against.
    pub const A4_TEMPLATE: PageSource = PageSource::Pixels {
        width: 2480,
        height: 3508,
        dpi: 300,
    };

    pub fn size(&self) -> Result<Size> {
        match *self {
            PageSource::Pixels { width, height, dpi } => {
                if dpi == 0 {
                    return Err(ReportError::InvalidConfiguration("dpi must be > 0".to_string()));
                }
                Ok(Size::from_pixels(width, height, dpi))
            }
            PageSource::Letter => Ok(Size::letter()),
            PageSource::Points { width, height } => {
                if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
                    return Err(ReportError::InvalidConfiguration(format!(
                        "page size must be positive (got {width}x{height})"
                    )));
                }
                Ok(Size::new(width, height))
            }
        }
    }

    fn dimensions(&self) -> Result<(f64, f64)> {
        match *self {
            PageSource::Pixels { width, height, dpi } if dpi > 0 => Ok((
                width as f64 / dpi as f64 * 72.0,
                height as f64 / dpi as f64 * 72.0,
            )),
            PageSource::Points { width, height } => {
                self.size()?;
                Ok((width, height))
            }
            _ => {
                let size = self.size()?;
                Ok((size.width.to_f64(), size.height.to_f64()))
            }
        }
    }
}

impl Default for PageSource {
    fn default() -> Self {
        PageSource::A4_TEMPLATE
    }
}

/// Fixed wording printed on every report. Unset wording stays blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportText {
    pub default_comment: String,
    pub ecopy_comment_one: String,
    pub ecopy_comment_two: String,
    pub important_notice: String,
    pub important_notice_bold: String,
    pub bottom_date: String,
}

impl ReportText {
    pub const ENV_KEYS: [&'static str; 6] = [
        "GEMREPORT_DEFAULT_COMMENT",
        "GEMREPORT_ECOPY_COMMENT_ONE",
        "GEMREPORT_ECOPY_COMMENT_TWO",
        "GEMREPORT_IMPORTANT_NOTICE",
        "GEMREPORT_IMPORTANT_NOTICE_BOLD",
        "GEMREPORT_BOTTOM_DATE",
    ];

    /// Defaults overridden by whichever `GEMREPORT_*` variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut text = Self::default();
        let [comment, one, two, notice, bold, date] = Self::ENV_KEYS;
        let slots: [(&str, &mut String); 6] = [
            (comment, &mut text.default_comment),
            (one, &mut text.ecopy_comment_one),
            (two, &mut text.ecopy_comment_two),
            (notice, &mut text.important_notice),
            (bold, &mut text.important_notice_bold),
            (date, &mut text.bottom_date),
        ];
        for (key, slot) in slots {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }
        text
    }
}

/// How long an export waits for QR preparation before going ahead with
/// whatever is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolicy {
    pub wait_ceiling: Duration,
    pub poll_interval: Duration,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self {
            wait_ceiling: Duration::from_secs(30),
            poll_interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    cols: u32,
    rows: u32,
    page: PageSource,
    single_page: Option<PageSource>,
    qr_concurrency: usize,
    qr_pixel_width: u32,
    verify_base_url: Option<String>,
    adhoc_qr: bool,
    uploads_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
    fonts_dir: Option<PathBuf>,
    text: ReportText,
    export: ExportPolicy,
    layout: PageLayout,
}

impl SheetConfig {
    pub fn builder() -> SheetConfigBuilder {
        SheetConfigBuilder::new()
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn page(&self) -> PageSource {
        self.page
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Page size for the one-report-per-page layout: the configured override,
    /// else the unrotated content box of a grid cell.
    pub fn single_page_size(&self) -> Result<Size> {
        match self.single_page {
            Some(source) => source.size(),
            None => {
                let (width, height) = self.layout.content_size();
                Ok(Size::new(width, height))
            }
        }
    }

    pub fn qr_concurrency(&self) -> usize {
        self.qr_concurrency
    }

    pub fn qr_pixel_width(&self) -> u32 {
        self.qr_pixel_width
    }

    /// Origin verification links are built on: the configured value, else
    /// `GEMREPORT_BASE_URL`, else empty (a relative link).
    pub fn verify_base_url(&self) -> String {
        if let Some(base) = &self.verify_base_url {
            return base.clone();
        }
        std::env::var(BASE_URL_ENV).unwrap_or_default()
    }

    /// Grid cells without a prepared QR image encode their own.
    pub fn adhoc_qr(&self) -> bool {
        self.adhoc_qr
    }

    pub fn uploads_dir(&self) -> Option<&PathBuf> {
        self.uploads_dir.as_ref()
    }

    pub fn static_dir(&self) -> Option<&PathBuf> {
        self.static_dir.as_ref()
    }

    pub fn fonts_dir(&self) -> Option<&PathBuf> {
        self.fonts_dir.as_ref()
    }

    pub fn text(&self) -> &ReportText {
        &self.text
    }

    pub fn export_policy(&self) -> ExportPolicy {
        self.export
    }
}

pub struct SheetConfigBuilder {
    cols: u32,
    rows: u32,
    page: PageSource,
    single_page: Option<PageSource>,
    border_width: f64,
    border_color: Color,
    qr_concurrency: usize,
    qr_pixel_width: u32,
    verify_base_url: Option<String>,
    adhoc_qr: bool,
    uploads_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
    fonts_dir: Option<PathBuf>,
    text: Option<ReportText>,
    export: ExportPolicy,
}

impl SheetConfigBuilder {
    pub fn new() -> Self {
        Self {
            cols: 3,
            rows: 3,
            page: PageSource::default(),
            single_page: None,
            border_width: 0.3,
            border_color: Color::BLACK,
            qr_concurrency: 8,
            qr_pixel_width: 800,
            verify_base_url: None,
            adhoc_qr: true,
            uploads_dir: None,
            static_dir: None,
            fonts_dir: None,
            text: None,
            export: ExportPolicy::default(),
        }
    }

    pub fn cols(mut self, cols: u32) -> Self {
        self.cols = cols;
        self
    }

    pub fn rows(mut self, rows: u32) -> Self {
        self.rows = rows;
        self
    }

    pub fn grid(self, cols: u32, rows: u32) -> Self {
        self.cols(cols).rows(rows)
    }

    pub fn page(mut self, page: PageSource) -> Self {
        self.page = page;
        self
    }

    pub fn single_page(mut self, page: PageSource) -> Self {
        self.single_page = Some(page);
        self
    }

    pub fn border_width(mut self, width: f64) -> Self {
        self.border_width = width;
        self
    }

    pub fn border_color(mut self, color: Color) -> Self {
        self.border_color = color;
        self
    }

    pub fn qr_concurrency(mut self, workers: usize) -> Self {
        self.qr_concurrency = workers;
        self
    }

    pub fn qr_pixel_width(mut self, width: u32) -> Self {
        self.qr_pixel_width = width;
        self
    }

    pub fn verify_base_url(mut self, base: impl Into<String>) -> Self {
        self.verify_base_url = Some(base.into());
        self
    }

    pub fn adhoc_qr(mut self, enabled: bool) -> Self {
        self.adhoc_qr = enabled;
        self
    }

    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = Some(dir.into());
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn fonts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fonts_dir = Some(dir.into());
        self
    }

    /// Report wording; defaults to [`ReportText::from_env`].
    pub fn text(mut self, text: ReportText) -> Self {
        self.text = Some(text);
        self
    }

    pub fn export_policy(mut self, policy: ExportPolicy) -> Self {
        self.export = policy;
        self
    }

    pub fn build(self) -> Result<SheetConfig> {
        if self.qr_concurrency == 0 {
            return Err(ReportError::InvalidConfiguration(
                "qr_concurrency must be >= 1".to_string(),
            ));
        }
        if self.qr_pixel_width == 0 {
            return Err(ReportError::InvalidConfiguration(
                "qr_pixel_width must be > 0".to_string(),
            ));
        }
        if self.export.poll_interval.is_zero() {
            return Err(ReportError::InvalidConfiguration(
                "export poll_interval must be > 0".to_string(),
            ));
        }
        if let Some(single) = self.single_page {
            single.size()?;
        }
        let (width, height) = self.page.dimensions()?;
        let layout = PageLayout::from_points(
            width,
            height,
            self.cols,
            self.rows,
            self.border_width,
            self.border_color,
        )?;
        Ok(SheetConfig {
            cols: self.cols,
            rows: self.rows,
            page: self.page,
            single_page: self.single_page,
            qr_concurrency: self.qr_concurrency,
            qr_pixel_width: self.qr_pixel_width,
            verify_base_url: self.verify_base_url,
            adhoc_qr: self.adhoc_qr,
            uploads_dir: self.uploads_dir,
            static_dir: self.static_dir,
            fonts_dir: self.fonts_dir,
            text: self.text.unwrap_or_else(ReportText::from_env),
            export: self.export,
            layout,
        })
    }
}

impl Default for SheetConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_print_template() {
        let config = SheetConfig::builder().build().unwrap();
        assert_eq!((config.cols(), config.rows()), (3, 3));
        assert_eq!(config.qr_concurrency(), 8);
        assert_eq!(config.qr_pixel_width(), 800);
        assert_eq!(config.export_policy().wait_ceiling, Duration::from_secs(30));
        assert_eq!(config.export_policy().poll_interval, Duration::from_millis(200));
        let layout = config.layout();
        assert!((layout.page_width - 595.2).abs() < 1e-9);
        assert!((layout.cell_width - 198.0).abs() < 1e-9);
        let single = config.single_page_size().unwrap();
        assert_eq!(single.width.to_milli_i64(), 280_240);
        assert_eq!(single.height.to_milli_i64(), 198_000);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        for builder in [
            SheetConfig::builder().cols(0),
            SheetConfig::builder().rows(0),
            SheetConfig::builder().qr_concurrency(0),
            SheetConfig::builder().page(PageSource::Pixels { width: 10, height: 10, dpi: 0 }),
            SheetConfig::builder().page(PageSource::Points { width: -1.0, height: 10.0 }),
            SheetConfig::builder().border_width(300.0),
        ] {
            assert!(matches!(builder.build(), Err(ReportError::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn letter_page_recomputes_layout() {
        let config = SheetConfig::builder()
            .page(PageSource::Letter)
            .grid(2, 4)
            .build()
            .unwrap();
        let layout = config.layout();
        assert_eq!(layout.vertical_lines.len(), 3);
        assert_eq!(layout.horizontal_lines.len(), 5);
        assert!((layout.cell_width - (612.0 - 0.9) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_base_url_wins() {
        let config = SheetConfig::builder()
            .verify_base_url("https://verify.example")
            .build()
            .unwrap();
        assert_eq!(config.verify_base_url(), "https://verify.example");
    }

    #[test]
    fn text_lookup_overrides_only_present_keys() {
        let env: HashMap<&str, &str> = [
            ("GEMREPORT_DEFAULT_COMMENT", "Custom comment. "),
            ("GEMREPORT_BOTTOM_DATE", "03/2025"),
        ]
        .into_iter()
        .collect();
        let text = ReportText::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(text.default_comment, "Custom comment. ");
        assert_eq!(text.bottom_date, "03/2025");
        assert_eq!(text.important_notice, ReportText::default().important_notice);
    }

    #[test]
    fn unconfigured_wording_is_blank() {
        let text = ReportText::from_lookup(|_| None);
        assert_eq!(text, ReportText::default());
        for wording in [
            &text.default_comment,
            &text.ecopy_comment_one,
            &text.ecopy_comment_two,
            &text.important_notice,
            &text.important_notice_bold,
            &text.bottom_date,
        ] {
            assert!(wording.is_empty());
        }
    }
}
