use crate::assets::{AssetKind, AssetResolver};
use crate::canvas::{Canvas, ImageFit};
use crate::config::ReportText;
use crate::font::{FontFamily, FontRegistry, FontWeight};
use crate::geometry::PageLayout;
use crate::qr::{QrEncoder, quick_verify_url};
use crate::record::ReportRecord;
use crate::style::{
    COLON_FAMILY, FOOTER_FAMILY, FooterStyle, HEADER_FAMILY, LABEL_FAMILY, LayoutVariant,
    Placement, TITLE_FAMILY, VALUE_FONTS, VariantStyle,
};
use crate::types::{Color, Pt};

const NBSP: &str = "\u{00A0}";
const NATURAL_LINE_HEIGHT: f64 = 1.2;
// Family the container falls back to for text with no family of its own.
const CONTAINER_FONT: &str = "Helvetica";

/// Box a report is laid out in, before any rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLayout {
    pub single: bool,
    pub content_width: f64,
    pub content_height: f64,
    /// Width of field values; derived from the photo column when `None`.
    pub value_width: Option<f64>,
}

impl CellLayout {
    /// Content of one grid cell: the cell with sides swapped, drawn rotated.
    pub fn grid(layout: &PageLayout) -> Self {
        let (content_width, content_height) = layout.content_size();
        Self {
            single: false,
            content_width,
            content_height,
            value_width: Some(layout.value_width()),
        }
    }

    pub fn single(content_width: f64, content_height: f64) -> Self {
        Self {
            single: true,
            content_width,
            content_height,
            value_width: None,
        }
    }
}

/// Value width for a full-page report: whatever the photo column leaves.
pub fn single_value_width(style: &VariantStyle, content_width: f64) -> f64 {
    let photo_width = style.photo.width.resolve(content_width);
    let photo_right = style
        .photo
        .right
        .map(|right| right.resolve(content_width))
        .unwrap_or(0.0);
    content_width - 2.0 * style.padding_horizontal - photo_width - photo_right
}

/// Draws one report into the current canvas frame, origin at the top-left
/// of the content box.
pub struct CellRenderer<'a> {
    fonts: &'a FontRegistry,
    assets: &'a AssetResolver,
    text: &'a ReportText,
    adhoc_qr: Option<(&'a dyn QrEncoder, &'a str)>,
}

impl<'a> CellRenderer<'a> {
    pub fn new(fonts: &'a FontRegistry, assets: &'a AssetResolver, text: &'a ReportText) -> Self {
        Self {
            fonts,
            assets,
            text,
            adhoc_qr: None,
        }
    }

    /// Grid cells whose record carries no QR image encode a short
    /// verification link themselves, bypassing any cache.
    pub fn with_adhoc_qr(mut self, encoder: &'a dyn QrEncoder, base_url: &'a str) -> Self {
        self.adhoc_qr = Some((encoder, base_url));
        self
    }

    pub fn render(&self, canvas: &mut Canvas, record: &ReportRecord, cell: CellLayout) {
        let variant = LayoutVariant::select(cell.single, record.is_ecopy);
        let style = variant.style();
        let width = cell.content_width;
        let height = cell.content_height;
        let value_width = cell
            .value_width
            .unwrap_or_else(|| single_value_width(style, width))
            - style.fields.value_width_reduction;

        canvas.set_fill_color(Color::BLACK);

        if let Some(label) = style.ecopy_label {
            let font = self.fonts.key_for(label.family, FontWeight::Normal);
            let run = Run::new(label.text, font, label.size, label.letter_spacing);
            let block = layout_runs(self.fonts, &[run], f64::INFINITY, 0.0, NATURAL_LINE_HEIGHT);
            canvas.set_fill_color(label.color);
            draw_block(
                canvas,
                &block,
                label.left.resolve(width),
                label.top.resolve(height) + label.margin_top,
            );
            canvas.set_fill_color(Color::BLACK);
        }

        if let Some(placement) = style.company_logo {
            self.draw_asset(canvas, AssetKind::CompanyLogo, record.company_logo.as_deref(), placement, width, height);
        }
        if let Some(placement) = style.institution_logo {
            self.draw_asset(canvas, AssetKind::InstitutionLogo, None, placement, width, height);
        }
        if let Some(placement) = style.notice_background {
            if record.notice_image {
                self.draw_asset(canvas, AssetKind::NoticeBackground, None, placement, width, height);
            }
        }
        self.draw_asset(canvas, AssetKind::Photo, record.image_filename.as_deref(), style.photo, width, height);

        if let Some(placement) = style.qr_watermark {
            if let Some(qr) = self.qr_image(record) {
                canvas.draw_image_fit(placement.resolve(width, height), qr, ImageFit::Fill);
            }
        }

        self.draw_header(canvas, style, width);
        self.draw_fields(canvas, record, style, value_width);
        self.draw_footer(canvas, record, style, width, height);
        self.draw_bottom_date(canvas, record, style, width, height);
    }

    fn qr_image(&self, record: &ReportRecord) -> Option<String> {
        if let Some(prepared) = record.qr_image.as_ref() {
            return Some(prepared.clone());
        }
        let (encoder, base_url) = self.adhoc_qr?;
        let report_no = record.report_number()?;
        match encoder.encode(&quick_verify_url(base_url, report_no)) {
            Ok(url) => Some(url),
            Err(err) => {
                log::error!("qr generation failed for report {report_no}: {err}");
                None
            }
        }
    }

    fn draw_asset(
        &self,
        canvas: &mut Canvas,
        kind: AssetKind,
        reference: Option<&str>,
        placement: Placement,
        width: f64,
        height: f64,
    ) {
        match self.assets.resolve(kind, reference) {
            Some(source) => {
                canvas.draw_image_fit(placement.resolve(width, height), source, ImageFit::Cover)
            }
            None => log::debug!("no {} to draw", kind.as_str()),
        }
    }

    fn font(&self, family: FontFamily, weight: FontWeight) -> String {
        self.fonts.key_for(family, weight)
    }

    fn draw_header(&self, canvas: &mut Canvas, style: &VariantStyle, width: f64) {
        let header = style.header;
        let sizes = style.fonts;
        let left = style.padding_horizontal + header.left;
        let right = width - style.padding_horizontal - header.right;
        let top = style.padding_vertical + header.top;
        let plain = self.font(HEADER_FAMILY, FontWeight::Normal);
        let bold = self.font(HEADER_FAMILY, FontWeight::Bold);

        let lines = [
            (
                vec![Run::new("INTERNATIONAL", plain.clone(), sizes.title, header.line_letter_spacing)],
                0.0,
            ),
            (
                vec![Run::new("GEMOLOGICAL", bold, sizes.title, 0.0)],
                header.gemological_margin_top,
            ),
            (
                vec![
                    Run::new(format!("INSTITUTE{NBSP}"), plain, sizes.title, header.line_letter_spacing),
                    Run::new(
                        "INDIA",
                        self.font(FontFamily::ItcAvantGardeCondensed, FontWeight::Normal),
                        6.0,
                        header.india_letter_spacing,
                    ),
                ],
                header.institute_margin_top,
            ),
        ];
        let mut y = top + header.column_margin_top;
        for (runs, margin_top) in lines {
            y += margin_top;
            let block = layout_runs(self.fonts, &runs, f64::INFINITY, 0.0, NATURAL_LINE_HEIGHT);
            draw_block(canvas, &block, left, y);
            y += block.height();
        }

        let title = Run::new(
            "JEWELRY REPORT",
            self.font(TITLE_FAMILY, FontWeight::Normal),
            sizes.jewelry_title,
            header.title_letter_spacing,
        );
        let title_width = title.measure(self.fonts, &title.text);
        let block = layout_runs(self.fonts, &[title], f64::INFINITY, 0.0, NATURAL_LINE_HEIGHT);
        draw_block(
            canvas,
            &block,
            right - header.title_margin_right - title_width,
            top + header.title_margin_top,
        );
    }

    fn draw_fields(
        &self,
        canvas: &mut Canvas,
        record: &ReportRecord,
        style: &VariantStyle,
        value_width: f64,
    ) {
        let fields = style.fields;
        let sizes = style.fonts;
        let x = style.padding_horizontal + fields.margin_left;
        let mut y = style.padding_vertical + fields.margin_top;
        let label_font = self.font(LABEL_FAMILY, FontWeight::Normal);
        let values = [
            record.report_no.clone(),
            record.description.clone(),
            record.shape_and_cut.clone(),
            format!("{} Carat", record.tot_est_weight),
            record.color.clone(),
            record.clarity.clone(),
        ];

        for row in 0..style.labels.len() {
            let shift = fields.row_offsets[row];
            let value_font = VALUE_FONTS[row];
            let font = self.font(value_font.family, value_font.weight);

            let label_text = if fields.label_uppercase {
                style.labels[row].to_uppercase()
            } else {
                style.labels[row].to_string()
            };
            let label = layout_runs(
                self.fonts,
                &[Run::new(label_text, label_font.clone(), sizes.label, 0.0)],
                fields.label_width - fields.label_padding_right,
                0.0,
                NATURAL_LINE_HEIGHT,
            );
            draw_block(canvas, &label, x, y + shift);

            let value_x = if fields.label_inline { x + fields.label_width } else { x };
            let paragraphs = if row == values.len() {
                self.comment_paragraphs(record, style, &font, value_width, value_font.weight)
            } else {
                let mut runs = self.value_prefix(style, &font, value_font.weight);
                runs.push(Run::new(values[row].clone(), font.clone(), sizes.value, 0.0));
                vec![(
                    layout_runs(
                        self.fonts,
                        &runs,
                        value_width,
                        fields.value_text_indent,
                        fields.value_line_height,
                    ),
                    fields.value_margin_top,
                )]
            };

            let mut value_y = y + shift;
            for (block, margin_top) in &paragraphs {
                value_y += margin_top;
                draw_block(canvas, block, value_x, value_y);
                value_y += block.height();
            }

            let value_height = value_y - (y + shift);
            let row_height = if fields.label_inline {
                value_height.max(label.height())
            } else {
                value_height
            };
            y += row_height + fields.row_margin_bottom;
        }
    }

    // Non-breaking space then the `: ` separator every value starts with.
    fn value_prefix(&self, style: &VariantStyle, font: &str, weight: FontWeight) -> Vec<Run> {
        vec![
            Run::new(NBSP, font.to_string(), style.fonts.value, 0.0),
            Run::new(
                ": ",
                self.font(COLON_FAMILY, weight),
                style.colon_size(),
                0.0,
            )
            .shifted(style.fields.colon_margin_left),
        ]
    }

    fn comment_paragraphs(
        &self,
        record: &ReportRecord,
        style: &VariantStyle,
        font: &str,
        value_width: f64,
        weight: FontWeight,
    ) -> Vec<(TextBlock, f64)> {
        let fields = style.fields;
        let size = style.fonts.value;
        let style_line = Run::new(
            format!("Style #{}", record.style_number),
            font.to_string(),
            size,
            fields.style_number_letter_spacing,
        );

        let mut first = self.value_prefix(style, font, weight);
        if fields.label_inline {
            first.push(Run::new(self.text.ecopy_comment_one.clone(), font.to_string(), size, 0.0));
            let second = Run::new(self.text.ecopy_comment_two.clone(), font.to_string(), size, 0.0);
            vec![
                (
                    layout_runs(self.fonts, &first, value_width, fields.value_text_indent, fields.value_line_height),
                    fields.value_margin_top,
                ),
                (
                    layout_runs(self.fonts, &[second], value_width, 0.0, fields.value_line_height),
                    fields.ecopy_second_line_margin_top,
                ),
                (
                    layout_runs(self.fonts, &[style_line], value_width, 0.0, fields.value_line_height),
                    fields.style_line_margin_top,
                ),
            ]
        } else {
            first.push(Run::new(self.text.default_comment.clone(), font.to_string(), size, 0.0));
            first.push(style_line);
            vec![(
                layout_runs(self.fonts, &first, value_width, fields.value_text_indent, fields.value_line_height),
                fields.value_margin_top,
            )]
        }
    }

    fn draw_footer(
        &self,
        canvas: &mut Canvas,
        record: &ReportRecord,
        style: &VariantStyle,
        width: f64,
        height: f64,
    ) {
        let footer = style.footer;
        let size = style.fonts.footer;
        let bold = self.font(FOOTER_FAMILY, FontWeight::Bold);
        let notice = record
            .important_notice
            .clone()
            .unwrap_or_else(|| self.text.important_notice.clone());
        let notice_bold = record
            .important_notice_bold
            .clone()
            .unwrap_or_else(|| self.text.important_notice_bold.clone());
        let max_width = footer_wrap_width(&footer, width);

        let first = layout_runs(
            self.fonts,
            &[
                Run::new("Important notice: ", bold.clone(), size, footer.letter_spacing),
                Run::new(notice, CONTAINER_FONT.to_string(), size, footer.notice_letter_spacing),
            ],
            max_width,
            0.0,
            NATURAL_LINE_HEIGHT,
        );
        let second = layout_runs(
            self.fonts,
            &[Run::new(notice_bold, bold, size, footer.letter_spacing)],
            max_width,
            0.0,
            NATURAL_LINE_HEIGHT,
        );

        let total = first.height() + footer.bold_margin_top + second.height();
        let x = footer.left + footer.margin_left;
        let top = height - footer.bottom - total;
        draw_block(canvas, &first, x, top);
        draw_block(canvas, &second, x, top + first.height() + footer.bold_margin_top);
    }

    fn draw_bottom_date(
        &self,
        canvas: &mut Canvas,
        record: &ReportRecord,
        style: &VariantStyle,
        width: f64,
        height: f64,
    ) {
        let Some(placement) = style.bottom_date else {
            return;
        };
        let text = record
            .bottom_date
            .clone()
            .unwrap_or_else(|| self.text.bottom_date.clone());
        if text.trim().is_empty() {
            return;
        }
        let run = Run::new(text, CONTAINER_FONT.to_string(), style.fonts.bottom_date, 0.0);
        let text_width = run.measure(self.fonts, &run.text);
        let block = layout_runs(self.fonts, &[run], f64::INFINITY, 0.0, NATURAL_LINE_HEIGHT);
        let x = width - placement.right.resolve(width) - text_width;
        let y = height - placement.bottom.resolve(height) - block.height();
        draw_block(canvas, &block, x, y);
    }
}

// The footer is anchored at its left edge only; it may run to the right side.
fn footer_wrap_width(footer: &FooterStyle, width: f64) -> f64 {
    width - footer.left - footer.margin_left
}

/// A stretch of text in one font.
#[derive(Debug, Clone)]
struct Run {
    text: String,
    font: String,
    size: f64,
    spacing: f64,
    /// Horizontal offset applied before the run starts.
    shift: f64,
}

impl Run {
    fn new(text: impl Into<String>, font: String, size: f64, spacing: f64) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            spacing,
            shift: 0.0,
        }
    }

    fn shifted(mut self, shift: f64) -> Self {
        self.shift = shift;
        self
    }

    fn measure(&self, fonts: &FontRegistry, text: &str) -> f64 {
        fonts
            .measure_text_width(&self.font, Pt::from_f64(self.size), Pt::from_f64(self.spacing), text)
            .to_f64()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Span {
    run: usize,
    x: f64,
    width: f64,
    text: String,
    font: String,
    size: f64,
    spacing: f64,
}

#[derive(Debug, Clone, Default)]
struct Line {
    spans: Vec<Span>,
    height: f64,
}

#[derive(Debug, Clone, Default)]
struct TextBlock {
    lines: Vec<Line>,
}

impl TextBlock {
    fn height(&self) -> f64 {
        self.lines.iter().map(|line| line.height).sum()
    }
}

/// Breaks `runs` into lines no wider than `width`. The first line starts at
/// `indent` (which may be negative); wrapped lines start at zero. Words are
/// never split.
fn layout_runs(fonts: &FontRegistry, runs: &[Run], width: f64, indent: f64, line_height: f64) -> TextBlock {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut x = indent;

    for (index, run) in runs.iter().enumerate() {
        x += run.shift;
        line.height = line.height.max(run.size * line_height);
        for piece in run.text.split_inclusive(' ') {
            let advance = run.measure(fonts, piece);
            let word = piece.trim_end_matches(' ');
            let visible = if word.len() == piece.len() {
                advance
            } else {
                run.measure(fonts, word)
            };

            if !line.spans.is_empty() && !word.is_empty() && x + visible > width {
                lines.push(std::mem::take(&mut line));
                line.height = run.size * line_height;
                x = 0.0;
            }
            if !lines.is_empty() && line.spans.is_empty() && word.is_empty() {
                continue;
            }

            match line.spans.last_mut() {
                Some(last) if last.run == index => {
                    last.text.push_str(piece);
                    last.width += advance;
                }
                _ => line.spans.push(Span {
                    run: index,
                    x,
                    width: advance,
                    text: piece.to_string(),
                    font: run.font.clone(),
                    size: run.size,
                    spacing: run.spacing,
                }),
            }
            x += advance;
        }
    }

    if !line.spans.is_empty() {
        lines.push(line);
    }
    TextBlock { lines }
}

fn draw_block(canvas: &mut Canvas, block: &TextBlock, x: f64, y: f64) {
    let mut top = y;
    for line in &block.lines {
        for span in &line.spans {
            canvas.set_font_name(&span.font);
            canvas.set_font_size(Pt::from_f64(span.size));
            canvas.set_char_spacing(Pt::from_f64(span.spacing));
            canvas.draw_string(
                Pt::from_f64(x + span.x),
                Pt::from_f64(top + (line.height - span.size) / 2.0),
                span.text.trim_end_matches(' '),
            );
        }
        top += line.height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Document};
    use crate::qr::tests::CountingEncoder;
    use crate::style::GRID;
    use crate::types::Size;
    use std::path::PathBuf;

    fn text() -> ReportText {
        ReportText {
            default_comment: "Natural stones. ".to_string(),
            ecopy_comment_one: "Electronic copy line one.".to_string(),
            ecopy_comment_two: "Electronic copy line two.".to_string(),
            important_notice: "Read the reverse.".to_string(),
            important_notice_bold: "Not a valuation.".to_string(),
            bottom_date: "01/2025".to_string(),
        }
    }

    fn record() -> ReportRecord {
        ReportRecord {
            style_number: "ST-9".to_string(),
            report_no: "JR1001".to_string(),
            description: "Gold ring".to_string(),
            shape_and_cut: "Round brilliant".to_string(),
            tot_est_weight: "1.20".to_string(),
            color: "G-H".to_string(),
            clarity: "VS".to_string(),
            image_filename: Some("ring.jpg".to_string()),
            ..ReportRecord::default()
        }
    }

    fn grid_cell() -> CellLayout {
        CellLayout {
            single: false,
            content_width: 280.24,
            content_height: 198.0,
            value_width: Some(224.3),
        }
    }

    fn render(renderer: &CellRenderer<'_>, record: &ReportRecord, cell: CellLayout) -> Document {
        let mut canvas = Canvas::new(Size::new(cell.content_width, cell.content_height));
        renderer.render(&mut canvas, record, cell);
        canvas.finish(None)
    }

    fn strings(doc: &Document) -> Vec<String> {
        doc.pages[0]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn images(doc: &Document) -> Vec<String> {
        doc.pages[0]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawImage { resource_id, .. } => Some(resource_id.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn grid_cell_draws_fields_and_prepared_qr() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let text = text();
        let renderer = CellRenderer::new(&fonts, &assets, &text);
        let mut record = record();
        record.qr_image = Some("data:image/png;base64,QR".to_string());

        let doc = render(&renderer, &record, grid_cell());
        let strings = strings(&doc);
        for expected in [
            "INTERNATIONAL",
            "GEMOLOGICAL",
            "JEWELRY REPORT",
            "Report No",
            "Tot. Est.Weight",
            "JR1001",
            "1.20 Carat",
            "Style #ST-9",
            "Important notice:",
            "01/2025",
        ] {
            assert!(strings.iter().any(|s| s == expected), "missing {expected:?} in {strings:?}");
        }
        assert!(strings.iter().any(|s| s.starts_with("INSTITUTE")));
        assert_eq!(images(&doc), vec!["data:image/png;base64,QR".to_string()]);
    }

    #[test]
    fn footer_runs_to_the_right_edge() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let footer = GRID.footer;
        let cell = grid_cell();
        let wrap = footer_wrap_width(&footer, cell.content_width);
        assert!((wrap - (280.24 - 26.5 + 3.4)).abs() < 1e-9);

        let bold = fonts.key_for(FOOTER_FAMILY, FontWeight::Bold);
        let size = Pt::from_f64(GRID.fonts.footer);
        let spacing = Pt::from_f64(footer.letter_spacing);
        let mut notice = String::new();
        while fonts.measure_text_width(&bold, size, spacing, &notice).to_f64() < 240.0 {
            notice.push_str("n ");
        }
        let notice = notice.trim_end().to_string();
        let measured = fonts.measure_text_width(&bold, size, spacing, &notice).to_f64();
        assert!(measured > cell.content_width - 2.0 * footer.left);
        assert!(measured < wrap);

        let mut text = text();
        text.important_notice_bold = notice.clone();
        let renderer = CellRenderer::new(&fonts, &assets, &text);
        let doc = render(&renderer, &record(), cell);
        assert!(strings(&doc).iter().any(|s| *s == notice));
    }

    #[test]
    fn blank_wording_draws_only_fixed_labels() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let text = ReportText::default();
        let renderer = CellRenderer::new(&fonts, &assets, &text);
        let doc = render(&renderer, &record(), grid_cell());
        let strings = strings(&doc);
        assert!(strings.iter().any(|s| s == "Important notice:"));
        assert!(strings.iter().any(|s| s == "Style #ST-9"));
        assert!(strings.iter().all(|s| !s.contains("guarantee") && !s.contains("examination")));
    }

    #[test]
    fn single_layout_never_draws_a_qr() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let text = text();
        let encoder = CountingEncoder::default();
        let renderer = CellRenderer::new(&fonts, &assets, &text).with_adhoc_qr(&encoder, "");
        let mut record = record();
        record.qr_image = Some("data:image/png;base64,QR".to_string());

        let doc = render(&renderer, &record, CellLayout::single(280.24, 198.0));
        assert!(images(&doc).is_empty());
        assert_eq!(encoder.calls(), 0);
        let strings = strings(&doc);
        assert!(strings.iter().any(|s| s == "E-COPY"));
        assert!(!strings.iter().any(|s| s == "01/2025"));
    }

    #[test]
    fn grid_cell_encodes_its_own_qr_when_missing() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let text = text();
        let encoder = CountingEncoder::default();
        let renderer =
            CellRenderer::new(&fonts, &assets, &text).with_adhoc_qr(&encoder, "https://igi.example");

        let doc = render(&renderer, &record(), grid_cell());
        assert_eq!(encoder.calls(), 1);
        assert_eq!(
            images(&doc),
            vec!["data:text/plain,https://igi.example/?r=JR1001".to_string()]
        );

        let blank = ReportRecord::default();
        render(&renderer, &blank, grid_cell());
        assert_eq!(encoder.calls(), 1);
    }

    #[test]
    fn electronic_copy_uses_its_own_wording() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let text = text();
        let renderer = CellRenderer::new(&fonts, &assets, &text);
        let mut record = record();
        record.is_ecopy = true;

        let doc = render(&renderer, &record, CellLayout::single(280.24, 198.0));
        let strings = strings(&doc);
        assert!(strings.iter().any(|s| s == "SUMMARY NO"));
        assert!(strings.iter().any(|s| s == "ELECTRONIC COPY"));
        let joined = strings.join(" ");
        assert!(joined.contains("Electronic copy line one."));
        assert!(joined.contains("Electronic copy line two."));
        assert!(!joined.contains("Natural stones."));
        assert!(strings.iter().any(|s| s == "Style #ST-9"));

        let red = doc.pages[0]
            .commands
            .iter()
            .position(|cmd| *cmd == Command::SetFillColor(Color::RED))
            .unwrap();
        let label = doc.pages[0]
            .commands
            .iter()
            .position(|cmd| matches!(cmd, Command::DrawString { text, .. } if text == "ELECTRONIC COPY"))
            .unwrap();
        assert!(red < label);
    }

    #[test]
    fn record_wording_overrides_defaults() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::default();
        let text = text();
        let renderer = CellRenderer::new(&fonts, &assets, &text);
        let mut record = record();
        record.important_notice = Some("Custom notice.".to_string());
        record.bottom_date = Some("12/2030".to_string());

        let joined = strings(&render(&renderer, &record, grid_cell())).join(" ");
        assert!(joined.contains("Custom notice."));
        assert!(!joined.contains("Read the reverse."));
        assert!(joined.contains("12/2030"));
    }

    #[test]
    fn assets_follow_layout_and_flags() {
        let fonts = FontRegistry::new();
        let assets = AssetResolver::new(Some(PathBuf::from("/u")), Some(PathBuf::from("/s")));
        let text = text();
        let renderer = CellRenderer::new(&fonts, &assets, &text);
        let mut record = record();
        record.notice_image = true;
        record.company_logo = Some("acme.png".to_string());

        let grid = images(&render(&renderer, &record, grid_cell()));
        assert!(grid.iter().any(|s| s.ends_with("notice_bg.png")));
        assert!(grid.iter().any(|s| s.ends_with("ring.jpg")));
        assert!(!grid.iter().any(|s| s.ends_with("acme.png")));
        assert!(!grid.iter().any(|s| s.ends_with("logo.jpg")));

        let single = images(&render(&renderer, &record, CellLayout::single(280.24, 198.0)));
        assert!(!single.iter().any(|s| s.ends_with("notice_bg.png")));
        assert!(single.iter().any(|s| s.ends_with("acme.png")));
        assert!(single.iter().any(|s| s.ends_with("logo.jpg")));
    }

    #[test]
    fn wrapped_lines_restart_at_the_left_edge() {
        let fonts = FontRegistry::new();
        // Helvetica "a" is 556/1000 em: each "aaaa " word is 11.12 + 1.39 wide at 5pt.
        let run = Run::new("aaaa aaaa aaaa aaaa", "Helvetica".to_string(), 5.0, 0.0);
        let block = layout_runs(&fonts, &[run], 30.0, 10.0, 1.6);
        assert_eq!(block.lines.len(), 3);
        assert_eq!(block.lines[0].spans[0].x, 10.0);
        assert_eq!(block.lines[0].spans[0].text, "aaaa ");
        assert_eq!(block.lines[1].spans[0].x, 0.0);
        assert_eq!(block.lines[1].spans[0].text, "aaaa aaaa ");
        assert!((block.height() - 3.0 * 8.0).abs() < 1e-9);
    }

    #[test]
    fn shifted_runs_move_the_cursor() {
        let fonts = FontRegistry::new();
        let runs = [
            Run::new(NBSP, "Helvetica".to_string(), 6.0, 0.0),
            Run::new(": ", "Helvetica".to_string(), 6.0, 0.0).shifted(-10.0),
        ];
        let block = layout_runs(&fonts, &runs, 100.0, 53.4, 1.6);
        let spans = &block.lines[0].spans;
        assert_eq!(spans.len(), 2);
        // 53.4 + 278/1000 * 6 - 10
        assert!((spans[1].x - 45.068).abs() < 1e-6);
    }

    #[test]
    fn single_value_width_leaves_room_for_the_photo() {
        let style = LayoutVariant::Single.style();
        assert!((single_value_width(style, 280.24) - (280.24 - 12.0 - 44.0 - 6.0)).abs() < 1e-9);
    }
}
