use crate::assets::AssetResolver;
use crate::canvas::{Canvas, Document};
use crate::cell::{CellLayout, CellRenderer};
use crate::config::SheetConfig;
use crate::error::Result;
use crate::font::FontRegistry;
use crate::geometry::{GRID_CONTENT_ROTATION, PageLayout, rotated_content_matrix};
use crate::pdf::document_to_pdf;
use crate::qr::{PngQrEncoder, QrCache, QrEncoder, prepare_batch};
use crate::record::ReportRecord;
use crate::types::{Color, Pt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub const PAGE_DOCUMENT_TITLE: &str = "Jewelry Report";

/// Splits `items` into consecutive pages of `size`; the last may be short.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    items.chunks(size).map(|page| page.to_vec()).collect()
}

/// Every cell of one page in row-major order; `None` marks a blank filler.
pub fn page_slots(items: &[ReportRecord], capacity: usize) -> Vec<Option<&ReportRecord>> {
    let mut slots: Vec<Option<&ReportRecord>> = items.iter().take(capacity).map(Some).collect();
    slots.resize(capacity.max(slots.len()), None);
    slots
}

/// Lays records out on pages; everything a sheet needs to draw and serialize.
pub struct SheetRenderer {
    config: SheetConfig,
    fonts: FontRegistry,
    assets: AssetResolver,
    adhoc_encoder: Option<Arc<dyn QrEncoder>>,
    base_url: String,
}

impl SheetRenderer {
    pub fn new(config: SheetConfig, adhoc_encoder: Option<Arc<dyn QrEncoder>>) -> Self {
        let mut fonts = FontRegistry::new();
        if let Some(dir) = config.fonts_dir() {
            let registered = fonts.register_report_fonts(dir);
            log::debug!("registered {registered} report fonts from {}", dir.display());
        }
        let assets = AssetResolver::new(config.uploads_dir().cloned(), config.static_dir().cloned());
        let adhoc_encoder = adhoc_encoder.filter(|_| config.adhoc_qr());
        let base_url = config.verify_base_url();
        Self {
            config,
            fonts,
            assets,
            adhoc_encoder,
            base_url,
        }
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn layout(&self) -> &PageLayout {
        self.config.layout()
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    fn cell_renderer(&self) -> CellRenderer<'_> {
        let renderer = CellRenderer::new(&self.fonts, &self.assets, self.config.text());
        match &self.adhoc_encoder {
            Some(encoder) => renderer.with_adhoc_qr(encoder.as_ref(), &self.base_url),
            None => renderer,
        }
    }

    /// Draws one grid page: rotated report cells, then the hairlines on top.
    pub fn draw_page(&self, canvas: &mut Canvas, items: &[ReportRecord]) {
        let layout = self.layout();
        let cell = CellLayout::grid(layout);
        let renderer = self.cell_renderer();

        for (index, slot) in page_slots(items, layout.capacity()).into_iter().enumerate() {
            let Some(record) = slot else {
                continue;
            };
            let rect = layout.cell_rect(index);
            let matrix = rotated_content_matrix(
                rect,
                cell.content_width,
                cell.content_height,
                GRID_CONTENT_ROTATION,
                layout.page_height,
            );
            canvas.save_state();
            canvas.clip_rect(rect);
            canvas.begin_frame(matrix, Pt::from_f64(cell.content_height));
            renderer.render(canvas, record, cell);
            canvas.end_frame();
            canvas.restore_state();
        }

        canvas.set_fill_color(layout.border_color);
        for line in layout.line_rects() {
            canvas.draw_rect(line);
        }
        canvas.set_fill_color(Color::BLACK);
    }

    fn grid_document(&self, pages: &[Vec<ReportRecord>], title: String) -> Document {
        let mut canvas = Canvas::new(self.layout().page_size());
        for (index, items) in pages.iter().enumerate() {
            if index > 0 {
                canvas.show_page();
            }
            self.draw_page(&mut canvas, items);
        }
        if pages.is_empty() {
            return Document {
                title: Some(title),
                page_size: canvas.page_size(),
                pages: Vec::new(),
            };
        }
        canvas.finish(Some(title))
    }

    /// Every page of `records` in one document, titled after the first report.
    pub fn preview_document(&self, records: &[ReportRecord]) -> Document {
        let title = records
            .first()
            .and_then(ReportRecord::report_number)
            .unwrap_or("batch")
            .to_string();
        self.grid_document(&chunk(records, self.layout().capacity()), title)
    }

    /// A document holding exactly one grid page.
    pub fn page_document(&self, items: &[ReportRecord]) -> Document {
        self.grid_document(&[items.to_vec()], PAGE_DOCUMENT_TITLE.to_string())
    }

    /// One unrotated report per page.
    pub fn single_document(&self, records: &[ReportRecord]) -> Result<Document> {
        let size = self.config.single_page_size()?;
        let cell = CellLayout::single(size.width.to_f64(), size.height.to_f64());
        let renderer = self.cell_renderer();
        let mut canvas = Canvas::new(size);
        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                canvas.show_page();
            }
            renderer.render(&mut canvas, record, cell);
        }
        let title = records
            .first()
            .and_then(ReportRecord::report_number)
            .map(str::to_string);
        if records.is_empty() {
            return Ok(Document {
                title,
                page_size: size,
                pages: Vec::new(),
            });
        }
        Ok(canvas.finish(title))
    }

    pub fn to_pdf(&self, document: &Document) -> Result<Vec<u8>> {
        document_to_pdf(document, Some(&self.fonts))
    }
}

/// A report batch and its QR preparation.
///
/// Setting new records starts preparation on a background thread; results of
/// a superseded run, or of a run that finishes after the sheet is dropped,
/// are discarded.
pub struct ReportSheet {
    renderer: SheetRenderer,
    cache: Arc<QrCache>,
    records: Arc<Vec<ReportRecord>>,
    prepared: Arc<Mutex<Option<Vec<ReportRecord>>>>,
    generation: Arc<AtomicU64>,
    mounted: Arc<AtomicBool>,
}

impl ReportSheet {
    pub fn new(config: SheetConfig) -> Self {
        let encoder: Arc<dyn QrEncoder> = Arc::new(PngQrEncoder::new(config.qr_pixel_width()));
        Self::with_encoder(config, encoder)
    }

    /// Uses `encoder` for both the shared cache and cells' own QR images.
    pub fn with_encoder(config: SheetConfig, encoder: Arc<dyn QrEncoder>) -> Self {
        let cache = Arc::new(QrCache::new(encoder.clone(), config.verify_base_url()));
        Self::with_cache(config, cache, encoder)
    }

    /// Shares `cache` with other sheets of the same session.
    pub fn with_cache(config: SheetConfig, cache: Arc<QrCache>, encoder: Arc<dyn QrEncoder>) -> Self {
        Self {
            renderer: SheetRenderer::new(config, Some(encoder)),
            cache,
            records: Arc::new(Vec::new()),
            prepared: Arc::new(Mutex::new(Some(Vec::new()))),
            generation: Arc::new(AtomicU64::new(0)),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn renderer(&self) -> &SheetRenderer {
        &self.renderer
    }

    pub fn config(&self) -> &SheetConfig {
        self.renderer.config()
    }

    pub fn cache(&self) -> &Arc<QrCache> {
        &self.cache
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    /// Replaces the batch and starts QR preparation for it. The returned
    /// handle may be joined or dropped.
    pub fn set_records(&mut self, records: Vec<ReportRecord>) -> Option<JoinHandle<()>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.records = Arc::new(records);

        if self.records.is_empty() {
            self.store_prepared(Vec::new());
            return None;
        }
        if let Ok(mut prepared) = self.prepared.lock() {
            *prepared = None;
        }

        let job = PreparationJob {
            records: self.records.clone(),
            cache: self.cache.clone(),
            prepared: self.prepared.clone(),
            generation: self.generation.clone(),
            mounted: self.mounted.clone(),
            concurrency: self.config().qr_concurrency(),
            id: generation,
        };
        let spawned = std::thread::Builder::new()
            .name(format!("gemreport-prepare-{generation}"))
            .spawn({
                let job = job.clone();
                move || job.run()
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("cannot start qr preparation thread ({err}); preparing inline");
                job.run();
                None
            }
        }
    }

    fn store_prepared(&self, records: Vec<ReportRecord>) {
        if let Ok(mut prepared) = self.prepared.lock() {
            *prepared = Some(records);
        }
    }

    /// Records with QR images attached, once preparation has finished.
    pub fn prepared(&self) -> Option<Vec<ReportRecord>> {
        self.prepared.lock().ok().and_then(|prepared| prepared.clone())
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
            .lock()
            .map(|prepared| prepared.is_some())
            .unwrap_or(false)
    }

    /// Prepared records when ready, otherwise the raw batch.
    pub fn data_source(&self) -> Vec<ReportRecord> {
        self.prepared().unwrap_or_else(|| self.records.to_vec())
    }

    pub fn page_count(&self) -> usize {
        self.records.len().div_ceil(self.renderer.layout().capacity())
    }

    pub fn pages(&self) -> Vec<Vec<ReportRecord>> {
        chunk(&self.data_source(), self.renderer.layout().capacity())
    }

    /// Live preview of every page.
    pub fn preview_document(&self) -> Document {
        let title = self
            .records
            .first()
            .and_then(ReportRecord::report_number)
            .unwrap_or("batch")
            .to_string();
        let mut document = self.renderer.preview_document(&self.data_source());
        document.title = Some(title);
        document
    }

    pub fn preview_pdf(&self) -> Result<Vec<u8>> {
        self.renderer.to_pdf(&self.preview_document())
    }

    /// `Jewelry-Report-<first report number>-<cols>x<rows>`.
    pub fn file_name_root(&self) -> String {
        let first = self
            .records
            .first()
            .and_then(ReportRecord::report_number)
            .unwrap_or("batch")
            .replace(['/', '\\'], "-");
        format!(
            "Jewelry-Report-{}-{}x{}",
            first,
            self.config().cols(),
            self.config().rows()
        )
    }
}

impl Drop for ReportSheet {
    fn drop(&mut self) {
        self.mounted.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct PreparationJob {
    records: Arc<Vec<ReportRecord>>,
    cache: Arc<QrCache>,
    prepared: Arc<Mutex<Option<Vec<ReportRecord>>>>,
    generation: Arc<AtomicU64>,
    mounted: Arc<AtomicBool>,
    concurrency: usize,
    id: u64,
}

impl PreparationJob {
    fn run(&self) {
        let out = prepare_batch(&self.records, &self.cache, self.concurrency);
        if !self.mounted.load(Ordering::SeqCst) {
            log::debug!("sheet dropped; discarding qr preparation {}", self.id);
            return;
        }
        if let Ok(mut prepared) = self.prepared.lock() {
            // Checked under the lock so a newer batch cannot be overwritten.
            if self.generation.load(Ordering::SeqCst) != self.id {
                log::debug!("qr preparation {} superseded", self.id);
                return;
            }
            *prepared = Some(out);
            log::debug!("qr preparation {} ready ({} records)", self.id, self.records.len());
        }
    }
}
