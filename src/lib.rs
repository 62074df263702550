mod assets;
mod canvas;
mod cell;
mod config;
mod error;
mod export;
mod font;
mod geometry;
mod pdf;
mod qr;
mod record;
mod sheet;
mod style;
mod types;

pub use assets::{AssetKind, AssetResolver};
pub use canvas::{Canvas, Command, Document, ImageFit, Page};
pub use cell::{CellLayout, CellRenderer, single_value_width};
pub use config::{BASE_URL_ENV, ExportPolicy, PageSource, ReportText, SheetConfig, SheetConfigBuilder};
pub use error::{ReportError, Result};
pub use export::{DirectorySink, DownloadSink, ExportArtifact, ExportState, Exporter, MemorySink};
pub use font::{FontFamily, FontRegistry, FontWeight, REPORT_FONT_FILES};
pub use geometry::{GRID_CONTENT_ROTATION, PageLayout, round3, rotated_content_matrix};
pub use pdf::document_to_pdf;
pub use qr::{PngQrEncoder, QrCache, QrEncoder, prepare_batch, quick_verify_url, verify_url};
pub use record::{ReportRecord, load_records, parse_records};
pub use sheet::{PAGE_DOCUMENT_TITLE, ReportSheet, SheetRenderer, chunk, page_slots};
pub use style::{LayoutVariant, VariantStyle};
pub use types::{Color, Pt, Rect, Size};

/// Prepares `records` and writes them to `sink` as a single PDF or a zip of
/// per-page PDFs, waiting for QR preparation as `config` allows.
pub fn export_records(
    config: SheetConfig,
    records: Vec<ReportRecord>,
    sink: &mut dyn DownloadSink,
) -> Result<Option<ExportArtifact>> {
    let mut sheet = ReportSheet::new(config);
    let preparation = sheet.set_records(records);
    let mut exporter = Exporter::for_sheet(&sheet);
    let artifact = exporter.export(&sheet, sink);
    if let Some(handle) = preparation {
        if handle.join().is_err() {
            log::warn!("qr preparation thread panicked");
        }
    }
    artifact
}
