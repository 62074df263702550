use crate::config::ExportPolicy;
use crate::error::{ReportError, Result};
use crate::record::ReportRecord;
use crate::sheet::{ReportSheet, chunk};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Preparing,
    Ready,
    Exporting,
    Done,
    Failed,
}

/// Receives finished files; the library counterpart of a browser download.
pub trait DownloadSink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes delivered files into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        self.written.push(path);
        Ok(())
    }
}

/// Keeps delivered files in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(file_name, _)| file_name == name)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.files.push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportArtifact {
    Pdf { file_name: String },
    Archive { file_name: String, entries: Vec<String> },
}

impl ExportArtifact {
    pub fn file_name(&self) -> &str {
        match self {
            ExportArtifact::Pdf { file_name } | ExportArtifact::Archive { file_name, .. } => file_name,
        }
    }
}

/// Turns a sheet's pages into one PDF, or a zip of per-page PDFs.
#[derive(Debug, Default)]
pub struct Exporter {
    policy: ExportPolicy,
    state: ExportState,
}

impl Exporter {
    pub fn new(policy: ExportPolicy) -> Self {
        Self {
            policy,
            state: ExportState::Idle,
        }
    }

    pub fn for_sheet(sheet: &ReportSheet) -> Self {
        Self::new(sheet.config().export_policy())
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Exports every page of `sheet` into `sink`.
    ///
    /// Waits up to the policy's ceiling for QR preparation, then proceeds
    /// with whatever records are available. Returns `Ok(None)` for an empty
    /// batch. A failure leaves the exporter in [`ExportState::Failed`].
    pub fn export(&mut self, sheet: &ReportSheet, sink: &mut dyn DownloadSink) -> Result<Option<ExportArtifact>> {
        if sheet.records().is_empty() {
            return Ok(None);
        }
        let records = self.wait_for_records(sheet);
        self.state = ExportState::Exporting;
        match self.write_pages(sheet, &records, sink) {
            Ok(artifact) => {
                self.state = ExportState::Done;
                log::info!("exported {}", artifact.file_name());
                Ok(Some(artifact))
            }
            Err(err) => {
                self.state = ExportState::Failed;
                log::error!("export failed: {err}");
                Err(err)
            }
        }
    }

    fn wait_for_records(&mut self, sheet: &ReportSheet) -> Vec<ReportRecord> {
        if let Some(prepared) = sheet.prepared() {
            self.state = ExportState::Ready;
            return prepared;
        }
        self.state = ExportState::Preparing;
        let started = Instant::now();
        loop {
            if let Some(prepared) = sheet.prepared() {
                self.state = ExportState::Ready;
                return prepared;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.policy.wait_ceiling {
                break;
            }
            std::thread::sleep(self.policy.poll_interval.min(self.policy.wait_ceiling - elapsed));
        }
        log::warn!(
            "qr preparation not ready after {:?}; exporting without it",
            self.policy.wait_ceiling
        );
        self.state = ExportState::Ready;
        sheet.records().to_vec()
    }

    fn write_pages(
        &self,
        sheet: &ReportSheet,
        records: &[ReportRecord],
        sink: &mut dyn DownloadSink,
    ) -> Result<ExportArtifact> {
        let renderer = sheet.renderer();
        let root = sheet.file_name_root();
        let pages = chunk(records, renderer.layout().capacity());

        let mut parts = Vec::with_capacity(pages.len());
        for (index, items) in pages.iter().enumerate() {
            let document = renderer.page_document(items);
            let bytes = renderer.to_pdf(&document)?;
            log::debug!("serialized page {} of {} ({} bytes)", index + 1, pages.len(), bytes.len());
            parts.push(bytes);
        }

        if let [only] = parts.as_slice() {
            let file_name = format!("{root}.pdf");
            sink.deliver(&file_name, only)?;
            return Ok(ExportArtifact::Pdf { file_name });
        }

        let entries: Vec<String> = (1..=parts.len())
            .map(|n| format!("{root}-part-{n}.pdf"))
            .collect();
        let archive = zip_parts(&entries, &parts)?;
        let file_name = format!("{root}.zip");
        sink.deliver(&file_name, &archive)?;
        Ok(ExportArtifact::Archive { file_name, entries })
    }
}

fn zip_parts(names: &[String], parts: &[Vec<u8>]) -> Result<Vec<u8>> {
    if names.len() != parts.len() {
        return Err(ReportError::Archive("entry names do not match parts".to_string()));
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in names.iter().zip(parts) {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetConfig;
    use crate::qr::tests::CountingEncoder;
    use std::io::Read;
    use std::sync::Arc;
    use std::time::Duration;

    fn records(n: usize) -> Vec<ReportRecord> {
        (1..=n).map(|i| ReportRecord::new(format!("JR{i}"))).collect()
    }

    fn prepared_sheet(n: usize) -> ReportSheet {
        let config = SheetConfig::builder()
            .verify_base_url("https://igi.example")
            .build()
            .unwrap();
        let mut sheet = ReportSheet::with_encoder(config, Arc::new(CountingEncoder::default()));
        if let Some(handle) = sheet.set_records(records(n)) {
            handle.join().unwrap();
        }
        sheet
    }

    #[test]
    fn one_page_is_a_plain_pdf() {
        let sheet = prepared_sheet(9);
        let mut sink = MemorySink::new();
        let mut exporter = Exporter::for_sheet(&sheet);
        let artifact = exporter.export(&sheet, &mut sink).unwrap().unwrap();
        assert_eq!(
            artifact,
            ExportArtifact::Pdf {
                file_name: "Jewelry-Report-JR1-3x3.pdf".to_string()
            }
        );
        assert_eq!(exporter.state(), ExportState::Done);
        assert_eq!(sink.files.len(), 1);
        let bytes = sink.file("Jewelry-Report-JR1-3x3.pdf").unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn several_pages_are_zipped() {
        let sheet = prepared_sheet(10);
        let mut sink = MemorySink::new();
        let artifact = Exporter::for_sheet(&sheet).export(&sheet, &mut sink).unwrap().unwrap();
        let ExportArtifact::Archive { file_name, entries } = artifact else {
            panic!("expected an archive");
        };
        assert_eq!(file_name, "Jewelry-Report-JR1-3x3.zip");
        assert_eq!(
            entries,
            vec![
                "Jewelry-Report-JR1-3x3-part-1.pdf".to_string(),
                "Jewelry-Report-JR1-3x3-part-2.pdf".to_string(),
            ]
        );

        let bytes = sink.file(&file_name).unwrap().to_vec();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut part = Vec::new();
        archive
            .by_name("Jewelry-Report-JR1-3x3-part-2.pdf")
            .unwrap()
            .read_to_end(&mut part)
            .unwrap();
        assert!(part.starts_with(b"%PDF-"));
    }

    #[test]
    fn empty_batch_exports_nothing() {
        let sheet = prepared_sheet(0);
        let mut sink = MemorySink::new();
        let mut exporter = Exporter::for_sheet(&sheet);
        assert!(exporter.export(&sheet, &mut sink).unwrap().is_none());
        assert_eq!(exporter.state(), ExportState::Idle);
        assert!(sink.files.is_empty());
    }

    #[test]
    fn unfinished_preparation_does_not_block_export() {
        let config = SheetConfig::builder()
            .verify_base_url("https://igi.example")
            .adhoc_qr(false)
            .build()
            .unwrap();
        let encoder = Arc::new(CountingEncoder::slow(Duration::from_millis(1000)));
        let mut sheet = ReportSheet::with_encoder(config, encoder);
        let handle = sheet.set_records(records(2));

        let policy = ExportPolicy {
            wait_ceiling: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
        };
        let mut exporter = Exporter::new(policy);
        let mut sink = MemorySink::new();
        let started = Instant::now();
        let artifact = exporter.export(&sheet, &mut sink).unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(artifact.file_name(), "Jewelry-Report-JR1-3x3.pdf");
        assert_eq!(exporter.state(), ExportState::Done);
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    #[test]
    fn directory_sink_writes_files() {
        let dir = std::env::temp_dir().join(format!("gemreport-export-{}", std::process::id()));
        let sheet = prepared_sheet(1);
        let mut sink = DirectorySink::new(&dir);
        Exporter::for_sheet(&sheet).export(&sheet, &mut sink).unwrap();
        assert_eq!(sink.written().len(), 1);
        assert!(sink.written()[0].ends_with("Jewelry-Report-JR1-3x3.pdf"));
        assert!(std::fs::metadata(&sink.written()[0]).unwrap().len() > 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sink_failure_marks_the_export_failed() {
        struct RejectingSink;
        impl DownloadSink for RejectingSink {
            fn deliver(&mut self, _file_name: &str, _bytes: &[u8]) -> Result<()> {
                Err(ReportError::Io(std::io::Error::other("disk full")))
            }
        }
        let sheet = prepared_sheet(3);
        let mut exporter = Exporter::for_sheet(&sheet);
        assert!(exporter.export(&sheet, &mut RejectingSink).is_err());
        assert_eq!(exporter.state(), ExportState::Failed);
    }
}
