use crate::error::{ReportError, Result};
use crate::record::ReportRecord;
use base64::Engine;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Characters a URI component keeps unescaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Verification link a report's QR image points at.
pub fn verify_url(base: &str, report_no: &str) -> String {
    format!(
        "{}/Verify-Your-Report?r={}",
        base,
        utf8_percent_encode(report_no, URI_COMPONENT)
    )
}

/// Short verification link encoded by cells that generate their own QR image.
pub fn quick_verify_url(base: &str, report_no: &str) -> String {
    format!("{}/?r={}", base, utf8_percent_encode(report_no, URI_COMPONENT))
}

/// Turns text into a QR image, returned as a `data:` URL.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<String>;
}

/// Black-on-white PNG QR codes with no quiet zone, `pixel_width` pixels square.
#[derive(Debug, Clone, Copy)]
pub struct PngQrEncoder {
    pixel_width: u32,
}

impl PngQrEncoder {
    pub fn new(pixel_width: u32) -> Self {
        Self { pixel_width }
    }
}

impl Default for PngQrEncoder {
    fn default() -> Self {
        Self::new(800)
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode(&self, text: &str) -> Result<String> {
        let code = qrcode::QrCode::new(text.as_bytes())
            .map_err(|err| ReportError::Qr(format!("cannot encode {text:?}: {err}")))?;
        let modules = code.width();
        let colors = code.to_colors();
        let size = self.pixel_width.max(modules as u32);
        let scale = size as usize;

        let image = image::GrayImage::from_fn(size, size, |x, y| {
            let mx = x as usize * modules / scale;
            let my = y as usize * modules / scale;
            match colors.get(my * modules + mx) {
                Some(qrcode::Color::Dark) => image::Luma([0u8]),
                _ => image::Luma([255u8]),
            }
        });

        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(image)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|err| ReportError::Qr(format!("png encoding failed: {err}")))?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

/// Report number to QR image memo, shared by everything drawing one batch.
///
/// Failures are remembered as `None` and never retried; entries are never
/// evicted.
pub struct QrCache {
    entries: Mutex<HashMap<String, Option<String>>>,
    encoder: Arc<dyn QrEncoder>,
    base_url: String,
}

impl QrCache {
    pub fn new(encoder: Arc<dyn QrEncoder>, base_url: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            encoder,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get(&self, report_no: Option<&str>) -> Option<String> {
        let key = report_no.filter(|key| !key.trim().is_empty())?;

        if let Ok(entries) = self.entries.lock() {
            if let Some(hit) = entries.get(key) {
                log::debug!("qr cache hit for {key}");
                return hit.clone();
            }
        }

        log::debug!("qr cache miss for {key}");
        let url = verify_url(&self.base_url, key);
        let generated = match self.encoder.encode(&url) {
            Ok(data_url) => Some(data_url),
            Err(err) => {
                log::error!("qr generation failed for report {key}: {err}");
                None
            }
        };

        match self.entries.lock() {
            // A concurrent lookup may have resolved the key first; keep its answer.
            Ok(mut entries) => entries.entry(key.to_string()).or_insert(generated).clone(),
            Err(_) => generated,
        }
    }

    pub fn contains(&self, report_no: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(report_no))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Copies `records` and attaches a QR image to every copy that lacks one,
/// running at most `concurrency` lookups at once.
pub fn prepare_batch(records: &[ReportRecord], cache: &QrCache, concurrency: usize) -> Vec<ReportRecord> {
    let mut out = records.to_vec();
    let pending: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.qr_image.is_none())
        .map(|(index, _)| index)
        .collect();
    if pending.is_empty() {
        return out;
    }

    let workers = concurrency.max(1).min(pending.len());
    let next = AtomicUsize::new(0);
    let resolved: Mutex<Vec<(usize, Option<String>)>> = Mutex::new(Vec::with_capacity(pending.len()));

    let work = || {
        loop {
            let slot = next.fetch_add(1, Ordering::Relaxed);
            let Some(&index) = pending.get(slot) else {
                break;
            };
            let qr = cache.get(records[index].report_number());
            if let Ok(mut resolved) = resolved.lock() {
                resolved.push((index, qr));
            }
        }
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("gemreport-qr-{i}"))
        .build()
    {
        Ok(pool) => {
            let work = &work;
            pool.scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(move |_| work());
                }
            });
        }
        Err(err) => {
            log::warn!("qr worker pool unavailable ({err}); encoding sequentially");
            work();
        }
    }

    let resolved = resolved.into_inner().unwrap_or_default();
    log::debug!(
        "prepared qr images for {} of {} records",
        resolved.iter().filter(|(_, qr)| qr.is_some()).count(),
        records.len()
    );
    for (index, qr) in resolved {
        out[index].qr_image = qr;
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Returns a fake data URL naming the encoded text and counts calls.
    #[derive(Default)]
    pub(crate) struct CountingEncoder {
        pub(crate) calls: AtomicUsize,
        pub(crate) in_flight: AtomicUsize,
        pub(crate) peak: AtomicUsize,
        pub(crate) delay: Duration,
    }

    impl CountingEncoder {
        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QrEncoder for CountingEncoder {
        fn encode(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("data:text/plain,{text}"))
        }
    }

    pub(crate) struct FailingEncoder {
        pub(crate) calls: AtomicUsize,
    }

    impl QrEncoder for FailingEncoder {
        fn encode(&self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ReportError::Qr("encoder offline".to_string()))
        }
    }

    #[test]
    fn verify_urls_escape_like_uri_components() {
        assert_eq!(
            verify_url("https://igi.example", "JR 10/01"),
            "https://igi.example/Verify-Your-Report?r=JR%2010%2F01"
        );
        assert_eq!(verify_url("", "A-1_(x)"), "/Verify-Your-Report?r=A-1_(x)");
        assert_eq!(quick_verify_url("https://igi.example", "7&8"), "https://igi.example/?r=7%268");
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = QrCache::new(encoder.clone(), "https://igi.example");
        let first = cache.get(Some("JR1"));
        let second = cache.get(Some("JR1"));
        assert_eq!(first, second);
        assert_eq!(
            first.as_deref(),
            Some("data:text/plain,https://igi.example/Verify-Your-Report?r=JR1")
        );
        assert_eq!(encoder.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_cached_as_none() {
        let encoder = Arc::new(FailingEncoder {
            calls: AtomicUsize::new(0),
        });
        let cache = QrCache::new(encoder.clone(), "");
        assert_eq!(cache.get(Some("JR2")), None);
        assert_eq!(cache.get(Some("JR2")), None);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains("JR2"));
    }

    #[test]
    fn absent_report_numbers_are_not_cached() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = QrCache::new(encoder.clone(), "");
        assert_eq!(cache.get(None), None);
        assert_eq!(cache.get(Some("")), None);
        assert_eq!(cache.get(Some("   ")), None);
        assert!(cache.is_empty());
        assert_eq!(encoder.calls(), 0);
    }

    #[test]
    fn whitespace_is_part_of_the_report_number() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = QrCache::new(encoder.clone(), "https://igi.example");
        let padded = cache.get(Some("JR1 "));
        let plain = cache.get(Some("JR1"));
        assert_ne!(padded, plain);
        assert_eq!(
            padded.as_deref(),
            Some("data:text/plain,https://igi.example/Verify-Your-Report?r=JR1%20")
        );
        assert_eq!(encoder.calls(), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("JR1 "));
    }

    #[test]
    fn clear_resets_between_sessions() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = QrCache::new(encoder.clone(), "");
        cache.get(Some("JR3"));
        cache.clear();
        cache.get(Some("JR3"));
        assert_eq!(encoder.calls(), 2);
    }

    #[test]
    fn batch_preparation_keeps_order_and_existing_images() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = QrCache::new(encoder.clone(), "");
        let mut records: Vec<ReportRecord> =
            (0..20).map(|i| ReportRecord::new(format!("JR{i}"))).collect();
        records[3].qr_image = Some("data:image/png;base64,given".to_string());
        records[7].report_no = String::new();

        let prepared = prepare_batch(&records, &cache, 8);
        assert_eq!(prepared.len(), 20);
        for (i, record) in prepared.iter().enumerate() {
            assert_eq!(record.report_no, records[i].report_no);
        }
        assert_eq!(prepared[3].qr_image.as_deref(), Some("data:image/png;base64,given"));
        assert_eq!(prepared[7].qr_image, None);
        assert_eq!(
            prepared[5].qr_image.as_deref(),
            Some("data:text/plain,/Verify-Your-Report?r=JR5")
        );
        // 20 records, one preset, one without a number.
        assert_eq!(encoder.calls(), 18);
        assert!(records.iter().all(|r| r.qr_image.is_none() || r.report_no == "JR3"));
    }

    #[test]
    fn batch_preparation_bounds_concurrency() {
        let encoder = Arc::new(CountingEncoder::slow(Duration::from_millis(20)));
        let cache = QrCache::new(encoder.clone(), "");
        let records: Vec<ReportRecord> =
            (0..24).map(|i| ReportRecord::new(format!("JR{i}"))).collect();
        prepare_batch(&records, &cache, 3);
        assert_eq!(encoder.calls(), 24);
        let peak = encoder.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak concurrency {peak}");
    }

    #[test]
    fn png_encoder_produces_a_square_image() {
        let url = PngQrEncoder::new(120)
            .encode("https://igi.example/Verify-Your-Report?r=JR1")
            .unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (120, 120));
        // No quiet zone: the top-left finder pattern starts at the corner.
        assert_eq!(image.to_luma8().get_pixel(0, 0).0, [0]);
    }
}
