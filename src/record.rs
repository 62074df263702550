use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

/// Field data of one gemological certificate.
///
/// Field names follow the upstream export so records can be loaded straight
/// from the JSON the admin tooling produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub style_number: String,
    #[serde(deserialize_with = "string_or_number")]
    pub report_no: String,
    pub description: String,
    pub shape_and_cut: String,
    #[serde(deserialize_with = "string_or_number")]
    pub tot_est_weight: String,
    pub color: String,
    pub clarity: String,
    pub comment: Option<String>,
    pub image_filename: Option<String>,
    pub company_logo: Option<String>,
    #[serde(rename = "isecopy")]
    pub is_ecopy: bool,
    pub notice_image: bool,
    pub report_date: Option<String>,
    pub important_notice: Option<String>,
    pub important_notice_bold: Option<String>,
    #[serde(alias = "bottom_data")]
    pub bottom_date: Option<String>,
    /// Precomputed QR image as a `data:` URL.
    #[serde(rename = "qrDataUrl", skip_serializing_if = "Option::is_none")]
    pub qr_image: Option<String>,
}

impl ReportRecord {
    pub fn new(report_no: impl Into<String>) -> Self {
        Self {
            report_no: report_no.into(),
            ..Default::default()
        }
    }

    /// Report number as printed, or `None` when blank.
    pub fn report_number(&self) -> Option<&str> {
        if self.report_no.trim().is_empty() {
            None
        } else {
            Some(&self.report_no)
        }
    }
}

// Spreadsheet exports hand numeric cells through as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    })
}

pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<ReportRecord>> {
    let bytes = std::fs::read(path)?;
    parse_records(&bytes)
}

pub fn parse_records(bytes: &[u8]) -> Result<Vec<ReportRecord>> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_field_names() {
        let json = br#"[{
            "style_number": "ST-9",
            "report_no": "JR1001",
            "description": "Gold ring",
            "tot_est_weight": "1.20",
            "isecopy": true,
            "notice_image": true,
            "bottom_data": "01/2025",
            "extra_column": 42
        }]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.report_number(), Some("JR1001"));
        assert!(record.is_ecopy);
        assert!(record.notice_image);
        assert_eq!(record.bottom_date.as_deref(), Some("01/2025"));
        assert!(record.qr_image.is_none());
        assert_eq!(record.clarity, "");
    }

    #[test]
    fn numeric_cells_become_text() {
        let json = br#"[{"report_no": 778812, "tot_est_weight": 0.5, "style_number": null}]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records[0].report_no, "778812");
        assert_eq!(records[0].tot_est_weight, "0.5");
        assert_eq!(records[0].style_number, "");
    }

    #[test]
    fn blank_report_number_is_absent() {
        assert_eq!(ReportRecord::new("   ").report_number(), None);
        assert_eq!(ReportRecord::default().report_number(), None);
        assert_eq!(ReportRecord::new("JR1 ").report_number(), Some("JR1 "));
    }
}
