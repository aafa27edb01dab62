//! XLSX constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Name Excel gives the first sheet of a new workbook.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet";

/// Canonical format preset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFmtKey {
    /// Bordered, centered body cell.
    Text,
    /// Body cell with bold font (group anchors).
    TextBold,
    /// Table header cell.
    Header,
    /// Large bold title line.
    Title,
    /// Plain centered caption line.
    Caption,
    /// Right-aligned signature line.
    Signature,
}

impl EnumFmtKey {
    /// Preset name as used in format maps and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumFmtKey::Text => "text",
            EnumFmtKey::TextBold => "text_bold",
            EnumFmtKey::Header => "header",
            EnumFmtKey::Title => "title",
            EnumFmtKey::Caption => "caption",
            EnumFmtKey::Signature => "signature",
        }
    }
}

/// Build default named format presets used by [`crate::writer::XlsxWriter`].
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_font_fmt_spec = SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };
    let cfg_base_fmt_spec = cfg_font_fmt_spec.with_(SpecCellFormat {
        border: Some(1),
        align: Some("center".to_string()),
        text_wrap: Some(true),
        ..Default::default()
    });

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumFmtKey::Text.as_str().to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        EnumFmtKey::TextBold.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Header.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Title.as_str().to_string(),
        cfg_font_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            font_size: Some(14),
            align: Some("center".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Caption.as_str().to_string(),
        cfg_font_fmt_spec.with_(SpecCellFormat {
            align: Some("center".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Signature.as_str().to_string(),
        cfg_font_fmt_spec.with_(SpecCellFormat {
            align: Some("right".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_presets_cover_every_key() {
        let dict_fmt = derive_default_xlsx_formats();
        for key in [
            EnumFmtKey::Text,
            EnumFmtKey::TextBold,
            EnumFmtKey::Header,
            EnumFmtKey::Title,
            EnumFmtKey::Caption,
            EnumFmtKey::Signature,
        ] {
            assert!(dict_fmt.contains_key(key.as_str()), "missing {}", key.as_str());
        }
        assert_eq!(dict_fmt["header"].bold, Some(true));
        assert_eq!(dict_fmt["header"].border, Some(1));
        assert_eq!(dict_fmt["title"].border, None);
        assert_eq!(dict_fmt["signature"].align.as_deref(), Some("right"));
    }
}
