//! Row normalization: significance, cleaning, value parsing and date keys.

use chrono::{Datelike, NaiveDate};
use depotkit_io_xlsx::EnumCellValue;
use regex::Regex;

use crate::conf::{C_FMT_DATE, C_FMT_SHEET_NAME};
use crate::error::ReportError;
use crate::spec::{
    EnumQcMarkerRule, EnumQuantity, EnumSignificanceRule, LocomotiveNumber, SpecNormalizedRow,
    SpecProductSchema, SpecRawRow, SpecWorkItem,
};

/// Year used to order `dd.mm` sheet names; leap so `29.02` stays valid.
const N_YEAR_SHEET_ORDER: i32 = 2000;

////////////////////////////////////////////////////////////////////////////////
// #region ValueParsing

/// Remove every `_`/`-` run, then trim surrounding whitespace.
///
/// Case is preserved and `clean_text(clean_text(x)) == clean_text(x)`.
pub fn clean_text(text: &str) -> String {
    let c_stripped: String = text.chars().filter(|c| !matches!(c, '_' | '-')).collect();
    c_stripped.trim().to_string()
}

/// Cleaned display text of a cell; empty for a missing cell.
pub fn clean_cell(value: &EnumCellValue) -> String {
    clean_text(&value.to_text())
}

/// Parse `H:MM`, `HH:MM` or either with `:SS` into zero-padded `HH:MM`.
///
/// Anything else, including non-text cells, yields an empty string.
pub fn parse_time_of_day(value: &EnumCellValue) -> String {
    let Some(text) = value.as_str() else {
        return String::new();
    };
    let l_parts: Vec<&str> = text.trim().split(':').collect();
    let if_digits = |part: &str, n_min: usize, n_max: usize| {
        (n_min..=n_max).contains(&part.len()) && part.chars().all(|c| c.is_ascii_digit())
    };

    let if_valid = match l_parts.as_slice() {
        &[c_hour, c_minute] => if_digits(c_hour, 1, 2) && if_digits(c_minute, 2, 2),
        &[c_hour, c_minute, c_second] => {
            if_digits(c_hour, 1, 2) && if_digits(c_minute, 2, 2) && if_digits(c_second, 2, 2)
        }
        _ => false,
    };
    if !if_valid {
        return String::new();
    }
    format!("{:0>2}:{}", l_parts[0], l_parts[1])
}

/// Fraction cell (`0.5`) to an integer percent (`50`), truncated.
///
/// Numeric text is accepted; other values yield `None`.
pub fn parse_completion_percent(value: &EnumCellValue) -> Option<i64> {
    let n_fraction = match value {
        EnumCellValue::Number(n) => *n,
        EnumCellValue::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        EnumCellValue::None | EnumCellValue::DateTime(_) => return None,
    };
    let n_percent = (n_fraction * 100.0).trunc();
    if !n_percent.is_finite() || n_percent.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(n_percent as i64)
}

/// Quantity cell: whole numbers become counts, other non-blank values text.
pub fn parse_quantity(value: &EnumCellValue) -> Option<EnumQuantity> {
    if value.is_blank() {
        return None;
    }
    match value {
        EnumCellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
            Some(EnumQuantity::Count(*n as i64))
        }
        EnumCellValue::String(s) => {
            let c_text = s.trim();
            match c_text.parse::<i64>() {
                Ok(n_count) => Some(EnumQuantity::Count(n_count)),
                Err(_) => Some(EnumQuantity::Text(c_text.to_string())),
            }
        }
        _ => Some(EnumQuantity::Text(value.to_text().into_owned())),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowRules

/// Outcome of checking one raw row against a product's rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumRowVerdict {
    /// Row becomes a work item.
    Accepted(SpecNormalizedRow),
    /// Row fails the significance rule.
    Insignificant,
    /// Row fails the QC marker rule.
    Excluded,
}

fn has_alphanumeric(text: &str) -> bool {
    text.chars().any(|c| {
        c.is_ascii_alphanumeric() || ('А'..='я').contains(&c) || matches!(c, 'Ё' | 'ё')
    })
}

/// Whether `row` carries a real work item under `rule`.
pub fn is_significant_row(row: &SpecRawRow, rule: EnumSignificanceRule) -> bool {
    match rule {
        EnumSignificanceRule::NonBlank => !row.locomotive.is_none() && !row.work_name.is_blank(),
        EnumSignificanceRule::Alphanumeric => {
            has_alphanumeric(&row.work_name.to_text())
                && has_alphanumeric(&row.locomotive.to_text())
        }
    }
}

/// Whether `row` passes the QC marker `rule`.
pub fn should_keep_by_qc_marker(row: &SpecRawRow, rule: EnumQcMarkerRule) -> bool {
    let if_marked = !row.qc_marker.is_blank();
    match rule {
        EnumQcMarkerRule::Exclude => !if_marked,
        EnumQcMarkerRule::Require => if_marked,
        EnumQcMarkerRule::Ignore => true,
    }
}

/// Classify and, when accepted, normalize one raw row.
pub fn derive_row_verdict(row: &SpecRawRow, schema: &SpecProductSchema) -> EnumRowVerdict {
    if !is_significant_row(row, schema.significance) {
        return EnumRowVerdict::Insignificant;
    }
    if !should_keep_by_qc_marker(row, schema.qc_marker) {
        return EnumRowVerdict::Excluded;
    }

    let item = SpecWorkItem {
        work_name: clean_cell(&row.work_name),
        completion: parse_completion_percent(&row.completion),
        time_start: parse_time_of_day(&row.time_start),
        time_end: parse_time_of_day(&row.time_end),
        quantity: parse_quantity(&row.qc_marker),
        product_number: row.locomotive.to_text().trim().to_string(),
    };
    EnumRowVerdict::Accepted(SpecNormalizedRow {
        locomotive: LocomotiveNumber::new(clean_cell(&row.locomotive)),
        item,
    })
}

/// Normalize one raw row; `None` when the row is insignificant or excluded.
pub fn normalize_row(row: &SpecRawRow, schema: &SpecProductSchema) -> Option<SpecNormalizedRow> {
    match derive_row_verdict(row, schema) {
        EnumRowVerdict::Accepted(row_normalized) => Some(row_normalized),
        EnumRowVerdict::Insignificant | EnumRowVerdict::Excluded => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Dates

/// Parse a user-supplied `dd.mm.yyyy` date.
///
/// Only the exact two-two-four digit shape is accepted, so the parsed date
/// formats back to the input.
pub fn parse_target_date(text: &str) -> Result<NaiveDate, ReportError> {
    let c_text = text.trim();
    let l_bytes = c_text.as_bytes();
    let if_shape_ok = l_bytes.len() == 10
        && l_bytes
            .iter()
            .enumerate()
            .all(|(n_idx, b)| if matches!(n_idx, 2 | 5) { *b == b'.' } else { b.is_ascii_digit() });
    if !if_shape_ok {
        return Err(ReportError::InvalidDate(text.to_string()));
    }
    NaiveDate::parse_from_str(c_text, C_FMT_DATE)
        .map_err(|_| ReportError::InvalidDate(text.to_string()))
}

/// `dd.mm.yyyy` text of a date.
pub fn format_target_date(date: NaiveDate) -> String {
    date.format(C_FMT_DATE).to_string()
}

/// Output sheet name (`dd.mm`, no year).
pub fn format_sheet_name(date: NaiveDate) -> String {
    date.format(C_FMT_SHEET_NAME).to_string()
}

/// `(month, day)` of a `dd.mm` sheet name; `None` for any other name.
pub fn parse_sheet_name_date(name: &str) -> Option<(u32, u32)> {
    let (c_day, c_month) = name.split_once('.')?;
    let if_part_ok =
        |part: &str| (1..=2).contains(&part.len()) && part.chars().all(|c| c.is_ascii_digit());
    if !if_part_ok(c_day) || !if_part_ok(c_month) {
        return None;
    }
    let date =
        NaiveDate::from_ymd_opt(N_YEAR_SHEET_ORDER, c_month.parse().ok()?, c_day.parse().ok()?)?;
    Some((date.month(), date.day()))
}

/// Finds a `dd.mm.yyyy` date inside a header cell.
#[derive(Debug, Clone)]
pub struct SpecEmbeddedDateMatcher {
    re_date: Regex,
}

impl SpecEmbeddedDateMatcher {
    pub fn new() -> Result<Self, ReportError> {
        let re_date = Regex::new(r"\d{2}\.\d{2}\.\d{4}")
            .map_err(|e| ReportError::Config(format!("Invalid date pattern: {e}")))?;
        Ok(Self { re_date })
    }

    /// Date carried by `value`: a date cell, or the first `dd.mm.yyyy`
    /// substring of a text cell that is a real calendar date.
    pub fn derive_embedded_date(&self, value: &EnumCellValue) -> Option<NaiveDate> {
        match value {
            EnumCellValue::DateTime(dt) => Some(dt.date()),
            EnumCellValue::String(text) => {
                let found = self.re_date.find(text)?;
                NaiveDate::parse_from_str(found.as_str(), C_FMT_DATE).ok()
            }
            EnumCellValue::None | EnumCellValue::Number(_) => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{derive_default_plan_schema, derive_default_qc_schema};

    fn derive_raw_row(locomotive: EnumCellValue, work_name: EnumCellValue) -> SpecRawRow {
        SpecRawRow {
            locomotive,
            work_name,
            ..Default::default()
        }
    }

    #[test]
    fn clean_text_strips_underscore_and_hyphen_runs() {
        assert_eq!(clean_text("1234-5"), "12345");
        assert_eq!(clean_text("  _Ремонт_ "), "Ремонт");
        assert_eq!(clean_text("a--b__c"), "abc");
        assert_eq!(clean_text("ТЭМ2"), "ТЭМ2");
        for text in ["_ x -", "--", "Ab_-cD", " - ", ""] {
            assert_eq!(clean_text(&clean_text(text)), clean_text(text));
        }
    }

    #[test]
    fn time_of_day_accepts_only_hour_minute_shapes() {
        let parse = |s: &str| parse_time_of_day(&EnumCellValue::from(s));
        assert_eq!(parse("9:5"), "");
        assert_eq!(parse("09:05"), "09:05");
        assert_eq!(parse("9:05"), "09:05");
        assert_eq!(parse("9:05:30"), "09:05");
        assert_eq!(parse(" 14:30 "), "14:30");
        assert_eq!(parse("123:00"), "");
        assert_eq!(parse("9:05:3"), "");
        assert_eq!(parse(""), "");
        assert_eq!(parse_time_of_day(&EnumCellValue::Number(0.375)), "");
        assert_eq!(parse_time_of_day(&EnumCellValue::None), "");
    }

    #[test]
    fn completion_percent_truncates() {
        assert_eq!(parse_completion_percent(&EnumCellValue::Number(0.5)), Some(50));
        assert_eq!(parse_completion_percent(&EnumCellValue::Number(1.0)), Some(100));
        assert_eq!(parse_completion_percent(&EnumCellValue::Number(0.999)), Some(99));
        assert_eq!(parse_completion_percent(&EnumCellValue::from("0,25")), Some(25));
        assert_eq!(parse_completion_percent(&EnumCellValue::from("половина")), None);
        assert_eq!(parse_completion_percent(&EnumCellValue::None), None);
    }

    #[test]
    fn quantity_keeps_counts_and_text() {
        assert_eq!(
            parse_quantity(&EnumCellValue::Number(3.0)),
            Some(EnumQuantity::Count(3))
        );
        assert_eq!(
            parse_quantity(&EnumCellValue::from(" 2 ")),
            Some(EnumQuantity::Count(2))
        );
        assert_eq!(
            parse_quantity(&EnumCellValue::from("2 шт")),
            Some(EnumQuantity::Text("2 шт".to_string()))
        );
        assert_eq!(parse_quantity(&EnumCellValue::from("  ")), None);
    }

    #[test]
    fn plan_rows_need_locomotive_and_work_name() {
        let schema = derive_default_plan_schema();
        for row in [
            derive_raw_row(EnumCellValue::None, EnumCellValue::from("Ремонт")),
            derive_raw_row(EnumCellValue::from("1234"), EnumCellValue::from("   ")),
            derive_raw_row(EnumCellValue::from("1234"), EnumCellValue::None),
        ] {
            assert_eq!(derive_row_verdict(&row, &schema), EnumRowVerdict::Insignificant);
            assert_eq!(normalize_row(&row, &schema), None);
        }
    }

    #[test]
    fn punctuation_only_work_name_is_kept_with_empty_text() {
        let schema = derive_default_plan_schema();
        for c_work_name in ["__", "-", " _-_ "] {
            let row =
                derive_raw_row(EnumCellValue::from("1234"), EnumCellValue::from(c_work_name));
            let EnumRowVerdict::Accepted(normalized) = derive_row_verdict(&row, &schema) else {
                panic!("work name {c_work_name:?} should be significant");
            };
            assert_eq!(normalized.item.work_name, "");
            assert_eq!(normalized.locomotive.as_str(), "1234");
        }
    }

    #[test]
    fn plan_row_normalizes_and_is_idempotent() {
        let schema = derive_default_plan_schema();
        let row = SpecRawRow {
            locomotive: EnumCellValue::from("1234-5"),
            work_name: EnumCellValue::from("_Ремонт_"),
            completion: EnumCellValue::Number(0.5),
            time_start: EnumCellValue::from("8:00"),
            time_end: EnumCellValue::from("17:00:00"),
            ..Default::default()
        };
        let normalized = normalize_row(&row, &schema).expect("accepted");
        assert_eq!(normalized.locomotive.as_str(), "12345");
        assert_eq!(normalized.item.work_name, "Ремонт");
        assert_eq!(normalized.item.completion, Some(50));
        assert_eq!(normalized.item.time_start, "08:00");
        assert_eq!(normalized.item.time_end, "17:00");

        let row_again = SpecRawRow {
            locomotive: EnumCellValue::from(normalized.locomotive.as_str()),
            work_name: EnumCellValue::from(normalized.item.work_name.as_str()),
            completion: row.completion.clone(),
            time_start: EnumCellValue::from(normalized.item.time_start.as_str()),
            time_end: EnumCellValue::from(normalized.item.time_end.as_str()),
            ..Default::default()
        };
        let normalized_again = normalize_row(&row_again, &schema).expect("accepted again");
        assert_eq!(normalized_again.locomotive, normalized.locomotive);
        assert_eq!(normalized_again.item.work_name, normalized.item.work_name);
        assert_eq!(normalized_again.item.time_start, normalized.item.time_start);
    }

    #[test]
    fn qc_marker_rules_split_the_products() {
        let mut row = derive_raw_row(EnumCellValue::from("0001"), EnumCellValue::from("Вал"));
        row.qc_marker = EnumCellValue::Number(2.0);

        let schema_plan = derive_default_plan_schema();
        assert_eq!(derive_row_verdict(&row, &schema_plan), EnumRowVerdict::Excluded);

        let schema_qc = derive_default_qc_schema();
        let normalized = normalize_row(&row, &schema_qc).expect("qc row");
        assert_eq!(normalized.item.quantity, Some(EnumQuantity::Count(2)));
        assert_eq!(normalized.item.product_number, "0001");

        row.qc_marker = EnumCellValue::None;
        assert_eq!(derive_row_verdict(&row, &schema_qc), EnumRowVerdict::Excluded);
        assert!(should_keep_by_qc_marker(&row, EnumQcMarkerRule::Ignore));
    }

    #[test]
    fn alphanumeric_rule_rejects_punctuation_only() {
        let rule = EnumSignificanceRule::Alphanumeric;
        assert!(is_significant_row(
            &derive_raw_row(EnumCellValue::Number(12.0), EnumCellValue::from("Ось")),
            rule
        ));
        assert!(!is_significant_row(
            &derive_raw_row(EnumCellValue::from("--"), EnumCellValue::from("Ось")),
            rule
        ));
        assert!(!is_significant_row(
            &derive_raw_row(EnumCellValue::from("12"), EnumCellValue::from(" _ ")),
            rule
        ));
    }

    #[test]
    fn target_date_round_trips() {
        for text in ["01.02.2024", "29.02.2024", "31.12.1999"] {
            let date = parse_target_date(text).expect("valid date");
            assert_eq!(format_target_date(date), text);
        }
        for text in ["1.02.2024", "2024-02-01", "30.02.2024", "01.02.24", "", "01.02.2024x"] {
            assert!(matches!(
                parse_target_date(text),
                Err(ReportError::InvalidDate(_))
            ));
        }
    }

    #[test]
    fn sheet_names_carry_month_and_day() {
        let date = parse_target_date("05.03.2024").expect("date");
        assert_eq!(format_sheet_name(date), "05.03");
        assert_eq!(parse_sheet_name_date("05.03"), Some((3, 5)));
        assert_eq!(parse_sheet_name_date("29.02"), Some((2, 29)));
        assert_eq!(parse_sheet_name_date("31.04"), None);
        assert_eq!(parse_sheet_name_date("Итоги"), None);
        assert_eq!(parse_sheet_name_date("05.03.2024"), None);
    }

    #[test]
    fn embedded_date_is_found_in_text_and_date_cells() {
        let matcher = SpecEmbeddedDateMatcher::new().expect("matcher");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("date");
        assert_eq!(
            matcher.derive_embedded_date(&EnumCellValue::from("Сменное задание на 05.03.2024 г.")),
            Some(date)
        );
        assert_eq!(
            matcher.derive_embedded_date(&EnumCellValue::DateTime(
                date.and_hms_opt(0, 0, 0).expect("dt")
            )),
            Some(date)
        );
        assert_eq!(matcher.derive_embedded_date(&EnumCellValue::from("99.99.2024")), None);
        assert_eq!(matcher.derive_embedded_date(&EnumCellValue::Number(5.0)), None);
    }
}
