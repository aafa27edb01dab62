//! Deployment constants and default product schemas.

use std::path::PathBuf;

use depotkit_io_xlsx::EnumFmtKey;

use crate::spec::{
    EnumConflictPolicy, EnumGroupingMode, EnumOutputField, EnumQcMarkerRule, EnumSheetMatchRule,
    EnumSignificanceRule, SpecColumnRef, SpecOutputColumn, SpecProductSchema, SpecSourceColumns,
    SpecTitleLine,
};

/// Workshop codes, in scan order.
pub const L_WORKSHOPS_DEFAULT: [&str; 4] = ["ЦКТ", "ЦПМ", "МСЦ", "ЭМУ"];
/// Root holding one sub-directory per workshop.
pub const C_INPUT_ROOT_DEFAULT: &str = r"D:\Сменные задания+заявки ОТК";
/// Plan workbook destination.
pub const C_PLAN_OUTPUT_DEFAULT: &str =
    r"D:\Сменные задания+заявки ОТК\План-задание по цехам\План-задание.xlsx";
/// QC request workbook destination.
pub const C_QC_OUTPUT_DEFAULT: &str = r"D:\Сменные задания+заявки ОТК\Заявки ОТК\Заявка_ОТК.xlsx";

/// Source file name pattern.
pub const C_PATTERN_SOURCE_FILE: &str = "*.xlsx";
/// Lock/temporary files written by the spreadsheet application.
pub const C_PATTERN_TEMP_FILE: &str = "~$*";
/// Zero-based row holding the source column labels.
pub const N_HEADER_ROW_IDX_DEFAULT: usize = 2;
/// Cell carrying the sheet date for embedded-date matching.
pub const C_DATE_CELL_DEFAULT: &str = "A1";

/// User-facing date format.
pub const C_FMT_DATE: &str = "%d.%m.%Y";
/// Output sheet name format.
pub const C_FMT_SHEET_NAME: &str = "%d.%m";
/// Interactive date prompt.
pub const C_PROMPT_DATE: &str = "Введите нужную дату в формате дд.мм.гггг";
/// Message for a malformed date.
pub const C_MSG_INVALID_DATE: &str =
    "Неверный формат даты. Пожалуйста, используйте формат дд.мм.гггг.";

/// Lone placeholder values treated as empty by trailing cleanup.
pub const L_PLACEHOLDERS: [&str; 2] = ["_", "-"];

/// Source column labels.
pub const C_LABEL_LOCOMOTIVE: &str = "№ тепловоза";
pub const C_LABEL_WORK_NAME: &str = "Наименование";
pub const C_LABEL_COMPLETION: &str = "Процент выполнения работы";
pub const C_LABEL_QC_MARKER: &str = "Количество номенклатуры предъявляемая ОТК";
pub const C_LABEL_PLAN: &str = "План";

/// Default source column table.
pub fn derive_default_source_columns() -> SpecSourceColumns {
    SpecSourceColumns {
        locomotive: SpecColumnRef::new(C_LABEL_LOCOMOTIVE, 0),
        work_name: SpecColumnRef::new(C_LABEL_WORK_NAME, 0),
        completion: SpecColumnRef::new(C_LABEL_COMPLETION, 0),
        qc_marker: SpecColumnRef::new(C_LABEL_QC_MARKER, 0),
        time_start: SpecColumnRef::new(C_LABEL_PLAN, 0),
        time_end: SpecColumnRef::new(C_LABEL_PLAN, 1),
    }
}

fn derive_column(caption: &str, field: EnumOutputField, width: f64) -> SpecOutputColumn {
    SpecOutputColumn {
        caption: caption.to_string(),
        field,
        width,
        fmt: None,
    }
}

/// Plan product: one sheet per date, locomotive -> workshop -> work items.
pub fn derive_default_plan_schema() -> SpecProductSchema {
    SpecProductSchema {
        sheet_match: EnumSheetMatchRule::EmbeddedDate,
        significance: EnumSignificanceRule::NonBlank,
        qc_marker: EnumQcMarkerRule::Exclude,
        grouping: EnumGroupingMode::Nested,
        merge_levels: vec![EnumOutputField::Locomotive, EnumOutputField::Workshop],
        columns: vec![
            derive_column("№ тепловоза", EnumOutputField::Locomotive, 20.0),
            derive_column("Цех", EnumOutputField::Workshop, 20.0),
            derive_column("Наименование работ", EnumOutputField::WorkName, 50.0),
            derive_column("% выполнения", EnumOutputField::Completion, 14.0),
            derive_column("Начало", EnumOutputField::TimeStart, 10.0),
            derive_column("Окончание", EnumOutputField::TimeEnd, 10.0),
        ],
        titles: vec![SpecTitleLine::new(
            "План-задание на %d.%m.%Y",
            EnumFmtKey::Title.as_str(),
        )],
        header_gap: false,
        footer: None,
        output_path: PathBuf::from(C_PLAN_OUTPUT_DEFAULT),
        conflict_policy: EnumConflictPolicy::Replace,
    }
}

/// QC request product: one sheet per date, flat list sorted by workshop.
pub fn derive_default_qc_schema() -> SpecProductSchema {
    let mut col_workshop = derive_column("Наименование цеха", EnumOutputField::Workshop, 20.0);
    col_workshop.fmt = Some(EnumFmtKey::TextBold.as_str().to_string());

    SpecProductSchema {
        sheet_match: EnumSheetMatchRule::SheetName,
        significance: EnumSignificanceRule::Alphanumeric,
        qc_marker: EnumQcMarkerRule::Require,
        grouping: EnumGroupingMode::FlatByWorkshop,
        merge_levels: vec![EnumOutputField::Workshop],
        columns: vec![
            derive_column(
                "Наименование предъявляемой продукции",
                EnumOutputField::WorkName,
                40.0,
            ),
            derive_column("№ продукции", EnumOutputField::ProductNumber, 20.0),
            derive_column("Количество", EnumOutputField::Quantity, 15.0),
            col_workshop,
            derive_column("Начало", EnumOutputField::TimeStart, 10.0),
            derive_column("Окончание", EnumOutputField::TimeEnd, 10.0),
        ],
        titles: vec![
            SpecTitleLine::new("ЗАЯВКА", EnumFmtKey::Title.as_str()),
            SpecTitleLine::new(
                "на предъявление и сдачу продукции ОТК",
                EnumFmtKey::Caption.as_str(),
            ),
            SpecTitleLine::new("на «%d» _%m_ %Y года.", EnumFmtKey::Caption.as_str()),
        ],
        header_gap: true,
        footer: Some("Начальник смены".to_string()),
        output_path: PathBuf::from(C_QC_OUTPUT_DEFAULT),
        conflict_policy: EnumConflictPolicy::Replace,
    }
}
