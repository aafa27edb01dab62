//! Grouping of normalized rows into output order.

use std::collections::HashMap;

use crate::spec::{
    EnumGroupingMode, LocomotiveNumber, SpecCollectedRow, SpecReportRow, SpecWorkItem,
    WorkshopCode,
};

/// Items of one workshop under one locomotive; never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecWorkshopGroup {
    pub workshop: WorkshopCode,
    pub items: Vec<SpecWorkItem>,
}

/// Workshops of one locomotive, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLocomotiveGroup {
    pub locomotive: LocomotiveNumber,
    pub workshops: Vec<SpecWorkshopGroup>,
}

/// Ordered locomotive -> workshop -> items mapping.
///
/// Insertion order is first-encountered order at both levels; items are
/// appended and never reordered or deduplicated.
#[derive(Debug, Clone, Default)]
pub struct AggregationTable {
    l_groups: Vec<SpecLocomotiveGroup>,
    dict_idx_by_locomotive: HashMap<LocomotiveNumber, usize>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` under `(locomotive, workshop)`, creating either level on
    /// first sight.
    pub fn push(
        &mut self,
        locomotive: LocomotiveNumber,
        workshop: WorkshopCode,
        item: SpecWorkItem,
    ) {
        let n_idx = match self.dict_idx_by_locomotive.get(&locomotive) {
            Some(n_idx) => *n_idx,
            None => {
                let n_idx = self.l_groups.len();
                self.dict_idx_by_locomotive.insert(locomotive.clone(), n_idx);
                self.l_groups.push(SpecLocomotiveGroup {
                    locomotive,
                    workshops: Vec::new(),
                });
                n_idx
            }
        };

        let l_workshops = &mut self.l_groups[n_idx].workshops;
        match l_workshops.iter_mut().find(|group| group.workshop == workshop) {
            Some(group) => group.items.push(item),
            None => l_workshops.push(SpecWorkshopGroup {
                workshop,
                items: vec![item],
            }),
        }
    }

    /// Locomotive groups in first-seen order.
    pub fn groups(&self) -> &[SpecLocomotiveGroup] {
        &self.l_groups
    }

    /// Number of locomotives.
    pub fn len(&self) -> usize {
        self.l_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_groups.is_empty()
    }

    /// Flatten into output rows: locomotive, then workshop, then item order.
    pub fn into_rows(self) -> Vec<SpecReportRow> {
        let mut l_rows = Vec::new();
        for group in self.l_groups {
            for group_workshop in group.workshops {
                for item in group_workshop.items {
                    l_rows.push(SpecReportRow {
                        locomotive: group.locomotive.clone(),
                        workshop: group_workshop.workshop.clone(),
                        item,
                    });
                }
            }
        }
        l_rows
    }
}

impl FromIterator<SpecCollectedRow> for AggregationTable {
    fn from_iter<I: IntoIterator<Item = SpecCollectedRow>>(iter: I) -> Self {
        let mut table = AggregationTable::new();
        for row_collected in iter {
            table.push(
                row_collected.row.locomotive,
                row_collected.workshop,
                row_collected.row.item,
            );
        }
        table
    }
}

/// Arrival order, stable-sorted by workshop code.
pub fn derive_flat_rows(rows: Vec<SpecCollectedRow>) -> Vec<SpecReportRow> {
    let mut l_rows: Vec<SpecReportRow> = rows
        .into_iter()
        .map(|row_collected| SpecReportRow {
            locomotive: row_collected.row.locomotive,
            workshop: row_collected.workshop,
            item: row_collected.row.item,
        })
        .collect();
    l_rows.sort_by(|a, b| a.workshop.cmp(&b.workshop));
    l_rows
}

/// Output rows of one run under the product's grouping mode.
pub fn aggregate_rows(
    rows: Vec<SpecCollectedRow>,
    grouping: EnumGroupingMode,
) -> Vec<SpecReportRow> {
    match grouping {
        EnumGroupingMode::Nested => rows.into_iter().collect::<AggregationTable>().into_rows(),
        EnumGroupingMode::FlatByWorkshop => derive_flat_rows(rows),
    }
}
