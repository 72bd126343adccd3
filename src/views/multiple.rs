//! Registry-wide overview for the Multiple CSVs view.

use serde::Serialize;

use crate::data_registry::DatasetRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnPresence {
    pub column: String,
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetComparison {
    pub datasets: Vec<DatasetSummary>,
    /// Columns present in every dataset, in first-dataset order.
    pub shared_columns: Vec<String>,
    pub columns: Vec<ColumnPresence>,
}

pub fn compare(registry: &DatasetRegistry) -> DatasetComparison {
    let selected = registry.selected_name();

    let datasets = registry
        .iter()
        .map(|d| DatasetSummary {
            name: d.display_name.clone(),
            row_count: d.row_count,
            column_count: d.column_count,
            selected: selected == Some(d.display_name.as_str()),
        })
        .collect();

    let mut columns: Vec<ColumnPresence> = Vec::new();
    for dataset in registry.iter() {
        for column in &dataset.columns {
            match columns.iter_mut().find(|p| &p.column == column) {
                Some(presence) => {
                    if !presence.datasets.contains(&dataset.display_name) {
                        presence.datasets.push(dataset.display_name.clone());
                    }
                }
                None => columns.push(ColumnPresence {
                    column: column.clone(),
                    datasets: vec![dataset.display_name.clone()],
                }),
            }
        }
    }

    let shared_columns = if registry.is_empty() {
        Vec::new()
    } else {
        columns
            .iter()
            .filter(|p| p.datasets.len() == registry.len())
            .map(|p| p.column.clone())
            .collect()
    };

    DatasetComparison {
        datasets,
        shared_columns,
        columns,
    }
}
