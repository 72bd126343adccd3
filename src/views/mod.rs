//! Sub-views reached from the Dashboard. Each one receives the selected
//! dataset's canonical path and loads the file itself through the session's
//! table cache.

pub mod geospatial;
pub mod multiple;
pub mod visualization;

pub use geospatial::to_geojson;
pub use multiple::{compare, DatasetComparison};
pub use visualization::{render_plot, PlotKind, PlotRequest, VisualizationOptions};

/// Question sent to the query agent by the AI visualization assistant.
pub fn ai_visualization_question(query: &str) -> String {
    format!("Generate a visualization based on this query: {}", query.trim())
}
