//! Table formatting for query results and run summaries.

use comfy_table::{
    Attribute, Cell, CellAlignment, Color, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::index::{IndexMetadata, SearchHit};
use crate::pipeline::{EmbedReport, EmbedStatus};

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        Self {
            table: styled_table(),
        }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        self.table.set_header(bold_cells(headers));
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

fn styled_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn bold_cells(headers: Vec<&str>) -> Vec<Cell> {
    headers
        .into_iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
        .collect()
}

/// Ranked query results.
pub fn create_hits_table(hits: &[SearchHit]) -> String {
    let mut table = styled_table();
    table.set_header(bold_cells(vec!["Rank", "Source file", "Chunk", "Distance"]));

    for (rank, hit) in hits.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            Cell::new(&hit.source_file_id),
            Cell::new(hit.ordinal).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.6}", hit.distance)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

/// Per-file outcome of an embed run, with a total row.
pub fn create_embed_summary_table(report: &EmbedReport) -> String {
    let mut table = styled_table();
    table.set_header(bold_cells(vec!["Source file", "Vectors", "Status"]));

    for outcome in &report.files {
        let (vectors, status, color) = match &outcome.status {
            EmbedStatus::Embedded { vectors } => (vectors.to_string(), "saved".to_string(), Color::Green),
            EmbedStatus::SkippedEmpty => ("-".to_string(), "empty, skipped".to_string(), Color::Yellow),
            EmbedStatus::Failed(error) => {
                let first_line = error.to_string().lines().next().unwrap_or_default().to_string();
                ("-".to_string(), format!("failed: {first_line}"), Color::Red)
            }
        };
        table.add_row(vec![
            Cell::new(&outcome.source_file_id),
            Cell::new(vectors).set_alignment(CellAlignment::Right),
            Cell::new(status).fg(color),
        ]);
    }

    for failure in &report.unreadable {
        table.add_row(vec![
            Cell::new(failure.path.display()),
            Cell::new("-").set_alignment(CellAlignment::Right),
            Cell::new("unreadable").fg(Color::Red),
        ]);
    }

    for pruned in &report.pruned {
        table.add_row(vec![
            Cell::new(pruned),
            Cell::new("-").set_alignment(CellAlignment::Right),
            Cell::new("pruned").fg(Color::Yellow),
        ]);
    }

    table.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(report.vector_count())
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
        Cell::new(format!(
            "{} saved, {} failed",
            report.embedded_files(),
            report.failed_files()
        ))
        .add_attribute(Attribute::Bold),
    ]);

    table.to_string()
}

/// Index build summary.
pub fn create_metadata_table(metadata: &IndexMetadata) -> String {
    TableBuilder::new()
        .set_headers(vec!["Property", "Value"])
        .add_row(vec!["Model".to_string(), metadata.model_name.clone()])
        .add_row(vec!["Dimension".to_string(), metadata.dimension.to_string()])
        .add_row(vec!["Vectors".to_string(), metadata.vector_count.to_string()])
        .add_row(vec!["Source files".to_string(), metadata.bundle_count.to_string()])
        .add_row(vec!["Metric".to_string(), "squared L2 (exact)".to_string()])
        .add_row(vec!["Build id".to_string(), format!("{:016x}", metadata.build_id)])
        .add_row(vec!["Built".to_string(), metadata.created_at_display()])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FileOutcome;
    use crate::types::{ChunkOrdinal, SourceFileId};

    #[test]
    fn test_table_builder() {
        let table = TableBuilder::new()
            .set_headers(vec!["Column 1", "Column 2"])
            .add_row(vec!["Value 1".to_string(), "Value 2".to_string()])
            .build();

        assert!(table.contains("Column 1"));
        assert!(table.contains("Value 1"));
    }

    #[test]
    fn test_hits_table() {
        let hits = vec![SearchHit {
            source_file_id: SourceFileId::new("a.txt").unwrap(),
            ordinal: ChunkOrdinal::new(2).unwrap(),
            distance: 1.5,
        }];
        let table = create_hits_table(&hits);
        assert!(table.contains("a.txt"));
        assert!(table.contains("1.500000"));
    }

    #[test]
    fn test_embed_summary_totals() {
        let report = EmbedReport {
            files: vec![
                FileOutcome {
                    source_file_id: SourceFileId::new("a.txt").unwrap(),
                    status: EmbedStatus::Embedded { vectors: 3 },
                },
                FileOutcome {
                    source_file_id: SourceFileId::new("b.txt").unwrap(),
                    status: EmbedStatus::SkippedEmpty,
                },
            ],
            ..Default::default()
        };
        let table = create_embed_summary_table(&report);
        assert!(table.contains("TOTAL"));
        assert!(table.contains("1 saved, 0 failed"));
        assert!(table.contains("empty, skipped"));
    }
}
