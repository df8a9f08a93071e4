/*!
# Report sink
Verification content is built as a sequence of pages and handed to a `ReportSink`, which decides how they are rendered.
The shipped implementation serializes the document to JSON; a PDF or HTML renderer only needs to implement the trait.
*/
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::data_types::table::Table;
use crate::util::json_io::save_json;

/// One pass/fail line on a checklist page
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChecklistItem {
    pub passed: bool,
    pub statement: String
}

impl ChecklistItem {
    /// Rendered form, e.g. "PASSED: <statement>"
    pub fn label(&self) -> String {
        format!("{}: {}", if self.passed { "PASSED" } else { "FAILED" }, self.statement)
    }
}

/// A bar chart of one value per label
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub subtitle: String,
    pub x_label: String,
    pub y_label: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// Fixed y-axis range, auto-scaled if None
    pub y_limits: Option<(f64, f64)>,
    pub caption: Option<String>
}

impl BarChart {
    /// Title shown in the table of contents
    pub fn full_title(&self) -> String {
        if self.subtitle.is_empty() {
            self.title.clone()
        } else {
            format!("{}, {}", self.title, self.subtitle)
        }
    }
}

/// A single page of a report
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPage {
    Checklist { title: String, items: Vec<ChecklistItem> },
    BarChart(BarChart),
    Table { title: String, columns: Vec<String>, rows: Vec<Vec<String>> },
}

impl ReportPage {
    /// Builds a table page from an in-memory table
    pub fn from_table(title: &str, table: &Table) -> Self {
        ReportPage::Table {
            title: title.to_string(),
            columns: table.columns().to_vec(),
            rows: table.rows().iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect()
        }
    }

    pub fn title(&self) -> String {
        match self {
            ReportPage::Checklist { title, .. } => title.clone(),
            ReportPage::BarChart(chart) => chart.full_title(),
            ReportPage::Table { title, .. } => title.clone()
        }
    }
}

/// Consumer of report content; pages are added in order and flushed with `render`.
pub trait ReportSink {
    /// Sets the document title and the free-form details shown on the title page
    fn set_title(&mut self, title: &str, details: &str);

    /// Appends one page
    fn add_page(&mut self, page: ReportPage);

    /// Writes out everything added so far
    /// # Errors
    /// * if the output cannot be written
    fn render(&mut self) -> anyhow::Result<()>;

    fn add_checklist(&mut self, title: &str, items: Vec<ChecklistItem>) {
        self.add_page(ReportPage::Checklist { title: title.to_string(), items });
    }

    fn add_bar_chart(&mut self, chart: BarChart) {
        self.add_page(ReportPage::BarChart(chart));
    }

    fn add_table(&mut self, title: &str, table: &Table) {
        self.add_page(ReportPage::from_table(title, table));
    }
}

/// Table of contents entry, page 1 is the title page and page 2 the contents
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TocEntry {
    pub page: usize,
    pub title: String
}

/// The serialized form of a full report
#[derive(Serialize)]
struct ReportDocument<'a> {
    title: &'a str,
    details: &'a str,
    table_of_contents: Vec<TocEntry>,
    pages: &'a [ReportPage]
}

/// Renders a report as a single JSON document (gzip if the path ends in .gz)
#[derive(Clone, Debug)]
pub struct JsonReportSink {
    filename: PathBuf,
    title: String,
    details: String,
    pages: Vec<ReportPage>
}

impl JsonReportSink {
    /// Constructor
    /// # Arguments
    /// * `filename` - the output JSON path
    pub fn new(filename: &Path) -> Self {
        Self {
            filename: filename.to_path_buf(),
            title: String::new(),
            details: String::new(),
            pages: vec![]
        }
    }

    /// Generates the table of contents from the page titles
    pub fn table_of_contents(&self) -> Vec<TocEntry> {
        self.pages.iter().enumerate()
            .map(|(index, page)| TocEntry {
                page: index + 3,
                title: page.title()
            })
            .collect()
    }

    // getters
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn pages(&self) -> &[ReportPage] {
        &self.pages
    }
}

impl ReportSink for JsonReportSink {
    fn set_title(&mut self, title: &str, details: &str) {
        self.title = title.to_string();
        self.details = details.to_string();
    }

    fn add_page(&mut self, page: ReportPage) {
        self.pages.push(page);
    }

    fn render(&mut self) -> anyhow::Result<()> {
        info!("Saving report with {} pages to {:?}...", self.pages.len(), self.filename);
        let document = ReportDocument {
            title: &self.title,
            details: &self.details,
            table_of_contents: self.table_of_contents(),
            pages: &self.pages
        };
        save_json(&document, &self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::table::Cell;

    #[test]
    fn test_json_sink() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("report.json");
        let mut sink = JsonReportSink::new(&filename);
        sink.set_title("Metrics", "Primary: a.xlsx");
        sink.add_checklist("Aggregation Details", vec![
            ChecklistItem { passed: true, statement: "rows = 4/4".to_string() },
            ChecklistItem { passed: false, statement: "genes".to_string() },
        ]);
        sink.add_bar_chart(BarChart {
            title: "Sample s1".to_string(),
            subtitle: "VAF".to_string(),
            labels: vec!["chr1_1".to_string()],
            values: vec![0.5],
            ..Default::default()
        });
        sink.add_table("Overview", &Table::new(vec!["a".to_string()], vec![vec![Cell::Int(3)]]));

        let toc = sink.table_of_contents();
        assert_eq!(toc.len(), 3);
        assert_eq!(toc[0], TocEntry { page: 3, title: "Aggregation Details".to_string() });
        assert_eq!(toc[1].title, "Sample s1, VAF");
        sink.render().unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&filename).unwrap()).unwrap();
        assert_eq!(value["title"], "Metrics");
        assert_eq!(value["pages"][0]["kind"], "checklist");
        assert_eq!(value["pages"][0]["items"][1]["passed"], false);
        assert_eq!(value["pages"][1]["kind"], "bar_chart");
        assert_eq!(value["pages"][2]["rows"][0][0], "3");
    }

    #[test]
    fn test_checklist_label() {
        let item = ChecklistItem { passed: false, statement: "x".to_string() };
        assert_eq!(item.label(), "FAILED: x");
    }
}
