/// History selection and spreadsheet export
///
/// Users mark records in their history and download the marked set as an
/// XLSX workbook. The selection lives in the per-user session; this module
/// owns the selection set itself plus the workbook rendering.
///
/// # Workbook Layout
///
/// One sheet named "Inventario" with a header row and one row per
/// selected record:
///
/// | Product | Quantity | User | Date | Photo URL |
///
/// Records without a photo render "no photo" in the last column.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashSet;
use stocklens_shared::models::record::InventoryRecord;
use uuid::Uuid;

/// Export error types
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Workbook serialization failed
    #[error("Workbook rendering failed: {0}")]
    Render(String),
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Render(err.to_string())
    }
}

/// Set of record IDs marked for export
///
/// Toggling is self-inverse: toggling the same ID twice restores the
/// previous state.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: HashSet<Uuid>,
}

impl Selection {
    /// Creates an empty selection
    pub fn new() -> Self {
        Selection::default()
    }

    /// Flips one record in or out of the selection
    pub fn toggle(&mut self, id: Uuid) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Replaces the selection with the given IDs
    pub fn select_all<I: IntoIterator<Item = Uuid>>(&mut self, ids: I) {
        self.ids = ids.into_iter().collect();
    }

    /// Empties the selection
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// True when nothing is selected
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when the given record is selected
    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    /// Number of selected records
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// One spreadsheet row, already formatted for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub product: String,
    pub quantity: i64,
    pub user: String,
    pub date: String,
    pub photo: String,
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Projects the selected records into export rows
///
/// Row order follows `records`, so passing history (newest first) keeps
/// the workbook in the same order the user sees on screen.
pub fn export_rows(records: &[InventoryRecord], selection: &Selection) -> Vec<ExportRow> {
    records
        .iter()
        .filter(|r| selection.contains(r.id))
        .map(|r| ExportRow {
            product: r.label.clone(),
            quantity: r.count,
            user: r.user_email.clone(),
            date: format_date(r.created_at),
            photo: r
                .photo_url
                .clone()
                .unwrap_or_else(|| "no photo".to_string()),
        })
        .collect()
}

const COLUMNS: [(&str, f64); 5] = [
    ("Product", 25.0),
    ("Quantity", 10.0),
    ("User", 30.0),
    ("Date", 22.0),
    ("Photo URL", 60.0),
];

/// Renders rows into XLSX bytes
///
/// # Errors
///
/// Returns `ExportError::Render` if workbook serialization fails
pub fn render_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Inventario")?;

    let header_format = Format::new().set_bold();

    for (col, (title, width)) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, *width)?;
        sheet.write_with_format(0, col, *title, &header_format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write(r, 0, row.product.as_str())?;
        sheet.write(r, 1, row.quantity)?;
        sheet.write(r, 2, row.user.as_str())?;
        sheet.write(r, 3, row.date.as_str())?;
        sheet.write(r, 4, row.photo.as_str())?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Download filename carrying the export date
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("inventario_{}.xlsx", now.format("%Y-%m-%d"))
}
