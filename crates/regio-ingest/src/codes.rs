use std::collections::BTreeSet;
use std::path::Path;

use regio_model::{CodeFormat, RegionCode};

use crate::csv_table::read_csv_table;
use crate::error::{IngestError, Result};

const CODE_ALIASES: &[&str] = &["code", "region_code", "Region", "kode"];

/// Read a list of region codes from the `code` column (or the first column
/// when no known header is present).
pub fn read_code_list(path: &Path, format: &CodeFormat) -> Result<BTreeSet<RegionCode>> {
    let table = read_csv_table(path)?;
    if table.headers.is_empty() {
        return Err(table.missing_column(CODE_ALIASES[0]));
    }
    let idx = table.find_column(CODE_ALIASES).unwrap_or(0);
    let column = table.headers[idx].clone();
    let mut codes = BTreeSet::new();
    for row in &table.rows {
        let raw = row.get(idx);
        if raw.is_empty() {
            continue;
        }
        let code = format
            .normalize(raw)
            .map_err(|err| IngestError::invalid(path, row.line, &column, err.to_string()))?;
        codes.insert(code);
    }
    Ok(codes)
}
