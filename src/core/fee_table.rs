use crate::domain::model::{normalize_township, FeeRecord};
use crate::utils::error::{PermitError, Result};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Header positions of the fee table columns. Only `Township` is required.
struct Columns {
    township: usize,
    furnace: Option<usize>,
    ac_new: Option<usize>,
    ac_replace: Option<usize>,
    boiler: Option<usize>,
    combined: Option<usize>,
    separate: Option<usize>,
    special: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let township = find("Township").ok_or_else(|| PermitError::InvalidData {
            message: "Fee table has no 'Township' column".to_string(),
        })?;
        Ok(Self {
            township,
            furnace: find("Furnace_Cost"),
            ac_new: find("AC_New_Cost"),
            ac_replace: find("AC_Replace_Cost"),
            boiler: find("Boiler_Cost"),
            combined: find("FAC_Cost"),
            separate: find("Separate"),
            special: find("Special_Calc"),
        })
    }

    /// Missing columns and cells past the end of a short row read as "".
    fn cell<'r>(row: &'r StringRecord, index: Option<usize>) -> &'r str {
        index.and_then(|i| row.get(i)).unwrap_or("")
    }

    fn record(&self, row: &StringRecord) -> FeeRecord {
        FeeRecord {
            township: Self::cell(row, Some(self.township)).trim().to_string(),
            furnace: parse_cost(Self::cell(row, self.furnace)),
            ac_new: parse_cost(Self::cell(row, self.ac_new)),
            ac_replace: parse_cost(Self::cell(row, self.ac_replace)),
            boiler: parse_cost(Self::cell(row, self.boiler)),
            combined: parse_cost(Self::cell(row, self.combined)),
            separate: parse_flag(Self::cell(row, self.separate)),
            special: parse_flag(Self::cell(row, self.special)),
        }
    }
}

/// Empty or malformed cells count as no cost.
pub fn parse_cost(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(0.0)
}

fn parse_flag(cell: &str) -> bool {
    cell.trim().eq_ignore_ascii_case("yes")
}

#[derive(Debug, Clone, Default)]
pub struct FeeTable {
    records: BTreeMap<String, FeeRecord>,
}

impl FeeTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_reader(file)?;
        tracing::debug!(
            "Loaded {} townships from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = Columns::from_headers(reader.headers()?)?;

        let mut records = BTreeMap::new();
        for row in reader.records() {
            let record = columns.record(&row?);
            if record.township.is_empty() {
                continue;
            }
            // later rows replace earlier ones with the same key
            records.insert(record.key(), record);
        }

        Ok(Self { records })
    }

    pub fn from_records<I: IntoIterator<Item = FeeRecord>>(records: I) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key(), r)).collect(),
        }
    }

    pub fn get(&self, township: &str) -> Option<&FeeRecord> {
        self.records.get(&normalize_township(township))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeeRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Township,Furnace_Cost,AC_New_Cost,AC_Replace_Cost,Boiler_Cost,FAC_Cost,Separate,Special_Calc,Notes
Amherst town,45,45,45,45,45,no,yes,
Tonawanda town,60,75,50,60,60,yes,no,call first
Kenmore,,n/a,30,40,,No,
";

    #[test]
    fn test_loads_rows_by_header_name() {
        let table = FeeTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let tonawanda = table.get("TONAWANDA TOWN").unwrap();
        assert_eq!(tonawanda.township, "Tonawanda town");
        assert_eq!(tonawanda.furnace, 60.0);
        assert_eq!(tonawanda.ac_new, 75.0);
        assert_eq!(tonawanda.ac_replace, 50.0);
        assert!(tonawanda.separate);
        assert!(!tonawanda.special);

        assert!(table.get("amherst town").unwrap().special);
    }

    #[test]
    fn test_malformed_and_empty_cells_are_zero() {
        let table = FeeTable::from_reader(SAMPLE.as_bytes()).unwrap();
        let kenmore = table.get("kenmore").unwrap();
        assert_eq!(kenmore.furnace, 0.0);
        assert_eq!(kenmore.ac_new, 0.0);
        assert_eq!(kenmore.ac_replace, 30.0);
        assert_eq!(kenmore.combined, 0.0);
        assert!(!kenmore.separate);
        assert!(!kenmore.special);
    }

    #[test]
    fn test_missing_optional_columns_default() {
        let csv_text = "Township,Furnace_Cost\nDepew,25\n";
        let table = FeeTable::from_reader(csv_text.as_bytes()).unwrap();
        let depew = table.get("depew").unwrap();
        assert_eq!(depew.furnace, 25.0);
        assert_eq!(depew.boiler, 0.0);
        assert!(!depew.separate);
    }

    #[test]
    fn test_short_rows_fill_missing_cells_with_zero() {
        let csv_text = "\
Township,Furnace_Cost,AC_New_Cost,AC_Replace_Cost,Boiler_Cost,FAC_Cost,Separate,Special_Calc
Depew,25,,,,,no
Sloan,30
";
        let table = FeeTable::from_reader(csv_text.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let depew = table.get("depew").unwrap();
        assert_eq!(depew.furnace, 25.0);
        assert!(!depew.special);

        let sloan = table.get("sloan").unwrap();
        assert_eq!(sloan.furnace, 30.0);
        assert_eq!(sloan.boiler, 0.0);
        assert!(!sloan.separate);
    }

    #[test]
    fn test_missing_township_column_is_an_error() {
        let csv_text = "Town,Furnace_Cost\nDepew,25\n";
        assert!(FeeTable::from_reader(csv_text.as_bytes()).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = FeeTable::from_path(file.path()).unwrap();
        assert!(table.get("Kenmore").is_some());
        assert!(table.get("Lockport city").is_none());
    }
}
