//! Passenger CSV loading and the typed records built from it

use crate::error::Error;
use log::{debug, warn};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const AGE: &str = "Age";
pub const GENDER: &str = "Gender";
pub const CUSTOMER_TYPE: &str = "Customer Type";
pub const TRAVEL_TYPE: &str = "Type of Travel";
pub const CLASS: &str = "Class";
pub const FLIGHT_DISTANCE: &str = "Flight Distance";
pub const DEPARTURE_DELAY: &str = "Departure Delay in Minutes";
pub const ARRIVAL_DELAY: &str = "Arrival Delay in Minutes";
pub const SATISFACTION: &str = "satisfaction";

/// The 14 service-rating columns, in dataset order
pub const SERVICE_COLUMNS: [&str; 14] = [
    "Inflight wifi service",
    "Departure/Arrival time convenient",
    "Ease of Online booking",
    "Gate location",
    "Food and drink",
    "Online boarding",
    "Seat comfort",
    "Inflight entertainment",
    "On-board service",
    "Leg room service",
    "Baggage handling",
    "Checkin service",
    "Inflight service",
    "Cleanliness",
];

/// Columns a segmentation upload must carry
pub const SEGMENT_REQUIRED_COLUMNS: [&str; 5] =
    [AGE, CUSTOMER_TYPE, TRAVEL_TYPE, CLASS, FLIGHT_DISTANCE];

/// An uploaded CSV kept as text so every original column survives to the output file
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl PassengerTable {
    /// Every row must carry one cell per header; rows are reported 1-based
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> crate::Result<Self> {
        if let Some(i) = rows.iter().position(|row| row.len() != headers.len()) {
            return Err(Error::RowWidth {
                row: i + 1,
                expected: headers.len(),
                actual: rows[i].len(),
            });
        }
        Ok(Self { headers, rows })
    }

    /// Load a CSV file with a header row
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let table = Self::from_reader(File::open(path)?)?;
        debug!(
            "Loaded {} rows x {} columns from {}",
            table.len(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> crate::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Fail with every absent column named, before any row is touched
    pub fn require_columns(&self, names: &[&str]) -> crate::Result<()> {
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumns { missing })
        }
    }

    fn index_of(&self, name: &str) -> crate::Result<usize> {
        self.column_index(name).ok_or_else(|| Error::MissingColumns {
            missing: vec![name.to_string()],
        })
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(String::as_str)
    }

    pub fn str_column(&self, name: &str) -> crate::Result<Vec<&str>> {
        let idx = self.index_of(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Parse a column as finite numbers; rows are reported 1-based
    pub fn numeric_column(&self, name: &str) -> crate::Result<Vec<f64>> {
        let idx = self.index_of(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_number(&row[idx], i + 1, name))
            .collect()
    }

    /// Like [`numeric_column`](Self::numeric_column) but empty cells take `fill`
    pub fn numeric_column_or(&self, name: &str, fill: f64) -> crate::Result<Vec<f64>> {
        let idx = self.index_of(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row[idx].trim().is_empty() {
                    Ok(fill)
                } else {
                    parse_number(&row[idx], i + 1, name)
                }
            })
            .collect()
    }

    /// Replace the column if it already exists, otherwise append it
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// A new table holding only the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// A new table with only the named columns that exist, in the order given
    pub fn project(&self, names: &[&str]) -> Self {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        Self {
            headers: indices.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    pub fn write_to<W: Write>(&self, writer: W) -> crate::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_path(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        self.write_to(File::create(path)?)
    }
}

fn parse_number(raw: &str, row: usize, column: &str) -> crate::Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::InvalidValue {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// The 14 service ratings of one passenger, each validated to lie in 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRatings([u8; 14]);

impl ServiceRatings {
    pub fn new(values: [u8; 14]) -> crate::Result<Self> {
        for (service, &value) in SERVICE_COLUMNS.iter().zip(values.iter()) {
            if !(1..=5).contains(&value) {
                return Err(Error::InvalidRating {
                    service: service.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(Self(values))
    }

    /// Parse ratings given in [`SERVICE_COLUMNS`] order; "4" and "4.0" are both accepted
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> crate::Result<Self> {
        if raw.len() != SERVICE_COLUMNS.len() {
            return Err(Error::InvalidParameter {
                name: "ratings",
                value: raw.len().to_string(),
                reason: "expected exactly 14 service ratings",
            });
        }

        let mut values = [0u8; 14];
        for (i, text) in raw.iter().enumerate() {
            let text = text.as_ref().trim();
            values[i] = text
                .parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && (1.0..=5.0).contains(v))
                .map(|v| v as u8)
                .ok_or_else(|| Error::InvalidRating {
                    service: SERVICE_COLUMNS[i].to_string(),
                    value: text.to_string(),
                })?;
        }
        Ok(Self(values))
    }

    pub fn get(&self, index: usize) -> u8 {
        self.0[index]
    }

    pub fn values(&self) -> &[u8; 14] {
        &self.0
    }
}

/// One passenger as the segmentation pipeline sees it
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerRecord {
    pub age: f64,
    pub customer_type: String,
    pub travel_type: String,
    pub class: String,
    pub flight_distance: f64,
    /// Absent when the upload carries no rating columns
    pub ratings: Option<ServiceRatings>,
}

/// Build one record per row, in row order
///
/// Rating columns are all-or-nothing: a file with none of them yields records
/// without ratings, a file with only some of them is rejected.
pub fn passenger_records(table: &PassengerTable) -> crate::Result<Vec<PassengerRecord>> {
    table.require_columns(&SEGMENT_REQUIRED_COLUMNS)?;

    let present = SERVICE_COLUMNS.iter().filter(|c| table.has_column(c)).count();
    let with_ratings = match present {
        0 => {
            warn!("Upload has no service rating columns; recommendations will be empty");
            false
        }
        n if n == SERVICE_COLUMNS.len() => true,
        _ => table.require_columns(&SERVICE_COLUMNS).map(|_| true)?,
    };

    let ages = table.numeric_column(AGE)?;
    let distances = table.numeric_column(FLIGHT_DISTANCE)?;
    let customer_types = table.str_column(CUSTOMER_TYPE)?;
    let travel_types = table.str_column(TRAVEL_TYPE)?;
    let classes = table.str_column(CLASS)?;
    let rating_columns: Vec<Vec<&str>> = if with_ratings {
        SERVICE_COLUMNS
            .iter()
            .map(|c| table.str_column(c))
            .collect::<crate::Result<_>>()?
    } else {
        Vec::new()
    };

    (0..table.len())
        .map(|i| {
            let ratings = if with_ratings {
                let raw: Vec<&str> = rating_columns.iter().map(|col| col[i]).collect();
                Some(ServiceRatings::parse(&raw)?)
            } else {
                None
            };

            Ok(PassengerRecord {
                age: ages[i],
                customer_type: customer_types[i].to_string(),
                travel_type: travel_types[i].to_string(),
                class: classes[i].to_string(),
                flight_distance: distances[i],
                ratings,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,Age,Customer Type,Type of Travel,Class,Flight Distance").unwrap();
        writeln!(file, "1,25,Loyal Customer,Business travel,Business,460").unwrap();
        writeln!(file, "2,61,disloyal Customer,Personal Travel,Eco,2300").unwrap();
        file
    }

    fn rated_table(ratings: &str) -> PassengerTable {
        let mut headers: Vec<String> = SEGMENT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        headers.extend(SERVICE_COLUMNS.iter().map(|c| c.to_string()));
        let mut row: Vec<String> = ["40", "Loyal Customer", "Business travel", "Eco", "900"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        row.extend(ratings.split(',').map(str::to_string));
        PassengerTable::new(headers, vec![row]).unwrap()
    }

    #[test]
    fn test_load_table() {
        let file = create_test_csv();
        let table = PassengerTable::from_path(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.headers().len(), 6);
        assert_eq!(table.cell(1, CLASS), Some("Eco"));
        assert_eq!(table.numeric_column(AGE).unwrap(), vec![25.0, 61.0]);
    }

    #[test]
    fn test_require_columns_reports_all_missing() {
        let file = create_test_csv();
        let table = PassengerTable::from_path(file.path()).unwrap();
        let err = table.require_columns(&[AGE, GENDER, SATISFACTION]).unwrap_err();
        match err {
            Error::MissingColumns { missing } => {
                assert_eq!(missing, vec![GENDER.to_string(), SATISFACTION.to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_numeric_cell() {
        let table = PassengerTable::new(
            vec![AGE.to_string()],
            vec![vec!["31".to_string()], vec!["abc".to_string()]],
        )
        .unwrap();
        let err = table.numeric_column(AGE).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { row: 2, .. }));
    }

    #[test]
    fn test_empty_cells_filled() {
        let table = PassengerTable::new(
            vec![ARRIVAL_DELAY.to_string()],
            vec![vec!["".to_string()], vec!["12".to_string()]],
        )
        .unwrap();
        assert_eq!(table.numeric_column_or(ARRIVAL_DELAY, 0.0).unwrap(), vec![0.0, 12.0]);
    }

    #[test]
    fn test_short_row_rejected() {
        let err = PassengerTable::new(
            vec![AGE.to_string(), CLASS.to_string()],
            vec![vec!["31".to_string(), "Eco".to_string()], vec!["52".to_string()]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::RowWidth {
                row: 2,
                expected: 2,
                actual: 1
            }
        ));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_set_column_replaces_existing() {
        let file = create_test_csv();
        let mut table = PassengerTable::from_path(file.path()).unwrap();
        table.set_column("Assigned Cluster", vec!["0".into(), "1".into()]);
        table.set_column("Assigned Cluster", vec!["2".into(), "3".into()]);
        assert_eq!(table.headers().len(), 7);
        assert_eq!(table.cell(0, "Assigned Cluster"), Some("2"));
    }

    #[test]
    fn test_write_preserves_columns_and_order() {
        let file = create_test_csv();
        let table = PassengerTable::from_path(file.path()).unwrap();
        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        let reloaded = PassengerTable::from_reader(out.as_slice()).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_records_without_ratings() {
        let file = create_test_csv();
        let table = PassengerTable::from_path(file.path()).unwrap();
        let records = passenger_records(&table).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].customer_type, "disloyal Customer");
        assert!(records.iter().all(|r| r.ratings.is_none()));
    }

    #[test]
    fn test_records_with_ratings() {
        let table = rated_table("1,2,3,4,5,1,2,3,4,5,1,2,3.0,4");
        let records = passenger_records(&table).unwrap();
        let ratings = records[0].ratings.unwrap();
        assert_eq!(ratings.get(0), 1);
        assert_eq!(ratings.get(12), 3);
    }

    #[test]
    fn test_rating_out_of_range() {
        let table = rated_table("0,2,3,4,5,1,2,3,4,5,1,2,3,4");
        let err = passenger_records(&table).unwrap_err();
        assert!(matches!(err, Error::InvalidRating { ref service, .. } if service == SERVICE_COLUMNS[0]));
    }

    #[test]
    fn test_partial_rating_columns_rejected() {
        let mut table = PassengerTable::from_path(create_test_csv().path()).unwrap();
        table.set_column(SERVICE_COLUMNS[0], vec!["3".into(), "4".into()]);
        let err = passenger_records(&table).unwrap_err();
        match err {
            Error::MissingColumns { missing } => assert_eq!(missing.len(), 13),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_service_ratings_new_validates() {
        assert!(ServiceRatings::new([3; 14]).is_ok());
        let mut values = [3; 14];
        values[5] = 6;
        assert!(ServiceRatings::new(values).is_err());
    }
}
