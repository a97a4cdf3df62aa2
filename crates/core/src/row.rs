//! Spreadsheet cells and the named-field rows decoded from them.
//!
//! Tables arrive as `Vec<Vec<CellValue>>` with a header at index 0. Rows are
//! decoded once, right after the fetch, into [`TenderRow`] / [`UserRow`]; a
//! row too short to carry a column the pipeline reads fails with
//! [`SchemaError::MissingColumn`] instead of failing later inside matching.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// A raw spreadsheet cell as returned by the values API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Empty,
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            // Integral numbers print without a fractional part ("100", not "100.0").
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Boolean(b) => write!(f, "{b}"),
            CellValue::Empty => Ok(()),
        }
    }
}

/// Stringify, lowercase and trim a cell value.
///
/// Every location, state and material comparison goes through this.
pub fn normalize(cell: &str) -> String {
    cell.to_lowercase().trim().to_string()
}

// ── Column layout ─────────────────────────────────────────────

mod tender_col {
    pub const NAME: usize = 0;
    pub const LOCATION: usize = 1;
    pub const DESCRIPTION: usize = 2;
    pub const EMD: usize = 6;
    pub const MATERIAL: usize = 8;
    pub const QUALIFYING_DATE: usize = 9;
}

mod user_col {
    pub const CITY: usize = 1;
    pub const STATE: usize = 2;
    pub const NAME: usize = 3;
    pub const CONTACT: usize = 4;
    pub const CATEGORY: usize = 7;
    pub const MATERIAL: usize = 8;
    pub const SECONDARY_ID: usize = 9;
}

struct RowReader<'a> {
    table: &'static str,
    index: usize,
    cells: &'a [CellValue],
}

impl RowReader<'_> {
    fn required(&self, column: usize, field: &'static str) -> Result<String, SchemaError> {
        self.cells
            .get(column)
            .map(ToString::to_string)
            .ok_or(SchemaError::MissingColumn {
                table: self.table,
                row: self.index,
                column,
                field,
            })
    }

    fn optional(&self, column: usize) -> Option<String> {
        self.cells.get(column).map(ToString::to_string)
    }
}

// ── Tenders ───────────────────────────────────────────────────

/// One tender, decoded from the tenders sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenderRow {
    /// Sheet row index (header is 0).
    pub index: usize,
    pub name: String,
    /// Raw `"city,state"` text.
    pub location: String,
    pub description: String,
    pub emd: String,
    pub material: String,
    pub qualifying_date: Option<String>,
}

impl TenderRow {
    pub fn decode(index: usize, cells: &[CellValue]) -> Result<Self, SchemaError> {
        let r = RowReader { table: "tenders", index, cells };
        Ok(Self {
            index,
            name: r.required(tender_col::NAME, "name")?,
            location: r.required(tender_col::LOCATION, "location")?,
            description: r.required(tender_col::DESCRIPTION, "description")?,
            emd: r.required(tender_col::EMD, "emd")?,
            material: r.required(tender_col::MATERIAL, "material")?,
            qualifying_date: r.optional(tender_col::QUALIFYING_DATE),
        })
    }

    /// Split the location on `,` into `(city, state)`.
    ///
    /// Only the first two parts are used; `None` when there is no comma.
    pub fn city_state(&self) -> Option<(&str, &str)> {
        let mut parts = self.location.split(',');
        let city = parts.next()?;
        let state = parts.next()?;
        Some((city, state))
    }
}

// ── Users ─────────────────────────────────────────────────────

/// One user profile, decoded from the users sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    /// Sheet row index (header is 0).
    pub index: usize,
    pub city: String,
    pub state: String,
    pub name: String,
    /// Grouping key and message recipient (a phone number in practice).
    pub contact: String,
    /// Notification-target category shown in messages.
    pub category: String,
    pub material: String,
    pub secondary_id: Option<String>,
}

impl UserRow {
    pub fn decode(index: usize, cells: &[CellValue]) -> Result<Self, SchemaError> {
        let r = RowReader { table: "users", index, cells };
        Ok(Self {
            index,
            city: r.required(user_col::CITY, "city")?,
            state: r.required(user_col::STATE, "state")?,
            name: r.required(user_col::NAME, "name")?,
            contact: r.required(user_col::CONTACT, "contact")?,
            category: r.required(user_col::CATEGORY, "category")?,
            material: r.required(user_col::MATERIAL, "material")?,
            secondary_id: r.optional(user_col::SECONDARY_ID),
        })
    }
}

/// Decoded users, addressable by sheet row index.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    rows: Vec<UserRow>,
}

impl UserTable {
    pub fn new(rows: Vec<UserRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[UserRow] {
        &self.rows
    }

    /// Look up a user by its sheet row index.
    pub fn get(&self, index: usize) -> Option<&UserRow> {
        // Decoded tables are dense from index 1; fall back to a scan otherwise.
        index
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .filter(|row| row.index == index)
            .or_else(|| self.rows.iter().find(|row| row.index == index))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode a raw tenders table, skipping the header row.
///
/// An absent table decodes to no tenders.
pub fn decode_tenders(raw: Option<&[Vec<CellValue>]>) -> Result<Vec<TenderRow>, SchemaError> {
    raw.unwrap_or_default()
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, cells)| TenderRow::decode(i, cells))
        .collect()
}

/// Decode a raw users table, skipping the header row.
pub fn decode_users(raw: Option<&[Vec<CellValue>]>) -> Result<UserTable, SchemaError> {
    let rows = raw
        .unwrap_or_default()
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, cells)| UserRow::decode(i, cells))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(UserTable { rows })
}
