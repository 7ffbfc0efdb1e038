//! Semicolon-delimited table assets.

use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::schema::{FieldLayout, SchemaRegistry, TableSchema};
use std::str::FromStr;
use std::sync::Arc;

/// Field delimiter.
pub const DELIMITER: char = ';';
/// Lines starting with this marker (after leading whitespace) are comments.
pub const COMMENT_MARKER: &str = "//";

/// One table row.
///
/// The last field always holds whatever followed the final delimiter,
/// including the line terminator (`"\n"`, `"\r\n"`, or `""` on an
/// unterminated last line). Joining the fields with `;` reproduces the line.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<String>,
    layout: Option<Arc<FieldLayout>>,
}

impl Row {
    fn parse(line: &str) -> Self {
        Self {
            fields: line.split(DELIMITER).map(str::to_string).collect(),
            layout: None,
        }
    }

    /// Whether this row is exposed as a data row.
    pub fn is_data(&self) -> bool {
        self.layout.is_some()
    }

    /// All fields, including the trailing terminator field.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of real fields (excluding the terminator field).
    pub fn width(&self) -> usize {
        self.fields.len().saturating_sub(1)
    }

    /// The layout used to name this row's fields, if it is a data row.
    pub fn layout(&self) -> Option<&Arc<FieldLayout>> {
        self.layout.as_ref()
    }

    /// Raw positional access.
    pub fn field(&self, index: usize) -> Option<&str> {
        if index < self.width() {
            Some(self.fields[index].as_str())
        } else {
            None
        }
    }

    /// Overwrite a field by raw position.
    pub fn set_field(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        let width = self.width();
        if index >= width {
            return Err(Error::FieldOutOfRange { index, width });
        }
        self.fields[index] = value.into();
        Ok(())
    }

    /// Field index of a schema name in this row.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.layout.as_ref()?.resolve(name, self.width())
    }

    /// Field value by schema name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index_of(name).map(|idx| self.fields[idx].as_str())
    }

    /// Field value by schema name, parsed.
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.trim().parse().ok()
    }

    /// Overwrite a field by schema name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let idx = self.index_of(name).ok_or_else(|| Error::UnknownField {
            table: self
                .layout
                .as_ref()
                .map(|layout| layout.table().to_string())
                .unwrap_or_default(),
            field: name.to_string(),
        })?;
        self.fields[idx] = value.into();
        Ok(())
    }

    fn write_to(&self, out: &mut String) {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(DELIMITER);
            }
            out.push_str(field);
        }
    }
}

/// A decoded table.
#[derive(Debug, Clone)]
pub struct TableAsset {
    schema: Arc<TableSchema>,
    rows: Vec<Row>,
    encoding: TextEncoding,
    wide_from: Option<usize>,
}

impl TableAsset {
    /// Decode `bytes` as the table `identity`, using a schema from `schemas`.
    pub fn decode(identity: &str, bytes: &[u8], schemas: &SchemaRegistry) -> Result<Self> {
        let schema = schemas
            .get(identity)
            .ok_or_else(|| Error::SchemaMissing(identity.to_ascii_lowercase()))?;
        let (text, encoding) = TextEncoding::decode_lenient(bytes);
        Ok(Self::from_text(schema, &text, encoding))
    }

    /// Build a table from already-decoded text.
    pub fn from_text(schema: Arc<TableSchema>, text: &str, encoding: TextEncoding) -> Self {
        let mut rows = Vec::new();
        let mut layout = Arc::clone(schema.base());
        let mut wide_from = None;

        for line in text.split_inclusive('\n') {
            if line.trim_start().starts_with(COMMENT_MARKER) {
                continue;
            }

            let mut row = Row::parse(line);
            if row.width() >= schema.min_fields() {
                if wide_from.is_none() && row.width() > schema.base().width() {
                    if let Some(wide) = schema.wide() {
                        tracing::debug!(
                            "Table '{}' switches to wide layout at row {} (width {} > {})",
                            schema.identity(),
                            rows.len(),
                            row.width(),
                            schema.base().width()
                        );
                        layout = Arc::clone(wide);
                        wide_from = Some(rows.len());
                    }
                }
                row.layout = Some(Arc::clone(&layout));
            }
            rows.push(row);
        }

        Self {
            schema,
            rows,
            encoding,
            wide_from,
        }
    }

    /// Table identity (lowercased file stem).
    pub fn identity(&self) -> &str {
        self.schema.identity()
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Index of the first row decoded with the wide layout, if any.
    pub fn wide_from(&self) -> Option<usize> {
        self.wide_from
    }

    /// Every retained row, data or not.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows that meet the schema minimum.
    pub fn data_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|row| row.is_data())
    }

    /// Mutable view over rows that meet the schema minimum.
    pub fn data_rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.rows.iter_mut().filter(|row| row.is_data())
    }

    /// First data row whose field `name` equals `value`.
    pub fn find_row_mut(&mut self, name: &str, value: &str) -> Option<&mut Row> {
        self.data_rows_mut().find(|row| row.get(name) == Some(value))
    }

    /// Overwrite a named field, reporting the table identity on failure.
    pub fn set_field(&mut self, row: usize, name: &str, value: impl Into<String>) -> Result<()> {
        let identity = self.schema.identity().to_string();
        let count = self.rows.len();
        let row = self.rows.get_mut(row).ok_or(Error::FieldOutOfRange {
            index: row,
            width: count,
        })?;
        row.set(name, value).map_err(|err| match err {
            // Header rows carry no layout to name the table.
            Error::UnknownField { field, .. } => Error::UnknownField {
                table: identity,
                field,
            },
            other => other,
        })
    }

    /// Re-join all rows into text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            row.write_to(&mut out);
        }
        out
    }

    /// Encode back to bytes in the original encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encoding.encode(&self.to_text())
    }
}
