//! Byte encoding of a [`Marble`] as stored at its state address.
//!
//! The stored value is `name,color,size,owner` in UTF-8. The format has no
//! escaping, so encoding refuses any field that contains the delimiter.

use thiserror::Error;

use crate::domain::Marble;

pub const FIELD_DELIMITER: char = ',';
pub const RECORD_FIELDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not valid utf-8")]
    NotUtf8,
    #[error("record has {0} fields, expected {RECORD_FIELDS}")]
    FieldCount(usize),
    #[error("record size field {0:?} is not an integer")]
    InvalidSize(String),
    #[error("{field} contains the '{FIELD_DELIMITER}' delimiter")]
    DelimiterInField { field: &'static str },
}

impl Marble {
    pub fn to_record(&self) -> Result<Vec<u8>, RecordError> {
        for (field, value) in [
            ("name", &self.name),
            ("color", &self.color),
            ("owner", &self.owner),
        ] {
            if value.contains(FIELD_DELIMITER) {
                return Err(RecordError::DelimiterInField { field });
            }
        }

        Ok(format!(
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.name, self.color, self.size, self.owner
        )
        .into_bytes())
    }

    pub fn from_record(bytes: &[u8]) -> Result<Self, RecordError> {
        let text = std::str::from_utf8(bytes).map_err(|_| RecordError::NotUtf8)?;
        let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
        let [name, color, size, owner] = fields[..] else {
            return Err(RecordError::FieldCount(fields.len()));
        };
        let size = size
            .parse::<i64>()
            .map_err(|_| RecordError::InvalidSize(size.to_string()))?;

        Ok(Self::new(name, color, size, owner))
    }
}
