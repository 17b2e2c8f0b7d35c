//! Query-result backend messages.

use crate::error::{Error, Result};
use crate::protocol::codec::Reader;
use crate::protocol::types::{FormatCode, Oid};

/// One column of a RowDescription.
#[derive(Debug, Clone)]
pub struct FieldDescription<'a> {
    /// Field name
    pub name: &'a str,
    /// Table OID (0 if not a table column)
    pub table_oid: Oid,
    /// Column attribute number (0 if not a table column)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: Oid,
    /// Type size (negative = variable width)
    pub type_size: i16,
    /// Type modifier (type-specific)
    pub type_modifier: i32,
    /// Format code (0=text, 1=binary)
    pub format: FormatCode,
}

/// RowDescription: the shape of a result set.
#[derive(Debug)]
pub struct RowDescription<'a> {
    fields: Vec<FieldDescription<'a>>,
}

impl<'a> RowDescription<'a> {
    /// Parse a RowDescription message payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let count = r.i16()?;
        if count < 0 {
            return Err(Error::Protocol(format!(
                "RowDescription: negative field count {count}"
            )));
        }

        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.cstr()?;
            let table_oid = r.u32()?;
            let column_id = r.i16()?;
            let type_oid = r.u32()?;
            let type_size = r.i16()?;
            let type_modifier = r.i32()?;
            let format = FormatCode::from_u16(r.u16()?);
            fields.push(FieldDescription {
                name,
                table_oid,
                column_id,
                type_oid,
                type_size,
                type_modifier,
                format,
            });
        }

        Ok(Self { fields })
    }

    /// Field descriptions in column order.
    pub fn fields(&self) -> &[FieldDescription<'a>] {
        &self.fields
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the result set has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// DataRow: one row of column values.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    num_columns: u16,
    columns_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    /// Parse a DataRow message payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let num_columns = r.u16()?;
        Ok(Self {
            num_columns,
            columns_data: r.remaining(),
        })
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.num_columns as usize
    }

    /// True when the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Iterate over column values; `None` is SQL NULL.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.columns_data,
            left: self.num_columns,
        }
    }
}

/// Iterator over the values of a [`DataRow`].
#[derive(Debug, Clone)]
pub struct DataRowIter<'a> {
    remaining: &'a [u8],
    left: u16,
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;

        let mut r = Reader::new(self.remaining);
        let len = match r.i32() {
            Ok(len) => len,
            Err(e) => return Some(Err(e)),
        };
        if len == -1 {
            self.remaining = r.remaining();
            return Some(Ok(None));
        }
        match r.bytes(len as usize) {
            Ok(value) => {
                self.remaining = r.remaining();
                Some(Ok(Some(value)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// CommandComplete: the command tag of a finished statement.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete<'a> {
    /// Command tag (e.g. `"SELECT 5"`, `"INSERT 0 1"`, `"DELETE 3"`)
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    /// Parse a CommandComplete message payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let tag = r.cstr()?;
        Ok(Self { tag })
    }
}

/// EmptyQueryResponse: the query string was empty.
#[derive(Debug, Clone, Copy)]
pub struct EmptyQueryResponse;

impl EmptyQueryResponse {
    /// Parse an EmptyQueryResponse message payload.
    pub fn parse(_payload: &[u8]) -> Result<Self> {
        Ok(Self)
    }
}
