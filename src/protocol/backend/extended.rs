//! Extended-query completion and description messages.

use crate::error::{Error, Result};
use crate::protocol::codec::Reader;
use crate::protocol::types::Oid;

macro_rules! empty_message {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl $name {
            /// Parse the (empty) message payload.
            pub fn parse(payload: &[u8]) -> Result<Self> {
                if !payload.is_empty() {
                    return Err(Error::Protocol(format!(
                        concat!(stringify!($name), ": unexpected {}-byte payload"),
                        payload.len()
                    )));
                }
                Ok(Self)
            }
        }
    };
}

empty_message! {
    /// ParseComplete: the statement was parsed.
    ParseComplete
}

empty_message! {
    /// BindComplete: the portal was bound.
    BindComplete
}

empty_message! {
    /// CloseComplete: the statement or portal was closed.
    CloseComplete
}

empty_message! {
    /// NoData: the statement returns no rows.
    NoData
}

/// ParameterDescription: the OIDs the server inferred for each placeholder.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    oids: Vec<Oid>,
}

impl ParameterDescription {
    /// Parse a ParameterDescription message payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let count = r.i16()?;
        if count < 0 {
            return Err(Error::Protocol(format!(
                "ParameterDescription: negative count {count}"
            )));
        }
        let mut oids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            oids.push(r.u32()?);
        }
        Ok(Self { oids })
    }

    /// Parameter type OIDs in placeholder order.
    pub fn oids(&self) -> &[Oid] {
        &self.oids
    }

    /// Take ownership of the OID list.
    pub fn into_oids(self) -> Vec<Oid> {
        self.oids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_reject_payload() {
        assert!(ParseComplete::parse(&[]).is_ok());
        assert!(BindComplete::parse(&[1]).is_err());
    }

    #[test]
    fn parameter_description_oids() {
        // two params: int4 (23), text (25)
        let payload = [0, 2, 0, 0, 0, 23, 0, 0, 0, 25];
        let desc = ParameterDescription::parse(&payload).unwrap();
        assert_eq!(desc.oids(), &[23, 25]);
    }

    #[test]
    fn parameter_description_empty() {
        let desc = ParameterDescription::parse(&[0, 0]).unwrap();
        assert!(desc.oids().is_empty());
    }
}
