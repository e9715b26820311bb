//! Content-addressed fault identity
//!
//! Provides [`FaultId`], the 20-byte SHA-1 digest that identifies a fault
//! signature and doubles as its storage key.

use sha1::{Digest, Sha1};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::RecordError;

/// Length of a fault id in bytes
pub const FAULT_ID_LEN: usize = 20;

/// A 20-byte fault identity (SHA-1)
///
/// Two reports with the same project, exception type, exception class and
/// exception message always produce the same id. Rendered as 40 lowercase
/// hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FaultId([u8; FAULT_ID_LEN]);

impl FaultId {
    /// Create id from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 20 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() != FAULT_ID_LEN {
            return Err(RecordError::InvalidIdLength {
                expected: FAULT_ID_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; FAULT_ID_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Compute the id of a fault signature
    ///
    /// The digest covers the plain concatenation of the four fields in this
    /// order. No case or whitespace normalization is applied.
    #[must_use]
    pub fn compute(
        project_name: &str,
        exception_type: &str,
        exception_class: &str,
        exception_message: &str,
    ) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(project_name.as_bytes());
        hasher.update(exception_type.as_bytes());
        hasher.update(exception_class.as_bytes());
        hasher.update(exception_message.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Storage key for this id
    #[inline]
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Display for FaultId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for FaultId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for FaultId {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FaultId> for String {
    fn from(id: FaultId) -> Self {
        id.to_string()
    }
}
