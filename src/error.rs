use crate::hash_table::TableError;

/// Outcome of a failed [`Dictionary`](crate::Dictionary) operation.
///
/// This is the complete set callers can observe; table-level errors are
/// translated at the dictionary boundary.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    /// A caller-supplied argument cannot be honored (a length past the end
    /// of the string, a length that splits a character, a zero capacity).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// `remove` was called for a string that is not in the dictionary. This
    /// is a double remove or a remove without a matching insert.
    #[error("value was not found in the dictionary")]
    NotFound,

    /// Table storage could not be allocated.
    #[error("out of memory")]
    OutOfMemory,

    /// The backing table reported an inconsistency. Details are logged.
    #[error("internal dictionary error")]
    Internal,
}

impl From<TableError> for DictError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::OutOfMemory => {
                log::error!("dictionary: {e}");
                DictError::OutOfMemory
            }
            TableError::CapacityOverflow | TableError::Full | TableError::Corrupted(_) => {
                log::error!("dictionary: internal error: {e}");
                DictError::Internal
            }
        }
    }
}
