//! Errors reported by the checked decoding boundary.
//!
//! Corruption found on the hot paths (`Header::type_code`, `type_name`, the
//! typed casts) is fatal and panics instead. These variants are only produced
//! where a caller explicitly asked for a checked answer, such as
//! [`decode`](crate::decode) or [`LayoutSettings::validate`](crate::LayoutSettings::validate).

use thiserror::Error;

use crate::types::TypeCode;
use crate::value::Cell;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A tag or header carried a code outside the type catalog.
    #[error("unknown type code {0}")]
    UnknownType(Cell),

    /// The header at `address` marks a block on the free list.
    #[error("object at {address:#x} is a free block")]
    FreeBlock { address: Cell },

    /// The object at `address` was moved by the collector.
    #[error("object at {address:#x} was forwarded to {target:#x}")]
    Forwarded { address: Cell, target: Cell },

    /// The reference tag and the header of the object it points at disagree.
    #[error("reference tagged {tagged} points at a {found} header")]
    TagMismatch { tagged: TypeCode, found: TypeCode },

    /// Layout settings that no build could produce.
    #[error("invalid layout settings: {0}")]
    InvalidSettings(String),
}
