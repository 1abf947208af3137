//! Reasons a document fails the well-formedness check.

use thiserror::Error;

/// Why a document is not well-formed XML. Positions are byte offsets.
#[derive(Debug, Error)]
pub enum WellFormedError {
    #[error("malformed XML near byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("element <{name}> is never closed")]
    Unclosed { name: String },
    #[error("document has no root element")]
    NoRoot,
    #[error("second root element at byte {position}")]
    MultipleRoots { position: u64 },
    #[error("content outside the root element at byte {position}")]
    OutsideRoot { position: u64 },
    #[error("XML declaration is not at the start of the document (byte {position})")]
    MisplacedDeclaration { position: u64 },
    #[error("invalid name '{name}' at byte {position}")]
    InvalidName { name: String, position: u64 },
    #[error("raw '<' in value of attribute '{name}' at byte {position}")]
    LtInAttribute { name: String, position: u64 },
    #[error("'--' inside comment at byte {position}")]
    BadComment { position: u64 },
}
