pub mod anchor;
pub mod parser;
pub mod writer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("task has no title")]
    MissingTitle,
}
