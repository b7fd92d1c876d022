//! Core data types: tokens, queries, change sets, errors.

pub mod error;
pub mod query;
pub mod token;

pub use error::{IndexError, IndexResult};
pub use query::{Changes, Query, QueryValue};
pub use token::{multiunion, token_set, SharedSet, Token, TokenSet};
