//! Type definitions for wrapstats

mod error;
mod month;
mod package;

pub use error::*;
pub use month::*;
pub use package::*;
