//! Size-bounded page rendering.
//!
//! A [`Page`] combines a node template, the cache values mapped for display
//! and an optional [`Menu`] into one output page that never exceeds the
//! configured byte budget. When one mapped value (or the menu itself) is a
//! sink, the [`Sizer`] splits it across as many pages as needed while
//! reserving room for the browse controls each page shows.

pub mod menu;
pub mod page;
pub mod sizer;
pub mod template;

pub use menu::{BrowseConfig, Menu};
pub use page::Page;
pub use sizer::Sizer;

use crate::virtual_machine::cache::CacheError;
use menuvm_derive::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Requested page index is not among the computed pages.
    #[error("page {index} out of bounds, {pages} pages")]
    BrowseOutOfBounds { index: u32, pages: usize },
    /// A single sink line does not fit on a page by itself.
    #[error("line of {len} bytes does not fit remaining page capacity {capacity}")]
    LineTooLong { len: usize, capacity: usize },
    /// Rendered output exceeds the byte budget.
    #[error("rendered {len} bytes, budget is {budget}")]
    Capacity { len: usize, budget: usize },
    /// Both a value sink and a menu sink were declared.
    #[error("value sink {0} conflicts with menu sink")]
    DoubleSink(String),
    /// Two values with sink reservations were mapped.
    #[error("sink {second} mapped while {first} is already the sink")]
    MultipleSinks { first: String, second: String },
    #[error("{0}")]
    Cache(#[from] CacheError),
}
