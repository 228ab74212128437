//! Filtered listing queries.
//!
//! Every paged endpoint accumulates its predicate once through [`ListQuery`]
//! and derives both the page statement and the count statement from it, so
//! the reported total always agrees with the rows.

mod bind;
mod page;
mod query;

pub use bind::Bind;
pub use page::Pagination;
pub use query::ListQuery;
