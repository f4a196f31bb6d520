pub mod filter;
pub mod types;

pub use filter::apply;
pub use types::{describe_filters, FilterClause, FilterSpec, Operator, QueryDecision};
