//! Cost queries: the statement catalog, parameter validation and execution.

mod catalog;
mod executor;
mod params;

pub use catalog::{RowSetQuery, ScalarQuery};
pub use executor::{CostStore, QueryExecutor};
pub use params::{
    bind_named, required_placeholders, validate, ParameterBag, DATE_FORMAT, END_DATE, START_DATE,
    UNIT,
};
