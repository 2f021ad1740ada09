//! Travel lookup tools.
//!
//! A closed set of key-less public-API lookups (weather, country facts,
//! exchange rates, public holidays, web search) behind one uniform
//! invocation contract:
//! - [`ToolInvoker`] -- the seam the agent engine calls through
//! - [`ToolRegistry`] -- the production invoker, one bounded attempt per call
//! - [`ToolOutcome`] -- success text or a normalized failure, never a panic or `Err`

pub mod country;
pub mod error;
pub mod exchange;
pub mod holidays;
pub(crate) mod http;
pub mod registry;
pub mod weather;
pub mod web_search;

pub use error::ToolError;
pub use registry::{ToolInvoker, ToolOutcome, ToolRegistry, TravelTool};
