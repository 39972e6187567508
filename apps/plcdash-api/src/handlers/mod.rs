//! Handlers 模块

pub mod data;
pub mod mappings;
pub mod metrics;
pub mod plcs;
pub mod status;
pub mod tables;
pub mod tags;
pub mod write;

pub use data::*;
pub use mappings::*;
pub use metrics::*;
pub use plcs::*;
pub use status::*;
pub use tables::*;
pub use tags::*;
pub use write::*;
