//! Container image building

pub mod builder;
pub mod docker;
pub mod reference;
pub mod registry;
