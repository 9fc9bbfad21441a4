//! Cloud adapters built on the `aws` command line tool

pub mod cli;
pub mod ecr;
pub mod ecs;

pub use cli::AwsCli;
pub use ecr::EcrRegistry;
pub use ecs::EcsCli;
