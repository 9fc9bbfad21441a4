//! Process configuration

pub mod ci;
pub mod settings;

pub use ci::CiContext;
pub use settings::Settings;
