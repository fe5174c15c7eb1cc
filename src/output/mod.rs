pub mod config;
pub mod html;
pub mod presenter;
pub mod types;

pub use presenter::Emitter;
