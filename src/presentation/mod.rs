pub mod app;
pub mod console;

pub use app::{LaunchApp, LinkMode};
