pub mod countdown;
pub mod models;
pub mod panel;
pub mod session;
pub mod settings;
