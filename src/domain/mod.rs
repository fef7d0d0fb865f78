pub mod decoder;
pub mod driver;
pub mod models;
pub mod settings;
