pub mod campaign;
pub mod credits;
pub mod settings;
