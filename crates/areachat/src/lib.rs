pub mod errors;
pub mod formatter;
pub mod functions;
pub mod gateway;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod store;
