pub mod api;
pub mod config;
pub mod importer;
pub mod maintenance;
pub mod rows;
