pub mod dtos;
pub mod error;
pub mod files;
pub mod models;
pub mod persistence;
pub mod util;
