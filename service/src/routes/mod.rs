pub mod convert;
pub mod files;
pub mod root;
