mod files;
pub use files::*;

mod root;
pub use root::*;
