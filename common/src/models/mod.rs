mod conversion;
pub use conversion::*;

mod files;
pub use files::*;

mod state;
pub use state::*;
