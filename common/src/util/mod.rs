pub mod consts;
pub mod mime;
pub mod names;
pub mod random;
