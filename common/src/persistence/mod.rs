mod common;
pub use common::{ByteStream, IStorageArea, Partition, StoredFile};

pub mod local;
pub mod memory;
pub mod tempfiles;
