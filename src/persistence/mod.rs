mod file;
mod interface;
mod memory;

pub use file::FileKeyValueStore;
pub use interface::KeyValueStore;
pub use memory::MemoryKeyValueStore;
