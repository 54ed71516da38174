mod memory;

pub use memory::InMemoryEventArchive;
