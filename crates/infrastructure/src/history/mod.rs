mod memory;

pub use memory::InMemoryTagHistory;
