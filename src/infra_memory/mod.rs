mod session_storage_memory;

pub use session_storage_memory::*;
