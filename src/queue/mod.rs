pub mod job;
pub mod group_queue;
pub mod memory_queue;
pub mod scheduler;
