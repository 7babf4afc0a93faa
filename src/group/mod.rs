pub mod comparator;
pub mod field_group;
pub mod orchestrator;
