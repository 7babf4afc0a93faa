pub mod sort_key;
pub mod arithmetic;
