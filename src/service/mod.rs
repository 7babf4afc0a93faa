pub mod sort_service;
