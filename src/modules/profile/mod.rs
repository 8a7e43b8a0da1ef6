pub mod repository;
pub mod repository_pg;
pub mod schema;
pub mod service;

#[cfg(test)]
pub mod repository_memory;
