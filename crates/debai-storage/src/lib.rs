//! DebAI storage crate - SQLite persistence for the employee directory.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::EmployeeRepository;
