pub mod batch;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod issue;
pub mod layout;
pub mod pdf;
pub mod routes;
pub mod startup;
pub mod state;
pub mod storage;
pub mod templates;
