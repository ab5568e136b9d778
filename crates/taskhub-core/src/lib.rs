pub mod credentials;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod source;
pub mod sqlite;
