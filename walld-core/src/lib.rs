pub mod config;
pub mod dispatch;
pub mod error;
pub mod interface;
pub mod ipc;
pub mod models;
pub mod paths;
pub mod rotation;
pub mod scan;
pub mod store;
pub mod variable;
