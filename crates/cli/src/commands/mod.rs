pub mod classify;
pub mod config_cmd;
pub mod context;
pub mod facts;
pub mod ingest;
pub mod search;
pub mod store;
pub mod topics;
