pub mod pipeline;
pub mod config;
pub mod log;
pub mod import;
pub mod check;
pub mod debug;
pub mod aggressive;
pub mod paste;
pub mod test_connection;
pub mod status;
pub mod schedule;
pub mod serve;
pub mod init;
