pub mod bus_sink;
pub mod http;
pub mod json_store;
pub mod key_directory;
