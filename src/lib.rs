//! Library crate for modbus-scanner-web exposing reusable modules.
pub mod bus;
pub mod client;
pub mod form;
pub mod modbus;
pub mod page;
pub mod ports;
pub mod server;
pub mod sim;
pub mod types;
pub mod view;
