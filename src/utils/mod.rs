// Utils module - Transport, traffic logging and hashing helpers

pub mod debug;
pub mod hash;
pub mod network;
pub mod proxy;
