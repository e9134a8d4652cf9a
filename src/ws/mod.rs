//! Duplex connection layer

pub mod handler;
pub mod packet;
pub mod payload;
pub mod ping;
pub mod session;
