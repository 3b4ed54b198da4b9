//! tsvk core library: relays commands written in a VK community chat to a TShock server's REST
//! API and sends the output back as a reply.

pub mod channels;
pub mod config;
pub mod credentials;
pub mod gateway;
pub mod sanitize;
pub mod tshock;
