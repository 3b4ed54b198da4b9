//! TShock integration: the REST command client and the server `config.json` reader that yields
//! the REST settings and the credential table.

mod rest;
mod server_config;

pub use rest::{CommandExecutor, CommandResult, RestClient, RestError};
pub use server_config::{load_tshock_config, parse_tshock_config, RestTokenInfo, TShockConfig};
