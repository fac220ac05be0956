pub mod cache;
pub mod cleanup;
pub mod client;
pub mod config;
pub mod grant;
pub mod sector;
pub mod state;
pub mod store;
pub mod token;
pub mod uma;
pub mod user;

#[cfg(test)]
pub(crate) mod test_utils;
