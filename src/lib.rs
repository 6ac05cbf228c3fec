pub mod auth;
pub mod config;
pub mod history;
pub mod logging;

#[cfg(test)]
mod test_utils;
