pub mod config;
pub mod connectivity;
pub mod domain;
pub mod local_api;
pub mod reader;
pub mod remote_client;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod testing;

pub type ReadsyncResult<T> = anyhow::Result<T>;
