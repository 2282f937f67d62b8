pub mod config;
pub mod logging;

// Fragment acquisition and image reassembly
pub mod band;
pub mod codec;
pub mod digest;
pub mod fetch;
pub mod pipeline;
pub mod reassemble;
pub mod retry;
pub mod storage;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;
