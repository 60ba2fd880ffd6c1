pub mod config;
pub mod error;
pub mod net;
pub mod queue;
pub mod sim;
pub mod stripe;
pub mod topo;
pub mod workload;

#[cfg(test)]
mod test;
