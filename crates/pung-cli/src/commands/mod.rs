pub mod clients;
pub mod plan;
pub mod servers;
