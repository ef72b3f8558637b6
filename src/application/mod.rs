pub mod detection;
pub mod shutdown;
