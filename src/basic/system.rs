pub mod admittance;
pub mod network;
