pub mod error;
pub mod fdlf;
pub mod gauss_seidel;
pub mod options;
pub mod post_processing;
pub mod solver;
pub mod system;
pub mod trace;
pub mod zbus;

pub use fdlf::{FastDecoupled, FdlfResult};
pub use gauss_seidel::GaussSeidel;
pub use options::SolverOptions;
pub use post_processing::PowerFlowReport;
pub use trace::{IterationSnapshot, Trace};
pub use zbus::{ZBusBuilder, zbus_from_ybus};
