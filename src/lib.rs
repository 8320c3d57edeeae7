mod basic;
pub mod io;
pub mod testcases;

pub use basic::error::PowerFlowError;

pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use crate::io::json::{load_network, network_from_str};
    pub use basic::solver::{DefaultSolver, DenseLuSolver, Solve};
    pub use basic::system::{
        admittance::{YBus, build_ybus},
        network::{Branch, Bus, BusKind, Limit, Network},
    };
}
