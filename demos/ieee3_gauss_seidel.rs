use std::env;

use rustpower_lf::prelude::*;

fn main() {
    let dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let net = load_network(format!("{dir}/cases/ieee3.json")).unwrap();

    let gs = GaussSeidel::new(100, 1e-6).with_acceleration(1.6);
    let trace = gs.solve(&net).unwrap();
    println!("{}", trace.to_table());

    let last = trace.final_snapshot().unwrap();
    for q in &last.pv_reactive {
        println!(
            "bus {}: Q = {:.4} pu{}",
            q.bus_id,
            q.q_pu,
            if q.clamped { " (at limit)" } else { "" }
        );
    }
    if !trace.converged(gs.tolerance) {
        println!(
            "not converged after {} iterations, mismatch {:.3e}",
            trace.iterations(),
            trace.final_mismatch().unwrap_or(f64::NAN)
        );
    }

    let report = PowerFlowReport::from_trace(&net, &trace).unwrap();
    println!("{report}");
}
