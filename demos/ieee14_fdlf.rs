use rustpower_lf::{prelude::*, testcases::ieee14};

/// Runs `$block` `$times` times and prints the mean wall time.
macro_rules! timeit {
    ($name:ident, $times:expr, $block:expr) => {{
        let start = std::time::Instant::now();
        for _ in 0..$times {
            std::hint::black_box($block());
        }
        println!(
            "{}: {:?} per run over {} runs",
            stringify!($name),
            start.elapsed() / $times,
            $times
        );
    }};
}

fn main() {
    let net = ieee14();
    let options = SolverOptions {
        tolerance: 1e-8,
        max_iter: 50,
        ..Default::default()
    };
    let fdlf = FastDecoupled::from(&options);
    let res = fdlf.solve(&net).unwrap();

    println!("B' =\n{:.3}", res.b_prime);
    println!("B'' =\n{:.3}", res.b_double_prime);
    println!("{}", res.trace.to_table());
    println!("{}", PowerFlowReport::from_trace(&net, &res.trace).unwrap());

    timeit!(fdlf_ieee14, 100, || fdlf.solve(&net));
    timeit!(fdlf_ieee14_dense, 100, || fdlf.solve_with(&net, &mut DenseLuSolver));
    let gs = GaussSeidel::from(&options).with_acceleration(1.6);
    timeit!(gauss_seidel_ieee14, 100, || gs.solve(&net));
}
