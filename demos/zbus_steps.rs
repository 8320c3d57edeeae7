use num_complex::Complex64;
use rustpower_lf::{prelude::*, testcases::ieee3};

fn main() {
    let z = |x: f64| Complex64::new(x, 0.0);
    let mut builder = ZBusBuilder::new();
    builder
        .add_to_reference(z(0.5))
        .and_then(|b| b.add_radial(0, z(0.2)))
        .and_then(|b| b.add_radial(1, z(0.3)))
        .and_then(|b| b.link(0, 2, z(0.1)))
        .unwrap();

    for (k, step) in builder.steps().iter().enumerate() {
        println!("step {k}: {} - {}", step.case, step.description);
        println!("{:.4}", step.matrix.map(|z| z.re));
    }

    let net = ieee3();
    let zbus = zbus_from_ybus(&build_ybus(&net).unwrap()).unwrap();
    println!("Z-Bus of the 3-bus case:\n{:.4}", zbus);
}
