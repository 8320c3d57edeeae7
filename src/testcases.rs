//! Built-in networks on a 100 MVA base.

use crate::basic::system::network::{Branch, Bus, Network};

/// Textbook 3-bus system: slack at bus 1, a limited PV generator at bus 2 and a
/// heavy load at bus 3.
pub fn ieee3() -> Network {
    Network::new(
        100.0,
        vec![
            Bus::slack(1, 1.05, 0.0),
            Bus::pv(2, 1.04, 200.0).with_q_limits(-50.0, 100.0),
            Bus::pq(3, 400.0, 250.0),
        ],
        vec![
            Branch::new(1, 2, 0.02, 0.04, 0.01),
            Branch::new(1, 3, 0.01, 0.03, 0.01),
            Branch::new(2, 3, 0.0125, 0.025, 0.01),
        ],
    )
}

/// Simplified IEEE 14-bus system with three off-nominal transformers.
pub fn ieee14() -> Network {
    Network::new(
        100.0,
        vec![
            Bus::slack(1, 1.06, 0.0),
            Bus::pv(2, 1.045, 40.0)
                .with_load(21.7, 12.7)
                .with_q_limits(-40.0, 50.0),
            Bus::pv(3, 1.01, 0.0)
                .with_load(94.2, 19.0)
                .with_q_limits(0.0, 40.0),
            Bus::pq(4, 47.8, -3.9),
            Bus::pq(5, 7.6, 1.6),
            Bus::pv(6, 1.07, 0.0)
                .with_load(11.2, 7.5)
                .with_q_limits(-6.0, 24.0),
            Bus::pq(7, 0.0, 0.0),
            Bus::pv(8, 1.09, 0.0).with_q_limits(-6.0, 24.0),
            Bus::pq(9, 29.5, 16.6),
            Bus::pq(10, 9.0, 5.8),
            Bus::pq(11, 3.5, 1.8),
            Bus::pq(12, 6.1, 1.6),
            Bus::pq(13, 13.5, 5.8),
            Bus::pq(14, 14.9, 5.0),
        ],
        vec![
            Branch::new(1, 2, 0.01938, 0.05917, 0.0528),
            Branch::new(1, 5, 0.05403, 0.22304, 0.0492),
            Branch::new(2, 3, 0.04699, 0.19797, 0.0438),
            Branch::new(2, 4, 0.05811, 0.17632, 0.0340),
            Branch::new(2, 5, 0.05695, 0.17388, 0.0346),
            Branch::new(3, 4, 0.06701, 0.17103, 0.0128),
            Branch::new(4, 5, 0.01335, 0.04211, 0.0),
            Branch::new(4, 7, 0.0, 0.20912, 0.0).with_tap(0.978),
            Branch::new(4, 9, 0.0, 0.55618, 0.0).with_tap(0.969),
            Branch::new(5, 6, 0.0, 0.25202, 0.0).with_tap(0.932),
            Branch::new(6, 11, 0.09498, 0.19890, 0.0),
            Branch::new(6, 12, 0.12291, 0.25581, 0.0),
            Branch::new(6, 13, 0.06615, 0.13027, 0.0),
            Branch::new(7, 8, 0.0, 0.17615, 0.0),
            Branch::new(7, 9, 0.0, 0.11001, 0.0),
            Branch::new(9, 10, 0.03181, 0.08450, 0.0),
            Branch::new(9, 14, 0.12711, 0.27038, 0.0),
            Branch::new(10, 11, 0.08205, 0.19207, 0.0),
            Branch::new(12, 13, 0.22092, 0.19988, 0.0),
            Branch::new(13, 14, 0.17093, 0.34802, 0.0),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cases_are_valid() {
        for net in [ieee3(), ieee14()] {
            net.validate().unwrap();
        }
        let part = ieee14().partition().unwrap();
        assert_eq!(part.pv.len(), 4);
        assert_eq!(part.pq.len(), 9);
        assert_eq!(ieee14().branches.iter().filter(|b| !b.is_nominal()).count(), 3);
    }
}
