use std::{fs, path::Path};

use crate::basic::{error::Result, system::network::Network};

mod network_converter;
pub use network_converter::*;

/// Parses a network from its JSON exchange form and validates it.
pub fn network_from_str(json: &str) -> Result<Network> {
    let record: NetworkRecord = serde_json::from_str(json)?;
    let net = Network::try_from(record)?;
    net.validate()?;
    Ok(net)
}

/// Reads and validates a network JSON file.
pub fn load_network(path: impl AsRef<Path>) -> Result<Network> {
    let content = fs::read_to_string(path)?;
    network_from_str(&content)
}

pub fn to_json_string(net: &Network) -> Result<String> {
    Ok(serde_json::to_string_pretty(&NetworkRecord::from(net))?)
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::basic::{error::PowerFlowError, system::network::BusKind};
    use crate::testcases::{ieee14, ieee3};

    const IEEE3: &str = r#"{
        "baseMVA": 100,
        "buses": [
            { "id": 1, "type": "slack", "vMag": 1.05, "vAng": 0, "pGen": 0, "qGen": 0, "pLoad": 0, "qLoad": 0 },
            { "id": 2, "type": "pv", "vMag": 1.04, "vAng": 0, "pGen": 200, "qGen": 0, "pLoad": 0, "qLoad": 0, "qMin": -50, "qMax": 100 },
            { "id": 3, "type": "pq", "vMag": 1.0, "vAng": 0, "pGen": 0, "qGen": 0, "pLoad": 400, "qLoad": 250 }
        ],
        "branches": [
            { "from": 1, "to": 2, "r": 0.02, "x": 0.04, "b": 0.01 },
            { "from": 1, "to": 3, "r": 0.01, "x": 0.03, "b": 0.01 },
            { "from": 2, "to": 3, "r": 0.0125, "x": 0.025, "b": 0.01 }
        ]
    }"#;

    #[test]
    fn test_parse_ieee3() {
        let net = network_from_str(IEEE3).unwrap();
        assert_eq!(net, ieee3());
        assert!(matches!(net.buses[1].kind, BusKind::PV { q_lim: Some(_) }));
    }

    #[test]
    fn test_round_trip_with_taps() {
        let json = to_json_string(&ieee14()).unwrap();
        assert!(json.contains("\"tapRatio\": 0.978"));
        assert!(json.contains("\"baseMVA\""));
        assert_eq!(network_from_str(&json).unwrap(), ieee14());
    }

    #[test]
    fn test_load_case_file() {
        let dir = env::var("CARGO_MANIFEST_DIR").unwrap();
        let net = load_network(format!("{dir}/cases/ieee14.json")).unwrap();
        assert_eq!(net, ieee14());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_network("/nonexistent/network.json"),
            Err(PowerFlowError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_network_rejected() {
        let json = IEEE3.replace(r#""from": 2, "to": 3"#, r#""from": 2, "to": 7"#);
        assert!(matches!(
            network_from_str(&json),
            Err(PowerFlowError::InvalidBranch { to: 7, .. })
        ));
        let json = IEEE3.replace(r#""type": "pq""#, r#""type": "load""#);
        assert!(matches!(network_from_str(&json), Err(PowerFlowError::Json(_))));
    }
}
