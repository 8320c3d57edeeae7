use serde::{Deserialize, Serialize};

use crate::basic::{
    error::PowerFlowError,
    system::network::{Branch, Bus, BusKind, Limit, Network},
};

// Flat records mirroring the JSON exchange format. Bus types are plain tags here
// and only become a `BusKind` through `TryFrom`.

fn default_vm() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    Slack,
    Pv,
    Pq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRecord {
    pub id: u32,
    #[serde(rename = "type")]
    pub type_: BusType,
    #[serde(default = "default_vm")]
    pub v_mag: f64,
    #[serde(default)]
    pub v_ang: f64,
    #[serde(default)]
    pub p_gen: f64,
    #[serde(default)]
    pub q_gen: f64,
    #[serde(default)]
    pub p_load: f64,
    #[serde(default)]
    pub q_load: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    pub from: u32,
    pub to: u32,
    pub r: f64,
    pub x: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[serde(rename = "baseMVA")]
    pub base_mva: f64,
    pub buses: Vec<BusRecord>,
    #[serde(default)]
    pub branches: Vec<BranchRecord>,
}

impl TryFrom<&BusRecord> for Bus {
    type Error = PowerFlowError;

    fn try_from(rec: &BusRecord) -> Result<Self, Self::Error> {
        let q_lim = match (rec.q_min, rec.q_max) {
            (Some(min), Some(max)) => Some(Limit { min, max }),
            (None, None) => None,
            _ => {
                return Err(PowerFlowError::InvalidNetwork(format!(
                    "bus {} must give both qMin and qMax",
                    rec.id
                )));
            }
        };
        let kind = match (rec.type_, q_lim) {
            (BusType::Pv, q_lim) => BusKind::PV { q_lim },
            (BusType::Slack, None) => BusKind::Slack,
            (BusType::Pq, None) => BusKind::PQ,
            (_, Some(_)) => {
                return Err(PowerFlowError::InvalidNetwork(format!(
                    "bus {}: reactive limits are only allowed on PV buses",
                    rec.id
                )));
            }
        };
        Ok(Bus {
            id: rec.id,
            kind,
            vm_pu: rec.v_mag,
            va_degree: rec.v_ang,
            p_gen_mw: rec.p_gen,
            q_gen_mvar: rec.q_gen,
            p_load_mw: rec.p_load,
            q_load_mvar: rec.q_load,
        })
    }
}

impl From<&Bus> for BusRecord {
    fn from(bus: &Bus) -> Self {
        let type_ = match bus.kind {
            BusKind::Slack => BusType::Slack,
            BusKind::PV { .. } => BusType::Pv,
            BusKind::PQ => BusType::Pq,
        };
        let q_lim = bus.q_limits();
        BusRecord {
            id: bus.id,
            type_,
            v_mag: bus.vm_pu,
            v_ang: bus.va_degree,
            p_gen: bus.p_gen_mw,
            q_gen: bus.q_gen_mvar,
            p_load: bus.p_load_mw,
            q_load: bus.q_load_mvar,
            q_min: q_lim.map(|l| l.min),
            q_max: q_lim.map(|l| l.max),
        }
    }
}

impl From<&BranchRecord> for Branch {
    fn from(rec: &BranchRecord) -> Self {
        Branch {
            from: rec.from,
            to: rec.to,
            r: rec.r,
            x: rec.x,
            b: rec.b,
            tap: rec.tap_ratio,
        }
    }
}

impl From<&Branch> for BranchRecord {
    fn from(br: &Branch) -> Self {
        BranchRecord {
            from: br.from,
            to: br.to,
            r: br.r,
            x: br.x,
            b: br.b,
            tap_ratio: br.tap,
        }
    }
}

impl TryFrom<NetworkRecord> for Network {
    type Error = PowerFlowError;

    fn try_from(rec: NetworkRecord) -> Result<Self, Self::Error> {
        let buses = rec
            .buses
            .iter()
            .map(Bus::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let branches = rec.branches.iter().map(Branch::from).collect();
        Ok(Network::new(rec.base_mva, buses, branches))
    }
}

impl From<&Network> for NetworkRecord {
    fn from(net: &Network) -> Self {
        NetworkRecord {
            base_mva: net.base_mva,
            buses: net.buses.iter().map(BusRecord::from).collect(),
            branches: net.branches.iter().map(BranchRecord::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(type_: BusType, q_min: Option<f64>, q_max: Option<f64>) -> BusRecord {
        BusRecord {
            id: 4,
            type_,
            v_mag: 1.0,
            v_ang: 0.0,
            p_gen: 0.0,
            q_gen: 0.0,
            p_load: 0.0,
            q_load: 0.0,
            q_min,
            q_max,
        }
    }

    #[test]
    fn test_limits_only_on_pv() {
        let bus = Bus::try_from(&record(BusType::Pv, Some(-10.0), Some(20.0))).unwrap();
        assert_eq!(bus.q_limits(), Some(Limit { min: -10.0, max: 20.0 }));

        for type_ in [BusType::Slack, BusType::Pq] {
            assert!(matches!(
                Bus::try_from(&record(type_, Some(-10.0), Some(20.0))),
                Err(PowerFlowError::InvalidNetwork(_))
            ));
        }
    }

    #[test]
    fn test_half_limit_rejected() {
        assert!(matches!(
            Bus::try_from(&record(BusType::Pv, None, Some(20.0))),
            Err(PowerFlowError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let rec: BusRecord = serde_json::from_str(r#"{"id": 2, "type": "pq"}"#).unwrap();
        let bus = Bus::try_from(&rec).unwrap();
        assert_eq!(bus, Bus::pq(2, 0.0, 0.0));
    }
}
