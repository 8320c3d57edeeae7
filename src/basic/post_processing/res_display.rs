use std::fmt;
use tabled::Tabled;

/// A wrapper around a float that limits the number of decimal places when printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl Default for FloatWrapper {
    fn default() -> Self {
        Self {
            value: Default::default(),
            precision: 3,
        }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

/// Table row for bus results.
#[derive(Debug, Tabled)]
#[allow(non_snake_case)]
pub(crate) struct BusResTable {
    pub(crate) Bus: u32,
    pub(crate) Type: &'static str,
    pub(crate) Vm: FloatWrapper,
    pub(crate) Va: FloatWrapper,
    pub(crate) P_mw: FloatWrapper,
    pub(crate) Q_mvar: FloatWrapper,
}

/// Table row for branch results.
#[derive(Debug, Tabled)]
pub(crate) struct LineResTable {
    pub(crate) from: u32,
    pub(crate) to: u32,
    pub(crate) p_from_mw: FloatWrapper,
    pub(crate) q_from_mvar: FloatWrapper,
    pub(crate) p_to_mw: FloatWrapper,
    pub(crate) q_to_mvar: FloatWrapper,
    pub(crate) pl_mw: FloatWrapper,
    pub(crate) ql_mvar: FloatWrapper,
    pub(crate) i_from_pu: FloatWrapper,
    pub(crate) i_to_pu: FloatWrapper,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_wrapper_precision() {
        assert_eq!(FloatWrapper::new(1.23456, 2).to_string(), "1.23");
        assert_eq!(format!("{:?}", FloatWrapper::new(-0.5, 3)), "-0.500");
        assert_eq!(FloatWrapper::default().to_string(), "0.000");
    }
}
