use once_cell::sync::Lazy;

use crate::error::{SimError, SimResult};
use crate::native;
use crate::signal::SimObject;
use crate::value::LogicVec;

pub static SIM_IF: Lazy<Box<dyn SimIf + Sync + Send>> = Lazy::new(new_interface);

fn new_interface() -> Box<dyn SimIf + Sync + Send> {
    Box::new(native::Native)
}

#[derive(Debug, Hash, Clone, Eq, PartialEq)]
pub enum SimCallback {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

/// What the trigger and object layers need from a simulator.
pub trait SimIf {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimResult<()>;
    fn get_value(&self, obj: &SimObject) -> SimResult<u32>;
    fn set_value_bin(&self, obj: &SimObject, value: &str) -> SimResult<()>;
    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String>;
    fn get_logic(&self, obj: &SimObject) -> SimResult<LogicVec>;
    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject>;
    fn get_root_object(&self) -> SimResult<SimObject>;
    fn get_full_name(&self, obj: &SimObject) -> SimResult<String>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log(&self, msg: &str);
    fn register_callback_rw(&self) -> SimResult<usize>;
    fn register_callback_ro(&self) -> SimResult<usize>;
    fn register_callback_time(&self, t: u64) -> SimResult<usize>;
    fn register_callback_edge(&self, sig_hdl: usize) -> SimResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()>;

    fn get_sim_time(&self, unit: &str) -> f64 {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let precision = self.get_sim_precision();
        match time_scale(unit) {
            Ok(scale) => ldexp10(t, precision - scale),
            Err(_) => t,
        }
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> SimResult<u64> {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit)? - precision);
        if steps % 1.0 == 0.0 && steps >= 0.0 {
            Ok(steps as u64)
        } else {
            Err(SimError::TimeRounding {
                time,
                unit: unit.to_string(),
                precision,
            })
        }
    }
}

pub(crate) fn time_scale(unit: &str) -> SimResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" | "s" => Ok(0),
        _ => Err(SimError::UnknownTimeUnit(unit.to_string())),
    }
}

pub(crate) fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10f64.powi(i32::from(exp))
    } else {
        frac / 10f64.powi(-i32::from(exp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("fs", -15)]
    #[case("ps", -12)]
    #[case("ns", -9)]
    #[case("us", -6)]
    #[case("ms", -3)]
    #[case("sec", 0)]
    fn units(#[case] unit: &str, #[case] scale: i8) {
        assert_eq!(time_scale(unit).unwrap(), scale);
    }

    #[test]
    fn unknown_unit() {
        assert_eq!(
            time_scale("min"),
            Err(SimError::UnknownTimeUnit("min".to_string()))
        );
    }

    #[test]
    fn ldexp10_scales_both_ways() {
        assert_eq!(ldexp10(5.0, 6), 5_000_000.0);
        assert_eq!(ldexp10(5_000.0, -3), 5.0);
        // no overflow past 10^19
        assert!((ldexp10(1.0, -40) / 1e-40 - 1.0).abs() < 1e-12);
        assert!((ldexp10(3.0, 24) / 3e24 - 1.0).abs() < 1e-12);
    }
}
