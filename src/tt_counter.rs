//! Top level wrapper exposing the counter on the Tiny Tapeout pinout.
//!
//! | Port      | Use                                         |
//! |-----------|---------------------------------------------|
//! | `ui_in`   | `[0]` count enable, `[1]` load, `[2]` up, `[3]` output enable |
//! | `uio_in`  | parallel load data                          |
//! | `uio_out` | count, or `zzzzzzzz` while not driven        |
//! | `uio_oe`  | `0xff` while the bus is driven              |
//! | `uo_out`  | unused, tied low                            |

use crate::counter::{ControlBits, Counter};
use crate::design::{Design, Pins, Port};
use crate::value::{BusValue, LogicVec};

pub const TOP_NAME: &str = "tt_um_counter";

const PORTS: [Port; 8] = [
    Port::input("clk", 1),
    Port::input("rst_n", 1),
    Port::input("ena", 1),
    Port::input("ui_in", 8),
    Port::input("uio_in", 8),
    Port::output("uo_out", 8),
    Port::output("uio_out", 8),
    Port::output("uio_oe", 8),
];

#[derive(Debug, Clone, Default)]
pub struct TtCounter {
    counter: Counter,
}

impl TtCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u8 {
        self.counter.count()
    }

    fn bus(&self, inputs: &Pins) -> BusValue {
        let control = ControlBits::from_ui_in(inputs.bits("ui_in") as u8);
        self.counter.bus(inputs.bit("ena"), control.output_enable)
    }
}

impl Design for TtCounter {
    fn name(&self) -> &str {
        TOP_NAME
    }

    fn ports(&self) -> Vec<Port> {
        PORTS.to_vec()
    }

    fn clock(&self) -> &'static str {
        "clk"
    }

    fn clock_edge(&mut self, inputs: &Pins) {
        let before = self.counter.count();
        let (count, _) = self.counter.advance(
            inputs.bit("rst_n"),
            inputs.bit("ena"),
            ControlBits::from_ui_in(inputs.bits("ui_in") as u8),
            inputs.bits("uio_in") as u8,
        );
        log::trace!(target: "countbench::tt_counter", "count {} -> {}", before, count);
    }

    fn drive(&self, inputs: &Pins, outputs: &mut Pins) {
        let bus = self.bus(inputs);
        let oe = if bus.is_high_impedance() { 0x00 } else { 0xff };
        outputs.set("uo_out", LogicVec::zero(8));
        outputs.set("uio_out", LogicVec::from(bus));
        outputs.set("uio_oe", LogicVec::from_u64(8, oe));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pins(rst_n: u64, ena: u64, ui_in: u64, uio_in: u64) -> Pins {
        let mut p = Pins::new();
        p.set("clk", LogicVec::from_u64(1, 1));
        p.set("rst_n", LogicVec::from_u64(1, rst_n));
        p.set("ena", LogicVec::from_u64(1, ena));
        p.set("ui_in", LogicVec::from_u64(8, ui_in));
        p.set("uio_in", LogicVec::from_u64(8, uio_in));
        p
    }

    fn outputs(d: &TtCounter, inputs: &Pins) -> Pins {
        let mut out = Pins::new();
        d.drive(inputs, &mut out);
        out
    }

    #[test]
    fn load_then_show() {
        let mut d = TtCounter::new();
        d.clock_edge(&pins(1, 1, 0b0010, 121));
        assert_eq!(d.count(), 121);

        let shown = pins(1, 1, 0b1000, 0);
        let out = outputs(&d, &shown);
        assert_eq!(out.get("uio_out").and_then(|v| v.to_bus()), Some(BusValue::Driven(121)));
        assert_eq!(out.bits("uio_oe"), 0xff);
        assert_eq!(out.bits("uo_out"), 0);
    }

    #[test]
    fn output_disabled_tristates_bus() {
        let d = TtCounter::new();
        let out = outputs(&d, &pins(1, 1, 0b0001, 0));
        assert_eq!(out.get("uio_out").map(|v| v.to_bin()), Some("zzzzzzzz".to_string()));
        assert_eq!(out.bits("uio_oe"), 0);
    }

    #[test]
    fn unknown_inputs_read_low() {
        let mut d = TtCounter::new();
        let mut p = pins(1, 1, 0, 0);
        p.set("ui_in", LogicVec::parse_bin("zzzzzz1x").unwrap());
        p.set("uio_in", LogicVec::from_u64(8, 9));
        d.clock_edge(&p);
        // `ui_in[1]` = load, `ui_in[0]` = x reads as 0
        assert_eq!(d.count(), 9);
    }
}
