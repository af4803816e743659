//! The counter register unit.
//!
//! An 8-bit register that is synchronously reset, loaded, counted up or down,
//! or held, plus a combinational tri-state gate in front of its output bus.
//! The next-state function is an ordered rule list, see [`Transition::select`].

use crate::value::BusValue;

/// Count direction as encoded on `ui_in[2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Up,
    #[default]
    Down,
}

impl From<bool> for Direction {
    fn from(up: bool) -> Self {
        if up {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Control inputs sampled with every clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlBits {
    pub output_enable: bool,
    pub count_enable: bool,
    pub direction: Direction,
    pub load: bool,
}

impl ControlBits {
    pub const COUNT_ENABLE: u8 = 1 << 0;
    pub const LOAD: u8 = 1 << 1;
    pub const UP: u8 = 1 << 2;
    pub const OUTPUT_ENABLE: u8 = 1 << 3;

    /// Decodes the dedicated input byte. Bits 7..4 are ignored.
    pub fn from_ui_in(ui_in: u8) -> Self {
        ControlBits {
            output_enable: ui_in & Self::OUTPUT_ENABLE != 0,
            count_enable: ui_in & Self::COUNT_ENABLE != 0,
            direction: Direction::from(ui_in & Self::UP != 0),
            load: ui_in & Self::LOAD != 0,
        }
    }

    pub fn to_ui_in(self) -> u8 {
        let mut ui_in = 0;
        if self.count_enable {
            ui_in |= Self::COUNT_ENABLE;
        }
        if self.load {
            ui_in |= Self::LOAD;
        }
        if self.direction == Direction::Up {
            ui_in |= Self::UP;
        }
        if self.output_enable {
            ui_in |= Self::OUTPUT_ENABLE;
        }
        ui_in
    }

    pub fn output_enable(mut self, on: bool) -> Self {
        self.output_enable = on;
        self
    }

    pub fn load(mut self, on: bool) -> Self {
        self.load = on;
        self
    }

    pub fn count(mut self, direction: Direction) -> Self {
        self.count_enable = true;
        self.direction = direction;
        self
    }
}

/// The rule that determines the next register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Reset,
    Load(u8),
    CountUp,
    CountDown,
    Hold,
}

type Rule = fn(bool, bool, ControlBits, u8) -> Option<Transition>;

// Highest priority first. The first rule that returns `Some` wins.
const RULES: [Rule; 5] = [
    |reset_n, _, _, _| (!reset_n).then_some(Transition::Reset),
    |_, chip_enable, _, _| (!chip_enable).then_some(Transition::Hold),
    |_, _, control, data| control.load.then_some(Transition::Load(data)),
    |_, _, control, _| {
        control.count_enable.then_some(match control.direction {
            Direction::Up => Transition::CountUp,
            Direction::Down => Transition::CountDown,
        })
    },
    |_, _, _, _| Some(Transition::Hold),
];

impl Transition {
    pub fn select(reset_n: bool, chip_enable: bool, control: ControlBits, parallel_data: u8) -> Self {
        RULES
            .iter()
            .find_map(|rule| rule(reset_n, chip_enable, control, parallel_data))
            .unwrap_or(Transition::Hold)
    }

    pub fn apply(self, count: u8) -> u8 {
        match self {
            Transition::Reset => 0,
            Transition::Load(data) => data,
            Transition::CountUp => count.wrapping_add(1),
            Transition::CountDown => count.wrapping_sub(1),
            Transition::Hold => count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counter {
    count: u8,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(count: u8) -> Self {
        Counter { count }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    /// Clock edge. The only mutator of the register.
    pub fn advance(
        &mut self,
        reset_n: bool,
        chip_enable: bool,
        control: ControlBits,
        parallel_data: u8,
    ) -> (u8, BusValue) {
        let transition = Transition::select(reset_n, chip_enable, control, parallel_data);
        self.count = transition.apply(self.count);
        (self.count, self.bus(chip_enable, control.output_enable))
    }

    /// Combinational output. A disabled chip doesn't drive the bus.
    pub fn bus(&self, chip_enable: bool, output_enable: bool) -> BusValue {
        if chip_enable && output_enable {
            BusValue::Driven(self.count)
        } else {
            BusValue::HighImpedance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn controls() -> impl Strategy<Value = ControlBits> {
        any::<u8>().prop_map(ControlBits::from_ui_in)
    }

    #[rstest]
    #[case(false, true, 0b1111, Transition::Reset)]
    #[case(false, false, 0b0000, Transition::Reset)]
    #[case(true, false, 0b1111, Transition::Hold)]
    #[case(true, true, 0b0011, Transition::Load(42))]
    #[case(true, true, 0b0111, Transition::Load(42))]
    #[case(true, true, 0b0101, Transition::CountUp)]
    #[case(true, true, 0b0001, Transition::CountDown)]
    #[case(true, true, 0b1100, Transition::Hold)]
    #[case(true, true, 0b1000, Transition::Hold)]
    fn priority_order(
        #[case] reset_n: bool,
        #[case] chip_enable: bool,
        #[case] ui_in: u8,
        #[case] expected: Transition,
    ) {
        let control = ControlBits::from_ui_in(ui_in);
        assert_eq!(Transition::select(reset_n, chip_enable, control, 42), expected);
    }

    #[test]
    fn ui_in_packing() {
        let c = ControlBits::from_ui_in(0b1111_1101);
        assert!(c.output_enable && c.count_enable && !c.load);
        assert_eq!(c.direction, Direction::Up);
        assert_eq!(c.to_ui_in(), 0b1101);
        assert_eq!(ControlBits::default().load(true).to_ui_in(), 0b0010);
        assert_eq!(
            ControlBits::default().output_enable(true).count(Direction::Up).to_ui_in(),
            0b1101
        );
    }

    #[test]
    fn wraps_at_both_ends() {
        let mut c = Counter::with_count(255);
        let up = ControlBits::default().count(Direction::Up).output_enable(true);
        assert_eq!(c.advance(true, true, up, 0), (0, BusValue::Driven(0)));
        let down = ControlBits::default().count(Direction::Down);
        assert_eq!(c.advance(true, true, down, 0), (255, BusValue::HighImpedance));
    }

    #[test]
    fn zero_and_undriven_are_distinct() {
        let c = Counter::new();
        assert_eq!(c.bus(true, true), BusValue::Driven(0));
        assert_eq!(c.bus(true, false), BusValue::HighImpedance);
        assert_eq!(c.bus(false, true), BusValue::HighImpedance);
    }

    proptest! {
        #[test]
        fn reset_dominates(start: u8, control in controls(), data: u8, ena: bool) {
            let mut c = Counter::with_count(start);
            let (count, _) = c.advance(false, ena, control, data);
            prop_assert_eq!(count, 0);
        }

        #[test]
        fn load_beats_counting(start: u8, data: u8, up: bool) {
            let mut c = Counter::with_count(start);
            let control = ControlBits::default().count(Direction::from(up)).load(true);
            prop_assert_eq!(c.advance(true, true, control, data).0, data);
        }

        #[test]
        fn counts_modulo_256(start: u8, n in 0usize..1000, up: bool) {
            let mut c = Counter::with_count(start);
            let control = ControlBits::default().count(Direction::from(up));
            for _ in 0..n {
                c.advance(true, true, control, 0);
            }
            let n = (n % 256) as u8;
            let expected = if up { start.wrapping_add(n) } else { start.wrapping_sub(n) };
            prop_assert_eq!(c.count(), expected);
        }

        #[test]
        fn disabled_chip_holds(start: u8, steps in prop::collection::vec((controls(), any::<u8>()), 1..64)) {
            let mut c = Counter::with_count(start);
            for (control, data) in steps {
                let (count, bus) = c.advance(true, false, control, data);
                prop_assert_eq!(count, start);
                prop_assert_eq!(bus, BusValue::HighImpedance);
            }
        }

        #[test]
        fn output_enable_only_gates_the_bus(start: u8, control in controls(), data: u8) {
            let mut with_oe = Counter::with_count(start);
            let mut without_oe = Counter::with_count(start);
            let (a, bus_a) = with_oe.advance(true, true, control.output_enable(true), data);
            let (b, bus_b) = without_oe.advance(true, true, control.output_enable(false), data);
            prop_assert_eq!(a, b);
            prop_assert_eq!(bus_a, BusValue::Driven(a));
            prop_assert_eq!(bus_b, BusValue::HighImpedance);
        }
    }
}
