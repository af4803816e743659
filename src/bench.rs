//! Testbench for `tt_um_counter`.
//!
//! Inputs are driven on the falling edge of `clk`, so the design samples them
//! on the following rising edge. The bus is sampled in the read-only phase
//! after each rising edge and compared against a [`Counter`] reference model.

use rand::Rng;

use crate::prelude::*;
use crate::tb_obj::TbObj;

pub const CLOCK_PERIOD_NS: u32 = 10;
pub const RANDOM_CYCLES: u32 = 500;

#[derive(Clone)]
pub struct CounterTb {
    pub clk: SimObject,
    pub rst_n: SimObject,
    pub ena: SimObject,
    pub ui_in: SimObject,
    pub uio_in: SimObject,
    pub uio_out: SimObject,
    pub uio_oe: SimObject,
    pub scoreboard: Scoreboard<BusValue>,
    model: TbObj<Counter>,
}

impl CounterTb {
    /// Starts the clock and the tri-state assertion.
    pub fn new(dut: SimObject) -> Self {
        let tb = Self {
            clk: dut.c("clk"),
            rst_n: dut.c("rst_n"),
            ena: dut.c("ena"),
            ui_in: dut.c("ui_in"),
            uio_in: dut.c("uio_in"),
            uio_out: dut.c("uio_out"),
            uio_oe: dut.c("uio_oe"),
            scoreboard: Scoreboard::new(),
            model: TbObj::new(Counter::new()),
        };
        Task::fork(testbench::clock(tb.clk, CLOCK_PERIOD_NS, "ns"));
        tb.bus_tristate_assertion();
        tb
    }

    fn bus_tristate_assertion(&self) {
        let uio_out = self.uio_out;
        let uio_oe = self.uio_oe;
        assertion!("bus_z_iff_not_enabled", [Trigger::rising_edge(self.clk)], async move {
            check!(uio_out.is_high_z() == (uio_oe.u32() == 0))
        });
    }

    /// Holds reset for `cycles` rising edges with the chip enabled, then releases it.
    pub async fn reset(&self, cycles: u32) -> TbResult {
        self.clk.falling_edge().await;
        self.rst_n.set(0);
        self.ena.set(1);
        self.ui_in.set(0);
        self.uio_in.set(0);
        utils::clock_cycles(self.clk, cycles).await?;
        self.model.with_mut(|m| *m = Counter::new());
        self.clk.falling_edge().await;
        self.rst_n.set(1);
        Ok(Val::None)
    }

    pub fn drive(&self, control: ControlBits, data: u8) {
        self.ui_in.set(u32::from(control.to_ui_in()));
        self.uio_in.set(u32::from(data));
    }

    /// Drives one cycle out of reset with the chip enabled, and checks the bus
    /// against the model. Returns the bus.
    pub async fn cycle(&self, label: &str, control: ControlBits, data: u8) -> SimResult<BusValue> {
        self.cycle_pins(label, true, true, control, data).await
    }

    /// Like [`cycle`](Self::cycle), also driving `rst_n` and `ena`.
    pub async fn cycle_pins(
        &self,
        label: &str,
        reset_n: bool,
        chip_enable: bool,
        control: ControlBits,
        data: u8,
    ) -> SimResult<BusValue> {
        self.clk.falling_edge().await;
        self.rst_n.set(u32::from(reset_n));
        self.ena.set(u32::from(chip_enable));
        self.drive(control, data);
        self.clk.rising_edge().await;
        Trigger::read_only().await;
        let expected = self.model_step();
        let bus = self.uio_out.try_bus()?;
        self.scoreboard.add_exp_labeled(label, expected);
        self.scoreboard.add_recv(bus);
        Ok(bus)
    }

    /// Like [`cycle`](Self::cycle), repeated `n` times.
    pub async fn cycles(&self, label: &str, control: ControlBits, data: u8, n: u32) -> SimResult<BusValue> {
        let mut bus = BusValue::HighImpedance;
        for i in 0..n {
            bus = self.cycle(&format!("{} [{}]", label, i), control, data).await?;
        }
        Ok(bus)
    }

    /// Checks an observed bus against a fixed value.
    pub fn expect_bus(&self, label: &str, expected: BusValue, observed: BusValue) {
        self.scoreboard.add_exp_labeled(label, expected);
        self.scoreboard.add_recv(observed);
    }

    /// Advances the reference model with the inputs sampled at the last edge.
    fn model_step(&self) -> BusValue {
        let reset_n = self.rst_n.u32() == 1;
        let chip_enable = self.ena.u32() == 1;
        let control = ControlBits::from_ui_in(self.ui_in.u32() as u8);
        let data = self.uio_in.u32() as u8;
        self.model
            .with_mut(|m| m.advance(reset_n, chip_enable, control, data).1)
    }

    /// Feeds the model's prediction for every rising edge to `monitor`,
    /// labeled with the edge count.
    pub async fn model_mon(self, monitor: Monitor<BusValue>) -> TbResult {
        for edge in 0u64.. {
            self.clk.rising_edge().await;
            Trigger::read_only().await;
            monitor.to_scoreboard_labeled(&format!("edge {}", edge), self.model_step());
        }
        Ok(Val::None)
    }

    /// Feeds the observed bus for every rising edge to `monitor`.
    pub async fn bus_mon(self, monitor: Monitor<BusValue>) -> TbResult {
        loop {
            self.clk.rising_edge().await;
            Trigger::read_only().await;
            monitor.to_scoreboard(self.uio_out.bus());
        }
    }

    /// Lets the last sampled edge settle, then reports the scoreboard.
    pub async fn finish(&self) -> TbResult {
        self.clk.falling_edge().await;
        SIM_IF.log(&format!("scoreboard: {}", self.scoreboard.result_str()));
        self.scoreboard.result()
    }
}

fn sim_err(e: SimError) -> Val {
    Val::String(e.to_string())
}

/// Reset, load, count up, count down, and release the bus.
pub async fn test_project(dut: SimObject) -> TbResult {
    let tb = CounterTb::new(dut);
    let idle = ControlBits::default();
    let shown = idle.output_enable(true);

    SIM_IF.log("Testing reset");
    tb.reset(5).await?;
    tb.cycle("released from reset", idle, 0).await.map_err(sim_err)?;
    let bus = tb.cycle("show count after reset", shown, 0).await.map_err(sim_err)?;
    tb.expect_bus("bus after reset", BusValue::Driven(0), bus);

    SIM_IF.log("Testing parallel load");
    tb.cycle("load 121", idle.load(true), 121).await.map_err(sim_err)?;
    let bus = tb.cycle("show loaded value", shown, 0).await.map_err(sim_err)?;
    tb.expect_bus("bus after load", BusValue::Driven(121), bus);

    SIM_IF.log("Testing count up");
    let bus = tb
        .cycles("count up", shown.count(Direction::Up), 0, 10)
        .await
        .map_err(sim_err)?;
    tb.expect_bus("bus after 10 up", BusValue::Driven(131), bus);

    SIM_IF.log("Testing count down");
    let bus = tb
        .cycles("count down", shown.count(Direction::Down), 0, 20)
        .await
        .map_err(sim_err)?;
    tb.expect_bus("bus after 20 down", BusValue::Driven(111), bus);

    SIM_IF.log("Testing tri-state output");
    let bus = tb
        .cycle("disable output", idle.count(Direction::Down), 0)
        .await
        .map_err(sim_err)?;
    tb.expect_bus("bus released", BusValue::HighImpedance, bus);

    tb.finish().await
}

/// Reset wins over load and count, whatever the other inputs are.
pub async fn test_reset_dominance(dut: SimObject) -> TbResult {
    let tb = CounterTb::new(dut);
    let shown = ControlBits::default().output_enable(true);

    tb.reset(2).await?;
    tb.cycle("load 200", shown.load(true), 200).await.map_err(sim_err)?;
    for control in [shown.load(true), shown.count(Direction::Up), shown.count(Direction::Down)] {
        let bus = tb
            .cycle_pins("held in reset", false, true, control, 77)
            .await
            .map_err(sim_err)?;
        tb.expect_bus("reset dominates", BusValue::Driven(0), bus);
    }
    let bus = tb.cycle("released", shown, 0).await.map_err(sim_err)?;
    tb.expect_bus("count stays 0 after reset", BusValue::Driven(0), bus);
    tb.finish().await
}

/// Counting wraps modulo 256 in both directions.
pub async fn test_wraparound(dut: SimObject) -> TbResult {
    let tb = CounterTb::new(dut);
    let shown = ControlBits::default().output_enable(true);

    tb.reset(2).await?;
    tb.cycle("load 250", shown.load(true), 250).await.map_err(sim_err)?;
    let bus = tb.cycles("up across 255", shown.count(Direction::Up), 0, 10).await.map_err(sim_err)?;
    tb.expect_bus("250 + 10", BusValue::Driven(4), bus);

    tb.cycle("load 3", shown.load(true), 3).await.map_err(sim_err)?;
    let bus = tb.cycles("down across 0", shown.count(Direction::Down), 0, 5).await.map_err(sim_err)?;
    tb.expect_bus("3 - 5", BusValue::Driven(254), bus);

    tb.cycle("load 0", shown.load(true), 0).await.map_err(sim_err)?;
    let bus = tb.cycles("more than a lap", shown.count(Direction::Up), 0, 300).await.map_err(sim_err)?;
    tb.expect_bus("0 + 300", BusValue::Driven(44), bus);
    tb.finish().await
}

/// A disabled chip holds its count, ignores load, and releases the bus.
pub async fn test_chip_enable_gating(dut: SimObject) -> TbResult {
    let tb = CounterTb::new(dut);
    let shown = ControlBits::default().output_enable(true);

    tb.reset(2).await?;
    tb.cycle("load 42", shown.load(true), 42).await.map_err(sim_err)?;
    for control in [shown.count(Direction::Up), shown.load(true), shown.count(Direction::Down)] {
        let bus = tb
            .cycle_pins("chip disabled", true, false, control, 9)
            .await
            .map_err(sim_err)?;
        tb.expect_bus("disabled chip releases bus", BusValue::HighImpedance, bus);
    }
    let bus = tb.cycle("enabled again", shown, 0).await.map_err(sim_err)?;
    tb.expect_bus("count held while disabled", BusValue::Driven(42), bus);
    tb.finish().await
}

/// Random inputs for [`RANDOM_CYCLES`] cycles, checked every edge against the model.
pub async fn test_random_stimulus(dut: SimObject) -> TbResult {
    let tb = CounterTb::new(dut);
    let seed = rand::random::<u64>();
    SIM_IF.log(&format!("random stimulus seed {}", seed));
    let mut rng = utils::seeded_rng(seed);

    tb.reset(2).await?;

    let expected = Monitor::new();
    expected.set_scoreboard(tb.scoreboard.clone(), true);
    let received = Monitor::new();
    received.set_scoreboard(tb.scoreboard.clone(), false);
    Task::fork(tb.clone().model_mon(expected));
    Task::fork(tb.clone().bus_mon(received));

    for _ in 0..RANDOM_CYCLES {
        tb.clk.falling_edge().await;
        tb.rst_n.set(u32::from(!rng.gen_bool(0.03)));
        tb.ena.set(u32::from(rng.gen_bool(0.9)));
        tb.ui_in.set(rng.gen_range(0..=u8::MAX).into());
        tb.uio_in.set(rng.gen_range(0..=u8::MAX).into());
    }
    tb.clk.rising_edge().await;
    tb.finish().await
}
