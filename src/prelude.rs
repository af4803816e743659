pub use crate::assertion::{Assertion, AssertionStats};
pub use crate::counter::{ControlBits, Counter, Direction};
pub use crate::error::{SimError, SimResult};
pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::SimObject;
pub use crate::sim_if::SIM_IF;
pub use crate::testbench::{self, Monitor, Scoreboard};
pub use crate::trigger::Trigger;
pub use crate::utils;
pub use crate::value::{BusValue, Val};
pub use crate::{assertion, check, fail_test, pass_test, TbResult};
pub use futures::future::FutureExt;
