use std::collections::VecDeque;
use std::fmt::{self, Debug};

use crate::prelude::*;
use crate::tb_obj::TbObj;

/*
 * SCOREBOARD
 */

/// One expected/received pair that did not match.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch<T> {
    /// Position in the compared stream, starting at 0.
    pub index: u32,
    pub label: Option<String>,
    pub expected: T,
    pub received: T,
}

impl<T: Debug> fmt::Display for Mismatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)?;
        if let Some(label) = &self.label {
            write!(f, " ({})", label)?;
        }
        write!(f, ": expected {:?}, received {:?}", self.expected, self.received)
    }
}

/// Compares expected and received items in order. Mismatches are recorded
/// and comparison continues, so a run reports every one of them.
pub struct Scoreboard<T>(TbObj<ScoreboardInner<T>>);

impl<T> Clone for Scoreboard<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq + Debug + Clone> Scoreboard<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(TbObj::new(ScoreboardInner {
            exp_q: VecDeque::new(),
            recv_q: VecDeque::new(),
            mismatches: Vec::new(),
            expected: 0,
            received: 0,
            matched: 0,
        }))
    }
    pub fn add_exp(&self, data: T) {
        self.push_exp(None, data);
    }
    pub fn add_exp_labeled(&self, label: &str, data: T) {
        self.push_exp(Some(label.to_string()), data);
    }
    fn push_exp(&self, label: Option<String>, data: T) {
        self.0.with_mut(|s| {
            s.exp_q.push_back((label, data));
            s.expected += 1;
            s.compare();
        });
    }
    pub fn add_recv(&self, data: T) {
        self.0.with_mut(|s| {
            s.recv_q.push_back(data);
            s.received += 1;
            s.compare();
        });
    }
    pub fn mismatches(&self) -> Vec<Mismatch<T>> {
        self.0.get().mismatches.clone()
    }
    pub fn passed(&self) -> bool {
        let s = self.0.get();
        s.expected > 0
            && s.received == s.expected
            && s.matched == s.received
            && s.mismatches.is_empty()
            && s.exp_q.is_empty()
            && s.recv_q.is_empty()
    }
    pub fn result_str(&self) -> String {
        let s = self.0.get();
        format!(
            "expected={}, received={}, matched={}, errors={}, expQ: {}, recvQ: {}",
            s.expected,
            s.received,
            s.matched,
            s.mismatches.len(),
            s.exp_q.len(),
            s.recv_q.len()
        )
    }
    /// `Ok` with the summary, or `Err` with the summary and every mismatch.
    pub fn result(&self) -> TbResult {
        if self.passed() {
            return Ok(Val::String(self.result_str()));
        }
        let mut msg = self.result_str();
        for m in self.mismatches() {
            msg.push('\n');
            msg.push_str(&m.to_string());
        }
        Err(Val::String(msg))
    }
}

struct ScoreboardInner<T> {
    exp_q: VecDeque<(Option<String>, T)>,
    recv_q: VecDeque<T>,
    mismatches: Vec<Mismatch<T>>,
    expected: u32,
    received: u32,
    matched: u32,
}

impl<T: PartialEq> ScoreboardInner<T> {
    fn compare(&mut self) {
        while !self.exp_q.is_empty() && !self.recv_q.is_empty() {
            let (Some((label, expected)), Some(received)) =
                (self.exp_q.pop_front(), self.recv_q.pop_front())
            else {
                break;
            };
            let index = self.matched + self.mismatches.len() as u32;
            if expected == received {
                self.matched += 1;
            } else {
                self.mismatches.push(Mismatch { index, label, expected, received });
            }
        }
    }
}

/*
 * MONITOR
 */

/// Forwards observed items to a scoreboard, as expected or received.
pub struct Monitor<T>(TbObj<MonitorInner<T>>);

impl<T> Clone for Monitor<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq + Debug + Clone> Monitor<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(TbObj::new(MonitorInner {
            enable: true,
            exp_not_recv: true,
            scoreboard: None,
        }))
    }
    pub fn set_scoreboard(&self, sb: Scoreboard<T>, exp_not_recv: bool) {
        self.0.with_mut(|m| {
            m.exp_not_recv = exp_not_recv;
            m.scoreboard = Some(sb);
        })
    }
    pub fn enable(&self, on: bool) {
        self.0.with_mut(|m| m.enable = on);
    }
    /// Panics if no scoreboard is set.
    pub fn to_scoreboard(&self, data: T) {
        self.forward(None, data);
    }
    pub fn to_scoreboard_labeled(&self, label: &str, data: T) {
        self.forward(Some(label), data);
    }
    fn forward(&self, label: Option<&str>, data: T) {
        let (enable, exp_not_recv, sb) =
            self.0.with(|m| (m.enable, m.exp_not_recv, m.scoreboard.clone()));
        if !enable {
            return;
        }
        let Some(sb) = sb else {
            panic!("Can't forward data to scoreboard. No scoreboard set");
        };
        match (exp_not_recv, label) {
            (true, Some(label)) => sb.add_exp_labeled(label, data),
            (true, None) => sb.add_exp(data),
            (false, _) => sb.add_recv(data),
        }
    }
}

struct MonitorInner<T> {
    enable: bool,
    exp_not_recv: bool,
    scoreboard: Option<Scoreboard<T>>,
}

/*
 * CLOCK
 */

/// Drives `clk` low for the first half of each period, high for the second.
pub async fn clock(clk: SimObject, period: u32, unit: &str) -> TbResult {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        SIM_IF.log(&format!("Warning: Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.", period=period, unit=unit, high=high_t, low=low_t));
    }
    loop {
        clk.set(0);
        Trigger::timer(low_t as u64, unit).await;
        clk.set(1);
        Trigger::timer(high_t as u64, unit).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scoreboard_matches_in_order() {
        let sb = Scoreboard::new();
        sb.add_exp(1u8);
        sb.add_exp(2);
        sb.add_recv(1);
        assert!(!sb.passed());
        sb.add_recv(2);
        assert!(sb.passed());
        assert!(sb.result().is_ok());
    }

    #[test]
    fn scoreboard_records_every_mismatch() {
        let sb = Scoreboard::new();
        for (i, (exp, recv)) in [(1u8, 1u8), (2, 3), (4, 4), (5, 6)].into_iter().enumerate() {
            sb.add_exp_labeled(&format!("step {}", i), exp);
            sb.add_recv(recv);
        }
        assert_eq!(
            sb.mismatches(),
            vec![
                Mismatch { index: 1, label: Some("step 1".to_string()), expected: 2, received: 3 },
                Mismatch { index: 3, label: Some("step 3".to_string()), expected: 5, received: 6 },
            ]
        );
        let Err(Val::String(msg)) = sb.result() else {
            panic!("scoreboard should fail");
        };
        assert!(msg.contains("errors=2"));
        assert!(msg.contains("#3 (step 3): expected 5, received 6"));
    }

    #[test]
    fn empty_scoreboard_does_not_pass() {
        let sb: Scoreboard<u8> = Scoreboard::new();
        assert!(!sb.passed());
    }

    #[test]
    fn monitor_forwards_to_side() {
        let sb = Scoreboard::new();
        let exp = Monitor::new();
        let recv = Monitor::new();
        exp.set_scoreboard(sb.clone(), true);
        recv.set_scoreboard(sb.clone(), false);
        exp.to_scoreboard(7u8);
        recv.enable(false);
        recv.to_scoreboard(9);
        recv.enable(true);
        recv.to_scoreboard(7);
        assert!(sb.passed());
    }

    #[test]
    fn labeled_monitor_names_the_mismatch() {
        let sb = Scoreboard::new();
        let exp = Monitor::new();
        let recv = Monitor::new();
        exp.set_scoreboard(sb.clone(), true);
        recv.set_scoreboard(sb.clone(), false);
        exp.to_scoreboard_labeled("edge 0", 1u8);
        recv.to_scoreboard_labeled("ignored on the received side", 2);
        assert_eq!(
            sb.mismatches(),
            vec![Mismatch { index: 0, label: Some("edge 0".to_string()), expected: 1, received: 2 }]
        );
    }
}
