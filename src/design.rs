use crate::value::LogicVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub name: &'static str,
    pub width: u32,
    pub direction: PortDirection,
}

impl Port {
    pub const fn input(name: &'static str, width: u32) -> Self {
        Port { name, width, direction: PortDirection::Input }
    }

    pub const fn output(name: &'static str, width: u32) -> Self {
        Port { name, width, direction: PortDirection::Output }
    }
}

/// Port values handed to a design, keyed by port name.
#[derive(Debug, Clone, Default)]
pub struct Pins(Vec<(&'static str, LogicVec)>);

impl Pins {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<LogicVec> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    /// Integer value of a port; `z`/`x` bits and missing ports read as 0.
    pub fn bits(&self, name: &str) -> u64 {
        self.get(name).map_or(0, |v| v.to_u64_lossy())
    }

    pub fn bit(&self, name: &str) -> bool {
        self.bits(name) & 1 != 0
    }

    pub fn set(&mut self, name: &'static str, value: LogicVec) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, LogicVec)> {
        self.0.iter()
    }
}

/// A synchronous design hosted by the native kernel.
///
/// The kernel calls [`clock_edge`](Design::clock_edge) once per rising edge
/// of the clock port, with the inputs as committed at that edge, and
/// [`drive`](Design::drive) after every change to recompute the outputs.
pub trait Design {
    fn name(&self) -> &str;
    fn ports(&self) -> Vec<Port>;
    fn clock(&self) -> &'static str;
    fn clock_edge(&mut self, inputs: &Pins);
    fn drive(&self, inputs: &Pins, outputs: &mut Pins);
}
