use std::cell::RefCell;

use fnv::FnvHashMap;

use crate::error::{SimError, SimResult};
use crate::sim_if::SIM_IF;
use crate::trigger::Trigger;
use crate::value::{BusValue, LogicVec, Val};
use crate::TbResult;

thread_local! {
    static SIG_MAP_NAME: RefCell<FnvHashMap<String, SimObject>> = RefCell::new(FnvHashMap::default());
}

pub(crate) fn clear_cache() {
    SIG_MAP_NAME.with(|m| m.borrow_mut().clear());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Int(u32),
    Hier,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn name(&self) -> String {
        SIM_IF
            .get_full_name(self)
            .unwrap_or_else(|_| format!("<handle {}>", self.handle))
    }

    pub fn size(&self) -> u32 {
        match self.kind {
            ObjectKind::Int(size) => size,
            _ => panic!("{} does not have a size.", self.name()),
        }
    }

    pub fn get_child(&self, name: &str) -> SimResult<Self> {
        let mut child_name = self.name();
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    pub fn from_name(full_name: &str) -> SimResult<Self> {
        if let Some(obj) = SIG_MAP_NAME.with(|m| m.borrow().get(full_name).copied()) {
            return Ok(obj);
        }
        let obj = SIM_IF.get_object_by_name(full_name)?;
        SIG_MAP_NAME.with(|m| m.borrow_mut().insert(full_name.to_string(), obj));
        Ok(obj)
    }

    pub fn get_root() -> SimResult<Self> {
        SIM_IF.get_root_object()
    }

    /// Child by name; panics if there is none.
    pub fn c(&self, name: &str) -> Self {
        self.get_child(name)
            .unwrap_or_else(|e| panic!("Could not get object {}.{}: {}", self.name(), name, e))
    }

    pub fn try_u32(&self) -> SimResult<u32> {
        SIM_IF.get_value(self)
    }

    pub fn u32(&self) -> u32 {
        self.try_u32()
            .unwrap_or_else(|e| panic!("Can't read {}: {}", self.name(), e))
    }

    pub fn logic(&self) -> SimResult<LogicVec> {
        SIM_IF.get_logic(self)
    }

    pub fn bin(&self) -> String {
        SIM_IF
            .get_value_bin(self)
            .unwrap_or_else(|e| panic!("Can't read {}: {}", self.name(), e))
    }

    /// Bus view of an 8-bit signal; fails if the bus is only partially driven.
    pub fn try_bus(&self) -> SimResult<BusValue> {
        let v = self.logic()?;
        v.to_bus().ok_or_else(|| SimError::Unresolved {
            name: self.name(),
            bin: v.to_bin(),
        })
    }

    pub fn bus(&self) -> BusValue {
        self.try_bus()
            .unwrap_or_else(|e| panic!("Can't read {} as a bus: {}", self.name(), e))
    }

    pub fn is_high_z(&self) -> bool {
        self.logic().map(|v| v.is_high_z()).unwrap_or(false)
    }

    pub fn try_set(&self, val: u32) -> SimResult<()> {
        SIM_IF.set_value(self, val)
    }

    pub fn set(&self, val: u32) {
        self.try_set(val)
            .unwrap_or_else(|e| panic!("Can't set {} to {}: {}", self.name(), val, e));
    }

    pub fn try_set_bin(&self, val: &str) -> SimResult<()> {
        SIM_IF.set_value_bin(self, val)
    }

    pub fn set_bin(&self, val: &str) {
        self.try_set_bin(val)
            .unwrap_or_else(|e| panic!("Can't set {} to {}: {}", self.name(), val, e));
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) -> TbResult {
        self.rising_edge().await;
        Trigger::read_only().await;
        Ok(Val::None)
    }
    pub async fn rising_edge_rw(self) -> TbResult {
        self.rising_edge().await;
        Trigger::read_write().await;
        Ok(Val::None)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}
