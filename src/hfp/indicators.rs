// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Indicator values reported through `+CIND` and `+CIEV`.

use tracing::{debug, warn};

/// Indicators in the order announced by `AT+CIND=?`. The discriminant is the
/// 1-based index used in `+CIEV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Service = 1,
    Call = 2,
    CallSetup = 3,
    CallHeld = 4,
    Signal = 5,
    Roam = 6,
    BatteryCharge = 7,
}

impl Indicator {
    pub const ALL: [Indicator; 7] = [
        Indicator::Service,
        Indicator::Call,
        Indicator::CallSetup,
        Indicator::CallHeld,
        Indicator::Signal,
        Indicator::Roam,
        Indicator::BatteryCharge,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Indicator::Service => "service",
            Indicator::Call => "call",
            Indicator::CallSetup => "callsetup",
            Indicator::CallHeld => "callheld",
            Indicator::Signal => "signal",
            Indicator::Roam => "roam",
            Indicator::BatteryCharge => "battchg",
        }
    }

    pub fn max(self) -> u8 {
        match self {
            Indicator::Service | Indicator::Call | Indicator::Roam => 1,
            Indicator::CallSetup => 3,
            Indicator::CallHeld => 2,
            Indicator::Signal | Indicator::BatteryCharge => 5,
        }
    }

    fn range(self) -> String {
        match self.max() {
            1 => "(0,1)".to_string(),
            max => format!("(0-{})", max),
        }
    }
}

/// Telephony call state as reported by the phone side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Disconnected,
    Incoming,
    Dialing,
    Alerting,
    Connected,
    Holding,
    Held,
    Resuming,
}

/// One call as listed by a call enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo {
    pub state: CallState,
}

/// A value that changed and should be reported as `+CIEV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorChange {
    pub indicator: Indicator,
    pub value: u8,
}

impl IndicatorChange {
    pub fn to_ciev(&self) -> String {
        format!("+CIEV: {},{}", self.indicator.index(), self.value)
    }
}

/// Side effects of a call-state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEffect {
    StartRing,
    StopRing,
    OpenSco,
    CloseSco,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallTransition {
    pub changes: Vec<IndicatorChange>,
    pub effects: Vec<CallEffect>,
}

/// Current indicator values plus the last call state seen.
#[derive(Debug, Clone)]
pub struct CallIndicatorModel {
    values: [u8; 7],
    call_state: CallState,
}

impl Default for CallIndicatorModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CallIndicatorModel {
    pub fn new() -> Self {
        let mut model = Self {
            values: [0; 7],
            call_state: CallState::Disconnected,
        };
        model.values[slot(Indicator::Service)] = 1;
        model.values[slot(Indicator::Signal)] = 5;
        model.values[slot(Indicator::BatteryCharge)] = 5;
        model
    }

    pub fn get(&self, indicator: Indicator) -> u8 {
        self.values[slot(indicator)]
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    /// Store a value. Returns the change to report, or `None` when the value
    /// is unchanged or out of range.
    pub fn set(&mut self, indicator: Indicator, value: u8) -> Option<IndicatorChange> {
        if value > indicator.max() {
            warn!(
                "Ignoring {} value {}, maximum is {}",
                indicator.name(),
                value,
                indicator.max()
            );
            return None;
        }
        let current = &mut self.values[slot(indicator)];
        if *current == value {
            return None;
        }
        *current = value;
        Some(IndicatorChange { indicator, value })
    }

    /// Apply a call-state change.
    pub fn call_state_changed(&mut self, state: CallState) -> CallTransition {
        let previous = self.call_state;
        self.call_state = state;
        let mut transition = CallTransition::default();
        debug!("Call state {:?} -> {:?}", previous, state);

        match state {
            CallState::Incoming => {
                transition.push(self.set(Indicator::CallSetup, 1));
                transition.effects.push(CallEffect::StartRing);
            }
            CallState::Dialing => {
                transition.push(self.set(Indicator::CallSetup, 2));
                transition.effects.push(CallEffect::OpenSco);
            }
            CallState::Alerting => {
                if previous == CallState::Dialing {
                    transition.push(self.set(Indicator::CallSetup, 3));
                } else {
                    warn!("Alerting without dialing first, previous {:?}", previous);
                }
            }
            CallState::Connected => {
                if previous == CallState::Incoming {
                    transition.effects.push(CallEffect::StopRing);
                }
                if matches!(
                    previous,
                    CallState::Incoming | CallState::Dialing | CallState::Alerting
                ) {
                    transition.push(self.set(Indicator::Call, 1));
                    transition.push(self.set(Indicator::CallSetup, 0));
                }
                transition.effects.push(CallEffect::OpenSco);
            }
            CallState::Disconnected => {
                transition.push(self.set(Indicator::Call, 0));
                transition.push(self.set(Indicator::CallSetup, 0));
                transition.effects.push(CallEffect::StopRing);
                transition.effects.push(CallEffect::CloseSco);
            }
            CallState::Holding | CallState::Held | CallState::Resuming => {
                debug!("{:?} is reported through call enumeration", state);
            }
        }
        transition
    }

    /// Derive `callheld` from the full call list: 1 when a held call exists
    /// next to an active one, 2 when every call is held, 0 otherwise.
    pub fn enumerate_calls(&mut self, calls: &[CallInfo]) -> Option<IndicatorChange> {
        let held = calls
            .iter()
            .any(|call| matches!(call.state, CallState::Held | CallState::Holding));
        let active = calls
            .iter()
            .any(|call| matches!(call.state, CallState::Connected | CallState::Resuming));
        let value = match (held, active) {
            (true, true) => 1,
            (true, false) => 2,
            (false, _) => 0,
        };
        self.set(Indicator::CallHeld, value)
    }

    /// Forget call state after the link dropped.
    pub fn reset_calls(&mut self) {
        for indicator in [Indicator::Call, Indicator::CallSetup, Indicator::CallHeld] {
            self.values[slot(indicator)] = 0;
        }
        self.call_state = CallState::Disconnected;
    }

    /// `+CIND: <values>` in announcement order.
    pub fn read_response(&self) -> String {
        let values: Vec<String> = self.values.iter().map(u8::to_string).collect();
        format!("+CIND: {}", values.join(","))
    }

    /// `+CIND: ("name",(range)),...` in announcement order.
    pub fn test_response() -> String {
        let entries: Vec<String> = Indicator::ALL
            .iter()
            .map(|indicator| format!("(\"{}\",{})", indicator.name(), indicator.range()))
            .collect();
        format!("+CIND: {}", entries.join(","))
    }
}

impl CallTransition {
    fn push(&mut self, change: Option<IndicatorChange>) {
        self.changes.extend(change);
    }
}

fn slot(indicator: Indicator) -> usize {
    usize::from(indicator.index() - 1)
}
