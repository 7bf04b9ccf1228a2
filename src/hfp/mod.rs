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

//! Hands-Free and Headset profiles, audio gateway role.

mod at;
mod indicators;
mod interpreter;
mod manager;
mod ring;

pub use at::{frame, AtCommand, AtError, LineBuffer, MAX_LINE_LENGTH, MAX_VGS};
pub use indicators::{
    CallEffect, CallIndicatorModel, CallInfo, CallState, CallTransition, Indicator,
    IndicatorChange,
};
pub use interpreter::{AtAction, AtCommandInterpreter, DEFAULT_SUPPORTED_FEATURES};
pub use manager::{HfpManager, HfpRole, HfpSettings};
pub use ring::{RingIndicator, RING_INTERVAL};
