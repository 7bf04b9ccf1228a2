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

//! Audio gateway side of the AT command exchange.

use std::cmp::Ordering;
use tracing::{debug, warn};

use super::at::AtCommand;
use super::indicators::{CallIndicatorModel, CallState};
use crate::events::{DialerCommand, SystemMessage, VolumeDirection};

/// Feature bits announced in `+BRSF` by default.
pub const DEFAULT_SUPPORTED_FEATURES: u32 = 23;

const CALL_HOLD_RESPONSE: &str = "+CHLD: (0,1,2,3)";

/// What the manager should do in response to one command line.
#[derive(Debug, Clone, PartialEq)]
pub enum AtAction {
    /// Send a response line; framing is added by the caller.
    Reply(String),
    Broadcast(SystemMessage),
}

#[derive(Debug, Clone)]
pub struct AtCommandInterpreter {
    local_features: u32,
    remote_features: Option<u32>,
    volume: Option<u8>,
}

impl AtCommandInterpreter {
    pub fn new(local_features: u32) -> Self {
        Self {
            local_features,
            remote_features: None,
            volume: None,
        }
    }

    /// Features announced by the remote unit in `AT+BRSF`.
    pub fn remote_features(&self) -> Option<u32> {
        self.remote_features
    }

    /// Last speaker gain, from either side.
    pub fn volume(&self) -> Option<u8> {
        self.volume
    }

    pub fn set_volume(&mut self, gain: u8) {
        self.volume = Some(gain);
    }

    /// Forget per-connection state.
    pub fn reset(&mut self) {
        self.remote_features = None;
    }

    pub fn handle_line(&mut self, line: &str, indicators: &CallIndicatorModel) -> Vec<AtAction> {
        debug!("AT <- {}", line);
        let command = match AtCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                return vec![AtAction::Reply("ERROR".to_string())];
            }
        };

        let mut actions = Vec::new();
        match command {
            AtCommand::SupportedFeatures(features) => {
                if features.is_none() {
                    warn!("Unreadable AT+BRSF feature bitmap");
                }
                self.remote_features = features;
                actions.push(AtAction::Reply(format!("+BRSF: {}", self.local_features)));
            }
            AtCommand::IndicatorTest => {
                actions.push(AtAction::Reply(CallIndicatorModel::test_response()));
            }
            AtCommand::IndicatorRead => {
                actions.push(AtAction::Reply(indicators.read_response()));
            }
            AtCommand::EventReporting | AtCommand::CallHold => {}
            AtCommand::CallHoldTest => {
                actions.push(AtAction::Reply(CALL_HOLD_RESPONSE.to_string()));
            }
            AtCommand::SpeakerGain(gain) => {
                if let Some(direction) = self.volume_direction(gain) {
                    actions.push(AtAction::Broadcast(SystemMessage::volume(direction)));
                }
                self.volume = Some(gain);
            }
            AtCommand::Redial => actions.push(dialer(DialerCommand::Redial)),
            AtCommand::Answer => actions.push(dialer(DialerCommand::Answer)),
            AtCommand::HangUp => actions.push(dialer(DialerCommand::HangUp)),
            AtCommand::KeyPress => {
                let command = match indicators.call_state() {
                    CallState::Incoming => DialerCommand::Answer,
                    CallState::Disconnected => DialerCommand::Redial,
                    _ => DialerCommand::HangUp,
                };
                actions.push(dialer(command));
            }
            AtCommand::Unknown(line) => debug!("Unhandled AT command {}", line),
        }
        actions.push(AtAction::Reply("OK".to_string()));
        actions
    }

    /// An unknown previous gain counts as lower than any new one.
    fn volume_direction(&self, gain: u8) -> Option<VolumeDirection> {
        let Some(previous) = self.volume else {
            return Some(VolumeDirection::Up);
        };
        match gain.cmp(&previous) {
            Ordering::Greater => Some(VolumeDirection::Up),
            Ordering::Less => Some(VolumeDirection::Down),
            Ordering::Equal => None,
        }
    }
}

fn dialer(command: DialerCommand) -> AtAction {
    AtAction::Broadcast(SystemMessage::dialer(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replies(actions: &[AtAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|action| match action {
                AtAction::Reply(line) => Some(line.as_str()),
                AtAction::Broadcast(_) => None,
            })
            .collect()
    }

    fn broadcasts(actions: &[AtAction]) -> Vec<&SystemMessage> {
        actions
            .iter()
            .filter_map(|action| match action {
                AtAction::Broadcast(message) => Some(message),
                AtAction::Reply(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_service_level_setup() {
        let mut interpreter = AtCommandInterpreter::new(DEFAULT_SUPPORTED_FEATURES);
        let model = CallIndicatorModel::new();

        let brsf = interpreter.handle_line("AT+BRSF=127", &model);
        assert_eq!(replies(&brsf), vec!["+BRSF: 23", "OK"]);
        assert_eq!(interpreter.remote_features(), Some(127));

        let read = interpreter.handle_line("AT+CIND?", &model);
        assert_eq!(replies(&read), vec!["+CIND: 1,0,0,0,5,0,5", "OK"]);

        assert_eq!(replies(&interpreter.handle_line("AT+CMER=3,0,0,1", &model)), vec!["OK"]);
        assert_eq!(
            replies(&interpreter.handle_line("AT+CHLD=?", &model)),
            vec!["+CHLD: (0,1,2,3)", "OK"]
        );
        assert_eq!(replies(&interpreter.handle_line("AT+NREC=0", &model)), vec!["OK"]);
    }

    #[test]
    fn test_speaker_gain_direction() {
        let mut interpreter = AtCommandInterpreter::new(DEFAULT_SUPPORTED_FEATURES);
        let model = CallIndicatorModel::new();

        let first = interpreter.handle_line("AT+VGS=3", &model);
        assert_eq!(
            broadcasts(&first),
            vec![&SystemMessage::volume(VolumeDirection::Up)]
        );

        interpreter.set_volume(5);
        let up = interpreter.handle_line("AT+VGS=07", &model);
        assert_eq!(broadcasts(&up), vec![&SystemMessage::volume(VolumeDirection::Up)]);
        assert_eq!(replies(&up), vec!["OK"]);
        assert_eq!(interpreter.volume(), Some(7));

        assert!(broadcasts(&interpreter.handle_line("AT+VGS=7", &model)).is_empty());
        let down = interpreter.handle_line("AT+VGS=2", &model);
        assert_eq!(broadcasts(&down), vec![&SystemMessage::volume(VolumeDirection::Down)]);
    }

    #[test]
    fn test_unreadable_features_still_answered() {
        let mut interpreter = AtCommandInterpreter::new(DEFAULT_SUPPORTED_FEATURES);
        let model = CallIndicatorModel::new();
        let brsf = interpreter.handle_line("AT+BRSF=none", &model);
        assert_eq!(replies(&brsf), vec!["+BRSF: 23", "OK"]);
        assert_eq!(interpreter.remote_features(), None);
    }

    #[test]
    fn test_bad_gain_is_an_error() {
        let mut interpreter = AtCommandInterpreter::new(DEFAULT_SUPPORTED_FEATURES);
        let model = CallIndicatorModel::new();
        interpreter.set_volume(5);
        let actions = interpreter.handle_line("AT+VGS=16", &model);
        assert_eq!(actions, vec![AtAction::Reply("ERROR".to_string())]);
        assert_eq!(interpreter.volume(), Some(5));
    }

    #[test]
    fn test_dialer_commands() {
        let mut interpreter = AtCommandInterpreter::new(DEFAULT_SUPPORTED_FEATURES);
        let model = CallIndicatorModel::new();
        for (line, command) in [
            ("AT+BLDN", DialerCommand::Redial),
            ("ATA", DialerCommand::Answer),
            ("AT+CHUP", DialerCommand::HangUp),
        ] {
            let actions = interpreter.handle_line(line, &model);
            assert_eq!(broadcasts(&actions), vec![&SystemMessage::dialer(command)]);
            assert_eq!(replies(&actions), vec!["OK"]);
        }
    }

    #[test]
    fn test_key_press_follows_call_state() {
        let mut interpreter = AtCommandInterpreter::new(DEFAULT_SUPPORTED_FEATURES);
        let mut model = CallIndicatorModel::new();
        let key = |interpreter: &mut AtCommandInterpreter, model: &CallIndicatorModel| {
            broadcasts(&interpreter.handle_line("AT+CKPD=200", model))[0].clone()
        };

        assert_eq!(key(&mut interpreter, &model), SystemMessage::dialer(DialerCommand::Redial));
        model.call_state_changed(CallState::Incoming);
        assert_eq!(key(&mut interpreter, &model), SystemMessage::dialer(DialerCommand::Answer));
        model.call_state_changed(CallState::Connected);
        assert_eq!(key(&mut interpreter, &model), SystemMessage::dialer(DialerCommand::HangUp));
        model.call_state_changed(CallState::Disconnected);
        model.call_state_changed(CallState::Dialing);
        assert_eq!(key(&mut interpreter, &model), SystemMessage::dialer(DialerCommand::HangUp));
    }
}
