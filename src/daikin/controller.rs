use super::{
    packet::{self, EncodedCommand, Frame, FrameError},
    phy::{Phy, PhyError},
    ClimateState, Fan, Features, Mode, Model, Preset, Swing,
};
use log::{debug, info, warn};
use std::{
    fmt,
    time::{Duration, Instant},
};
use strum::IntoEnumIterator;
use thiserror::Error;

/// The unit leaves boost on its own, the controller follows after this long.
pub const BOOST_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Hands an encoded command to the IR hardware. Fire and forget: the
/// controller does not wait for the physical transmission.
pub trait Transmitter {
    type Error: fmt::Display;

    fn transmit(&mut self, command: &EncodedCommand) -> Result<(), Self::Error>;
}

/// What a hosting climate framework needs from a device.
pub trait Climate {
    fn traits(&self) -> ClimateTraits;
    fn state(&self) -> &ClimateState;
    fn current_temperature(&self) -> Option<f32>;
    /// Returns true if a command was transmitted.
    fn control(&mut self, change: &StateChange) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClimateTraits {
    pub min_temperature: u8,
    pub max_temperature: u8,
    pub temperature_step: f32,
    pub supports_current_temperature: bool,
    pub modes: Vec<Mode>,
    pub fans: Vec<Fan>,
    pub swings: Vec<Swing>,
    pub presets: Vec<Preset>,
}

/// A partial update: only the fields that are set are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateChange {
    pub mode: Option<Mode>,
    pub target_temperature: Option<f32>,
    pub fan: Option<Fan>,
    pub swing: Option<Swing>,
    pub preset: Option<Preset>,
}

impl StateChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn target_temperature(mut self, temperature: f32) -> Self {
        self.target_temperature = Some(temperature);
        self
    }

    pub fn fan(mut self, fan: Fan) -> Self {
        self.fan = Some(fan);
        self
    }

    pub fn swing(mut self, swing: Swing) -> Self {
        self.swing = Some(swing);
        self
    }

    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = Some(preset);
        self
    }
}

#[derive(Error, Debug, Clone, Copy)]
pub enum ReceiveError {
    #[error("PHY error: {0}")]
    PhyError(#[from] PhyError),
    #[error("frame error: {0}")]
    FrameError(#[from] FrameError),
}

/// Owns the desired climate state of one unit and transmits it whenever a
/// request changes it. Bound to a single remote model for its lifetime.
pub struct Controller<T> {
    model: Model,
    features: Features,
    has_sensor: bool,

    state: ClimateState,
    // What the unit was last told, either by us or by its own remote
    last_transmitted: ClimateState,
    // Restarted by every command carrying boost, sent or received
    boost_started: Option<Instant>,
    clock: Box<dyn Fn() -> Instant>,

    sensor_temperature: Option<f32>,
    estimated_temperature: Option<f32>,

    transmitter: T,
}

impl<T: Transmitter> Controller<T> {
    pub fn new(model: Model, features: Features, has_sensor: bool, transmitter: T) -> Self {
        let state = ClimateState::new(model);
        Self {
            model,
            features,
            has_sensor,
            state,
            last_transmitted: state,
            boost_started: None,
            clock: Box::new(Instant::now),
            sensor_temperature: None,
            estimated_temperature: None,
            transmitter,
        }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn state(&self) -> &ClimateState {
        &self.state
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// Replaces the time source used to start the boost timer.
    pub fn set_clock(&mut self, clock: impl Fn() -> Instant + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn transmitter_mut(&mut self) -> &mut T {
        &mut self.transmitter
    }

    /// Applies the valid parts of `change` and transmits if the result
    /// differs from what the unit last received. Returns true if a command
    /// was transmitted.
    ///
    /// Setpoints are clamped to the model's range; fields gated off by the
    /// feature flags are ignored while the rest of the change still applies.
    pub fn request_state_change(&mut self, change: &StateChange) -> bool {
        let mut next = self.state;

        if let Some(mode) = change.mode {
            next.mode = mode;
        }

        if let Some(temperature) = change.target_temperature {
            match self.model.clamp_temperature(temperature) {
                Some(t) => next.target_temperature = t,
                None => warn!("ignoring invalid target temperature {}", temperature),
            }
        }

        if let Some(fan) = change.fan {
            next.fan = fan;
        }

        if let Some(swing) = change.swing {
            if self.features.allows_swing(swing) {
                next.swing = swing;
            } else {
                warn!("swing {} is disabled", swing.as_ref());
            }
        }

        if let Some(preset) = change.preset {
            if self.features.allows_preset(preset, next.mode) {
                next.preset = preset;
            } else {
                warn!(
                    "preset {} is not available in mode {}",
                    preset.as_ref(),
                    next.mode.as_ref()
                );
            }
        }

        self.update(next);

        if self.state == self.last_transmitted {
            debug!("state unchanged, nothing to transmit");
            return false;
        }
        self.transmit_state()
    }

    /// Encodes and sends the current state regardless of what was sent before.
    pub fn transmit_state(&mut self) -> bool {
        let command = packet::encode(&self.state, self.model);
        match self.transmitter.transmit(&command) {
            Ok(()) => {
                self.last_transmitted = self.state;
                if self.state.preset == Preset::Boost {
                    self.boost_started = Some((self.clock)());
                }
                true
            }
            Err(e) => {
                warn!("failed to transmit state: {}", e);
                false
            }
        }
    }

    /// Drops an expired boost preset. Returns true if the state changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let expired = self
            .boost_started
            .map_or(false, |started| now.saturating_duration_since(started) >= BOOST_TIMEOUT);
        if !expired {
            return false;
        }

        self.boost_started = None;
        if self.state.preset != Preset::Boost {
            return false;
        }

        info!("boost preset expired");
        self.state.preset = Preset::None;
        if self.last_transmitted.preset == Preset::Boost {
            self.last_transmitted.preset = Preset::None;
        }
        true
    }

    /// Decodes a pulse train captured from the unit's own remote and applies it.
    pub fn receive(
        &mut self,
        phy: &Phy,
        pulses: impl Iterator<Item = Duration>,
    ) -> Result<bool, ReceiveError> {
        let frames = phy
            .decode(pulses)?
            .iter()
            .map(|bytes| Frame::parse(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.on_receive(&frames))
    }

    /// Applies frames sent by the unit's own remote. Nothing is transmitted
    /// since the unit already received them. Returns true if the state changed.
    pub fn on_receive(&mut self, frames: &[Frame]) -> bool {
        let mut next = self.state;
        let mut boost_received = false;

        for frame in frames {
            debug!("received frame: {:?}", frame);
            match frame {
                Frame::First(first) => {
                    if first.comfort() {
                        next.preset = Preset::Comfort;
                    } else if next.preset == Preset::Comfort {
                        next.preset = Preset::None;
                    }
                }
                Frame::Time(_) => {}
                Frame::State(state) => {
                    if let Some(mode) = state.mode() {
                        next.mode = mode;
                    }
                    if let Some(t) = state.temperature().and_then(|t| self.model.clamp_temperature(t as f32)) {
                        next.target_temperature = t;
                    }
                    if let Some(fan) = state.fan() {
                        next.fan = fan;
                    }

                    let swing = state.swing();
                    if self.features.allows_swing(swing) {
                        next.swing = swing;
                    } else {
                        warn!("received disabled swing {}", swing.as_ref());
                    }

                    match state.preset() {
                        Some(preset) if self.features.allows_preset(preset, next.mode) => {
                            boost_received = preset == Preset::Boost;
                            next.preset = preset
                        }
                        Some(preset) => warn!("received disabled preset {}", preset.as_ref()),
                        None if matches!(next.preset, Preset::Boost | Preset::Eco) => {
                            next.preset = Preset::None
                        }
                        None => {}
                    }
                }
            }
        }

        let changed = self.update(next);
        self.last_transmitted = self.state;
        if boost_received && self.state.preset == Preset::Boost {
            self.boost_started = Some((self.clock)());
        }
        changed
    }

    /// Reading from the external sensor. Ignored unless one was configured.
    pub fn set_sensor_temperature(&mut self, temperature: f32) {
        if self.has_sensor {
            self.sensor_temperature = Some(temperature);
        } else {
            debug!("no sensor configured, ignoring reading {}", temperature);
        }
    }

    pub fn update_estimated_temperature(&mut self, temperature: f32) {
        self.estimated_temperature = Some(temperature);
    }

    pub fn current_temperature(&self) -> Option<f32> {
        self.sensor_temperature
            .filter(|_| self.has_sensor)
            .or(self.estimated_temperature)
    }

    pub fn traits(&self) -> ClimateTraits {
        ClimateTraits {
            min_temperature: self.model.min_temperature(),
            max_temperature: self.model.max_temperature(),
            temperature_step: 1.0,
            supports_current_temperature: true,
            modes: Mode::iter().collect(),
            fans: Fan::iter().collect(),
            swings: Swing::iter()
                .filter(|&s| self.features.allows_swing(s))
                .collect(),
            presets: Preset::iter()
                .filter(|&p| self.features.allows_preset(p, Mode::Cool))
                .collect(),
        }
    }

    // Enforces cross-field rules, then stores the state. Returns true if it changed.
    fn update(&mut self, mut next: ClimateState) -> bool {
        if next.mode == Mode::FanOnly && next.preset == Preset::Eco {
            next.preset = Preset::None;
        }

        // Comfort blows away from people, the vertical louver stays put
        if next.preset == Preset::Comfort {
            next.swing = match next.swing {
                Swing::Both if self.features.allows_swing(Swing::Horizontal) => Swing::Horizontal,
                Swing::Horizontal => Swing::Horizontal,
                _ => Swing::Off,
            };
        }

        if next.preset != Preset::Boost {
            self.boost_started = None;
        }

        if next == self.state {
            return false;
        }

        info!("state changed: {:?}", next);
        self.state = next;
        true
    }
}

impl<T: Transmitter> Climate for Controller<T> {
    fn traits(&self) -> ClimateTraits {
        Controller::traits(self)
    }

    fn state(&self) -> &ClimateState {
        Controller::state(self)
    }

    fn current_temperature(&self) -> Option<f32> {
        Controller::current_temperature(self)
    }

    fn control(&mut self, change: &StateChange) -> bool {
        self.request_state_change(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    #[derive(Default)]
    struct Recorder {
        commands: Vec<EncodedCommand>,
        fail: bool,
    }

    impl Transmitter for Recorder {
        type Error = &'static str;

        fn transmit(&mut self, command: &EncodedCommand) -> Result<(), Self::Error> {
            if self.fail {
                return Err("transmitter offline");
            }
            self.commands.push(command.clone());
            Ok(())
        }
    }

    fn controller(model: Model, features: Features) -> Controller<Recorder> {
        Controller::new(model, features, false, Recorder::default())
    }

    fn sent(controller: &Controller<Recorder>) -> usize {
        controller.transmitter().commands.len()
    }

    #[test]
    fn test_initial_state() {
        let c = controller(Model::Arc432a14, Features::default());
        assert_eq!(c.state().mode, Mode::Off);
        assert_eq!(c.state().target_temperature, 22);
        assert_eq!(c.state().fan, Fan::Auto);
        assert_eq!(c.state().swing, Swing::Off);
        assert_eq!(c.state().preset, Preset::None);
        assert_eq!(sent(&c), 0);
    }

    #[test]
    fn test_cool_23() {
        let mut c = controller(Model::Arc470a1, Features::default());
        assert!(c.request_state_change(&StateChange::new().mode(Mode::Cool).target_temperature(23.0)));

        let commands = &c.transmitter().commands;
        assert_eq!(commands.len(), 1);
        let frame = commands[0].state_frame().unwrap();
        assert_eq!(frame.mode(), Some(Mode::Cool));
        assert_eq!(frame.temperature_raw(), 46);
    }

    #[test]
    fn test_deduplication() {
        let mut c = controller(Model::Arc470a1, Features::default());
        let change = StateChange::new().mode(Mode::Heat).fan(Fan::Level2);
        assert!(c.request_state_change(&change));
        assert!(!c.request_state_change(&change));
        assert_eq!(sent(&c), 1);

        // Back to the initial state is a change too
        assert!(c.request_state_change(&StateChange::new().mode(Mode::Off).fan(Fan::Auto)));
        assert_eq!(sent(&c), 2);
    }

    #[test]
    fn test_clamping() {
        let mut c = controller(Model::Arc470a1, Features::default());
        c.request_state_change(&StateChange::new().target_temperature(-5.0));
        assert_eq!(c.state().target_temperature, 10);
        c.request_state_change(&StateChange::new().target_temperature(45.0));
        assert_eq!(c.state().target_temperature, 30);
        c.request_state_change(&StateChange::new().target_temperature(f32::NAN));
        assert_eq!(c.state().target_temperature, 30);

        let mut c = controller(Model::Arc432a14, Features::default());
        c.request_state_change(&StateChange::new().mode(Mode::Heat).target_temperature(12.0));
        assert_eq!(c.state().target_temperature, 18);
        c.request_state_change(&StateChange::new().target_temperature(32.4));
        assert_eq!(c.state().target_temperature, 32);
    }

    #[test]
    fn test_swing_gating() {
        let features = Features {
            swing_horizontal: false,
            ..Features::default()
        };
        let mut c = controller(Model::Arc470a1, features);

        for preset in [Preset::None, Preset::Comfort, Preset::None] {
            for swing in Swing::iter() {
                c.request_state_change(&StateChange::new().mode(Mode::Cool).swing(swing).preset(preset));
                assert!(!c.state().swing_horizontal(), "{:?} {:?}", swing, preset);
            }
        }

        // The rest of the change still applies
        c.request_state_change(&StateChange::new().swing(Swing::Vertical));
        c.request_state_change(&StateChange::new().swing(Swing::Horizontal).fan(Fan::Level5));
        assert_eq!(c.state().swing, Swing::Vertical);
        assert_eq!(c.state().fan, Fan::Level5);
    }

    #[test]
    fn test_disabled_eco_is_ignored() {
        let features = Features {
            preset_eco: false,
            ..Features::default()
        };
        let mut c = controller(Model::Arc470a1, features);
        assert!(!c.request_state_change(&StateChange::new().preset(Preset::Eco)));
        assert_eq!(c.state().preset, Preset::None);
        assert_eq!(sent(&c), 0);
    }

    #[test]
    fn test_eco_and_fan_only() {
        let mut c = controller(Model::Arc470a1, Features::default());
        c.request_state_change(&StateChange::new().mode(Mode::FanOnly).preset(Preset::Eco));
        assert_eq!(c.state().preset, Preset::None);

        c.request_state_change(&StateChange::new().mode(Mode::Cool).preset(Preset::Eco));
        assert_eq!(c.state().preset, Preset::Eco);

        c.request_state_change(&StateChange::new().mode(Mode::FanOnly));
        assert_eq!(c.state().preset, Preset::None);
    }

    #[test]
    fn test_comfort_stops_vertical_swing() {
        let mut c = controller(Model::Arc470a1, Features::default());
        c.request_state_change(&StateChange::new().mode(Mode::Heat).swing(Swing::Both));
        c.request_state_change(&StateChange::new().preset(Preset::Comfort));
        assert_eq!(c.state().swing, Swing::Horizontal);

        c.request_state_change(&StateChange::new().swing(Swing::Vertical));
        assert_eq!(c.state().swing, Swing::Off);

        let last = c.transmitter().commands.last().unwrap();
        assert!(matches!(last.frames[0], Frame::First(f) if f.comfort()));
    }

    fn manual_clock(c: &mut Controller<Recorder>) -> Rc<Cell<Instant>> {
        let now = Rc::new(Cell::new(Instant::now()));
        let clock = now.clone();
        c.set_clock(move || clock.get());
        now
    }

    #[test]
    fn test_boost_timeout() {
        let mut c = controller(Model::Arc470a1, Features::default());
        let now = manual_clock(&mut c);
        let start = now.get();

        c.request_state_change(&StateChange::new().mode(Mode::Cool).preset(Preset::Boost));
        assert_eq!(c.state().preset, Preset::Boost);

        assert!(!c.poll(start + BOOST_TIMEOUT - Duration::from_secs(1)));
        assert_eq!(c.state().preset, Preset::Boost);

        assert!(c.poll(start + BOOST_TIMEOUT));
        assert_eq!(c.state().preset, Preset::None);
        assert_eq!(sent(&c), 1);

        // The unit dropped boost by itself, nothing to resend
        assert!(!c.request_state_change(&StateChange::new().preset(Preset::None)));
    }

    #[test]
    fn test_boost_restarts_with_every_command() {
        let mut c = controller(Model::Arc470a1, Features::default());
        let now = manual_clock(&mut c);
        let start = now.get();

        c.request_state_change(&StateChange::new().mode(Mode::Cool).preset(Preset::Boost));

        // The unit starts a fresh boost period with this command
        now.set(start + Duration::from_secs(9 * 60));
        assert!(c.request_state_change(&StateChange::new().target_temperature(24.0)));
        assert_eq!(c.transmitter().commands[1].bytes()[16 + 13], 0x01);

        assert!(!c.poll(start + BOOST_TIMEOUT));
        assert_eq!(c.state().preset, Preset::Boost);
        assert!(c.poll(now.get() + BOOST_TIMEOUT));
        assert_eq!(c.state().preset, Preset::None);
    }

    #[test]
    fn test_received_boost_restarts_timer() {
        let mut c = controller(Model::Arc470a1, Features::default());
        let now = manual_clock(&mut c);
        let start = now.get();

        c.request_state_change(&StateChange::new().mode(Mode::Cool).preset(Preset::Boost));
        let command = packet::encode(c.state(), Model::Arc470a1);

        // Same state from the remote: nothing changes but the period restarts
        now.set(start + Duration::from_secs(5 * 60));
        assert!(!c.on_receive(&command.frames));

        assert!(!c.poll(start + BOOST_TIMEOUT));
        assert!(c.poll(now.get() + BOOST_TIMEOUT));
        assert_eq!(sent(&c), 1);
    }

    #[test]
    fn test_failed_boost_does_not_start_timer() {
        let mut c = controller(Model::Arc470a1, Features::default());
        let now = manual_clock(&mut c);
        c.transmitter_mut().fail = true;

        c.request_state_change(&StateChange::new().mode(Mode::Heat).preset(Preset::Boost));
        assert!(!c.poll(now.get() + BOOST_TIMEOUT * 2));
        assert_eq!(c.state().preset, Preset::Boost);
    }

    #[test]
    fn test_disabled_boost() {
        let features = Features {
            preset_boost: false,
            ..Features::default()
        };
        let mut c = controller(Model::Arc432a14, features);
        c.request_state_change(&StateChange::new().mode(Mode::Cool).preset(Preset::Boost));
        assert_eq!(c.state().preset, Preset::None);
        assert!(!c.poll(Instant::now() + BOOST_TIMEOUT * 2));
    }

    #[test]
    fn test_receive_from_remote() {
        let remote_state = ClimateState {
            mode: Mode::Heat,
            target_temperature: 26,
            fan: Fan::Quiet,
            swing: Swing::Both,
            preset: Preset::Eco,
        };
        let command = packet::encode(&remote_state, Model::Arc470a1);

        let mut c = controller(Model::Arc470a1, Features::default());
        assert!(c.receive(&Phy::new(), command.pulses.iter().copied()).unwrap());
        assert_eq!(*c.state(), remote_state);
        assert_eq!(sent(&c), 0);

        // The unit already has this state
        assert!(!c.request_state_change(&StateChange::new().mode(Mode::Heat)));
        assert_eq!(sent(&c), 0);
    }

    #[test]
    fn test_receive_keeps_setpoint_without_one() {
        let mut c = controller(Model::Arc470a1, Features::default());
        c.request_state_change(&StateChange::new().mode(Mode::Cool).target_temperature(24.0));

        for mode in [Mode::FanOnly, Mode::Dry, Mode::Auto] {
            let remote_state = ClimateState {
                mode,
                target_temperature: 18,
                ..ClimateState::new(Model::Arc470a1)
            };
            let command = packet::encode(&remote_state, Model::Arc470a1);
            assert_eq!(command.state_frame().unwrap().temperature(), None);

            assert!(c.on_receive(&command.frames));
            assert_eq!(c.state().mode, mode);
            assert_eq!(c.state().target_temperature, 24, "{:?}", mode);
        }
    }

    #[test]
    fn test_receive_respects_features() {
        let remote_state = ClimateState {
            mode: Mode::Cool,
            target_temperature: 21,
            fan: Fan::Auto,
            swing: Swing::Horizontal,
            preset: Preset::Boost,
        };
        let command = packet::encode(&remote_state, Model::Arc470a1);

        let features = Features {
            swing_horizontal: false,
            preset_boost: false,
            ..Features::default()
        };
        let mut c = controller(Model::Arc470a1, features);
        c.on_receive(&command.frames);
        assert_eq!(c.state().target_temperature, 21);
        assert_eq!(c.state().swing, Swing::Off);
        assert_eq!(c.state().preset, Preset::None);
    }

    #[test]
    fn test_receive_errors() {
        let mut c = controller(Model::Arc470a1, Features::default());
        let mut bytes = packet::encode(&ClimateState::new(Model::Arc470a1), Model::Arc470a1).bytes();
        bytes[22] ^= 0x01;
        let pulses = Phy::encode(&[&bytes[..8], &bytes[8..16], &bytes[16..]]);
        assert!(matches!(
            c.receive(&Phy::new(), pulses.into_iter()),
            Err(ReceiveError::FrameError(FrameError::ChecksumMismatch { .. }))
        ));

        let garbage = [100, 100, 100].map(Duration::from_micros);
        assert!(matches!(
            c.receive(&Phy::new(), garbage.into_iter()),
            Err(ReceiveError::PhyError(_))
        ));
    }

    #[test]
    fn test_failed_transmission_is_retried() {
        let mut c = controller(Model::Arc470a1, Features::default());
        c.transmitter_mut().fail = true;
        let change = StateChange::new().mode(Mode::Dry);
        assert!(!c.request_state_change(&change));

        c.transmitter_mut().fail = false;
        assert!(c.request_state_change(&change));
        assert_eq!(sent(&c), 1);
    }

    #[test]
    fn test_current_temperature() {
        let mut c = Controller::new(Model::Arc470a1, Features::default(), true, Recorder::default());
        assert_eq!(c.current_temperature(), None);
        c.update_estimated_temperature(19.5);
        assert_eq!(c.current_temperature(), Some(19.5));
        c.set_sensor_temperature(21.0);
        assert_eq!(c.current_temperature(), Some(21.0));

        let mut c = controller(Model::Arc470a1, Features::default());
        c.set_sensor_temperature(21.0);
        c.update_estimated_temperature(19.5);
        assert_eq!(c.current_temperature(), Some(19.5));
    }

    #[test]
    fn test_traits() {
        let features = Features {
            swing_horizontal: false,
            swing_both: true,
            preset_eco: false,
            preset_boost: true,
        };
        let traits = controller(Model::Arc432a14, features).traits();
        assert_eq!((traits.min_temperature, traits.max_temperature), (18, 32));
        assert_eq!(traits.modes.len(), 6);
        assert_eq!(traits.fans.len(), 7);
        assert_eq!(traits.swings, vec![Swing::Off, Swing::Vertical, Swing::Both]);
        assert_eq!(traits.presets, vec![Preset::None, Preset::Boost, Preset::Comfort]);
    }

    #[test]
    fn test_climate_interface() {
        let mut climate: Box<dyn Climate> = Box::new(controller(Model::Arc470a1, Features::default()));
        assert!(climate.control(&StateChange::new().mode(Mode::Auto)));
        assert_eq!(climate.state().mode, Mode::Auto);
        assert_eq!(climate.traits().max_temperature, 30);
        assert_eq!(climate.current_temperature(), None);
    }
}
