//! The control loop.
//!
//! Each call to [`Device::step`] is one loop iteration, in this order:
//!
//! 1. sample and debounce every channel; emit a keystroke for each edge
//!    right away (buttons by ascending index, then home)
//! 2. consume at most one serial command
//! 3. when the render period has elapsed, aggregate a snapshot and write it
//!    if anything changed
//!
//! Because keystrokes go out during sampling and snapshots only read stable
//! state, a keystroke is never later than the first snapshot showing it.

use log::warn;

use crate::capacitive::CapacitiveDebouncer;
use crate::clock::ResetClock;
use crate::config::{ConfigError, DeviceConfig};
use crate::debounce::Debouncer;
use crate::hal::{Keyboard, Sensors, SerialLink, TimeSource};
use crate::keymap::{Channel, KeyMapping};
use crate::output::Emitter;
use crate::protocol::{Command, CommandHandler};
use crate::state::{Aggregator, KeyState};
use crate::NUM_BUTTONS;

/// Everything the loop owns. Built once at power-up; the default mapping
/// comes back only by constructing a new `Device`.
pub struct Device<T> {
    buttons: [Debouncer; NUM_BUTTONS],
    touch: CapacitiveDebouncer,
    clock: ResetClock<T>,
    mapping: KeyMapping,
    aggregator: Aggregator,
    commands: CommandHandler,
    emitter: Emitter,
}

/// What one iteration did, for callers that want to observe the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    pub command: Option<Command>,
    /// Snapshot aggregated this iteration, if the render period elapsed.
    pub snapshot: Option<KeyState>,
}

impl<T: TimeSource> Device<T> {
    pub fn new(config: DeviceConfig, source: T) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut clock = ResetClock::new(source);
        let start = clock.ticks();
        Ok(Self {
            buttons: core::array::from_fn(|_| Debouncer::new(config.button_debounce_us)),
            touch: CapacitiveDebouncer::new(&config.touch),
            clock,
            mapping: KeyMapping::default(),
            aggregator: Aggregator::new(config.home_retrigger),
            commands: CommandHandler::new(config.remap_timeout_us),
            emitter: Emitter::new(config.snapshot_format, config.render_period_us, start),
        })
    }

    /// Run one loop iteration.
    pub fn step<S, L, K>(&mut self, sensors: &mut S, link: &mut L, keyboard: &mut K) -> StepReport
    where
        S: Sensors,
        L: SerialLink,
        K: Keyboard,
    {
        self.sample(sensors, keyboard);

        let command = self
            .commands
            .poll(link, &mut self.clock, &mut self.mapping, &self.touch);

        let snapshot = self.render(link);

        StepReport { command, snapshot }
    }

    fn sample<S: Sensors, K: Keyboard>(&mut self, sensors: &mut S, keyboard: &mut K) {
        let now = self.clock.ticks();

        let raw = sensors.read_buttons();
        for ((channel, button), &pressed) in Channel::buttons().zip(&mut self.buttons).zip(&raw) {
            button.sample(pressed, now);
            if let Some(edge) = button.take_edge() {
                self.emitter.keystroke(keyboard, &self.mapping, channel, edge);
            }
        }

        let intensity = sensors.read_intensity();
        self.touch.sample(intensity, now);
        if let Some(edge) = self.touch.take_edge() {
            self.emitter.keystroke(keyboard, &self.mapping, Channel::HOME, edge);
        }
    }

    fn render<L: SerialLink>(&mut self, link: &mut L) -> Option<KeyState> {
        let ticks = self.clock.ticks();
        if !self.emitter.due(ticks) {
            return None;
        }

        let now = self.clock.now();
        let state = self.aggregator.aggregate(&self.buttons, &self.touch, now);
        if self.emitter.render(link, &state).is_err() {
            warn!("snapshot not written");
        }
        Some(state)
    }

    pub fn mapping(&self) -> &KeyMapping {
        &self.mapping
    }

    pub fn touch(&self) -> &CapacitiveDebouncer {
        &self.touch
    }

    pub fn is_pressed(&self, channel: Channel) -> bool {
        match channel.button_index() {
            Some(index) => self.buttons[index].is_pressed(),
            None => self.touch.is_pressed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClock, FakeLink, FixedSensors, KeyAction, RecordingKeyboard};

    struct Rig {
        device: Device<FakeClock>,
        clock: FakeClock,
        sensors: FixedSensors,
        link: FakeLink,
        keyboard: RecordingKeyboard,
    }

    impl Rig {
        fn new(config: DeviceConfig) -> Self {
            let clock = FakeClock::new(0, 1);
            Self {
                device: Device::new(config, clock.clone()).unwrap(),
                clock,
                sensors: FixedSensors::default(),
                link: FakeLink::default(),
                keyboard: RecordingKeyboard::default(),
            }
        }

        fn run(&mut self, iterations: u32, step_us: u32) -> Vec<StepReport> {
            (0..iterations)
                .map(|_| {
                    self.clock.advance(step_us);
                    self.device
                        .step(&mut self.sensors, &mut self.link, &mut self.keyboard)
                })
                .collect()
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = DeviceConfig {
            render_period_us: 0,
            ..DeviceConfig::default()
        };
        assert!(Device::new(config, FakeClock::new(0, 0)).is_err());
    }

    #[test]
    fn test_simultaneous_presses_in_index_order() {
        let mut rig = Rig::new(DeviceConfig::default());
        rig.sensors.buttons = [true, false, true, true];
        rig.run(200, 100);
        assert_eq!(
            rig.keyboard.actions,
            vec![KeyAction::Press(b'w'), KeyAction::Press(b'y'), KeyAction::Press(b'z')]
        );
    }

    #[test]
    fn test_render_cadence() {
        let mut rig = Rig::new(DeviceConfig::default());
        let reports = rig.run(100, 1_000);
        let ticks = reports.iter().filter(|r| r.snapshot.is_some()).count();
        assert_eq!(ticks, 10);
        // Nothing ever changed, so nothing was written
        assert!(rig.link.output.is_empty());
    }

    #[test]
    fn test_home_touch_types_home_symbol() {
        let mut rig = Rig::new(DeviceConfig::default());
        rig.run(50, 100);
        rig.sensors.intensity = 400.0;
        rig.run(200, 100);
        assert_eq!(rig.keyboard.actions, vec![KeyAction::Press(b'_')]);
        assert!(rig.device.is_pressed(Channel::HOME));
        assert!(!Channel::buttons().any(|c| rig.device.is_pressed(c)));
        assert!(rig.link.output.starts_with("0 0 0 0 1 "), "{:?}", rig.link.output);
        assert_eq!(rig.link.output.lines().count(), 1);
    }

    #[test]
    fn test_command_runs_after_sampling() {
        let mut rig = Rig::new(DeviceConfig::default());
        rig.link.feed(b"l");
        let reports = rig.run(1, 1);
        assert_eq!(reports[0].command, Some(Command::ListMapping));
        assert_eq!(rig.link.output, "wxyz_\n");
    }
}
