//! Inbound/outbound event model for the routing engine.
//!
//! Only two event classes exist: notes (on/off) and controllers. Channels
//! are numbered 1..=16 as musicians count them.

use serde::{Deserialize, Serialize};

pub const MIN_CHANNEL: u8 = 1;
pub const MAX_CHANNEL: u8 = 16;
const MAX_DATA: u8 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    Note,
    Control,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    Control { channel: u8, controller: u8, value: u8 },
}

impl MidiEvent {
    pub fn class(&self) -> EventClass {
        match self {
            Self::NoteOn { .. } | Self::NoteOff { .. } => EventClass::Note,
            Self::Control { .. } => EventClass::Control,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::Control { channel, .. } => channel,
        }
    }

    /// Velocity for notes; controllers carry no intensity
    pub fn intensity(&self) -> Option<u8> {
        match *self {
            Self::NoteOn { velocity, .. } | Self::NoteOff { velocity, .. } => Some(velocity),
            Self::Control { .. } => None,
        }
    }

    pub fn with_channel(self, channel: u8) -> Self {
        match self {
            Self::NoteOn { note, velocity, .. } => Self::NoteOn {
                channel,
                note,
                velocity,
            },
            Self::NoteOff { note, velocity, .. } => Self::NoteOff {
                channel,
                note,
                velocity,
            },
            Self::Control {
                controller, value, ..
            } => Self::Control {
                channel,
                controller,
                value,
            },
        }
    }

    /// Attenuate the intensity by `gain`. Controllers pass through untouched.
    pub fn scaled(self, gain: f64) -> Self {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => {
                let mut scaled = scale(velocity, gain);
                // Velocity 0 would turn a sounding note into a release.
                if velocity > 0 && scaled == 0 {
                    scaled = 1;
                }
                Self::NoteOn {
                    channel,
                    note,
                    velocity: scaled,
                }
            }
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => Self::NoteOff {
                channel,
                note,
                velocity: scale(velocity, gain),
            },
            control @ Self::Control { .. } => control,
        }
    }

    /// Range-check channel and 7-bit data bytes
    pub fn validate(&self) -> Result<(), String> {
        let channel = self.channel();
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            return Err(format!(
                "channel {} outside {}..={}",
                channel, MIN_CHANNEL, MAX_CHANNEL
            ));
        }
        let (a, b) = match *self {
            Self::NoteOn { note, velocity, .. } | Self::NoteOff { note, velocity, .. } => {
                (note, velocity)
            }
            Self::Control {
                controller, value, ..
            } => (controller, value),
        };
        if a > MAX_DATA || b > MAX_DATA {
            return Err(format!("data byte out of 7-bit range in {:?}", self));
        }
        Ok(())
    }
}

fn scale(value: u8, gain: f64) -> u8 {
    (f64::from(value) * gain).round().clamp(0.0, f64::from(MAX_DATA)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_does_not_renormalize() {
        let event = MidiEvent::NoteOn {
            channel: 3,
            note: 60,
            velocity: 100,
        };
        assert_eq!(event.scaled(0.5).intensity(), Some(50));
        assert_eq!(event.scaled(0.55).intensity(), Some(55));
        assert_eq!(event.scaled(1.0), event);
    }

    #[test]
    fn test_quiet_note_on_stays_audible() {
        let event = MidiEvent::NoteOn {
            channel: 1,
            note: 60,
            velocity: 1,
        };
        assert_eq!(event.scaled(0.1).intensity(), Some(1));
        let release = MidiEvent::NoteOff {
            channel: 1,
            note: 60,
            velocity: 1,
        };
        assert_eq!(release.scaled(0.1).intensity(), Some(0));
    }

    #[test]
    fn test_control_ignores_gain() {
        let pedal = MidiEvent::Control {
            channel: 2,
            controller: 64,
            value: 127,
        };
        assert_eq!(pedal.scaled(0.5), pedal);
        assert_eq!(pedal.intensity(), None);
        assert_eq!(pedal.class(), EventClass::Control);
    }

    #[test]
    fn test_with_channel_keeps_payload() {
        let event = MidiEvent::NoteOff {
            channel: 5,
            note: 40,
            velocity: 64,
        };
        assert_eq!(
            event.with_channel(1),
            MidiEvent::NoteOff {
                channel: 1,
                note: 40,
                velocity: 64
            }
        );
    }

    #[test]
    fn test_validate_ranges() {
        let ok = MidiEvent::NoteOn {
            channel: 16,
            note: 127,
            velocity: 0,
        };
        assert!(ok.validate().is_ok());
        assert!(ok.with_channel(0).validate().is_err());
        assert!(ok.with_channel(17).validate().is_err());
        let bad = MidiEvent::Control {
            channel: 1,
            controller: 128,
            value: 0,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_json_shape() {
        let event: MidiEvent =
            serde_json::from_str(r#"{"kind":"note_on","channel":3,"note":60,"velocity":100}"#)
                .unwrap();
        assert_eq!(event.channel(), 3);
        assert_eq!(event.class(), EventClass::Note);
    }
}
