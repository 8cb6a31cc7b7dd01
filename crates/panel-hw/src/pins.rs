//! Logical pin table (BCM numbering).
//!
//! Each table is generated by `pin_table!`, so a variant cannot exist
//! without a pin number. Lookups are `const fn` matches; nothing is
//! resolved at runtime except parsing a name coming from an asset file.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PinError {
    #[error("Err.Pin.Unknown: no {kind} named '{name}'")]
    Unknown { kind: &'static str, name: String },
}

macro_rules! pin_table {
    (
        $(#[$meta:meta])*
        $ty:ident ($kind:literal) { $( $variant:ident = $pin:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $ty {
            $( $variant ),+
        }

        impl $ty {
            pub const ALL: &'static [$ty] = &[ $( $ty::$variant ),+ ];

            /// Physical BCM pin.
            pub const fn pin(self) -> u8 {
                match self {
                    $( $ty::$variant => $pin ),+
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $( $ty::$variant => stringify!($variant) ),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = PinError;

            /// Case-insensitive, surrounding whitespace ignored.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|p| p.name().eq_ignore_ascii_case(s))
                    .ok_or_else(|| PinError::Unknown {
                        kind: $kind,
                        name: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

pin_table! {
    /// Front-panel push buttons (inputs, active high).
    Button ("button") {
        Scene1 = 5,
        Scene2 = 6,
        Scene3 = 13,
        Scene4 = 19,
        Reset = 26,
        Stop = 21,
    }
}

pin_table! {
    /// Front-panel LEDs (outputs).
    Led ("led") {
        SystemGreen = 17,
        SystemRed = 27,
        Scene1Lamp = 23,
        Scene2Lamp = 24,
        Scene3Lamp = 25,
        Scene4Lamp = 12,
        ProcessBar1 = 4,
        ProcessBar2 = 18,
        ProcessBar3 = 16,
        ProcessBar4 = 20,
        ProcessBar5 = 7,
    }
}

impl Led {
    /// The process-indicator bar, bottom to top.
    pub const PROCESS_BAR: [Led; 5] = [
        Led::ProcessBar1,
        Led::ProcessBar2,
        Led::ProcessBar3,
        Led::ProcessBar4,
        Led::ProcessBar5,
    ];
}

impl Button {
    /// Scene name a button triggers; `None` for control buttons.
    pub fn scene(self) -> Option<&'static str> {
        match self {
            Button::Scene1 => Some("scene1"),
            Button::Scene2 => Some("scene2"),
            Button::Scene3 => Some("scene3"),
            Button::Scene4 => Some("scene4"),
            Button::Reset | Button::Stop => None,
        }
    }
}

/// Any named hardware role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalPin {
    Button(Button),
    Led(Led),
}

impl LogicalPin {
    pub const fn pin(self) -> u8 {
        match self {
            LogicalPin::Button(b) => b.pin(),
            LogicalPin::Led(l) => l.pin(),
        }
    }
}

impl FromStr for LogicalPin {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(led) = s.parse::<Led>() {
            return Ok(LogicalPin::Led(led));
        }
        s.parse::<Button>()
            .map(LogicalPin::Button)
            .map_err(|_| PinError::Unknown {
                kind: "pin",
                name: s.trim().to_string(),
            })
    }
}

impl fmt::Display for LogicalPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalPin::Button(b) => write!(f, "button:{b}"),
            LogicalPin::Led(l) => write!(f, "led:{l}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_pin_is_unique() {
        let mut seen = HashSet::new();
        for b in Button::ALL {
            assert!(seen.insert(b.pin()), "{b} reuses pin {}", b.pin());
        }
        for l in Led::ALL {
            assert!(seen.insert(l.pin()), "{l} reuses pin {}", l.pin());
        }
    }

    #[test]
    fn names_round_trip_case_insensitively() {
        for l in Led::ALL {
            assert_eq!(l.name().to_uppercase().parse::<Led>().unwrap(), *l);
        }
        for b in Button::ALL {
            assert_eq!(format!(" {} ", b.name().to_lowercase()).parse::<Button>().unwrap(), *b);
        }
    }

    #[test]
    fn logical_pin_resolves_both_kinds() {
        let led: LogicalPin = "systemgreen".parse().unwrap();
        assert_eq!(led, LogicalPin::Led(Led::SystemGreen));
        assert_eq!(led.pin(), 17);

        let button: LogicalPin = "Reset".parse().unwrap();
        assert_eq!(button.pin(), 26);

        let err = "Turbo".parse::<LogicalPin>().unwrap_err();
        assert_eq!(err.to_string(), "Err.Pin.Unknown: no pin named 'Turbo'");
    }

    #[test]
    fn button_and_led_names_do_not_overlap() {
        for b in Button::ALL {
            assert!(b.name().parse::<Led>().is_err(), "{b} is also an LED name");
        }
    }

    #[test]
    fn scene_buttons_map_to_scene_names() {
        assert_eq!(Button::Scene3.scene(), Some("scene3"));
        assert_eq!(Button::Reset.scene(), None);
    }
}
