//! Control commands.
//!
//! [`Command`] is a closed set: every variant is matched exhaustively by the
//! control queue. Each command carries at most one number. Chain indices are
//! 0-based; operator and parameter indices are 1-based, with 0 meaning
//! "deselect".
//!
//! The text form used by line-oriented front ends is `keyword [value]`:
//!
//! | keyword       | command                      |
//! |---------------|------------------------------|
//! | `exit`        | [`Command::Exit`]            |
//! | `start`       | [`Command::Start`]           |
//! | `stop`        | [`Command::Stop`]            |
//! | `sfx`         | [`Command::ToggleEffects`]   |
//! | `rewind s`    | [`Command::Rewind`]          |
//! | `forward s`   | [`Command::Forward`]         |
//! | `setpos s`    | [`Command::SetPosition`]     |
//! | `c-select i`  | [`Command::SelectChain`]     |
//! | `c-mute`      | [`Command::ToggleMute`]      |
//! | `c-bypass`    | [`Command::ToggleBypass`]    |
//! | `c-rewind s`  | [`Command::ChainRewind`]     |
//! | `c-forward s` | [`Command::ChainForward`]    |
//! | `c-setpos s`  | [`Command::ChainSetPosition`]|
//! | `cop-select i`| [`Command::SelectOperator`]  |
//! | `copp-select i`| [`Command::SelectParameter`]|
//! | `copp-set v`  | [`Command::SetParameter`]    |

use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;

/// Command identity without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// End the run.
    Exit,
    /// Start processing.
    Start,
    /// Stop processing.
    Stop,
    /// Flip engine-wide operator processing.
    ToggleEffects,
    /// Global relative seek backwards (seconds).
    Rewind,
    /// Global relative seek forwards (seconds).
    Forward,
    /// Global absolute seek (seconds).
    SetPosition,
    /// Select a chain (0-based).
    SelectChain,
    /// Flip mute on the selected chain.
    ToggleMute,
    /// Flip bypass on the selected chain.
    ToggleBypass,
    /// Rewind the selected chain's objects (seconds).
    ChainRewind,
    /// Forward the selected chain's objects (seconds).
    ChainForward,
    /// Position the selected chain's objects (seconds).
    ChainSetPosition,
    /// Select an operator of the selected chain (1-based, 0 deselects).
    SelectOperator,
    /// Select a parameter of the selected operator (1-based, 0 deselects).
    SelectParameter,
    /// Set the selected parameter.
    SetParameter,
}

impl CommandKind {
    const ALL: [CommandKind; 16] = [
        Self::Exit,
        Self::Start,
        Self::Stop,
        Self::ToggleEffects,
        Self::Rewind,
        Self::Forward,
        Self::SetPosition,
        Self::SelectChain,
        Self::ToggleMute,
        Self::ToggleBypass,
        Self::ChainRewind,
        Self::ChainForward,
        Self::ChainSetPosition,
        Self::SelectOperator,
        Self::SelectParameter,
        Self::SetParameter,
    ];

    /// Text keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::ToggleEffects => "sfx",
            Self::Rewind => "rewind",
            Self::Forward => "forward",
            Self::SetPosition => "setpos",
            Self::SelectChain => "c-select",
            Self::ToggleMute => "c-mute",
            Self::ToggleBypass => "c-bypass",
            Self::ChainRewind => "c-rewind",
            Self::ChainForward => "c-forward",
            Self::ChainSetPosition => "c-setpos",
            Self::SelectOperator => "cop-select",
            Self::SelectParameter => "copp-select",
            Self::SetParameter => "copp-set",
        }
    }

    /// Whether the command carries a number.
    pub fn takes_value(self) -> bool {
        !matches!(
            self,
            Self::Exit
                | Self::Start
                | Self::Stop
                | Self::ToggleEffects
                | Self::ToggleMute
                | Self::ToggleBypass
        )
    }

    /// Looks a keyword up.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == keyword)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A control command with its payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// End the run; discards the rest of the batch.
    Exit,
    /// Start processing.
    Start,
    /// Stop processing.
    Stop,
    /// Flip engine-wide operator processing.
    ToggleEffects,
    /// Seek all objects back by seconds.
    Rewind(f64),
    /// Seek all objects forward by seconds.
    Forward(f64),
    /// Seek all objects to an absolute time in seconds.
    SetPosition(f64),
    /// Select chain by 0-based index.
    SelectChain(usize),
    /// Flip mute on the selected chain.
    ToggleMute,
    /// Flip bypass on the selected chain.
    ToggleBypass,
    /// Seek the selected chain's objects back by seconds.
    ChainRewind(f64),
    /// Seek the selected chain's objects forward by seconds.
    ChainForward(f64),
    /// Seek the selected chain's objects to an absolute time.
    ChainSetPosition(f64),
    /// Select operator by 1-based index; 0 deselects.
    SelectOperator(usize),
    /// Select parameter by 1-based index; 0 deselects.
    SelectParameter(usize),
    /// Write the selected parameter.
    SetParameter(f64),
}

fn seconds(kind: CommandKind, value: f64) -> Result<f64, CommandError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CommandError::InvalidValue { kind, value })
    }
}

fn index(kind: CommandKind, value: f64) -> Result<usize, CommandError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(CommandError::InvalidValue { kind, value })
    }
}

impl Command {
    /// Builds a command from its kind and optional payload, checking that
    /// the payload is present exactly when needed and in range.
    pub fn new(kind: CommandKind, value: Option<f64>) -> Result<Self, CommandError> {
        let v = match (kind.takes_value(), value) {
            (true, Some(v)) => v,
            (true, None) => return Err(CommandError::MissingValue(kind)),
            (false, Some(_)) => return Err(CommandError::UnexpectedValue(kind)),
            (false, None) => 0.0,
        };
        Ok(match kind {
            CommandKind::Exit => Self::Exit,
            CommandKind::Start => Self::Start,
            CommandKind::Stop => Self::Stop,
            CommandKind::ToggleEffects => Self::ToggleEffects,
            CommandKind::ToggleMute => Self::ToggleMute,
            CommandKind::ToggleBypass => Self::ToggleBypass,
            CommandKind::Rewind => Self::Rewind(seconds(kind, v)?),
            CommandKind::Forward => Self::Forward(seconds(kind, v)?),
            CommandKind::SetPosition => Self::SetPosition(seconds(kind, v)?),
            CommandKind::ChainRewind => Self::ChainRewind(seconds(kind, v)?),
            CommandKind::ChainForward => Self::ChainForward(seconds(kind, v)?),
            CommandKind::ChainSetPosition => Self::ChainSetPosition(seconds(kind, v)?),
            CommandKind::SelectChain => Self::SelectChain(index(kind, v)?),
            CommandKind::SelectOperator => Self::SelectOperator(index(kind, v)?),
            CommandKind::SelectParameter => Self::SelectParameter(index(kind, v)?),
            CommandKind::SetParameter => {
                if !v.is_finite() {
                    return Err(CommandError::InvalidValue { kind, value: v });
                }
                Self::SetParameter(v)
            }
        })
    }

    /// The command's kind.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Exit => CommandKind::Exit,
            Self::Start => CommandKind::Start,
            Self::Stop => CommandKind::Stop,
            Self::ToggleEffects => CommandKind::ToggleEffects,
            Self::Rewind(_) => CommandKind::Rewind,
            Self::Forward(_) => CommandKind::Forward,
            Self::SetPosition(_) => CommandKind::SetPosition,
            Self::SelectChain(_) => CommandKind::SelectChain,
            Self::ToggleMute => CommandKind::ToggleMute,
            Self::ToggleBypass => CommandKind::ToggleBypass,
            Self::ChainRewind(_) => CommandKind::ChainRewind,
            Self::ChainForward(_) => CommandKind::ChainForward,
            Self::ChainSetPosition(_) => CommandKind::ChainSetPosition,
            Self::SelectOperator(_) => CommandKind::SelectOperator,
            Self::SelectParameter(_) => CommandKind::SelectParameter,
            Self::SetParameter(_) => CommandKind::SetParameter,
        }
    }

    /// The command's payload.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Self::Rewind(v)
            | Self::Forward(v)
            | Self::SetPosition(v)
            | Self::ChainRewind(v)
            | Self::ChainForward(v)
            | Self::ChainSetPosition(v)
            | Self::SetParameter(v) => Some(v),
            Self::SelectChain(i) | Self::SelectOperator(i) | Self::SelectParameter(i) => {
                Some(i as f64)
            }
            Self::Exit
            | Self::Start
            | Self::Stop
            | Self::ToggleEffects
            | Self::ToggleMute
            | Self::ToggleBypass => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{} {v}", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        let kind = CommandKind::from_keyword(keyword)
            .ok_or_else(|| CommandError::Unknown(s.trim().to_string()))?;
        let value = words
            .next()
            .map(|word| {
                word.parse::<f64>()
                    .map_err(|_| CommandError::NotANumber(word.to_string()))
            })
            .transpose()?;
        if let Some(extra) = words.next() {
            return Err(CommandError::Unknown(extra.to_string()));
        }
        Command::new(kind, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_presence_is_checked() {
        assert_eq!(
            Command::new(CommandKind::SetPosition, None),
            Err(CommandError::MissingValue(CommandKind::SetPosition))
        );
        assert_eq!(
            Command::new(CommandKind::Start, Some(1.0)),
            Err(CommandError::UnexpectedValue(CommandKind::Start))
        );
        assert_eq!(Command::new(CommandKind::Stop, None), Ok(Command::Stop));
    }

    #[test]
    fn indices_must_be_whole_and_non_negative() {
        assert_eq!(
            Command::new(CommandKind::SelectChain, Some(2.0)),
            Ok(Command::SelectChain(2))
        );
        assert!(Command::new(CommandKind::SelectChain, Some(1.5)).is_err());
        assert!(Command::new(CommandKind::SelectOperator, Some(-1.0)).is_err());
        assert!(Command::new(CommandKind::Rewind, Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn set_parameter_accepts_negative_values() {
        assert_eq!(
            Command::new(CommandKind::SetParameter, Some(-12.5)),
            Ok(Command::SetParameter(-12.5))
        );
    }

    #[test]
    fn parses_text_form() {
        assert_eq!("start".parse(), Ok(Command::Start));
        assert_eq!("setpos 1.5".parse(), Ok(Command::SetPosition(1.5)));
        assert_eq!("  c-select   3 ".parse(), Ok(Command::SelectChain(3)));
        assert_eq!("copp-set 50".parse(), Ok(Command::SetParameter(50.0)));
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(
            "jump 3".parse::<Command>(),
            Err(CommandError::Unknown(_))
        ));
        assert!(matches!(
            "setpos soon".parse::<Command>(),
            Err(CommandError::NotANumber(_))
        ));
        assert!(matches!(
            "setpos 1 2".parse::<Command>(),
            Err(CommandError::Unknown(_))
        ));
        assert!(matches!("".parse::<Command>(), Err(CommandError::Unknown(_))));
    }

    #[test]
    fn display_round_trips() {
        for cmd in [
            Command::Exit,
            Command::Forward(2.25),
            Command::SelectParameter(4),
            Command::ToggleBypass,
        ] {
            assert_eq!(cmd.to_string().parse(), Ok(cmd));
        }
    }

    #[test]
    fn every_kind_has_unique_keyword() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_keyword(kind.keyword()), Some(kind));
        }
    }
}
