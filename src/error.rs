use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("invalid time '{0}': hour must be followed by ':'")]
    MissingSeparator(String),
    #[error("invalid time '{0}': minutes must end the string")]
    TrailingInput(String),
    #[error("invalid time '{0}': expected digits")]
    NotANumber(String),
    #[error("invalid time '{0}': not a 24-hour clock value")]
    OutOfRange(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid screen index: '{index}' (have {count})")]
    Screen { index: usize, count: usize },
    #[error("Invalid crtc index: '{index}' on screen {screen} (have {count})")]
    Controller {
        screen: usize,
        index: usize,
        count: usize,
    },
    #[error("Unknown profile: '{0}'")]
    UnknownProfile(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RampError {
    #[error("gamma ramp has {actual} samples, controller expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("gamma ramp channels differ in length (red {red}, green {green}, blue {blue})")]
    UnevenChannels {
        red: usize,
        green: usize,
        blue: usize,
    },
}
