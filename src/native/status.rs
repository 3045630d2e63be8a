use std::fmt;

/// Status code returned by a failing native engine call.
///
/// Codes follow the HRESULT layout used by the native engine: failure bit set,
/// facility `0xAC7` for engine-specific errors and the generic Win32/COM codes
/// for the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NativeStatus(pub u32);

impl NativeStatus {
    pub const OUT_OF_MEMORY: Self = Self(0x8007_000E);
    pub const INVALID_ARG: Self = Self(0x8007_0057);
    pub const NOT_IMPL: Self = Self(0x8000_4001);
    pub const FAIL: Self = Self(0x8000_4005);

    pub const ALREADY_INITIALIZED: Self = Self::engine(0x01);
    pub const NOT_INITIALIZED: Self = Self::engine(0x02);
    pub const EXPIRED: Self = Self::engine(0x03);
    pub const NO_NOTIFICATION_CALLBACK: Self = Self::engine(0x04);
    pub const NOTIFICATION_REGISTERED: Self = Self::engine(0x05);
    pub const INVALID_USAGE: Self = Self::engine(0x06);
    pub const INVALID_DATA: Self = Self::engine(0x07);
    pub const INSTANCE_LIMIT_FAIL_TO_PLAY: Self = Self::engine(0x08);
    pub const NO_GLOBAL_SETTINGS: Self = Self::engine(0x09);
    pub const INVALID_VARIABLE_INDEX: Self = Self::engine(0x0A);
    pub const INVALID_CATEGORY: Self = Self::engine(0x0B);
    pub const INVALID_CUE_INDEX: Self = Self::engine(0x0C);
    pub const INVALID_WAVE_INDEX: Self = Self::engine(0x0D);
    pub const INVALID_TRACK_INDEX: Self = Self::engine(0x0E);
    pub const INVALID_SOUND_OFFSET_OR_INDEX: Self = Self::engine(0x0F);
    pub const READ_FILE: Self = Self::engine(0x10);
    pub const UNKNOWN_EVENT: Self = Self::engine(0x11);
    pub const IN_CALLBACK: Self = Self::engine(0x12);
    pub const NO_WAVE_BANK: Self = Self::engine(0x13);
    pub const SELECT_VARIATION: Self = Self::engine(0x14);
    pub const MULTIPLE_AUDITION_ENGINES: Self = Self::engine(0x15);
    pub const WAVE_BANK_NOT_PREPARED: Self = Self::engine(0x16);
    pub const NO_RENDERER: Self = Self::engine(0x17);
    pub const INVALID_ENTRY_COUNT: Self = Self::engine(0x18);
    pub const SEEK_TIME_BEYOND_END: Self = Self::engine(0x19);
    pub const NO_FRIENDLY_NAMES: Self = Self::engine(0x1A);

    const fn engine(code: u32) -> Self {
        Self(0x8AC7_0000 | code)
    }

    pub fn code(self) -> u32 {
        self.0
    }

    /// Human readable description of the status.
    pub fn description(self) -> &'static str {
        match self {
            Self::OUT_OF_MEMORY => "out of memory",
            Self::INVALID_ARG => "invalid argument",
            Self::NOT_IMPL => "not implemented",
            Self::FAIL => "unknown failure",
            Self::ALREADY_INITIALIZED => "the engine is already initialized",
            Self::NOT_INITIALIZED => "the engine has not been initialized",
            Self::EXPIRED => "the engine has expired",
            Self::NO_NOTIFICATION_CALLBACK => "no notification callback",
            Self::NOTIFICATION_REGISTERED => "notification already registered",
            Self::INVALID_USAGE => "invalid usage",
            Self::INVALID_DATA => "invalid data",
            Self::INSTANCE_LIMIT_FAIL_TO_PLAY => "failed to play due to instance limit",
            Self::NO_GLOBAL_SETTINGS => "global settings not loaded",
            Self::INVALID_VARIABLE_INDEX => "invalid variable index",
            Self::INVALID_CATEGORY => "invalid category",
            Self::INVALID_CUE_INDEX => "invalid cue index",
            Self::INVALID_WAVE_INDEX => "invalid wave index",
            Self::INVALID_TRACK_INDEX => "invalid track index",
            Self::INVALID_SOUND_OFFSET_OR_INDEX => "invalid sound offset or index",
            Self::READ_FILE => "error reading a file",
            Self::UNKNOWN_EVENT => "unknown event type",
            Self::IN_CALLBACK => "invalid call from inside a notification callback",
            Self::NO_WAVE_BANK => "no wavebank exists for the desired operation",
            Self::SELECT_VARIATION => "unable to select a variation",
            Self::MULTIPLE_AUDITION_ENGINES => "there can be only one audition engine",
            Self::WAVE_BANK_NOT_PREPARED => "the wavebank is not prepared",
            Self::NO_RENDERER => "no audio device found",
            Self::INVALID_ENTRY_COUNT => "invalid entry count for channel maps",
            Self::SEEK_TIME_BEYOND_END => "seek time is beyond the end",
            Self::NO_FRIENDLY_NAMES => "friendly names are not included in the bank",
            _ => "unexpected error",
        }
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
