//! Priority classes and their mapping onto Unix nice values.
use std::{io, str::FromStr};

use libc::c_int;
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::constants::{NICE_HIGH, NICE_LOW, NICE_NORMAL, NICE_VERY_HIGH};

/// CPU scheduling preference requested for a launched process.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(from = "String")]
pub enum ProcessPriority {
    /// Below normal scheduling preference.
    Low,
    /// The default class.
    #[default]
    Normal,
    /// Above normal scheduling preference.
    High,
    /// Highest class handed out by clu.
    VeryHigh,
}

impl ProcessPriority {
    /// Every supported class, lowest first.
    pub const ALL: [ProcessPriority; 4] = [
        ProcessPriority::Low,
        ProcessPriority::Normal,
        ProcessPriority::High,
        ProcessPriority::VeryHigh,
    ];

    /// Maps a raw discriminant (0 = Low .. 3 = VeryHigh). Anything else is `Normal`.
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => ProcessPriority::Low,
            1 => ProcessPriority::Normal,
            2 => ProcessPriority::High,
            3 => ProcessPriority::VeryHigh,
            _ => ProcessPriority::Normal,
        }
    }

    /// Parses a class name, falling back to `Normal` for unknown names.
    pub fn parse_lenient(value: &str) -> Self {
        ProcessPriority::from_str(value.trim()).unwrap_or_else(|_| {
            tracing::warn!("Unknown priority '{value}', falling back to normal");
            ProcessPriority::Normal
        })
    }

    /// Nice value that implements this class.
    pub const fn nice(&self) -> i32 {
        match self {
            ProcessPriority::Low => NICE_LOW,
            ProcessPriority::Normal => NICE_NORMAL,
            ProcessPriority::High => NICE_HIGH,
            ProcessPriority::VeryHigh => NICE_VERY_HIGH,
        }
    }

    /// Classifies a nice value read back from the OS.
    pub fn from_nice(nice: i32) -> Self {
        match nice {
            n if n > NICE_NORMAL => ProcessPriority::Low,
            NICE_NORMAL => ProcessPriority::Normal,
            n if n >= NICE_HIGH => ProcessPriority::High,
            _ => ProcessPriority::VeryHigh,
        }
    }

    /// Applies this class to the process `pid`.
    pub fn apply(&self, pid: u32) -> io::Result<()> {
        let res = unsafe {
            libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, self.nice() as c_int)
        };
        if res != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Reads the class currently assigned to the process `pid`.
    pub fn of_process(pid: u32) -> io::Result<Self> {
        // getpriority may legitimately return -1, so errno has to be cleared first.
        nix::errno::Errno::clear();
        let nice = unsafe { libc::getpriority(libc::PRIO_PROCESS, pid as libc::id_t) };
        if nice == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error().is_some_and(|code| code != 0) {
                return Err(err);
            }
        }
        Ok(ProcessPriority::from_nice(nice))
    }
}

impl From<String> for ProcessPriority {
    fn from(value: String) -> Self {
        ProcessPriority::parse_lenient(&value)
    }
}
