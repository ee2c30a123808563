use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Kernel control and status files. Fixed paths, not runtime-configurable.
pub const SPEED_LIMIT_PATH: &str = "/proc/sys/dev/raid/speed_limit_max";
pub const MDSTAT_PATH: &str = "/proc/mdstat";
pub const SYNC_ACTION_PATH: &str = "/sys/block/md0/md/sync_action";

/// The three sanctioned check-speed levels, in kB/s/device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedLevel {
    Normal,
    High,
    Low,
}

impl SpeedLevel {
    /// The value written verbatim to the speed-limit file.
    pub fn raw(self) -> &'static str {
        match self {
            SpeedLevel::Normal => "200000",
            SpeedLevel::High   => "2000000",
            SpeedLevel::Low    => "3000",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedLevel::Normal => "normal",
            SpeedLevel::High   => "high",
            SpeedLevel::Low    => "low",
        }
    }

    /// Map a raw speed-limit value back to a level, if it is one of ours.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "200000"  => Some(SpeedLevel::Normal),
            "2000000" => Some(SpeedLevel::High),
            "3000"    => Some(SpeedLevel::Low),
            _         => None,
        }
    }
}

/// Values accepted by the md sync_action file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Check,
    Idle,
}

impl SyncAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncAction::Check => "check",
            SyncAction::Idle  => "idle",
        }
    }
}

/// Overwrite the speed-limit file with the level's raw value.
pub fn set_speed(path: impl AsRef<Path>, level: SpeedLevel) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, level.raw())
        .with_context(|| format!("failed to write speed limit to {}", path.display()))
}

/// Read the current raw speed-limit value, trimmed.
pub fn current_speed(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read speed limit from {}", path.display()))?;
    Ok(raw.trim().to_string())
}

/// Overwrite the sync_action file to start or stop a check.
pub fn set_sync_action(path: impl AsRef<Path>, action: SyncAction) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, action.as_str())
        .with_context(|| format!("failed to write sync action to {}", path.display()))
}
