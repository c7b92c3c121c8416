use crate::constants::{
    DEFAULT_DARWIN_BINARY_NAME, DEFAULT_LINUX_BINARY_NAME, DEFAULT_WINDOWS_BINARY_NAME,
};
use crate::target_process::NamePattern;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Darwin,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Darwin
        } else {
            Platform::Linux
        }
    }
}

/// Per-platform agent binary names. Overridable through configuration;
/// defaults mirror the shipped service names.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BinaryNames {
    pub linux: String,
    pub windows: String,
    pub darwin: String,
}

impl Default for BinaryNames {
    fn default() -> Self {
        BinaryNames {
            linux: DEFAULT_LINUX_BINARY_NAME.to_string(),
            windows: DEFAULT_WINDOWS_BINARY_NAME.to_string(),
            darwin: DEFAULT_DARWIN_BINARY_NAME.to_string(),
        }
    }
}

impl BinaryNames {
    pub fn client_binary_name(&self, platform: Platform) -> &str {
        match platform {
            Platform::Linux => &self.linux,
            Platform::Windows => &self.windows,
            Platform::Darwin => &self.darwin,
        }
    }

    /// Derive the anchored name pattern used to find the agent process.
    /// The Windows service name carries an `.exe` suffix the process name
    /// may not; the Linux daemon name carries a trailing `d` the helper
    /// binaries drop. Darwin uses the binary name as-is.
    pub fn scan_pattern(&self, platform: Platform) -> NamePattern {
        let binary = self.client_binary_name(platform);
        let prefix = match platform {
            Platform::Windows => binary.strip_suffix(".exe").unwrap_or(binary),
            Platform::Linux => &binary[..binary.len().saturating_sub(1)],
            Platform::Darwin => binary,
        };
        NamePattern::new(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_pattern_drops_exe_suffix() {
        let names = BinaryNames::default();
        let pattern = names.scan_pattern(Platform::Windows);
        assert_eq!(pattern.as_str(), "MemscanService");
        assert!(pattern.matches("MemscanService"));
        assert!(pattern.matches("MemscanService.exe"));
    }

    #[test]
    fn test_linux_pattern_drops_daemon_suffix() {
        let names = BinaryNames::default();
        let pattern = names.scan_pattern(Platform::Linux);
        assert_eq!(pattern.as_str(), "memscan");
        assert!(pattern.matches("memscand"));
        assert!(pattern.matches("memscan"));
    }

    #[test]
    fn test_darwin_pattern_uses_name_as_is() {
        let names = BinaryNames::default();
        let pattern = names.scan_pattern(Platform::Darwin);
        assert_eq!(pattern.as_str(), "memscan");
    }

    #[test]
    fn test_custom_names_flow_through() {
        let names = BinaryNames {
            linux: "fleetd".to_string(),
            windows: "FleetSvc.exe".to_string(),
            darwin: "fleet".to_string(),
        };
        assert_eq!(names.scan_pattern(Platform::Linux).as_str(), "fleet");
        assert_eq!(names.scan_pattern(Platform::Windows).as_str(), "FleetSvc");
        assert_eq!(names.client_binary_name(Platform::Darwin), "fleet");
    }
}
