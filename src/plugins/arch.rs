// ============================================
// TANZU CLI - Target Architectures & Artifact Names
// ============================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of every installed plugin binary.
pub const BIN_NAME_PREFIX: &str = "tanzu-plugin-";
/// Prefix of every installed plugin test binary.
pub const TEST_BIN_NAME_PREFIX: &str = "tanzu-plugin-test-";
/// Prefix of released plugin artifacts.
pub const ARTIFACT_PREFIX: &str = "tanzu";
/// Prefix of released plugin test artifacts.
pub const TEST_ARTIFACT_PREFIX: &str = "test";

const EXE: &str = ".exe";

/// Supported OS/CPU pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "linux_386")]
    Linux386,
    #[serde(rename = "linux_amd64")]
    LinuxAmd64,
    #[serde(rename = "linux_arm64")]
    LinuxArm64,
    #[serde(rename = "darwin_amd64")]
    DarwinAmd64,
    #[serde(rename = "darwin_arm64")]
    DarwinArm64,
    #[serde(rename = "windows_386")]
    Win386,
    #[serde(rename = "windows_amd64")]
    WinAmd64,
}

impl Arch {
    pub const ALL: [Arch; 7] = [
        Arch::Linux386,
        Arch::LinuxAmd64,
        Arch::LinuxArm64,
        Arch::DarwinAmd64,
        Arch::DarwinArm64,
        Arch::Win386,
        Arch::WinAmd64,
    ];

    /// The arch this binary was built for, if it is one we publish.
    pub fn current() -> Option<Self> {
        Self::from_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust target names (`std::env::consts`) onto published arches.
    pub fn from_target(os: &str, arch: &str) -> Option<Self> {
        match (os, arch) {
            ("linux", "x86") => Some(Arch::Linux386),
            ("linux", "x86_64") => Some(Arch::LinuxAmd64),
            ("linux", "aarch64") => Some(Arch::LinuxArm64),
            ("macos", "x86_64") => Some(Arch::DarwinAmd64),
            ("macos", "aarch64") => Some(Arch::DarwinArm64),
            ("windows", "x86") => Some(Arch::Win386),
            ("windows", "x86_64") => Some(Arch::WinAmd64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Linux386 => "linux_386",
            Arch::LinuxAmd64 => "linux_amd64",
            Arch::LinuxArm64 => "linux_arm64",
            Arch::DarwinAmd64 => "darwin_amd64",
            Arch::DarwinArm64 => "darwin_arm64",
            Arch::Win386 => "windows_386",
            Arch::WinAmd64 => "windows_amd64",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Arch::Win386 | Arch::WinAmd64)
    }

    fn exe_suffix(&self) -> &'static str {
        if self.is_windows() {
            EXE
        } else {
            ""
        }
    }

    /// Released artifact name, e.g. `tanzu-login-linux_amd64`.
    pub fn artifact_name(&self, plugin: &str) -> String {
        format!(
            "{}-{}-{}{}",
            ARTIFACT_PREFIX,
            plugin,
            self.as_str(),
            self.exe_suffix()
        )
    }

    /// Released test artifact name, e.g. `test-login-linux_amd64`.
    pub fn test_artifact_name(&self, plugin: &str) -> String {
        format!(
            "{}-{}-{}{}",
            TEST_ARTIFACT_PREFIX,
            plugin,
            self.as_str(),
            self.exe_suffix()
        )
    }

    /// Installed binary file name for a plugin.
    pub fn bin_name(&self, plugin: &str) -> String {
        format!("{}{}{}", BIN_NAME_PREFIX, plugin, self.exe_suffix())
    }

    /// Installed test binary file name for a plugin.
    pub fn test_bin_name(&self, plugin: &str) -> String {
        format!("{}{}{}", TEST_BIN_NAME_PREFIX, plugin, self.exe_suffix())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unsupported arch {:?}", s))
    }
}

/// Recover a plugin name from an installed binary file name.
///
/// Returns `None` for files that are not plugin binaries.
pub fn plugin_name_from_bin(file_name: &str) -> Option<&str> {
    let name = file_name.strip_prefix(BIN_NAME_PREFIX)?;
    let name = name.strip_suffix(EXE).unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Recover a plugin name from an installed test binary file name.
pub fn plugin_name_from_test_bin(file_name: &str) -> Option<&str> {
    let name = file_name.strip_prefix(TEST_BIN_NAME_PREFIX)?;
    let name = name.strip_suffix(EXE).unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
