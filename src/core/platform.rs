//! Supported build platforms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A target operating environment with its own native project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
    Macos,
    Windows,
    Linux,
}

impl Platform {
    /// Every platform, in the order builds run when none are requested.
    pub const ALL: [Platform; 6] = [
        Platform::Android,
        Platform::Ios,
        Platform::Web,
        Platform::Macos,
        Platform::Windows,
        Platform::Linux,
    ];

    /// Identifier used in config files, output paths and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }

    /// Native project subdirectory relative to the project root.
    pub fn native_dir(&self) -> &'static str {
        self.as_str()
    }

    /// Whether this is a desktop platform.
    pub fn is_desktop(&self) -> bool {
        matches!(self, Platform::Macos | Platform::Windows | Platform::Linux)
    }

    /// Guess the platform an organized artifact belongs to from its extension.
    ///
    /// Used when the output tree is not organized by platform.
    pub fn from_artifact_extension(ext: &str) -> Option<Platform> {
        match ext {
            "apk" | "aab" => Some(Platform::Android),
            "ipa" | "xcarchive" => Some(Platform::Ios),
            "tar.gz" | "zip" => Some(Platform::Web),
            "app" | "dmg" => Some(Platform::Macos),
            "exe" | "msix" => Some(Platform::Windows),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            "macos" | "darwin" => Ok(Platform::Macos),
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            _ => Err(format!(
                "unknown platform '{}'; expected one of android, ios, web, macos, windows, linux",
                s
            )),
        }
    }
}

/// Architecture reported for artifacts built on this machine.
pub fn host_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "arm64",
        "x86_64" => "x64",
        "x86" => "x86",
        "arm" => "armv7",
        other => other,
    }
}
