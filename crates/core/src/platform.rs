//! Platform detection
//!
//! Reports the OS using kernel names (`"darwin"`, `"linux"`, `"windows"`),
//! matching what source-tree templates conventionally test against.

use std::sync::LazyLock;

/// Current platform information (cached)
///
/// # Example
/// ```
/// use hearth_core::platform::CURRENT_PLATFORM;
///
/// assert!(!CURRENT_PLATFORM.arch.is_empty());
/// ```
pub static CURRENT_PLATFORM: LazyLock<Platform> = LazyLock::new(Platform::detect);

/// Platform information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// OS: "darwin", "linux", "windows", or "unknown"
    pub os: &'static str,
    /// CPU architecture as Go spells it: "amd64", "arm64", ...
    pub arch: &'static str,
}

impl Platform {
    /// Detect the platform of the running binary
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: Self::go_arch(std::env::consts::ARCH),
        }
    }

    const fn detect_os() -> &'static str {
        #[cfg(target_os = "macos")]
        {
            "darwin"
        }

        #[cfg(target_os = "linux")]
        {
            "linux"
        }

        #[cfg(target_os = "windows")]
        {
            "windows"
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            "unknown"
        }
    }

    // Source trees written for chezmoi compare against GOARCH names.
    fn go_arch(arch: &'static str) -> &'static str {
        match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        }
    }
}
