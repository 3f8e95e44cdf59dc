pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arch::Arch;
use os::Os;

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
///
/// Serialized as its triple string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

/// The platforms resolved when a configuration does not list any.
pub const SUPPORTED_PLATFORMS: [Platform; 5] = [
  Platform::new(Arch::X86_64, Os::Linux),
  Platform::new(Arch::Aarch64, Os::Linux),
  Platform::new(Arch::X86_64, Os::MacOs),
  Platform::new(Arch::Aarch64, Os::MacOs),
  Platform::new(Arch::X86_64, Os::Windows),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid platform '{0}': expected '<arch>-<os>' such as 'x86_64-linux'")]
pub struct PlatformParseError(pub String);

impl Platform {
  /// Create a new platform identifier
  pub const fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// The default platform list.
  pub fn supported() -> Vec<Self> {
    SUPPORTED_PLATFORMS.to_vec()
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl FromStr for Platform {
  type Err = PlatformParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arch, os) = s.split_once('-').ok_or_else(|| PlatformParseError(s.to_string()))?;
    Ok(Self {
      arch: arch.parse().map_err(|_| PlatformParseError(s.to_string()))?,
      os: os.parse().map_err(|_| PlatformParseError(s.to_string()))?,
    })
  }
}

impl TryFrom<String> for Platform {
  type Error = PlatformParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Platform> for String {
  fn from(value: Platform) -> Self {
    value.triple()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
