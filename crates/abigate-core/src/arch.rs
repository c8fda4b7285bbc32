//! Target architectures for the compatibility matrix.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Architectures the matrix covers, in declared processing order.
///
/// Orthogonal to releases: the harness runs the full release catalog
/// once per architecture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// 64-bit (`-m64`).
    X86_64,
    /// 32-bit (`-m32`).
    X86,
    /// x32 ABI: 32-bit pointers on the 64-bit ISA (`-mx32`).
    X32,
}

impl Architecture {
    /// All architectures in the fixed declared order.
    pub const ALL: [Architecture; 3] = [Architecture::X86_64, Architecture::X86, Architecture::X32];

    /// The architecture name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::X86 => "x86",
            Architecture::X32 => "x32",
        }
    }

    /// Compiler flag selecting this architecture.
    pub fn cflag(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "-m64",
            Architecture::X86 => "-m32",
            Architecture::X32 => "-mx32",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cflag())
    }
}

impl std::str::FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "m64" | "-m64" => Ok(Architecture::X86_64),
            "x86" | "m32" | "-m32" => Ok(Architecture::X86),
            "x32" | "mx32" | "-mx32" => Ok(Architecture::X32),
            other => Err(format!(
                "unknown architecture '{other}' (expected x86_64, x86 or x32)"
            )),
        }
    }
}
