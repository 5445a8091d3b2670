use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use super::code_registry::CodeRegistry;
use super::error::StreamError;

/// Format slot value meaning "no format". Configuration records write it as
/// -1, so it can never be registered.
pub const NO_FORMAT: u32 = u32::MAX;

/// Sample format of one direction of a stream.
///
/// An open enumeration: the well-known formats are associated constants,
/// further native formats can be added with [`SampleFormat::register`]
/// without recompiling. Codes are bit flags, one bit per format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SampleFormat {
    code: u32,
    name: Cow<'static, str>,
}

static SAMPLE_FORMATS: Lazy<CodeRegistry<SampleFormat>> = Lazy::new(|| {
    CodeRegistry::new(
        "sample format",
        SampleFormat::KNOWN.into_iter().map(|f| (f.code, f)),
    )
});

impl SampleFormat {
    pub const FLOAT_32: Self = Self::known(0x0000_0001, "32-Bit Float");
    pub const SIGNED_INTEGER_32: Self = Self::known(0x0000_0002, "32-Bit Signed Integer");
    pub const SIGNED_INTEGER_24: Self = Self::known(0x0000_0004, "24-Bit Signed Integer");
    pub const SIGNED_INTEGER_16: Self = Self::known(0x0000_0008, "16-Bit Signed Integer");
    pub const SIGNED_INTEGER_8: Self = Self::known(0x0000_0010, "8-Bit Signed Integer");
    pub const UNSIGNED_INTEGER_8: Self = Self::known(0x0000_0020, "8-Bit Unsigned Integer");

    const KNOWN: [Self; 6] = [
        Self::FLOAT_32,
        Self::SIGNED_INTEGER_32,
        Self::SIGNED_INTEGER_24,
        Self::SIGNED_INTEGER_16,
        Self::SIGNED_INTEGER_8,
        Self::UNSIGNED_INTEGER_8,
    ];

    const fn known(code: u32, name: &'static str) -> Self {
        Self {
            code,
            name: Cow::Borrowed(name),
        }
    }

    /// Add a format the native engine understands but this crate does not list.
    ///
    /// [`NO_FORMAT`] is reserved and rejected as a configuration error.
    pub fn register(code: u32, name: impl Into<String>) -> Result<Self, StreamError> {
        if code == NO_FORMAT {
            return Err(StreamError::Configuration(format!(
                "sample format code {:#x} is reserved",
                code
            )));
        }
        SAMPLE_FORMATS.register(
            code,
            Self {
                code,
                name: Cow::Owned(name.into()),
            },
        )
    }

    /// Look up a format by its native code. Unknown codes yield `None`.
    pub fn resolve(code: u32) -> Option<Self> {
        SAMPLE_FORMATS.resolve(code)
    }

    /// All registered formats, ordered by code.
    pub fn values() -> Vec<Self> {
        SAMPLE_FORMATS.values()
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes per sample for the well-known formats.
    pub fn sample_size(&self) -> Option<usize> {
        match self.code {
            0x01 | 0x02 => Some(4),
            0x04 => Some(3),
            0x08 => Some(2),
            0x10 | 0x20 => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
