use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use super::code_registry::CodeRegistry;
use super::error::StreamError;

/// The native backend a [`HostApi`] drives (CoreAudio, ALSA, WASAPI, ...).
///
/// Deliberately not a Rust `enum`: backends unknown to this crate can be
/// registered at runtime with [`HostApiType::register`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HostApiType {
    code: u8,
    name: Cow<'static, str>,
}

static HOST_API_TYPES: Lazy<CodeRegistry<HostApiType>> = Lazy::new(|| {
    CodeRegistry::new(
        "host API type",
        HostApiType::KNOWN.into_iter().map(|t| (u32::from(t.code), t)),
    )
});

impl HostApiType {
    pub const IN_DEVELOPMENT: Self = Self::known(0, "Under Development");
    pub const DIRECT_SOUND: Self = Self::known(1, "DirectSound");
    pub const MME: Self = Self::known(2, "MultiMedia Extensions");
    pub const ASIO: Self = Self::known(3, "ASIO");
    pub const SOUND_MANAGER: Self = Self::known(4, "Sound Manager");
    pub const CORE_AUDIO: Self = Self::known(5, "Core Audio");
    pub const OSS: Self = Self::known(7, "Open Sound System");
    pub const ALSA: Self = Self::known(8, "Advanced Linux Sound Architecture");
    pub const AL: Self = Self::known(9, "SGI Audio Library");
    pub const BEOS: Self = Self::known(10, "BeOS Media Kit");
    pub const WDMKS: Self = Self::known(11, "WDM-KS");
    pub const JACK: Self = Self::known(12, "JACK Audio Connection Kit");
    pub const WASAPI: Self = Self::known(13, "Windows Audio Session API");
    pub const AUDIO_SCIENCE_HPI: Self = Self::known(14, "Audio Science HPI");

    const KNOWN: [Self; 14] = [
        Self::IN_DEVELOPMENT,
        Self::DIRECT_SOUND,
        Self::MME,
        Self::ASIO,
        Self::SOUND_MANAGER,
        Self::CORE_AUDIO,
        Self::OSS,
        Self::ALSA,
        Self::AL,
        Self::BEOS,
        Self::WDMKS,
        Self::JACK,
        Self::WASAPI,
        Self::AUDIO_SCIENCE_HPI,
    ];

    const fn known(code: u8, name: &'static str) -> Self {
        Self {
            code,
            name: Cow::Borrowed(name),
        }
    }

    /// Add a backend kind reported by a newer native engine.
    pub fn register(code: u8, name: impl Into<String>) -> Result<Self, StreamError> {
        HOST_API_TYPES.register(
            u32::from(code),
            Self {
                code,
                name: Cow::Owned(name.into()),
            },
        )
    }

    /// Look up a backend kind by code. Unknown codes yield `None`.
    pub fn resolve(code: u8) -> Option<Self> {
        HOST_API_TYPES.resolve(u32::from(code))
    }

    /// All registered backend kinds, ordered by code.
    pub fn values() -> Vec<Self> {
        HOST_API_TYPES.values()
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for HostApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A native audio backend and the devices it exposes.
///
/// Devices are not cached here; ask the host for them on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostApi {
    pub(crate) id: u8,
    pub(crate) type_code: u8,
    pub(crate) host_api_type: Option<HostApiType>,
    pub(crate) device_count: u8,
    pub(crate) default_input_device: Option<u8>,
    pub(crate) default_output_device: Option<u8>,
    pub(crate) name: String,
}

impl HostApi {
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The backend kind, or `None` when the native code is not registered.
    pub fn host_api_type(&self) -> Option<&HostApiType> {
        self.host_api_type.as_ref()
    }

    /// Raw native type code, available even when it did not resolve.
    pub fn type_code(&self) -> u8 {
        self.type_code
    }

    pub fn device_count(&self) -> u8 {
        self.device_count
    }

    /// Global index of the default input device, if the backend has one.
    pub fn default_input_device_id(&self) -> Option<u8> {
        self.default_input_device
    }

    pub fn default_output_device_id(&self) -> Option<u8> {
        self.default_output_device
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for HostApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = |id: Option<u8>| id.map_or_else(|| "none".to_string(), |id| id.to_string());
        writeln!(f, "Audio Host API {{")?;
        writeln!(f, "\tID: {}", self.id)?;
        writeln!(f, "\tName: {}", self.name)?;
        match &self.host_api_type {
            Some(t) => writeln!(f, "\tType: {}", t)?,
            None => writeln!(f, "\tType: unknown ({})", self.type_code)?,
        }
        writeln!(f, "\tDevice Count: {}", self.device_count)?;
        writeln!(f, "\tDefault Input Device ID: {}", device(self.default_input_device))?;
        writeln!(f, "\tDefault Output Device ID: {}", device(self.default_output_device))?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_types_resolve() {
        assert_eq!(HostApiType::resolve(8), Some(HostApiType::ALSA));
        assert_eq!(HostApiType::resolve(5).unwrap().name(), "Core Audio");
        // 6 was never assigned by the native engine.
        assert_eq!(HostApiType::resolve(6), None);
    }

    #[test]
    fn duplicate_type_code_fails() {
        assert!(matches!(
            HostApiType::register(13, "WASAPI again"),
            Err(StreamError::DuplicateCode { code: 13, .. })
        ));
    }

    #[test]
    fn runtime_types_are_listed() {
        let pulse = HostApiType::register(200, "PulseAudio").unwrap();
        let sndio = HostApiType::register(201, "sndio").unwrap();

        assert_eq!(HostApiType::resolve(200), Some(pulse.clone()));
        assert_eq!(HostApiType::resolve(201), Some(sndio.clone()));
        let values = HostApiType::values();
        assert!(values.contains(&pulse));
        assert!(values.contains(&sndio));
        assert!(values.contains(&HostApiType::JACK));
    }

    #[test]
    fn unresolved_type_is_displayed_by_code() {
        let api = HostApi {
            id: 0,
            type_code: 99,
            host_api_type: None,
            device_count: 0,
            default_input_device: None,
            default_output_device: Some(1),
            name: "Mystery".into(),
        };
        let text = api.to_string();
        assert!(text.contains("Type: unknown (99)"));
        assert!(text.contains("Default Input Device ID: none"));
        assert!(text.contains("Default Output Device ID: 1"));
    }
}
