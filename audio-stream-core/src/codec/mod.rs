//! Binary descriptor protocol shared with the native engine.

pub mod cursor;
pub mod records;

pub use records::{
    decode_device, decode_devices, decode_host_api, decode_host_apis, encode_configuration, ConfigRecord,
    DeviceRecord, HostApiRecord, CONFIG_RECORD_LEN,
};
