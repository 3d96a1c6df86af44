//! Shared types for blucli.
//!
//! This crate contains the types shared across the blucli workspace: the
//! discovered [`Device`] record, the [`DeviceClass`] table mapping LSDP class
//! codes to mDNS service tags, and device-argument parsing.

pub mod address;
pub mod class;
pub mod device;

pub use address::{join_host_port, split_host_port, ParseDeviceError};
pub use class::{class_to_type, is_player_class, DeviceClass};
pub use device::{Device, SOURCE_LSDP, SOURCE_MDNS};

/// HTTP port players listen on when nothing else is advertised.
pub const DEFAULT_PLAYER_PORT: u16 = 11000;
