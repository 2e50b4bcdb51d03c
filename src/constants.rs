//! `Mediabird` Constants
//!
//! This module contains all the constants used throughout the `Mediabird` library:
//! capacity limits for the bounded collections, message queue depths, and the
//! Bluetooth profile identifiers used to select a transport strategy.

/// Maximum number of media transports alive at the same time
pub const MAX_TRANSPORTS: usize = 4;

/// Maximum number of owners per transport
pub const MAX_TRANSPORT_OWNERS: usize = 4;

/// Maximum size of an endpoint codec configuration blob in bytes
pub const MAX_CONFIGURATION_SIZE: usize = 32;

/// Maximum length of a client identity string in bytes
pub const MAX_CLIENT_NAME_LENGTH: usize = 32;

/// Maximum length of a transport path string in bytes
pub const MAX_TRANSPORT_PATH_LENGTH: usize = 48;

/// Maximum length of a property name in `SetProperty` requests
pub const MAX_PROPERTY_NAME_LENGTH: usize = 16;

/// Depth of the static request/response/event queues
pub const MESSAGE_QUEUE_DEPTH: usize = 8;

/// Fixed input/output MTU of a voice (SCO) channel in bytes
pub const SCO_CHANNEL_MTU: u16 = 48;

/// A2DP Source service class UUID (streaming profile)
pub const A2DP_SOURCE_UUID: u16 = 0x110A;

/// A2DP Sink service class UUID (streaming profile)
pub const A2DP_SINK_UUID: u16 = 0x110B;

/// HFP Audio Gateway service class UUID (voice-channel profile)
pub const HFP_GATEWAY_UUID: u16 = 0x111F;

/// HSP Audio Gateway service class UUID (voice-channel profile)
pub const HSP_GATEWAY_UUID: u16 = 0x1112;
