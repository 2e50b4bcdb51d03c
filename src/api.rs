//! Mediabird API Functions
//!
//! This module provides the public API functions for interacting with the
//! media arbiter task. These functions use static channels to communicate
//! with the arbiter and are designed to be called from application code.
//!
//! The API functions are not coupled to any specific IPC surface. They can
//! back a D-Bus bridge, a shell, a test harness, or any other application
//! architecture.
//!
//! The response channel has a single consumer: each helper sends one request
//! and takes the next response, discarding it (as [`MediaError::Failed`]) if
//! the reply token does not match. Callers must serialize their use of these
//! helpers; with a deferred `Acquire` outstanding, a concurrent caller can
//! consume a response that was not addressed to it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mediabird::api::{acquire, release};
//!
//! # async fn example(transport: mediabird::transport::TransportId) {
//! // Take both locks and wait for the channel to come up
//! let channel = acquire(transport, ":1.42", "rw").await.unwrap();
//!
//! // Give everything back
//! release(transport, ":1.42", "rw").await.unwrap();
//! # }
//! ```

use crate::{
    AccessType, INTERNAL_COMMAND_CHANNEL, InternalCommand, MediaError, PROFILE_EVENT_CHANNEL,
    PROPERTY_CHANGED_CHANNEL, ProfileEvent, PropertyChanged, REQUEST_CHANNEL, RESPONSE_CHANNEL,
    Request, Response, address::BluetoothAddress, hosts::ReplyToken, media_registry,
    profile::ProfileUuid,
    transport::{ActiveChannel, ClientId, PropertyValue, TransportId, TransportProperties},
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};

static REPLY_COUNTER: Mutex<CriticalSectionRawMutex, u32> = Mutex::new(0);

async fn next_reply_token() -> ReplyToken {
    let mut counter = REPLY_COUNTER.lock().await;
    *counter = counter.wrapping_add(1);
    ReplyToken(*counter)
}

/// Acquire read/write access to a transport and wait for its channel.
///
/// `access` is parsed like a mode string: `"r"`, `"w"` or `"rw"`.
///
/// # Errors
///
/// Returns [`MediaError::PermissionDenied`] if the requested locks are
/// unavailable, [`MediaError::IoFailure`] if the channel could not be
/// brought up, or [`MediaError::Failed`] for an unknown transport or an
/// unexpected response.
pub async fn acquire(
    transport: TransportId,
    client: &str,
    access: &str,
) -> Result<ActiveChannel, MediaError> {
    let client = ClientId::new(client)?;
    let reply = next_reply_token().await;
    REQUEST_CHANNEL
        .sender()
        .send(Request::Acquire {
            transport,
            client,
            access: AccessType::parse(access),
            reply,
        })
        .await;
    match RESPONSE_CHANNEL.receiver().receive().await {
        Response::Acquired { reply: r, channel } if r == reply => Ok(channel),
        Response::Error { reply: r, error } if r == reply => Err(error),
        _ => Err(MediaError::Failed),
    }
}

/// Release previously acquired access on a transport.
///
/// Releasing a strict subset of the held access keeps the ownership alive
/// with the remainder.
///
/// # Errors
///
/// Returns [`MediaError::PermissionDenied`] if the caller holds nothing on
/// the transport or the released access does not match what it holds, or
/// [`MediaError::Failed`] for an unknown transport or an unexpected
/// response.
pub async fn release(
    transport: TransportId,
    client: &str,
    access: &str,
) -> Result<(), MediaError> {
    let client = ClientId::new(client)?;
    let reply = next_reply_token().await;
    REQUEST_CHANNEL
        .sender()
        .send(Request::Release {
            transport,
            client,
            access: AccessType::parse(access),
            reply,
        })
        .await;
    match RESPONSE_CHANNEL.receiver().receive().await {
        Response::Released { reply: r } if r == reply => Ok(()),
        Response::Error { reply: r, error } if r == reply => Err(error),
        _ => Err(MediaError::Failed),
    }
}

/// Read the property snapshot of a transport.
///
/// # Errors
///
/// Returns [`MediaError::Failed`] for an unknown transport or an unexpected
/// response.
pub async fn get_properties(transport: TransportId) -> Result<TransportProperties, MediaError> {
    let reply = next_reply_token().await;
    REQUEST_CHANNEL
        .sender()
        .send(Request::GetProperties { transport, reply })
        .await;
    match RESPONSE_CHANNEL.receiver().receive().await {
        Response::Properties {
            reply: r,
            properties,
        } if r == reply => Ok(properties),
        Response::Error { reply: r, error } if r == reply => Err(error),
        _ => Err(MediaError::Failed),
    }
}

/// Write a transport property.
///
/// # Errors
///
/// Currently always [`MediaError::NotSupported`]; neither profile exposes a
/// writable property. Returns [`MediaError::Failed`] for an oversized
/// property name, an unknown transport or an unexpected response.
pub async fn set_property(
    transport: TransportId,
    name: &str,
    value: PropertyValue,
) -> Result<(), MediaError> {
    let name = heapless::String::try_from(name).map_err(|()| MediaError::Failed)?;
    let reply = next_reply_token().await;
    REQUEST_CHANNEL
        .sender()
        .send(Request::SetProperty {
            transport,
            name,
            value,
            reply,
        })
        .await;
    match RESPONSE_CHANNEL.receiver().receive().await {
        Response::PropertySet { reply: r } if r == reply => Ok(()),
        Response::Error { reply: r, error } if r == reply => Err(error),
        _ => Err(MediaError::Failed),
    }
}

/// Register a transport for a configured endpoint.
///
/// # Errors
///
/// Returns [`MediaError::ConstructionFailed`] if the UUID maps to no
/// supported profile, the configuration is oversized, the registry is full,
/// or the registry has not been initialized.
pub async fn create_transport(
    device: BluetoothAddress,
    uuid: ProfileUuid,
    codec: u8,
    configuration: &[u8],
) -> Result<TransportId, MediaError> {
    let Ok(mut registry) = media_registry().await else {
        return Err(MediaError::ConstructionFailed);
    };
    registry.create_transport(device, uuid, codec, configuration)
}

/// Remove a transport, tearing down its remaining owners.
///
/// The removal is handed to the arbiter and runs on its loop; removal of an
/// unknown transport is ignored there.
pub async fn remove_transport(transport: TransportId) {
    INTERNAL_COMMAND_CHANNEL
        .sender()
        .send(InternalCommand::RemoveTransport { transport })
        .await;
}

/// Feed a profile-layer event (completion, disconnect, delay report) into
/// the arbiter
pub async fn submit_profile_event(event: ProfileEvent) {
    PROFILE_EVENT_CHANNEL.sender().send(event).await;
}

/// Wait for the next property change notification
pub async fn next_property_change() -> PropertyChanged {
    PROPERTY_CHANGED_CHANNEL.receiver().receive().await
}
