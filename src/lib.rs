#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(dead_code, clippy::unused_async, clippy::too_many_lines)]

pub mod access;
mod address;
pub mod api;
pub mod constants;
pub mod hosts;
pub mod processor;
pub mod profile;
pub mod registry;
pub mod transport;

use crate::constants::MESSAGE_QUEUE_DEPTH;
use crate::hosts::ReplyToken;
use crate::registry::MediaRegistry;
use crate::transport::{
    ActiveChannel, ClientId, PropertyChange, PropertyValue, TransportId, TransportPath,
    TransportProperties,
};
use embassy_sync::channel::Channel;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    mutex::{MappedMutexGuard, Mutex, MutexGuard},
};

pub use access::AccessType;
pub use address::BluetoothAddress;

pub(crate) static REQUEST_CHANNEL: Channel<CriticalSectionRawMutex, Request, MESSAGE_QUEUE_DEPTH> =
    Channel::new();

pub(crate) static RESPONSE_CHANNEL: Channel<
    CriticalSectionRawMutex,
    Response,
    MESSAGE_QUEUE_DEPTH,
> = Channel::new();

/// Profile-layer completions and device events feeding the arbiter task
pub(crate) static PROFILE_EVENT_CHANNEL: Channel<
    CriticalSectionRawMutex,
    ProfileEvent,
    MESSAGE_QUEUE_DEPTH,
> = Channel::new();

/// Deferred work the arbiter posts to itself, drained on later iterations
pub(crate) static INTERNAL_COMMAND_CHANNEL: Channel<
    CriticalSectionRawMutex,
    InternalCommand,
    MESSAGE_QUEUE_DEPTH,
> = Channel::new();

/// Property change notifications fanned out to interested subscribers
pub(crate) static PROPERTY_CHANGED_CHANNEL: Channel<
    CriticalSectionRawMutex,
    PropertyChanged,
    MESSAGE_QUEUE_DEPTH,
> = Channel::new();

/// Global `MediaRegistry`, initialized by the client at runtime
pub(crate) static MEDIA_REGISTRY: Mutex<CriticalSectionRawMutex, Option<MediaRegistry>> =
    Mutex::new(None);

/// Initialize the global `MediaRegistry`.
///
/// Must be called before using any API functions or spawning the arbiter
/// task.
///
/// # Errors
///
/// Returns an error if the registry has already been initialized.
pub async fn init_media_registry() -> Result<(), &'static str> {
    let mut guard = MEDIA_REGISTRY.lock().await;
    if guard.is_some() {
        return Err("MediaRegistry already initialized");
    }
    *guard = Some(MediaRegistry::new());
    Ok(())
}

/// Get a locked reference to the global `MediaRegistry`.
///
/// Primarily intended for the arbiter task; API users should use the
/// functions in the [`api`] module instead.
///
/// # Errors
///
/// Returns an error if the registry has not been initialized.
///
/// # Panics
///
/// Panics if the mutex guard cannot be mapped (should never happen in
/// practice).
pub async fn media_registry<'a>()
-> Result<MappedMutexGuard<'a, CriticalSectionRawMutex, MediaRegistry>, &'static str> {
    let guard = MEDIA_REGISTRY.lock().await;
    if guard.is_none() {
        return Err("MediaRegistry not initialized");
    }
    Ok(MutexGuard::map(guard, |opt| opt.as_mut().unwrap()))
}

/// Media-transport errors surfaced to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum MediaError {
    /// The caller may not perform the requested operation in the current
    /// lock state
    PermissionDenied,
    /// The profile layer could not start bringing the channel up
    ResumeFailed,
    /// An in-flight acquire failed or its owner was torn down before a
    /// channel could be delivered
    IoFailure,
    /// A transport could not be registered
    ConstructionFailed,
    /// The operation is not supported by the transport's profile
    NotSupported,
    /// Unknown transport, malformed input or internal failure
    Failed,
}

/// API requests sent to the media arbiter task
#[derive(Debug, Clone)]
pub(crate) enum Request {
    /// Take read/write locks on a transport and bring its channel up
    Acquire {
        transport: TransportId,
        client: ClientId,
        access: AccessType,
        reply: ReplyToken,
    },
    /// Give back some or all previously acquired access
    Release {
        transport: TransportId,
        client: ClientId,
        access: AccessType,
        reply: ReplyToken,
    },
    /// Read the property snapshot of a transport
    GetProperties {
        transport: TransportId,
        reply: ReplyToken,
    },
    /// Write a transport property
    SetProperty {
        transport: TransportId,
        name: heapless::String<{ constants::MAX_PROPERTY_NAME_LENGTH }>,
        value: PropertyValue,
        reply: ReplyToken,
    },
}

impl Request {
    pub(crate) fn reply_token(&self) -> ReplyToken {
        match self {
            Self::Acquire { reply, .. }
            | Self::Release { reply, .. }
            | Self::GetProperties { reply, .. }
            | Self::SetProperty { reply, .. } => *reply,
        }
    }
}

/// API responses sent back from the media arbiter task
#[derive(Debug, Clone)]
pub(crate) enum Response {
    /// Acquire completed; the channel is up
    Acquired {
        reply: ReplyToken,
        channel: ActiveChannel,
    },
    /// Release completed
    Released { reply: ReplyToken },
    /// Property snapshot of a transport
    Properties {
        reply: ReplyToken,
        properties: TransportProperties,
    },
    /// Property write completed
    PropertySet { reply: ReplyToken },
    /// Error occurred
    Error {
        reply: ReplyToken,
        error: MediaError,
    },
}

/// Events fed into the arbiter by profile integrations and device plumbing
#[derive(Debug, Clone)]
pub enum ProfileEvent {
    /// A requested stream came up
    StreamReady {
        /// Ticket of the resume operation this completes
        ticket: hosts::OperationTicket,
        /// Connection handle carrying the media channel
        handle: bt_hci::param::ConnHandle,
        /// Negotiated input MTU
        input_mtu: u16,
        /// Negotiated output MTU
        output_mtu: u16,
    },
    /// A requested stream failed to come up
    StreamFailed {
        /// Ticket of the resume operation this completes
        ticket: hosts::OperationTicket,
    },
    /// A requested SCO channel came up
    ChannelReady {
        /// Ticket of the resume operation this completes
        ticket: hosts::OperationTicket,
        /// SCO connection handle
        handle: bt_hci::param::ConnHandle,
    },
    /// A requested SCO channel failed to come up
    ChannelFailed {
        /// Ticket of the resume operation this completes
        ticket: hosts::OperationTicket,
    },
    /// A client with live owners disconnected
    ClientDisconnected {
        /// Identity of the departed client
        client: ClientId,
    },
    /// The remote sink reported a new rendering delay
    DelayChanged {
        /// Transport the report belongs to
        transport: TransportId,
        /// New delay in 1/10 ms units
        delay: u16,
    },
}

/// Deferred commands the arbiter posts to itself (fire-and-forget)
#[derive(Debug, Clone)]
pub(crate) enum InternalCommand {
    /// Tear one owner down on a later loop iteration
    RemoveOwner {
        transport: TransportId,
        client: ClientId,
    },
    /// Remove a transport, tearing down all of its owners
    RemoveTransport { transport: TransportId },
}

/// One property change notification, addressed by transport path
#[derive(Debug, Clone)]
pub struct PropertyChanged {
    /// Path of the transport the change belongs to
    pub path: TransportPath,
    /// The changed property and its new value
    pub change: PropertyChange,
}
