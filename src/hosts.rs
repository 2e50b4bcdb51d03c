//! Collaborator interfaces consumed by the transport arbitration core.
//!
//! The arbitration state machine never talks to the profile protocol layers
//! directly. It consumes four narrow interfaces:
//!
//! * [`StreamingHost`] — the A2DP/AVDTP side: signalling session management,
//!   per-endpoint session locking and asynchronous stream requests
//! * [`VoiceHost`] — the HFP/HSP side: device channel locking, asynchronous
//!   SCO channel requests and the voice feature flag accessors
//! * [`LivenessMonitor`] — client disconnect subscriptions
//! * [`TransportEvents`] — the outbound surface: deferred `Acquire` replies,
//!   property change notifications and deferred-teardown scheduling
//!
//! Asynchronous operations are ticket-based: a request returns an
//! [`OperationTicket`] and its completion later arrives as a
//! [`ProfileEvent`](crate::ProfileEvent) carrying the same ticket. Cancelling
//! a ticket is fire-and-forget; once the owning request is destroyed, any
//! late completion for that ticket is dropped by the arbiter.

use crate::{
    MediaError,
    address::BluetoothAddress,
    transport::{ActiveChannel, ClientId, PropertyChange, TransportId, TransportPath},
};

/// Handle to a streaming-profile signalling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct SessionHandle(pub u32);

/// Handle identifying one in-flight asynchronous resume operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct OperationTicket(pub u32);

/// Handle to a client liveness subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct WatchHandle(pub u32);

/// Correlation token for a pending `Acquire`/`Release` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct ReplyToken(pub u32);

/// Streaming-profile (A2DP) collaborator
pub trait StreamingHost {
    /// Acquire a signalling session towards `device`, or `None` on failure.
    ///
    /// Sessions are reference-managed by the collaborator; the transport
    /// caches the handle and releases it only when the transport is removed.
    fn acquire_session(&mut self, device: BluetoothAddress) -> Option<SessionHandle>;

    /// Release a previously acquired signalling session
    fn release_session(&mut self, session: SessionHandle);

    /// Take the profile-level endpoint lock; `false` means it is unavailable
    fn lock_endpoint(&mut self, session: SessionHandle, device: BluetoothAddress) -> bool;

    /// Release the profile-level endpoint lock
    fn unlock_endpoint(&mut self, session: SessionHandle, device: BluetoothAddress);

    /// Start an asynchronous stream request; completion arrives as a
    /// [`ProfileEvent`](crate::ProfileEvent) carrying the returned ticket
    fn request_stream(
        &mut self,
        session: SessionHandle,
        device: BluetoothAddress,
    ) -> Option<OperationTicket>;

    /// Cancel an in-flight stream request (fire-and-forget)
    fn cancel_stream(&mut self, device: BluetoothAddress, ticket: OperationTicket);
}

/// Voice-channel-profile (HFP/HSP) collaborator
pub trait VoiceHost {
    /// Take the device read+write channel lock; `false` means unavailable
    fn lock_channel(&mut self, device: BluetoothAddress) -> bool;

    /// Release the device read+write channel lock
    fn unlock_channel(&mut self, device: BluetoothAddress);

    /// Start an asynchronous voice channel request; completion arrives as a
    /// [`ProfileEvent`](crate::ProfileEvent) carrying the returned ticket
    fn request_channel(&mut self, device: BluetoothAddress) -> Option<OperationTicket>;

    /// Cancel an in-flight channel request (fire-and-forget)
    fn cancel_channel(&mut self, device: BluetoothAddress, ticket: OperationTicket);

    /// Current noise-reduction state of the device
    fn noise_reduction(&self, device: BluetoothAddress) -> bool;

    /// Current inband-ringtone state of the device
    fn inband_ringtone(&self, device: BluetoothAddress) -> bool;
}

/// Client liveness subscription service
///
/// A watch fires exactly once, as a
/// [`ProfileEvent::ClientDisconnected`](crate::ProfileEvent::ClientDisconnected),
/// when the named client disconnects. A fired watch is already unregistered
/// and must not be passed to [`LivenessMonitor::unwatch`] again.
pub trait LivenessMonitor {
    /// Subscribe to the disconnection of `client`
    fn watch(&mut self, client: &ClientId) -> WatchHandle;

    /// Drop a still-active subscription
    fn unwatch(&mut self, watch: WatchHandle);
}

/// Outbound event surface of the arbitration core
pub trait TransportEvents {
    /// Resolve a pending `Acquire` reply.
    ///
    /// Returns `false` if the reply could not be delivered (for example the
    /// client is gone); the caller treats that as the failure case.
    fn acquire_complete(
        &mut self,
        reply: ReplyToken,
        result: Result<ActiveChannel, MediaError>,
    ) -> bool;

    /// Emit a property change notification for the given transport path
    fn property_changed(&mut self, path: &TransportPath, change: PropertyChange);

    /// Schedule an owner teardown for a later arbiter loop iteration.
    ///
    /// Used when a streaming resume fails asynchronously: the failure is
    /// observed concurrently with a stream state change, and tearing down
    /// inline would re-enter the profile layer mid-notification.
    fn schedule_owner_teardown(&mut self, transport: TransportId, client: ClientId);
}

/// The collaborator bundle threaded through every arbitration operation
#[derive(Debug)]
pub struct MediaHosts<S, V, L> {
    /// Streaming-profile collaborator
    pub streaming: S,
    /// Voice-channel collaborator
    pub voice: V,
    /// Liveness subscription service
    pub liveness: L,
}

impl<S: StreamingHost, V: VoiceHost, L: LivenessMonitor> MediaHosts<S, V, L> {
    /// Bundle the three profile-layer collaborators
    pub fn new(streaming: S, voice: V, liveness: L) -> Self {
        Self {
            streaming,
            voice,
            liveness,
        }
    }
}
