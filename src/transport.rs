//! Media transport arbitration core.
//!
//! A [`MediaTransport`] represents one active or potential audio data channel
//! bound to a device+endpoint pairing. Competing clients take read/write
//! locks on it through `Acquire`/`Release`; the first successful acquire
//! drives the profile handshake that brings the underlying channel up, and
//! the last release suspends it again.
//!
//! Every failure path (lock conflict, synchronous or asynchronous resume
//! failure, client disconnection, forced removal) converges on the single
//! owner teardown sequence in [`MediaTransport::teardown_owner`], so no
//! pending reply is ever dropped and no in-flight ticket is left dangling.

use crate::{
    MediaError,
    access::AccessType,
    address::BluetoothAddress,
    constants,
    hosts::{
        LivenessMonitor, MediaHosts, OperationTicket, ReplyToken, SessionHandle, StreamingHost,
        TransportEvents, VoiceHost, WatchHandle,
    },
    profile::{ProfileUuid, TransportProfile},
};
use heapless::FnvIndexMap;

/// Stable textual identity of a transport (`<device-hex>/fd<n>`)
pub type TransportPath = heapless::String<{ constants::MAX_TRANSPORT_PATH_LENGTH }>;

/// Registry key of a media transport, unique per allocation, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, defmt::Format)]
pub struct TransportId(pub u32);

/// Opaque identity of a requesting client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(heapless::String<{ constants::MAX_CLIENT_NAME_LENGTH }>);

impl ClientId {
    /// Wrap a client identity string
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Failed`] if the name exceeds
    /// [`constants::MAX_CLIENT_NAME_LENGTH`] bytes.
    pub fn new(name: &str) -> Result<Self, MediaError> {
        heapless::String::try_from(name)
            .map(Self)
            .map_err(|_| MediaError::Failed)
    }

    /// The identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// A value carried by a `SetProperty` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PropertyValue {
    /// 16-bit unsigned value
    U16(u16),
    /// Boolean value
    Bool(bool),
}

/// A property change notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PropertyChange {
    /// Input MTU of the active channel changed
    InputMtu(u16),
    /// Output MTU of the active channel changed
    OutputMtu(u16),
    /// Streaming rendering delay changed
    Delay(u16),
}

/// Descriptor of the active audio data channel of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct ActiveChannel {
    /// Raw channel handle (L2CAP media channel or SCO link)
    pub handle: u16,
    /// Input MTU in bytes
    pub input_mtu: u16,
    /// Output MTU in bytes
    pub output_mtu: u16,
}

/// Completion payload of an asynchronous resume operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The streaming profile delivered an active stream
    Stream(ActiveChannel),
    /// The voice-channel profile delivered a SCO channel handle
    Channel(u16),
    /// The profile operation failed or returned an invalid handle
    Failed,
}

/// Read-only property snapshot of a transport
#[derive(Debug, Clone)]
pub struct TransportProperties {
    /// Device the transport is bound to
    pub device: BluetoothAddress,
    /// Read lock currently held
    pub read_lock: bool,
    /// Write lock currently held
    pub write_lock: bool,
    /// Input MTU of the active channel, 0 when none
    pub input_mtu: u16,
    /// Output MTU of the active channel, 0 when none
    pub output_mtu: u16,
    /// Endpoint service class UUID
    pub uuid: ProfileUuid,
    /// Endpoint codec identifier
    pub codec: u8,
    /// Negotiated codec configuration blob
    pub configuration: heapless::Vec<u8, { constants::MAX_CONFIGURATION_SIZE }>,
    /// Profile-specific extras
    pub profile: crate::profile::ProfileProperties,
}

/// One in-flight asynchronous resume operation, owned by exactly one owner
#[derive(Debug)]
pub(crate) struct AcquireRequest {
    /// Pending reply destination, consumed exactly once
    pub(crate) reply: Option<ReplyToken>,
    /// Cancellation handle; `None` once completed or when resume never started
    pub(crate) ticket: Option<OperationTicket>,
}

/// One client's exclusive/shared hold on a transport
#[derive(Debug)]
pub(crate) struct MediaOwner {
    /// Identity of the holding client
    pub(crate) client: ClientId,
    /// Capabilities currently held
    pub(crate) access: AccessType,
    /// Pending acquire request, at most one
    pub(crate) request: Option<AcquireRequest>,
    /// Liveness subscription; present iff the owner is live
    pub(crate) watch: Option<WatchHandle>,
}

/// The access-controlled handle for one audio data channel
#[derive(Debug)]
pub struct MediaTransport {
    pub(crate) id: TransportId,
    pub(crate) path: TransportPath,
    pub(crate) device: BluetoothAddress,
    pub(crate) uuid: ProfileUuid,
    pub(crate) codec: u8,
    pub(crate) configuration: heapless::Vec<u8, { constants::MAX_CONFIGURATION_SIZE }>,
    pub(crate) profile: TransportProfile,
    pub(crate) owners: FnvIndexMap<ClientId, MediaOwner, { constants::MAX_TRANSPORT_OWNERS }>,
    pub(crate) read_lock: bool,
    pub(crate) write_lock: bool,
    /// Profile-level session lock held
    pub(crate) in_use: bool,
    pub(crate) channel: Option<ActiveChannel>,
    /// Cached signalling session (streaming only); released at removal
    pub(crate) session: Option<SessionHandle>,
    /// Rendering delay (streaming only)
    pub(crate) delay: u16,
}

impl MediaTransport {
    pub(crate) fn new(
        id: TransportId,
        path: TransportPath,
        device: BluetoothAddress,
        uuid: ProfileUuid,
        codec: u8,
        configuration: heapless::Vec<u8, { constants::MAX_CONFIGURATION_SIZE }>,
        profile: TransportProfile,
    ) -> Self {
        Self {
            id,
            path,
            device,
            uuid,
            codec,
            configuration,
            profile,
            owners: FnvIndexMap::new(),
            read_lock: false,
            write_lock: false,
            in_use: false,
            channel: None,
            session: None,
            delay: 0,
        }
    }

    /// Registry key of this transport
    #[must_use]
    pub fn id(&self) -> TransportId {
        self.id
    }

    /// Stable textual path of this transport
    #[must_use]
    pub fn path(&self) -> &TransportPath {
        &self.path
    }

    /// Device this transport is bound to
    #[must_use]
    pub fn device(&self) -> BluetoothAddress {
        self.device
    }

    /// Descriptor of the active channel, if any resume has completed
    #[must_use]
    pub fn channel(&self) -> Option<ActiveChannel> {
        self.channel
    }

    /// Number of live owners
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    fn lock(&mut self, access: AccessType) {
        if access.read() {
            self.read_lock = true;
        }
        if access.write() {
            self.write_lock = true;
        }
    }

    fn unlock(&mut self, access: AccessType) {
        if access.read() {
            self.read_lock = false;
        }
        if access.write() {
            self.write_lock = false;
        }
    }

    /// Validate an `Acquire`, record the lock state and start the resume.
    ///
    /// On success the reply is deferred until the resume completes. A
    /// synchronous resume failure runs the shared teardown path, which
    /// delivers the error reply before this returns.
    ///
    /// # Errors
    ///
    /// [`MediaError::PermissionDenied`] if the client already owns this
    /// transport, the access set is empty, or a requested lock component is
    /// already held; [`MediaError::Failed`] if the owner table is full.
    pub fn acquire<S, V, L, E>(
        &mut self,
        client: &ClientId,
        access: AccessType,
        reply: ReplyToken,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) -> Result<(), MediaError>
    where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        if self.owners.contains_key(client) {
            return Err(MediaError::PermissionDenied);
        }
        if access.is_empty() {
            return Err(MediaError::PermissionDenied);
        }
        if (access.read() && self.read_lock) || (access.write() && self.write_lock) {
            return Err(MediaError::PermissionDenied);
        }
        if self.owners.len() == constants::MAX_TRANSPORT_OWNERS {
            return Err(MediaError::Failed);
        }

        self.lock(access);

        let profile = self.profile;
        let resumed = profile.resume(self, &mut hosts.streaming, &mut hosts.voice);

        let watch = hosts.liveness.watch(client);
        let owner = MediaOwner {
            client: client.clone(),
            access,
            request: Some(AcquireRequest {
                reply: Some(reply),
                ticket: resumed.ok(),
            }),
            watch: Some(watch),
        };
        let _ = self.owners.insert(client.clone(), owner);

        if resumed.is_err() {
            self.teardown_owner(client, hosts, events);
        }

        Ok(())
    }

    /// Handle a `Release` of some or all of a client's held access.
    ///
    /// Releasing exactly the held access removes the owner through the
    /// shared teardown path. Releasing a strict non-empty subset only clears
    /// the matching lock bits and shrinks the owner; the owner set is
    /// unchanged, so no suspend check runs.
    ///
    /// # Errors
    ///
    /// [`MediaError::PermissionDenied`] if the client owns nothing here or
    /// the released access is not a subset of what it holds.
    pub fn release<S, V, L, E>(
        &mut self,
        client: &ClientId,
        access: AccessType,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) -> Result<(), MediaError>
    where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        let held = self
            .owners
            .get(client)
            .map(|owner| owner.access)
            .ok_or(MediaError::PermissionDenied)?;

        if access == held {
            self.teardown_owner(client, hosts, events);
            Ok(())
        } else if !access.is_empty() && held.contains(access) {
            self.unlock(access);
            if let Some(owner) = self.owners.get_mut(client) {
                owner.access = held.remove(access);
            }
            Ok(())
        } else {
            Err(MediaError::PermissionDenied)
        }
    }

    /// Tear one owner down: release its lock bits, drop its liveness watch,
    /// resolve its pending request (error reply, ticket cancellation),
    /// remove it, and suspend the profile if it was the last owner.
    ///
    /// Returns `false` if the client owns nothing on this transport.
    pub fn teardown_owner<S, V, L, E>(
        &mut self,
        client: &ClientId,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) -> bool
    where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        let Some(mut owner) = self.owners.remove(client) else {
            return false;
        };

        self.unlock(owner.access);

        if let Some(watch) = owner.watch.take() {
            hosts.liveness.unwatch(watch);
        }

        if let Some(request) = owner.request.take() {
            if let Some(reply) = request.reply {
                events.acquire_complete(reply, Err(MediaError::IoFailure));
            }
            if let Some(ticket) = request.ticket {
                let profile = self.profile;
                profile.cancel(self.device, ticket, &mut hosts.streaming, &mut hosts.voice);
            }
        }

        if self.owners.is_empty() {
            let profile = self.profile;
            profile.suspend(self, &mut hosts.streaming, &mut hosts.voice);
        }

        true
    }

    /// Teardown driven by a fired liveness watch.
    ///
    /// The watch has already expired, so it is cleared without a matching
    /// `unwatch` before the shared teardown runs.
    pub(crate) fn owner_disconnected<S, V, L, E>(
        &mut self,
        client: &ClientId,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        if let Some(owner) = self.owners.get_mut(client) {
            owner.watch = None;
        }
        self.teardown_owner(client, hosts, events);
    }

    /// Resolve the completion of an asynchronous resume for `client`.
    pub(crate) fn resume_complete<S, V, L, E>(
        &mut self,
        client: &ClientId,
        outcome: ResumeOutcome,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        let channel = match (self.profile, outcome) {
            (TransportProfile::Streaming, ResumeOutcome::Stream(channel)) => Some(channel),
            (TransportProfile::Voice, ResumeOutcome::Channel(handle)) => Some(ActiveChannel {
                handle,
                input_mtu: constants::SCO_CHANNEL_MTU,
                output_mtu: constants::SCO_CHANNEL_MTU,
            }),
            _ => None,
        };

        let reply = {
            let Some(owner) = self.owners.get_mut(client) else {
                return;
            };
            let Some(request) = owner.request.as_mut() else {
                return;
            };
            request.ticket = None;
            if channel.is_some() {
                // Successful completion consumes the request; the reply is
                // attempted exactly once.
                let reply = request.reply.take();
                owner.request = None;
                reply
            } else {
                None
            }
        };

        match channel {
            Some(channel) => {
                self.publish_channel(channel, events);
                let delivered =
                    reply.is_some_and(|reply| events.acquire_complete(reply, Ok(channel)));
                if !delivered {
                    self.fail_resume(client, hosts, events);
                }
            }
            None => self.fail_resume(client, hosts, events),
        }
    }

    /// Converge a failed (or undeliverable) resume on owner teardown.
    ///
    /// Streaming failures are observed concurrently with a stream state
    /// change notification, so their teardown is deferred to a later loop
    /// iteration; voice failures tear down inline.
    fn fail_resume<S, V, L, E>(
        &mut self,
        client: &ClientId,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        match self.profile {
            TransportProfile::Streaming => {
                events.schedule_owner_teardown(self.id, client.clone());
            }
            TransportProfile::Voice => {
                self.teardown_owner(client, hosts, events);
            }
        }
    }

    /// Record the active channel descriptor.
    ///
    /// Idempotent on the handle: republishing the current handle changes
    /// nothing and emits nothing. A new handle emits one change notification
    /// per MTU field that actually changed.
    pub(crate) fn publish_channel<E: TransportEvents>(
        &mut self,
        channel: ActiveChannel,
        events: &mut E,
    ) {
        if self.channel.map(|current| current.handle) == Some(channel.handle) {
            return;
        }

        let previous = self.channel;
        self.channel = Some(channel);

        if previous.map(|c| c.input_mtu) != Some(channel.input_mtu) {
            events.property_changed(&self.path, PropertyChange::InputMtu(channel.input_mtu));
        }
        if previous.map(|c| c.output_mtu) != Some(channel.output_mtu) {
            events.property_changed(&self.path, PropertyChange::OutputMtu(channel.output_mtu));
        }
    }

    /// Store a new rendering delay (streaming only), notifying only when the
    /// value actually changed
    pub fn update_delay<E: TransportEvents>(&mut self, delay: u16, events: &mut E) {
        if self.delay == delay {
            return;
        }
        self.delay = delay;
        events.property_changed(&self.path, PropertyChange::Delay(delay));
    }

    /// Read-only property snapshot
    pub fn properties<V: VoiceHost>(&self, voice: &V) -> TransportProperties {
        TransportProperties {
            device: self.device,
            read_lock: self.read_lock,
            write_lock: self.write_lock,
            input_mtu: self.channel.map_or(0, |c| c.input_mtu),
            output_mtu: self.channel.map_or(0, |c| c.output_mtu),
            uuid: self.uuid,
            codec: self.codec,
            configuration: self.configuration.clone(),
            profile: self.profile.properties(self, voice),
        }
    }

    /// Handle a `SetProperty` request for this transport
    ///
    /// # Errors
    ///
    /// Currently always [`MediaError::NotSupported`]; neither profile
    /// exposes a writable property.
    pub fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), MediaError> {
        self.profile.set_property(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileProperties;
    use heapless::Vec;

    #[derive(Default)]
    struct MockStreaming {
        session_available: bool,
        lock_ok: bool,
        stream_ok: bool,
        next_ticket: u32,
        sessions_acquired: u32,
        sessions_released: Vec<SessionHandle, 4>,
        endpoint_locks: u32,
        endpoint_unlocks: u32,
        stream_requests: u32,
        canceled: Vec<OperationTicket, 8>,
    }

    impl StreamingHost for MockStreaming {
        fn acquire_session(&mut self, _device: BluetoothAddress) -> Option<SessionHandle> {
            if !self.session_available {
                return None;
            }
            self.sessions_acquired += 1;
            Some(SessionHandle(700 + self.sessions_acquired))
        }

        fn release_session(&mut self, session: SessionHandle) {
            self.sessions_released.push(session).unwrap();
        }

        fn lock_endpoint(&mut self, _session: SessionHandle, _device: BluetoothAddress) -> bool {
            if self.lock_ok {
                self.endpoint_locks += 1;
            }
            self.lock_ok
        }

        fn unlock_endpoint(&mut self, _session: SessionHandle, _device: BluetoothAddress) {
            self.endpoint_unlocks += 1;
        }

        fn request_stream(
            &mut self,
            _session: SessionHandle,
            _device: BluetoothAddress,
        ) -> Option<OperationTicket> {
            if !self.stream_ok {
                return None;
            }
            self.stream_requests += 1;
            self.next_ticket += 1;
            Some(OperationTicket(self.next_ticket))
        }

        fn cancel_stream(&mut self, _device: BluetoothAddress, ticket: OperationTicket) {
            self.canceled.push(ticket).unwrap();
        }
    }

    #[derive(Default)]
    struct MockVoice {
        lock_ok: bool,
        request_ok: bool,
        next_ticket: u32,
        channel_locks: u32,
        channel_unlocks: u32,
        channel_requests: u32,
        canceled: Vec<OperationTicket, 8>,
        nrec: bool,
        inband: bool,
    }

    impl VoiceHost for MockVoice {
        fn lock_channel(&mut self, _device: BluetoothAddress) -> bool {
            if self.lock_ok {
                self.channel_locks += 1;
            }
            self.lock_ok
        }

        fn unlock_channel(&mut self, _device: BluetoothAddress) {
            self.channel_unlocks += 1;
        }

        fn request_channel(&mut self, _device: BluetoothAddress) -> Option<OperationTicket> {
            if !self.request_ok {
                return None;
            }
            self.channel_requests += 1;
            self.next_ticket += 1;
            Some(OperationTicket(0x8000 + self.next_ticket))
        }

        fn cancel_channel(&mut self, _device: BluetoothAddress, ticket: OperationTicket) {
            self.canceled.push(ticket).unwrap();
        }

        fn noise_reduction(&self, _device: BluetoothAddress) -> bool {
            self.nrec
        }

        fn inband_ringtone(&self, _device: BluetoothAddress) -> bool {
            self.inband
        }
    }

    #[derive(Default)]
    struct MockLiveness {
        next_watch: u32,
        watches: u32,
        unwatched: Vec<WatchHandle, 8>,
    }

    impl LivenessMonitor for MockLiveness {
        fn watch(&mut self, _client: &ClientId) -> WatchHandle {
            self.next_watch += 1;
            self.watches += 1;
            WatchHandle(self.next_watch)
        }

        fn unwatch(&mut self, watch: WatchHandle) {
            self.unwatched.push(watch).unwrap();
        }
    }

    struct RecordingEvents {
        deliverable: bool,
        replies: Vec<(ReplyToken, Result<ActiveChannel, MediaError>), 8>,
        changes: Vec<PropertyChange, 8>,
        scheduled: Vec<(TransportId, ClientId), 4>,
    }

    impl RecordingEvents {
        fn new() -> Self {
            Self {
                deliverable: true,
                replies: Vec::new(),
                changes: Vec::new(),
                scheduled: Vec::new(),
            }
        }
    }

    impl TransportEvents for RecordingEvents {
        fn acquire_complete(
            &mut self,
            reply: ReplyToken,
            result: Result<ActiveChannel, MediaError>,
        ) -> bool {
            self.replies.push((reply, result)).unwrap();
            self.deliverable
        }

        fn property_changed(&mut self, _path: &TransportPath, change: PropertyChange) {
            self.changes.push(change).unwrap();
        }

        fn schedule_owner_teardown(&mut self, transport: TransportId, client: ClientId) {
            self.scheduled.push((transport, client)).unwrap();
        }
    }

    type TestHosts = MediaHosts<MockStreaming, MockVoice, MockLiveness>;

    fn hosts() -> TestHosts {
        MediaHosts::new(
            MockStreaming {
                session_available: true,
                lock_ok: true,
                stream_ok: true,
                ..Default::default()
            },
            MockVoice {
                lock_ok: true,
                request_ok: true,
                ..Default::default()
            },
            MockLiveness::default(),
        )
    }

    fn client(name: &str) -> ClientId {
        ClientId::new(name).unwrap()
    }

    fn transport(profile: TransportProfile) -> MediaTransport {
        let uuid = match profile {
            TransportProfile::Streaming => crate::constants::A2DP_SOURCE_UUID,
            TransportProfile::Voice => crate::constants::HFP_GATEWAY_UUID,
        };
        MediaTransport::new(
            TransportId(1),
            TransportPath::try_from("12:34:56:78:9A:BC/fd0").unwrap(),
            BluetoothAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]),
            uuid,
            0x00,
            heapless::Vec::from_slice(&[0x21, 0x15, 0x02, 0x35]).unwrap(),
            profile,
        )
    }

    fn pending_ticket(t: &MediaTransport, client: &ClientId) -> Option<OperationTicket> {
        t.owners
            .get(client)
            .and_then(|o| o.request.as_ref())
            .and_then(|r| r.ticket)
    }

    #[test]
    fn acquire_grants_requested_locks() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();

        t.acquire(&client("a"), AccessType::READ, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        assert!(t.read_lock);
        assert!(!t.write_lock);
        assert!(t.in_use);
        assert_eq!(t.owner_count(), 1);
        assert_eq!(h.streaming.stream_requests, 1);
        assert_eq!(h.liveness.watches, 1);
        // The reply is deferred until the resume completes.
        assert!(e.replies.is_empty());
    }

    #[test]
    fn duplicate_client_rejected_regardless_of_access() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        assert_eq!(
            t.acquire(&a, AccessType::WRITE, ReplyToken(2), &mut h, &mut e),
            Err(MediaError::PermissionDenied)
        );
        assert_eq!(t.owner_count(), 1);
        assert_eq!(h.streaming.stream_requests, 1);
        assert!(!t.write_lock);
    }

    #[test]
    fn empty_access_rejected_without_side_effects() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();

        assert_eq!(
            t.acquire(
                &client("a"),
                AccessType::parse("xyz"),
                ReplyToken(1),
                &mut h,
                &mut e
            ),
            Err(MediaError::PermissionDenied)
        );
        assert_eq!(t.owner_count(), 0);
        assert!(!t.read_lock && !t.write_lock);
        assert_eq!(h.streaming.stream_requests, 0);
        assert_eq!(h.liveness.watches, 0);
    }

    #[test]
    fn lock_components_arbitrated_independently() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();

        // A takes read while B takes write before A's resume completes.
        t.acquire(&client("a"), AccessType::READ, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        t.acquire(&client("b"), AccessType::WRITE, ReplyToken(2), &mut h, &mut e)
            .unwrap();
        assert!(t.read_lock && t.write_lock);
        assert_eq!(t.owner_count(), 2);

        // Any further read request conflicts with A's hold.
        assert_eq!(
            t.acquire(&client("c"), AccessType::READ, ReplyToken(3), &mut h, &mut e),
            Err(MediaError::PermissionDenied)
        );
        assert_eq!(
            t.acquire(
                &client("c"),
                AccessType::READ_WRITE,
                ReplyToken(3),
                &mut h,
                &mut e
            ),
            Err(MediaError::PermissionDenied)
        );
    }

    #[test]
    fn second_owner_reuses_session_lock() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();

        t.acquire(&client("a"), AccessType::READ, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        t.acquire(&client("b"), AccessType::WRITE, ReplyToken(2), &mut h, &mut e)
            .unwrap();

        // One cached session, one endpoint lock, two stream requests.
        assert_eq!(h.streaming.sessions_acquired, 1);
        assert_eq!(h.streaming.endpoint_locks, 1);
        assert_eq!(h.streaming.stream_requests, 2);
    }

    #[test]
    fn session_failure_fails_resume_synchronously() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        h.streaming.session_available = false;
        let mut e = RecordingEvents::new();

        t.acquire(&client("a"), AccessType::READ, ReplyToken(9), &mut h, &mut e)
            .unwrap();
        assert_eq!(t.owner_count(), 0);
        assert!(!t.read_lock);
        assert!(!t.in_use);
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(9), Err(MediaError::IoFailure))]
        );
        // Nothing was started, so nothing is canceled.
        assert!(h.streaming.canceled.is_empty());
        assert_eq!(h.liveness.unwatched.len(), 1);
    }

    #[test]
    fn endpoint_lock_failure_fails_resume_synchronously() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        h.streaming.lock_ok = false;
        let mut e = RecordingEvents::new();

        t.acquire(&client("a"), AccessType::READ, ReplyToken(9), &mut h, &mut e)
            .unwrap();
        assert_eq!(t.owner_count(), 0);
        assert_eq!(h.streaming.sessions_acquired, 1);
        // The session stays cached for later resumes.
        assert!(t.session.is_some());
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(9), Err(MediaError::IoFailure))]
        );
    }

    #[test]
    fn stream_request_failure_releases_locks() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        h.streaming.stream_ok = false;
        let mut e = RecordingEvents::new();

        t.acquire(
            &client("a"),
            AccessType::READ_WRITE,
            ReplyToken(9),
            &mut h,
            &mut e,
        )
        .unwrap();
        assert_eq!(t.owner_count(), 0);
        assert!(!t.read_lock && !t.write_lock);
        assert!(!t.in_use);
        assert_eq!(h.streaming.endpoint_unlocks, 1);
    }

    #[test]
    fn voice_lock_failure_fails_resume_synchronously() {
        let mut t = transport(TransportProfile::Voice);
        let mut h = hosts();
        h.voice.lock_ok = false;
        let mut e = RecordingEvents::new();

        t.acquire(&client("a"), AccessType::READ, ReplyToken(4), &mut h, &mut e)
            .unwrap();
        assert_eq!(t.owner_count(), 0);
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(4), Err(MediaError::IoFailure))]
        );
    }

    #[test]
    fn streaming_completion_publishes_and_replies() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ_WRITE, ReplyToken(7), &mut h, &mut e)
            .unwrap();
        let channel = ActiveChannel {
            handle: 0x0042,
            input_mtu: 512,
            output_mtu: 672,
        };
        t.resume_complete(&a, ResumeOutcome::Stream(channel), &mut h, &mut e);

        assert_eq!(t.channel(), Some(channel));
        assert_eq!(e.replies.as_slice(), &[(ReplyToken(7), Ok(channel))]);
        assert_eq!(
            e.changes.as_slice(),
            &[PropertyChange::InputMtu(512), PropertyChange::OutputMtu(672)]
        );
        // The request is destroyed on successful completion.
        assert!(t.owners.get(&a).unwrap().request.is_none());
        assert_eq!(t.owner_count(), 1);
    }

    #[test]
    fn voice_completion_uses_fixed_sco_mtus() {
        let mut t = transport(TransportProfile::Voice);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ_WRITE, ReplyToken(3), &mut h, &mut e)
            .unwrap();
        t.resume_complete(&a, ResumeOutcome::Channel(0x0007), &mut h, &mut e);

        let expected = ActiveChannel {
            handle: 0x0007,
            input_mtu: 48,
            output_mtu: 48,
        };
        assert_eq!(t.channel(), Some(expected));
        assert_eq!(e.replies.as_slice(), &[(ReplyToken(3), Ok(expected))]);
    }

    #[test]
    fn republishing_same_handle_is_idempotent() {
        let mut t = transport(TransportProfile::Streaming);
        let mut e = RecordingEvents::new();

        let first = ActiveChannel {
            handle: 1,
            input_mtu: 512,
            output_mtu: 512,
        };
        t.publish_channel(first, &mut e);
        assert_eq!(e.changes.len(), 2);

        // Same handle: nothing changes, nothing is emitted.
        t.publish_channel(
            ActiveChannel {
                handle: 1,
                input_mtu: 999,
                output_mtu: 999,
            },
            &mut e,
        );
        assert_eq!(e.changes.len(), 2);
        assert_eq!(t.channel(), Some(first));
    }

    #[test]
    fn new_handle_notifies_per_changed_mtu_field() {
        let mut t = transport(TransportProfile::Streaming);
        let mut e = RecordingEvents::new();

        t.publish_channel(
            ActiveChannel {
                handle: 1,
                input_mtu: 512,
                output_mtu: 672,
            },
            &mut e,
        );
        e.changes.clear();

        // New handle, only the output MTU differs.
        t.publish_channel(
            ActiveChannel {
                handle: 2,
                input_mtu: 512,
                output_mtu: 896,
            },
            &mut e,
        );
        assert_eq!(e.changes.as_slice(), &[PropertyChange::OutputMtu(896)]);
    }

    #[test]
    fn streaming_async_failure_defers_teardown() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ, ReplyToken(5), &mut h, &mut e)
            .unwrap();
        t.resume_complete(&a, ResumeOutcome::Failed, &mut h, &mut e);

        // Teardown is scheduled, not run inline.
        assert_eq!(e.scheduled.as_slice(), &[(TransportId(1), a.clone())]);
        assert_eq!(t.owner_count(), 1);
        assert!(e.replies.is_empty());
        assert!(t.read_lock);

        // The deferred command lands on the same path later.
        t.teardown_owner(&a, &mut h, &mut e);
        assert_eq!(t.owner_count(), 0);
        assert!(!t.read_lock);
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(5), Err(MediaError::IoFailure))]
        );
        // The ticket was cleared at completion, so nothing is canceled.
        assert!(h.streaming.canceled.is_empty());
        assert!(t.channel().is_none());
    }

    #[test]
    fn voice_async_failure_tears_down_inline() {
        let mut t = transport(TransportProfile::Voice);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ, ReplyToken(5), &mut h, &mut e)
            .unwrap();
        t.resume_complete(&a, ResumeOutcome::Failed, &mut h, &mut e);

        assert!(e.scheduled.is_empty());
        assert_eq!(t.owner_count(), 0);
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(5), Err(MediaError::IoFailure))]
        );
        assert_eq!(h.voice.channel_unlocks, 1);
        assert!(!t.in_use);
    }

    #[test]
    fn undeliverable_reply_is_treated_as_failure() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        e.deliverable = false;
        let a = client("a");

        t.acquire(&a, AccessType::READ, ReplyToken(6), &mut h, &mut e)
            .unwrap();
        t.resume_complete(
            &a,
            ResumeOutcome::Stream(ActiveChannel {
                handle: 3,
                input_mtu: 512,
                output_mtu: 512,
            }),
            &mut h,
            &mut e,
        );

        // One delivery attempt, then deferred teardown.
        assert_eq!(e.replies.len(), 1);
        assert_eq!(e.scheduled.len(), 1);

        t.teardown_owner(&a, &mut h, &mut e);
        // The reply was already consumed; teardown must not send another.
        assert_eq!(e.replies.len(), 1);
        assert_eq!(t.owner_count(), 0);
    }

    #[test]
    fn teardown_cancels_pending_ticket_exactly_once() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ, ReplyToken(8), &mut h, &mut e)
            .unwrap();
        let ticket = pending_ticket(&t, &a).unwrap();

        assert!(t.teardown_owner(&a, &mut h, &mut e));
        assert_eq!(h.streaming.canceled.as_slice(), &[ticket]);
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(8), Err(MediaError::IoFailure))]
        );

        // Idempotent: the owner is gone.
        assert!(!t.teardown_owner(&a, &mut h, &mut e));
        assert_eq!(h.streaming.canceled.len(), 1);
        assert_eq!(e.replies.len(), 1);
    }

    #[test]
    fn partial_release_keeps_owner_alive() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ_WRITE, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        t.resume_complete(
            &a,
            ResumeOutcome::Stream(ActiveChannel {
                handle: 1,
                input_mtu: 512,
                output_mtu: 512,
            }),
            &mut h,
            &mut e,
        );

        t.release(&a, AccessType::READ, &mut h, &mut e).unwrap();
        assert_eq!(t.owner_count(), 1);
        assert!(!t.read_lock);
        assert!(t.write_lock);
        assert_eq!(t.owners.get(&a).unwrap().access, AccessType::WRITE);
        // The owner set is unchanged, so no suspend ran.
        assert_eq!(h.streaming.endpoint_unlocks, 0);

        t.release(&a, AccessType::WRITE, &mut h, &mut e).unwrap();
        assert_eq!(t.owner_count(), 0);
        assert!(!t.read_lock && !t.write_lock);
        assert_eq!(h.streaming.endpoint_unlocks, 1);
        assert!(!t.in_use);
        // No pending request remained, so no extra reply was sent.
        assert_eq!(e.replies.len(), 1);
    }

    #[test]
    fn release_validates_access_against_held() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        assert_eq!(
            t.release(&a, AccessType::READ, &mut h, &mut e),
            Err(MediaError::PermissionDenied)
        );

        t.acquire(&a, AccessType::READ, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        assert_eq!(
            t.release(&a, AccessType::WRITE, &mut h, &mut e),
            Err(MediaError::PermissionDenied)
        );
        assert_eq!(
            t.release(&a, AccessType::READ_WRITE, &mut h, &mut e),
            Err(MediaError::PermissionDenied)
        );
        assert_eq!(
            t.release(&a, AccessType::parse(""), &mut h, &mut e),
            Err(MediaError::PermissionDenied)
        );
        assert_eq!(t.owner_count(), 1);
        assert!(t.read_lock);
    }

    #[test]
    fn suspend_runs_once_when_last_owner_leaves() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");
        let b = client("b");

        t.acquire(&a, AccessType::READ, ReplyToken(1), &mut h, &mut e)
            .unwrap();
        t.acquire(&b, AccessType::WRITE, ReplyToken(2), &mut h, &mut e)
            .unwrap();

        t.teardown_owner(&a, &mut h, &mut e);
        assert_eq!(h.streaming.endpoint_unlocks, 0);
        assert!(t.in_use);

        t.teardown_owner(&b, &mut h, &mut e);
        assert_eq!(h.streaming.endpoint_unlocks, 1);
        assert!(!t.in_use);
    }

    #[test]
    fn disconnect_skips_unwatch_but_cancels_and_replies() {
        let mut t = transport(TransportProfile::Streaming);
        let mut h = hosts();
        let mut e = RecordingEvents::new();
        let a = client("a");

        t.acquire(&a, AccessType::READ, ReplyToken(2), &mut h, &mut e)
            .unwrap();
        let ticket = pending_ticket(&t, &a).unwrap();

        t.owner_disconnected(&a, &mut h, &mut e);
        assert_eq!(t.owner_count(), 0);
        // The watch already fired; it must not be unregistered again.
        assert!(h.liveness.unwatched.is_empty());
        assert_eq!(h.streaming.canceled.as_slice(), &[ticket]);
        assert_eq!(
            e.replies.as_slice(),
            &[(ReplyToken(2), Err(MediaError::IoFailure))]
        );
    }

    #[test]
    fn delay_update_notifies_only_on_change() {
        let mut t = transport(TransportProfile::Streaming);
        let mut e = RecordingEvents::new();

        t.update_delay(150, &mut e);
        assert_eq!(e.changes.as_slice(), &[PropertyChange::Delay(150)]);

        t.update_delay(150, &mut e);
        assert_eq!(e.changes.len(), 1);

        t.update_delay(0, &mut e);
        assert_eq!(e.changes.len(), 2);
    }

    #[test]
    fn properties_snapshot_per_profile() {
        let mut h = hosts();
        h.voice.nrec = true;

        let t = transport(TransportProfile::Streaming);
        let props = t.properties(&h.voice);
        assert_eq!(props.device, t.device());
        assert_eq!(props.uuid, crate::constants::A2DP_SOURCE_UUID);
        assert_eq!(props.input_mtu, 0);
        assert_eq!(props.configuration.as_slice(), &[0x21, 0x15, 0x02, 0x35]);
        assert_eq!(props.profile, ProfileProperties::Streaming { delay: 0 });

        let v = transport(TransportProfile::Voice);
        let props = v.properties(&h.voice);
        assert_eq!(
            props.profile,
            ProfileProperties::Voice {
                noise_reduction: true,
                inband_ringtone: false,
            }
        );
    }

    #[test]
    fn client_id_rejects_oversized_names() {
        assert!(ClientId::new(":1.42").is_ok());
        let long = "0123456789012345678901234567890123456789";
        assert_eq!(ClientId::new(long), Err(MediaError::Failed));
    }
}
