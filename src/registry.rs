//! Registry of all live media transports.
//!
//! The [`MediaRegistry`] owns every [`MediaTransport`] and routes requests,
//! profile completions and liveness events to the right one. Transport
//! identifiers and path suffixes come from a monotonically increasing
//! counter that is never reused, so a stale identifier can never alias a
//! newer transport.

use crate::{
    MediaError,
    access::AccessType,
    address::BluetoothAddress,
    constants,
    hosts::{
        LivenessMonitor, MediaHosts, OperationTicket, ReplyToken, StreamingHost, TransportEvents,
        VoiceHost,
    },
    profile::{ProfileUuid, TransportProfile},
    transport::{
        ClientId, MediaTransport, PropertyValue, ResumeOutcome, TransportId, TransportPath,
        TransportProperties,
    },
};
use core::fmt::Write;
use heapless::FnvIndexMap;

/// Owner of all media transports on this host
#[derive(Debug)]
pub struct MediaRegistry {
    transports: FnvIndexMap<TransportId, MediaTransport, { constants::MAX_TRANSPORTS }>,
    /// Allocation counter, monotonically increasing, never reused
    next_transport: u32,
}

impl Default for MediaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            transports: FnvIndexMap::new(),
            next_transport: 0,
        }
    }

    /// Register a transport for a configured endpoint on `device`.
    ///
    /// The profile strategy is selected from the endpoint service UUID; the
    /// transport path is `<device-hex>/fd<n>` with `n` taken from the
    /// allocation counter.
    ///
    /// # Errors
    ///
    /// [`MediaError::ConstructionFailed`] if the UUID maps to no supported
    /// profile, the configuration blob is oversized, or the registry is
    /// full.
    pub fn create_transport(
        &mut self,
        device: BluetoothAddress,
        uuid: ProfileUuid,
        codec: u8,
        configuration: &[u8],
    ) -> Result<TransportId, MediaError> {
        let profile = TransportProfile::from_uuid(uuid).ok_or(MediaError::ConstructionFailed)?;
        if self.transports.len() == constants::MAX_TRANSPORTS {
            return Err(MediaError::ConstructionFailed);
        }
        let configuration = heapless::Vec::from_slice(configuration)
            .map_err(|()| MediaError::ConstructionFailed)?;

        let id = TransportId(self.next_transport);
        let mut path = TransportPath::new();
        write!(path, "{}/fd{}", device.format_hex(), self.next_transport)
            .map_err(|_| MediaError::ConstructionFailed)?;

        let transport = MediaTransport::new(id, path, device, uuid, codec, configuration, profile);
        self.transports
            .insert(id, transport)
            .map_err(|_| MediaError::ConstructionFailed)?;
        self.next_transport += 1;
        Ok(id)
    }

    /// Remove a transport, tearing down every remaining owner first and
    /// releasing the cached signalling session.
    ///
    /// # Errors
    ///
    /// [`MediaError::Failed`] if no such transport exists.
    pub fn remove_transport<S, V, L, E>(
        &mut self,
        id: TransportId,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) -> Result<(), MediaError>
    where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        let mut transport = self.transports.remove(&id).ok_or(MediaError::Failed)?;
        while let Some(client) = transport.owners.keys().next().cloned() {
            transport.teardown_owner(&client, hosts, events);
        }
        if let Some(session) = transport.session.take() {
            hosts.streaming.release_session(session);
        }
        Ok(())
    }

    /// Route an `Acquire` to its transport
    ///
    /// # Errors
    ///
    /// [`MediaError::Failed`] for an unknown transport, otherwise whatever
    /// [`MediaTransport::acquire`] returns.
    pub fn acquire<S, V, L, E>(
        &mut self,
        id: TransportId,
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
        let transport = self.transports.get_mut(&id).ok_or(MediaError::Failed)?;
        transport.acquire(client, access, reply, hosts, events)
    }

    /// Route a `Release` to its transport
    ///
    /// # Errors
    ///
    /// [`MediaError::Failed`] for an unknown transport, otherwise whatever
    /// [`MediaTransport::release`] returns.
    pub fn release<S, V, L, E>(
        &mut self,
        id: TransportId,
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
        let transport = self.transports.get_mut(&id).ok_or(MediaError::Failed)?;
        transport.release(client, access, hosts, events)
    }

    /// Property snapshot of a transport
    ///
    /// # Errors
    ///
    /// [`MediaError::Failed`] for an unknown transport.
    pub fn properties<V: VoiceHost>(
        &self,
        id: TransportId,
        voice: &V,
    ) -> Result<TransportProperties, MediaError> {
        let transport = self.transports.get(&id).ok_or(MediaError::Failed)?;
        Ok(transport.properties(voice))
    }

    /// Route a `SetProperty` to its transport
    ///
    /// # Errors
    ///
    /// [`MediaError::Failed`] for an unknown transport, otherwise whatever
    /// [`MediaTransport::set_property`] returns.
    pub fn set_property(
        &mut self,
        id: TransportId,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), MediaError> {
        let transport = self.transports.get_mut(&id).ok_or(MediaError::Failed)?;
        transport.set_property(name, value)
    }

    /// Resolve an asynchronous resume completion by its ticket.
    ///
    /// Tickets are allocated independently by the streaming and voice
    /// collaborators, so equal numeric values are legal across profiles;
    /// the lookup is restricted to transports of the completing profile.
    /// Completions whose ticket then matches no pending request are
    /// dropped: the owner may have been torn down (and the ticket
    /// canceled) while the completion was already queued.
    pub fn resume_complete<S, V, L, E>(
        &mut self,
        profile: TransportProfile,
        ticket: OperationTicket,
        outcome: ResumeOutcome,
        hosts: &mut MediaHosts<S, V, L>,
        events: &mut E,
    ) where
        S: StreamingHost,
        V: VoiceHost,
        L: LivenessMonitor,
        E: TransportEvents,
    {
        let mut target = None;
        'search: for (id, transport) in &self.transports {
            if transport.profile != profile {
                continue;
            }
            for (client, owner) in &transport.owners {
                let pending = owner.request.as_ref().and_then(|request| request.ticket);
                if pending == Some(ticket) {
                    target = Some((*id, client.clone()));
                    break 'search;
                }
            }
        }

        if let Some((id, client)) = target {
            if let Some(transport) = self.transports.get_mut(&id) {
                transport.resume_complete(&client, outcome, hosts, events);
            }
        }
    }

    /// Tear down every owner held by a disconnected client, across all
    /// transports
    pub fn client_disconnected<S, V, L, E>(
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
        let mut affected: heapless::Vec<TransportId, { constants::MAX_TRANSPORTS }> =
            heapless::Vec::new();
        for (id, transport) in &self.transports {
            if transport.owners.contains_key(client) {
                let _ = affected.push(*id);
            }
        }
        for id in affected {
            if let Some(transport) = self.transports.get_mut(&id) {
                transport.owner_disconnected(client, hosts, events);
            }
        }
    }

    /// Forward a delay report from the remote sink to its transport
    pub fn update_delay<E: TransportEvents>(&mut self, id: TransportId, delay: u16, events: &mut E) {
        if let Some(transport) = self.transports.get_mut(&id) {
            transport.update_delay(delay, events);
        }
    }

    /// Look up a transport by identifier
    #[must_use]
    pub fn transport(&self, id: TransportId) -> Option<&MediaTransport> {
        self.transports.get(&id)
    }

    /// Look up a transport mutably by identifier
    pub fn transport_mut(&mut self, id: TransportId) -> Option<&mut MediaTransport> {
        self.transports.get_mut(&id)
    }

    /// Number of live transports
    #[must_use]
    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }
}
