//! Media arbiter task - API request, profile event, and deferred command
//! processing
//!
//! This module contains the single processing loop that owns all transport
//! state transitions. API requests, profile-layer completions and deferred
//! internal commands are drained from their channels one event at a time, so
//! the [`crate::registry::MediaRegistry`] is never observed mid-transition.
//!
//! # Usage
//!
//! Spawn the arbiter as an Embassy task with the host integrations it should
//! drive:
//!
//! ```rust,no_run
//! use mediabird::{hosts::MediaHosts, processor};
//!
//! # async fn example<S, V, L>(streaming: S, voice: V, liveness: L)
//! # where
//! #     S: mediabird::hosts::StreamingHost,
//! #     V: mediabird::hosts::VoiceHost,
//! #     L: mediabird::hosts::LivenessMonitor,
//! # {
//! let hosts = MediaHosts::new(streaming, voice, liveness);
//! processor::run(hosts).await;
//! # }
//! ```
//!
//! # Architecture
//!
//! * **API requests** arrive on the request channel and get a response per
//!   request, except `Acquire`, whose response is deferred until the resume
//!   completes.
//! * **Profile events** carry completions (matched to pending acquires by
//!   ticket), client disconnections and delay reports.
//! * **Internal commands** are deferred work the arbiter posted to itself,
//!   always handled on a later loop iteration than the event that caused
//!   them.

use crate::{
    INTERNAL_COMMAND_CHANNEL, InternalCommand, MediaError, PROFILE_EVENT_CHANNEL,
    PROPERTY_CHANGED_CHANNEL, ProfileEvent, PropertyChanged, REQUEST_CHANNEL, RESPONSE_CHANNEL,
    Request, Response,
    hosts::{LivenessMonitor, MediaHosts, ReplyToken, StreamingHost, TransportEvents, VoiceHost},
    media_registry,
    profile::TransportProfile,
    transport::{
        ActiveChannel, ClientId, PropertyChange, ResumeOutcome, TransportId, TransportPath,
    },
};
use embassy_futures::select::{Either3, select3};

/// [`TransportEvents`] implementation that fans transport outcomes out onto
/// the global channels
pub struct ChannelEvents;

impl TransportEvents for ChannelEvents {
    fn acquire_complete(
        &mut self,
        reply: ReplyToken,
        result: Result<ActiveChannel, MediaError>,
    ) -> bool {
        let response = match result {
            Ok(channel) => Response::Acquired { reply, channel },
            Err(error) => Response::Error { reply, error },
        };
        if RESPONSE_CHANNEL.try_send(response).is_err() {
            defmt::error!(
                "[ARBITER] Response queue full, reply {:?} dropped",
                defmt::Debug2Format(&reply)
            );
            return false;
        }
        true
    }

    fn property_changed(&mut self, path: &TransportPath, change: PropertyChange) {
        let notification = PropertyChanged {
            path: path.clone(),
            change,
        };
        if PROPERTY_CHANGED_CHANNEL.try_send(notification).is_err() {
            defmt::warn!(
                "[ARBITER] Property change dropped: {:?}",
                defmt::Debug2Format(&change)
            );
        }
    }

    fn schedule_owner_teardown(&mut self, transport: TransportId, client: ClientId) {
        let command = InternalCommand::RemoveOwner { transport, client };
        if INTERNAL_COMMAND_CHANNEL.try_send(command).is_err() {
            defmt::error!("[ARBITER] Internal command queue full, teardown dropped");
        }
    }
}

async fn handle_request<S, V, L>(request: Request, hosts: &mut MediaHosts<S, V, L>)
where
    S: StreamingHost,
    V: VoiceHost,
    L: LivenessMonitor,
{
    defmt::debug!(
        "[ARBITER] API request: {:?}",
        defmt::Debug2Format(&request)
    );
    let reply = request.reply_token();
    let Ok(mut registry) = media_registry().await else {
        defmt::error!("[ARBITER] MediaRegistry not initialized");
        RESPONSE_CHANNEL
            .send(Response::Error {
                reply,
                error: MediaError::Failed,
            })
            .await;
        return;
    };

    let mut events = ChannelEvents;
    let response = match request {
        Request::Acquire {
            transport,
            client,
            access,
            reply,
        } => {
            match registry.acquire(transport, &client, access, reply, hosts, &mut events) {
                // The reply is sent when the resume completes or the owner
                // is torn down.
                Ok(()) => None,
                Err(error) => Some(Response::Error { reply, error }),
            }
        }
        Request::Release {
            transport,
            client,
            access,
            reply,
        } => match registry.release(transport, &client, access, hosts, &mut events) {
            Ok(()) => Some(Response::Released { reply }),
            Err(error) => Some(Response::Error { reply, error }),
        },
        Request::GetProperties { transport, reply } => {
            match registry.properties(transport, &hosts.voice) {
                Ok(properties) => Some(Response::Properties { reply, properties }),
                Err(error) => Some(Response::Error { reply, error }),
            }
        }
        Request::SetProperty {
            transport,
            name,
            value,
            reply,
        } => match registry.set_property(transport, name.as_str(), value) {
            Ok(()) => Some(Response::PropertySet { reply }),
            Err(error) => Some(Response::Error { reply, error }),
        },
    };

    if let Some(response) = response {
        defmt::debug!(
            "[ARBITER] API response: {:?}",
            defmt::Debug2Format(&response)
        );
        RESPONSE_CHANNEL.send(response).await;
    }
}

async fn handle_profile_event<S, V, L>(event: ProfileEvent, hosts: &mut MediaHosts<S, V, L>)
where
    S: StreamingHost,
    V: VoiceHost,
    L: LivenessMonitor,
{
    defmt::debug!(
        "[ARBITER] Profile event: {:?}",
        defmt::Debug2Format(&event)
    );
    let Ok(mut registry) = media_registry().await else {
        defmt::error!("[ARBITER] MediaRegistry not initialized");
        return;
    };

    let mut events = ChannelEvents;
    match event {
        ProfileEvent::StreamReady {
            ticket,
            handle,
            input_mtu,
            output_mtu,
        } => {
            let channel = ActiveChannel {
                handle: handle.raw(),
                input_mtu,
                output_mtu,
            };
            registry.resume_complete(
                TransportProfile::Streaming,
                ticket,
                ResumeOutcome::Stream(channel),
                hosts,
                &mut events,
            );
        }
        ProfileEvent::StreamFailed { ticket } => {
            registry.resume_complete(
                TransportProfile::Streaming,
                ticket,
                ResumeOutcome::Failed,
                hosts,
                &mut events,
            );
        }
        ProfileEvent::ChannelReady { ticket, handle } => {
            registry.resume_complete(
                TransportProfile::Voice,
                ticket,
                ResumeOutcome::Channel(handle.raw()),
                hosts,
                &mut events,
            );
        }
        ProfileEvent::ChannelFailed { ticket } => {
            registry.resume_complete(
                TransportProfile::Voice,
                ticket,
                ResumeOutcome::Failed,
                hosts,
                &mut events,
            );
        }
        ProfileEvent::ClientDisconnected { client } => {
            registry.client_disconnected(&client, hosts, &mut events);
        }
        ProfileEvent::DelayChanged { transport, delay } => {
            registry.update_delay(transport, delay, &mut events);
        }
    }
}

async fn handle_internal_command<S, V, L>(
    command: InternalCommand,
    hosts: &mut MediaHosts<S, V, L>,
) where
    S: StreamingHost,
    V: VoiceHost,
    L: LivenessMonitor,
{
    defmt::debug!(
        "[ARBITER] Internal command: {:?}",
        defmt::Debug2Format(&command)
    );
    let Ok(mut registry) = media_registry().await else {
        defmt::error!("[ARBITER] MediaRegistry not initialized");
        return;
    };

    let mut events = ChannelEvents;
    match command {
        InternalCommand::RemoveOwner { transport, client } => {
            // The owner may already be gone; teardown is idempotent.
            if let Some(transport) = registry.transport_mut(transport) {
                transport.teardown_owner(&client, hosts, &mut events);
            }
        }
        InternalCommand::RemoveTransport { transport } => {
            if registry.remove_transport(transport, hosts, &mut events).is_err() {
                defmt::warn!(
                    "[ARBITER] Remove of unknown transport: {:?}",
                    defmt::Debug2Format(&transport)
                );
            }
        }
    }
}

/// Run the media arbiter loop
///
/// # Panics
///
/// This function will panic if media registry initialization fails.
/// The panic occurs if `init_media_registry()` returns an error.
pub async fn run<S, V, L>(mut hosts: MediaHosts<S, V, L>) -> !
where
    S: StreamingHost,
    V: VoiceHost,
    L: LivenessMonitor,
{
    crate::init_media_registry()
        .await
        .expect("Failed to initialize media registry");

    let request_receiver = REQUEST_CHANNEL.receiver();
    let event_receiver = PROFILE_EVENT_CHANNEL.receiver();
    let internal_receiver = INTERNAL_COMMAND_CHANNEL.receiver();

    loop {
        match select3(
            request_receiver.receive(),
            event_receiver.receive(),
            internal_receiver.receive(),
        )
        .await
        {
            Either3::First(request) => handle_request(request, &mut hosts).await,
            Either3::Second(event) => handle_profile_event(event, &mut hosts).await,
            Either3::Third(command) => handle_internal_command(command, &mut hosts).await,
        }
    }
}
