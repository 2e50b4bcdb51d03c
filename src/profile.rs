//! Profile strategies for media transports.
//!
//! A transport behaves differently depending on the audio profile of its
//! endpoint: the streaming profile (A2DP) runs over an AVDTP signalling
//! session with a lazily acquired, transport-cached session handle, while the
//! voice-channel profile (HFP/HSP) locks the device's read+write channel and
//! brings up a SCO link with fixed 48-byte MTUs. The profile set is closed,
//! so dispatch is a plain enum selected once at transport construction from
//! the endpoint service UUID.

use crate::{
    MediaError, constants,
    hosts::{OperationTicket, StreamingHost, VoiceHost},
    transport::{MediaTransport, PropertyValue},
};

/// Service class UUID of a media endpoint (16-bit assigned number)
pub type ProfileUuid = u16;

/// The profile strategy driving resume/suspend/cancel for one transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum TransportProfile {
    /// A2DP streaming profile (source or sink endpoint)
    Streaming,
    /// HFP/HSP voice-channel profile (gateway endpoint)
    Voice,
}

/// Profile-specific entries of a transport property snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ProfileProperties {
    /// Streaming profile extras
    Streaming {
        /// Rendering delay reported by the remote sink, in 1/10 ms units
        delay: u16,
    },
    /// Voice-channel profile extras
    Voice {
        /// Noise reduction enabled on the device
        noise_reduction: bool,
        /// Inband ringtone enabled on the device
        inband_ringtone: bool,
    },
}

impl TransportProfile {
    /// Select the profile strategy for an endpoint service UUID
    #[must_use]
    pub fn from_uuid(uuid: ProfileUuid) -> Option<Self> {
        match uuid {
            constants::A2DP_SOURCE_UUID | constants::A2DP_SINK_UUID => Some(Self::Streaming),
            constants::HFP_GATEWAY_UUID | constants::HSP_GATEWAY_UUID => Some(Self::Voice),
            _ => None,
        }
    }

    /// Start bringing the transport channel into an active state.
    ///
    /// Returns the ticket of the in-flight asynchronous operation, or
    /// [`MediaError::ResumeFailed`] if the profile-level lock (or session)
    /// could not be obtained and nothing was started.
    pub(crate) fn resume<S: StreamingHost, V: VoiceHost>(
        self,
        transport: &mut MediaTransport,
        streaming: &mut S,
        voice: &mut V,
    ) -> Result<OperationTicket, MediaError> {
        let device = transport.device;
        match self {
            Self::Streaming => {
                // The signalling session is cached on the transport and kept
                // until the transport itself is removed, not until suspend.
                let session = match transport.session {
                    Some(session) => session,
                    None => {
                        let session = streaming
                            .acquire_session(device)
                            .ok_or(MediaError::ResumeFailed)?;
                        transport.session = Some(session);
                        session
                    }
                };

                if !transport.in_use {
                    if !streaming.lock_endpoint(session, device) {
                        return Err(MediaError::ResumeFailed);
                    }
                    transport.in_use = true;
                }

                streaming
                    .request_stream(session, device)
                    .ok_or(MediaError::ResumeFailed)
            }
            Self::Voice => {
                if !transport.in_use {
                    if !voice.lock_channel(device) {
                        return Err(MediaError::ResumeFailed);
                    }
                    transport.in_use = true;
                }

                voice
                    .request_channel(device)
                    .ok_or(MediaError::ResumeFailed)
            }
        }
    }

    /// Release the profile-level session lock once no owner remains
    pub(crate) fn suspend<S: StreamingHost, V: VoiceHost>(
        self,
        transport: &mut MediaTransport,
        streaming: &mut S,
        voice: &mut V,
    ) {
        match self {
            Self::Streaming => {
                if let Some(session) = transport.session {
                    streaming.unlock_endpoint(session, transport.device);
                }
            }
            Self::Voice => voice.unlock_channel(transport.device),
        }
        transport.in_use = false;
    }

    /// Forward cancellation of an in-flight resume to the profile layer
    pub(crate) fn cancel<S: StreamingHost, V: VoiceHost>(
        self,
        device: crate::BluetoothAddress,
        ticket: OperationTicket,
        streaming: &mut S,
        voice: &mut V,
    ) {
        match self {
            Self::Streaming => streaming.cancel_stream(device, ticket),
            Self::Voice => voice.cancel_channel(device, ticket),
        }
    }

    /// Profile-specific entries of the property snapshot
    pub(crate) fn properties<V: VoiceHost>(
        self,
        transport: &MediaTransport,
        voice: &V,
    ) -> ProfileProperties {
        match self {
            Self::Streaming => ProfileProperties::Streaming {
                delay: transport.delay,
            },
            Self::Voice => ProfileProperties::Voice {
                noise_reduction: voice.noise_reduction(transport.device),
                inband_ringtone: voice.inband_ringtone(transport.device),
            },
        }
    }

    /// Handle a `SetProperty` request.
    ///
    /// Neither profile exposes a writable property, so this is an explicit
    /// [`MediaError::NotSupported`] for both.
    pub(crate) fn set_property(
        self,
        _name: &str,
        _value: PropertyValue,
    ) -> Result<(), MediaError> {
        match self {
            Self::Streaming | Self::Voice => Err(MediaError::NotSupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_selects_strategy() {
        assert_eq!(
            TransportProfile::from_uuid(constants::A2DP_SOURCE_UUID),
            Some(TransportProfile::Streaming)
        );
        assert_eq!(
            TransportProfile::from_uuid(constants::A2DP_SINK_UUID),
            Some(TransportProfile::Streaming)
        );
        assert_eq!(
            TransportProfile::from_uuid(constants::HFP_GATEWAY_UUID),
            Some(TransportProfile::Voice)
        );
        assert_eq!(
            TransportProfile::from_uuid(constants::HSP_GATEWAY_UUID),
            Some(TransportProfile::Voice)
        );
        assert_eq!(TransportProfile::from_uuid(0x110E), None);
    }

    #[test]
    fn set_property_is_not_supported() {
        for profile in [TransportProfile::Streaming, TransportProfile::Voice] {
            assert_eq!(
                profile.set_property("Delay", PropertyValue::U16(100)),
                Err(MediaError::NotSupported)
            );
        }
    }
}
