// ============================================
// File: crates/vlink-core/src/protocol/verb.rs
// ============================================
//! # Verbs and Error Codes
//!
//! ## Main Functionality
//! - `Verb`: the operation a packet carries (low 5 bits of the verb byte)
//! - `ErrorCode`: reason codes carried by ERROR replies
//!
//! ## ⚠️ Important Note for Next Developer
//! - Ids are wire constants; never renumber
//! - Ids 15 and 17 are retired and must stay unassigned
//!
//! ## Last Modified
//! v0.1.0 - Initial verb table

use std::fmt;

// ============================================
// Verb
// ============================================

/// Packet verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Verb {
    /// No operation.
    Nop = 0,
    /// Announce identity; the only verb accepted before a key exists.
    Hello = 1,
    /// Error reply to an earlier packet.
    Error = 2,
    /// Success reply to an earlier packet.
    Ok = 3,
    /// Ask for the identities of addresses.
    Whois = 4,
    /// Introduce a peer's physical address.
    Rendezvous = 5,
    /// Ethernet frame with implied MACs.
    Frame = 6,
    /// Ethernet frame with explicit MACs and flags.
    ExtFrame = 7,
    /// Echo request.
    Echo = 8,
    /// Announce multicast subscriptions.
    MulticastLike = 9,
    /// Push credentials.
    NetworkCredentials = 10,
    /// Ask a controller for a network config.
    NetworkConfigRequest = 11,
    /// Network config pushed by a controller.
    NetworkConfig = 12,
    /// Ask for members of a multicast group.
    MulticastGather = 13,
    /// Multicast Ethernet frame.
    MulticastFrame = 14,
    /// Advertise direct physical paths.
    PushDirectPaths = 16,
    /// Path acknowledgement.
    Ack = 18,
    /// Path quality measurement.
    QosMeasurement = 19,
    /// Application message.
    UserMessage = 20,
    /// Remote trace report.
    RemoteTrace = 21,
}

impl Verb {
    /// Parses a verb id (the compression flag must already be masked off).
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::Nop,
            1 => Self::Hello,
            2 => Self::Error,
            3 => Self::Ok,
            4 => Self::Whois,
            5 => Self::Rendezvous,
            6 => Self::Frame,
            7 => Self::ExtFrame,
            8 => Self::Echo,
            9 => Self::MulticastLike,
            10 => Self::NetworkCredentials,
            11 => Self::NetworkConfigRequest,
            12 => Self::NetworkConfig,
            13 => Self::MulticastGather,
            14 => Self::MulticastFrame,
            16 => Self::PushDirectPaths,
            18 => Self::Ack,
            19 => Self::QosMeasurement,
            20 => Self::UserMessage,
            21 => Self::RemoteTrace,
            _ => return None,
        })
    }

    /// Wire id.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Upper-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Hello => "HELLO",
            Self::Error => "ERROR",
            Self::Ok => "OK",
            Self::Whois => "WHOIS",
            Self::Rendezvous => "RENDEZVOUS",
            Self::Frame => "FRAME",
            Self::ExtFrame => "EXT_FRAME",
            Self::Echo => "ECHO",
            Self::MulticastLike => "MULTICAST_LIKE",
            Self::NetworkCredentials => "NETWORK_CREDENTIALS",
            Self::NetworkConfigRequest => "NETWORK_CONFIG_REQUEST",
            Self::NetworkConfig => "NETWORK_CONFIG",
            Self::MulticastGather => "MULTICAST_GATHER",
            Self::MulticastFrame => "MULTICAST_FRAME",
            Self::PushDirectPaths => "PUSH_DIRECT_PATHS",
            Self::Ack => "ACK",
            Self::QosMeasurement => "QOS_MEASUREMENT",
            Self::UserMessage => "USER_MESSAGE",
            Self::RemoteTrace => "REMOTE_TRACE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// ErrorCode
// ============================================

/// Reason code carried by ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// Malformed or nonsensical request.
    InvalidRequest = 1,
    /// Protocol version too old.
    BadProtocolVersion = 2,
    /// Requested object unknown.
    ObjNotFound = 3,
    /// The sender's identity collides with a known one.
    IdentityCollision = 4,
    /// Verb or option not supported.
    UnsupportedOperation = 5,
    /// Sender must push its certificate of membership.
    NeedMembershipCertificate = 6,
    /// Sender is not allowed on the network.
    NetworkAccessDenied = 7,
    /// Receiver does not want this multicast group.
    UnwantedMulticast = 8,
}

impl ErrorCode {
    /// Parses an error code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::InvalidRequest,
            2 => Self::BadProtocolVersion,
            3 => Self::ObjNotFound,
            4 => Self::IdentityCollision,
            5 => Self::UnsupportedOperation,
            6 => Self::NeedMembershipCertificate,
            7 => Self::NetworkAccessDenied,
            8 => Self::UnwantedMulticast,
            _ => return None,
        })
    }

    /// Wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` if the code carries a network id.
    #[must_use]
    pub const fn has_network_id(self) -> bool {
        matches!(
            self,
            Self::NeedMembershipCertificate | Self::NetworkAccessDenied | Self::UnwantedMulticast
        )
    }
}

// ============================================
// Tests
// ============================================
