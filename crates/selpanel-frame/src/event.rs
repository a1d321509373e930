use crate::id::MediaId;

/// One classified line from the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Press(MediaId),
    Release(MediaId),
    /// Firmware finished booting.
    Ready,
    /// Reply to a host `PING`.
    HeartbeatReply,
    DeviceError(String),
    /// Full `FW ...` banner line.
    FirmwareInfo(String),
    ModeInfo(String),
    /// `OK ...` acknowledgements and free-form status lines.
    StatusInfo(String),
    Unknown(String),
}

impl ProtocolEvent {
    /// Short stable name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::Press(_) => "press",
            ProtocolEvent::Release(_) => "release",
            ProtocolEvent::Ready => "ready",
            ProtocolEvent::HeartbeatReply => "heartbeat_reply",
            ProtocolEvent::DeviceError(_) => "device_error",
            ProtocolEvent::FirmwareInfo(_) => "firmware_info",
            ProtocolEvent::ModeInfo(_) => "mode_info",
            ProtocolEvent::StatusInfo(_) => "status_info",
            ProtocolEvent::Unknown(_) => "unknown",
        }
    }
}
