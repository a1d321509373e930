//! Press dispatch with "last press wins" preemption.
//!
//! The dispatcher owns the playback session. Every method takes `&mut self`;
//! the bridge event loop is its only caller, which serializes presses and
//! completions. Device commands go through one [`DeviceQueue`], so the panel
//! sees them in dispatch order.

use std::sync::Arc;

use selpanel_frame::{Catalog, DeviceCommand, MediaId};
use tracing::{debug, info, warn};

use crate::device::{DeviceQueue, DeviceReceipt};
use crate::hub::{BroadcastReport, ConsumerHub};
use crate::media::MediaReport;
use crate::message::Broadcast;

/// What an accepted press did.
#[derive(Debug)]
pub struct PressOutcome {
    pub id: MediaId,
    /// Session that was preempted, if any.
    pub preempted: Option<MediaId>,
    pub stop: BroadcastReport,
    pub play: BroadcastReport,
    /// Queued `LEDSET`, when the host manages LEDs.
    pub device_write: Option<DeviceReceipt>,
}

#[derive(Debug)]
pub struct PressDispatcher {
    catalog: Catalog,
    session: Option<MediaId>,
    hub: Arc<ConsumerHub>,
    device: DeviceQueue,
    media: Arc<MediaReport>,
    device_managed_leds: bool,
}

impl PressDispatcher {
    pub fn new(
        catalog: Catalog,
        hub: Arc<ConsumerHub>,
        device: DeviceQueue,
        media: Arc<MediaReport>,
        device_managed_leds: bool,
    ) -> Self {
        Self {
            catalog,
            session: None,
            hub,
            device,
            media,
            device_managed_leds,
        }
    }

    /// Currently active media, if any.
    pub fn session(&self) -> Option<MediaId> {
        self.session
    }

    /// Handle a press of `raw`.
    ///
    /// Out-of-range ids are dropped without touching the session. Accepted
    /// presses always replace the session, even for the id already playing,
    /// and always broadcast `stop` then `play`. The optional `LEDSET` is
    /// queued before the broadcasts; its failure does not affect them.
    pub fn on_press(&mut self, raw: u32) -> Option<PressOutcome> {
        let Some(id) = self.catalog.media_id(raw) else {
            warn!(id = raw, catalog_size = self.catalog.size(), "press id out of range");
            return None;
        };

        if let Some(status) = self.media.incomplete_status(id) {
            warn!(%id, ?status, "media incomplete, playing anyway");
        }

        let preempted = self.session.replace(id);
        info!(%id, preempted = ?preempted.map(MediaId::get), "button pressed");

        let device_write =
            (!self.device_managed_leds).then(|| self.device.push(DeviceCommand::LedSet(id)));
        let stop = self.broadcast(&Broadcast::Stop);
        let play = self.broadcast(&Broadcast::Play { id });

        Some(PressOutcome {
            id,
            preempted,
            stop,
            play,
            device_write,
        })
    }

    /// Handle a consumer's report that playback of `raw` finished.
    ///
    /// Only a completion for the active session clears it and queues
    /// `LEDCLR`. Completions for preempted sessions are ignored.
    pub fn on_playback_ended(&mut self, raw: u32) -> Option<DeviceReceipt> {
        let Some(active) = self.session else {
            debug!(id = raw, "playback ended with no active session");
            return None;
        };
        if u32::from(active.get()) != raw {
            debug!(id = raw, active = %active, "ignoring completion of preempted session");
            return None;
        }

        info!(id = %active, "playback ended, clearing indicators");
        self.session = None;
        Some(self.device.push(DeviceCommand::LedClear))
    }

    /// Stop playback unconditionally: clear the session, broadcast `stop`
    /// and queue `LEDCLR`.
    pub fn stop(&mut self) -> (BroadcastReport, DeviceReceipt) {
        if let Some(previous) = self.session.take() {
            info!(id = %previous, "playback stopped");
        }
        let report = self.broadcast(&Broadcast::Stop);
        (report, self.device.push(DeviceCommand::LedClear))
    }

    /// Queue a device command behind any already queued.
    pub fn queue_device_command(&self, command: DeviceCommand) -> DeviceReceipt {
        self.device.push(command)
    }

    fn broadcast(&self, message: &Broadcast) -> BroadcastReport {
        match self.hub.broadcast(message) {
            Ok(report) => report,
            Err(err) => {
                warn!(?message, error = %err, "broadcast failed");
                BroadcastReport::default()
            }
        }
    }
}
