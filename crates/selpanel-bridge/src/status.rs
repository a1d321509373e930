use std::sync::Arc;

use selpanel_frame::{Catalog, MediaId};
use serde::Serialize;
use tokio::sync::watch;

use crate::hub::ConsumerHub;
use crate::media::MediaReport;
use crate::supervisor::LinkState;

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub version: &'static str,
    pub catalog_size: u16,
    pub current_id: Option<u16>,
    pub consumers: usize,
    pub link_state: LinkState,
    pub serial_port: String,
    pub host_leds: bool,
    pub media_missing: usize,
    pub missing_files: Vec<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub serial: bool,
    pub media_complete: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.serial && self.media_complete
    }
}

/// Read-only view over live bridge state for the HTTP surface.
#[derive(Debug, Clone)]
pub struct StatusSource {
    pub catalog: Catalog,
    pub serial_port: String,
    pub host_leds: bool,
    pub media: Arc<MediaReport>,
    pub hub: Arc<ConsumerHub>,
    pub link: watch::Receiver<LinkState>,
    pub session: watch::Receiver<Option<MediaId>>,
}

impl StatusSource {
    pub fn status(&self) -> StatusReport {
        StatusReport {
            version: env!("CARGO_PKG_VERSION"),
            catalog_size: self.catalog.size(),
            current_id: (*self.session.borrow()).map(MediaId::get),
            consumers: self.hub.len(),
            link_state: *self.link.borrow(),
            serial_port: self.serial_port.clone(),
            host_leds: self.host_leds,
            media_missing: self.media.missing.len(),
            missing_files: self.media.missing_preview().to_vec(),
        }
    }

    pub fn health(&self) -> HealthReport {
        let serial = self.link.borrow().is_connected();
        let media_complete = self.media.is_complete();
        HealthReport {
            status: if serial && media_complete {
                "healthy"
            } else {
                "degraded"
            },
            serial,
            media_complete,
        }
    }
}
