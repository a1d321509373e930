use selpanel_bridge::{Bridge, BridgeConfig};
use selpanel_frame::ReassemblerConfig;
use selpanel_transport::SerialConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{bridge_error, io_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = config_from_args(&args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("selpanel-rt")
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_on_signal(cancel.clone()));

        Bridge::new(config)
            .run(cancel)
            .await
            .map_err(|err| bridge_error("bridge failed", err))
    })?;

    info!("bridge stopped");
    Ok(SUCCESS)
}

fn config_from_args(args: &ServeArgs) -> CliResult<BridgeConfig> {
    let fragment_timeout = parse_duration(&args.fragment_timeout)?;
    let reconnect_delay = parse_duration(&args.reconnect_delay)?;
    let heartbeat = args.heartbeat.as_deref().map(parse_duration).transpose()?;

    let serial = SerialConfig {
        baud_rate: args.baud,
        ..SerialConfig::new(&args.port)
    };

    Ok(BridgeConfig {
        catalog: args.media.catalog()?,
        serial,
        device_managed_leds: !args.host_leds,
        reassembler: ReassemblerConfig::with_fragment_timeout(fragment_timeout),
        reconnect_delay,
        listen: args.listen,
        media_dir: args.media.media_dir.clone(),
        heartbeat,
    })
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                    _ = cancel.cancelled() => return,
                }
            }
            Err(_) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = cancel.cancelled() => return,
        }
    }

    info!("shutdown requested");
    cancel.cancel();
}
