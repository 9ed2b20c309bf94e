use std::{
    io,
    sync::{Arc, Mutex},
};

use env_logger::{Builder, Target};

use hifitime::prelude::{Duration, Epoch, TimeScale};

use log::{debug, error, info, log, trace, warn};

use tokio::{signal, sync::mpsc};

use ubx2collector::{
    batch::{encode_window, satellites},
    collecter::{Aggregator, Closed, Stream},
    device::Device,
    error::{Error, Result},
    forwarder::{Dispatch, DurableQueue, Forwarder, HttpUplink, Signer, queue_path},
    message::Message,
    runtime::Runtime,
    status::{Blinker, LogIndicator, StatusIndicator, SysfsGpio},
    ubx::Settings,
};

mod cli;

use crate::cli::Cli;

/// Status LED toggling period
const BLINK_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

/// Encodes a closed window and hands it to its forwarder.
fn dispatch(
    rtm: &mut Runtime,
    closed: Closed,
    raw: &Forwarder<HttpUplink>,
    position: &Forwarder<HttpUplink>,
) -> Result<()> {
    let Some(payload) = encode_window(&closed)? else {
        return Ok(());
    };

    let forwarder = match &closed {
        Closed::Raw(window) => {
            info!(
                "{} - {} window closed: {} epochs ({})",
                rtm.stamp(),
                closed.stream(),
                window.batch.len(),
                satellites(&window.batch)
            );
            raw
        },
        Closed::Position(window) => {
            info!(
                "{} - {} window closed: {} solutions",
                rtm.stamp(),
                closed.stream(),
                window.batch.len()
            );
            position
        },
    };

    rtm.windows += 1;

    match forwarder.forward(payload)? {
        Dispatch::Spawned(_) => trace!("{} - delivery task spawned", closed.stream()),
        Dispatch::Deferred => {},
    }

    Ok(())
}

/// Acquisition loop: runs until the input is exhausted.
fn acquire(
    mut device: Device,
    mut aggregator: Aggregator,
    mut rtm: Runtime,
    raw: &Forwarder<HttpUplink>,
    position: &Forwarder<HttpUplink>,
    blinker: &Mutex<Blinker>,
) -> Result<Runtime> {
    loop {
        let message = match device.next_message() {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!("{} - consumed all content", rtm.stamp());
                break;
            },
            Err(e @ Error::Malformed { .. }) => {
                rtm.malformed += 1;
                error!("{} - {}", rtm.stamp(), e);
                continue;
            },
            Err(e) => return Err(e),
        };

        rtm.messages += 1;

        match &message {
            Message::RawMeasurement(rawx) => {
                rtm.new_epoch(rawx.epoch());
                trace!("{} - {}", rtm.stamp(), rawx);
            },
            Message::TimeUTC(utc) if utc.valid_utc() => match utc.epoch() {
                Ok(t) => rtm.new_epoch(t),
                Err(e) => debug!("{} - invalid UTC time: {}", rtm.stamp(), e),
            },
            Message::Unknown { id, payload } => {
                trace!(
                    "{} - unknown message 0x{:04X} ({} bytes)",
                    rtm.stamp(),
                    id,
                    payload.len()
                );
            },
            _ => {},
        }

        if let Some((level, text)) = message.info() {
            log!(level.log_level(), "{} - receiver: {}", rtm.stamp(), text);
        }

        for closed in aggregator.consume(message) {
            dispatch(&mut rtm, closed, raw, position)?;
        }

        if let Ok(mut blinker) = blinker.lock() {
            if let Err(e) = blinker.tick() {
                debug!("status indicator: {}", e);
            }
        }
    }

    for closed in aggregator.flush() {
        dispatch(&mut rtm, closed, raw, position)?;
    }

    if device.rejected_frames() > 0 {
        warn!(
            "{} - {} frames rejected (checksum)",
            rtm.stamp(),
            device.rejected_frames()
        );
    }

    Ok(rtm)
}

async fn run(cli: &Cli, t_utc: Epoch) -> Result<()> {
    // Receiver settings and credentials are validated before any I/O
    let settings = match cli.config_file() {
        Some(path) => Some(Settings::from_file(path, cli.comm())?),
        None => None,
    };

    let valset = settings.as_ref().map(Settings::to_cfg_valset).transpose()?;
    let baud_switch = settings
        .as_ref()
        .map(Settings::baud_rate)
        .transpose()?
        .flatten();

    let key = cli.key_file().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "private key file required")
    })?;

    let signer = Signer::from_pem_file(key)?;

    // Input interface
    let mut device = if let Some(port) = cli.serial_port() {
        // active mode (GNSS module)
        Device::open_serial_port(port, cli.baud_rate())?
    } else {
        // passive mode (input files)
        Device::open_files(&cli.filepaths())?
    };

    // Device configuration
    if device.is_read_only() {
        debug!("passive mode: receiver configuration skipped");
    } else if let Some(valset) = valset.filter(|valset| !valset.is_empty()) {
        device.configure(&valset)?;
        info!(
            "{} - receiver configured ({} items)",
            t_utc,
            valset.len()
        );

        if let Some(baud) = baud_switch {
            device.set_baud_rate(baud)?;
        }
    }

    // Forwarders
    let uplink = Arc::new(HttpUplink::new(
        cli.url(),
        cli.location(),
        signer,
        cli.timeout(),
    )?);

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();

    let queue_dir = cli.queue_dir();
    std::fs::create_dir_all(&queue_dir)?;

    let forwarder = |stream: Stream| -> Result<Arc<Forwarder<HttpUplink>>> {
        let queue = DurableQueue::open(queue_path(&queue_dir, cli.location(), stream))?;
        Ok(Arc::new(Forwarder::new(
            stream,
            Arc::clone(&uplink),
            queue,
            cli.attempts(),
            fatal_tx.clone(),
        )))
    };

    let raw = forwarder(Stream::Raw)?;
    let position = forwarder(Stream::Position)?;

    // Status indicator
    let indicator: Box<dyn StatusIndicator> = match cli.led() {
        Some(pin) => Box::new(SysfsGpio::new(pin)?),
        None => Box::new(LogIndicator::default()),
    };

    let blinker = Arc::new(Mutex::new(Blinker::new(indicator, BLINK_PERIOD)));

    // main task
    let acquisition = {
        let raw = Arc::clone(&raw);
        let position = Arc::clone(&position);
        let blinker = Arc::clone(&blinker);
        let aggregator = Aggregator::new(cli.max_pending());
        let rtm = Runtime::new(t_utc);

        tokio::task::spawn_blocking(move || {
            acquire(device, aggregator, rtm, &raw, &position, &blinker)
        })
    };

    info!("{} - application deployed", t_utc);

    let result = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        },
        joined = acquisition => match joined {
            Ok(Ok(rtm)) => {
                raw.settle().await;
                position.settle().await;

                if let Some(t) = rtm.utc_time() {
                    info!("last receiver epoch: {}", t.round(Duration::from_seconds(1.0)));
                }

                info!(
                    "{} messages ({} malformed) in {}, {} windows forwarded, {} + {} batches queued",
                    rtm.messages,
                    rtm.malformed,
                    rtm.uptime(Epoch::now()?).round(Duration::from_seconds(1.0)),
                    rtm.windows,
                    raw.queued()?,
                    position.queued()?,
                );

                match fatal_rx.try_recv() {
                    Ok(e) => Err(e),
                    Err(_) => Ok(()),
                }
            },
            Ok(Err(e)) => Err(e),
            Err(e) => Err(Error::Io(io::Error::other(e))),
        },
        Some(e) = fatal_rx.recv() => Err(e),
    };

    if let Ok(mut blinker) = blinker.lock() {
        if let Err(e) = blinker.switch_off() {
            warn!("failed to switch status indicator off: {}", e);
        }
    }

    result
}

#[tokio::main]
pub async fn main() {
    let mut builder = Builder::from_default_env();

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let t_utc = match Epoch::now() {
        Ok(t) => t.to_time_scale(TimeScale::UTC),
        Err(e) => {
            error!("failed to determine system time: {}", e);
            std::process::exit(1);
        },
    };

    let cli = Cli::new();

    // blocking serial reads are not awaited on exit
    match run(&cli, t_utc).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    }
}
