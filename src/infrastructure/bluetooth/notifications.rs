//! Motion notification stream
//!
//! Subscribes to the motion characteristic and feeds every payload through
//! the [`MotionPipeline`] until the user presses Ctrl+C or the device stops
//! sending.

use crate::domain::driver::{MotionPipeline, PointerSink};
use crate::infrastructure::bluetooth::connection::BleConnection;
use crate::infrastructure::bluetooth::protocol;
use anyhow::{Context, Result};
use btleplug::api::{CharPropFlags, Peripheral as _};
use futures::stream::{Stream, StreamExt};
use std::io::Write;
use tracing::{debug, info};
use uuid::Uuid;

/// Why the stream loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Interrupted,
    Closed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub skipped: u64,
    pub other: u64,
}

/// Subscribe to `motion_uuid` and drive the pointer from its notifications
pub async fn run_pointer_control<S: PointerSink>(
    connection: &BleConnection,
    motion_uuid: &Uuid,
    pipeline: &mut MotionPipeline<S>,
    out: &mut dyn Write,
) -> Result<(StreamEnd, StreamStats)> {
    let characteristic = connection
        .find_characteristic(motion_uuid)
        .ok_or_else(|| anyhow::anyhow!("Motion characteristic {} not found", motion_uuid))?;

    if !characteristic
        .properties
        .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
    {
        anyhow::bail!("Characteristic {} does not support notifications", motion_uuid);
    }

    let peripheral = connection.peripheral();
    let notifications = peripheral.notifications().await?;
    peripheral
        .subscribe(&characteristic)
        .await
        .context("Failed to subscribe to motion characteristic")?;
    info!("Subscribed to {}", motion_uuid);

    let payloads = notifications.map(|n| (n.uuid, n.value));
    let result = pump(payloads, motion_uuid, pipeline, out, tokio::signal::ctrl_c()).await;

    if let Err(e) = peripheral.unsubscribe(&characteristic).await {
        debug!("Unsubscribe failed: {}", e);
    }
    result
}

/// Consume `(source, payload)` events until the stream ends or `stop` fires.
///
/// Payloads from `motion_uuid` go through the pipeline; anything else is
/// printed.
pub async fn pump<St, F, S>(
    payloads: St,
    motion_uuid: &Uuid,
    pipeline: &mut MotionPipeline<S>,
    out: &mut dyn Write,
    stop: F,
) -> Result<(StreamEnd, StreamStats)>
where
    St: Stream<Item = (Uuid, Vec<u8>)>,
    F: std::future::Future,
    S: PointerSink,
{
    let mut stats = StreamStats::default();
    futures::pin_mut!(payloads);
    tokio::pin!(stop);

    let outcome = loop {
        tokio::select! {
            _ = &mut stop => break Ok(StreamEnd::Interrupted),
            next = payloads.next() => {
                let Some((source, value)) = next else {
                    break Ok(StreamEnd::Closed);
                };
                if source != *motion_uuid {
                    stats.other += 1;
                    let shown = protocol::format_value(&value);
                    if let Err(e) = writeln!(out, "{}: {}", source, shown) {
                        break Err(e);
                    }
                    continue;
                }
                match pipeline.handle_payload(&value) {
                    Some(_) => stats.frames += 1,
                    None => stats.skipped += 1,
                }
            }
        }
    };

    pipeline.finish();
    let end = outcome.context("Failed to print notification")?;
    info!(
        "Motion stream ended ({:?}): {} frames, {} skipped, {} other",
        end, stats.frames, stats.skipped, stats.other
    );
    Ok((end, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decoder::DecoderConfig;
    use crate::domain::driver::tests::RecordingPointer;
    use crate::domain::models::{ButtonLatchState, ButtonSide, HostInputCall};
    use crate::infrastructure::bluetooth::protocol::parse_uuid;

    #[tokio::test]
    async fn test_pump_until_stream_closes() {
        let motion = parse_uuid("c8c51726-81bc-483b-a052-f7a14ea3d281").unwrap();
        let battery = parse_uuid("2a19").unwrap();
        let events = vec![
            (motion, vec![0, 0, 0, 0]),
            (battery, vec![0x64]),
            (motion, vec![1, 2]),
            (motion, vec![255, 255, 255, 255]),
        ];

        let sink = RecordingPointer::default();
        let mut pipeline = MotionPipeline::new(DecoderConfig::default(), &sink);
        let mut out = Vec::new();

        let (end, stats) = pump(
            futures::stream::iter(events),
            &motion,
            &mut pipeline,
            &mut out,
            futures::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(end, StreamEnd::Closed);
        assert_eq!(
            stats,
            StreamStats {
                frames: 2,
                skipped: 1,
                other: 1
            }
        );
        assert_eq!(
            sink.take(),
            vec![
                HostInputCall::ButtonDown(ButtonSide::Left),
                HostInputCall::ButtonUp(ButtonSide::Left),
                HostInputCall::MoveRelative { dx: 0.0, dy: 0.0 },
            ]
        );
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("00002a19-0000-1000-8000-00805f9b34fb: 64"));
    }

    #[tokio::test]
    async fn test_pump_stop_releases_held_button() {
        let motion = parse_uuid("2a37").unwrap();
        let events = futures::stream::iter(vec![(motion, vec![100, 0, 0, 0])])
            .chain(futures::stream::pending());

        let sink = RecordingPointer::default();
        let mut pipeline = MotionPipeline::new(DecoderConfig::default(), &sink);
        let mut out = Vec::new();

        let stop = tokio::time::sleep(std::time::Duration::from_millis(20));
        let (end, stats) = pump(events, &motion, &mut pipeline, &mut out, stop)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Interrupted);
        assert_eq!(stats.frames, 1);
        assert_eq!(
            sink.take(),
            vec![
                HostInputCall::ButtonDown(ButtonSide::Right),
                HostInputCall::ButtonUp(ButtonSide::Right),
            ]
        );
    }

    /// Writer that rejects every write
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pump_output_error_releases_held_button() {
        let motion = parse_uuid("2a37").unwrap();
        let other = parse_uuid("2a19").unwrap();
        let events = futures::stream::iter(vec![(motion, vec![0, 0, 0, 0]), (other, vec![1])]);

        let sink = RecordingPointer::default();
        let mut pipeline = MotionPipeline::new(DecoderConfig::default(), &sink);
        let mut out = BrokenWriter;

        let result = pump(
            events,
            &motion,
            &mut pipeline,
            &mut out,
            futures::future::pending::<()>(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(pipeline.state(), ButtonLatchState::default());
        assert_eq!(
            sink.take(),
            vec![
                HostInputCall::ButtonDown(ButtonSide::Left),
                HostInputCall::ButtonUp(ButtonSide::Left),
            ]
        );
    }
}
