use std::{sync::Arc, time::Duration};

use anyhow::Result;
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::UnboundedReceiver,
    time::timeout,
};

use crate::{
    domain::{InboundFrame, OutboundFrame},
    infrastructure::shutdown::{Shutdown, ShutdownListener},
};

use super::{
    codec::{read_frame, write_frame, FrameError},
    outbox::Outbox,
    router::{error_response, MessageRouter},
};

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Native-messaging host loop: reads frames until the browser closes the port
/// or shutdown is requested, handling each one on its own task.
pub async fn serve<R, W>(
    router: Arc<MessageRouter>,
    mut reader: R,
    writer: W,
    outbox: Outbox,
    frames: UnboundedReceiver<OutboundFrame>,
    shutdown: Shutdown,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer_task = tokio::spawn(write_loop(writer, frames, shutdown.subscribe()));
    let mut shutdown_listener = shutdown.subscribe();

    loop {
        let next = tokio::select! {
            res = read_frame(&mut reader) => res,
            _ = shutdown_listener.notified() => {
                tracing::info!(target: "bridge", "shutdown requested; no longer reading");
                break;
            }
        };

        match next {
            Ok(Some(bytes)) => accept(&router, &outbox, &bytes),
            Ok(None) => {
                tracing::info!(target: "bridge", "browser closed the native messaging port");
                break;
            }
            Err(err) => {
                tracing::error!(target: "bridge", error = %err, "failed to read frame");
                break;
            }
        }
    }

    shutdown.trigger();
    match timeout(WRITER_DRAIN_TIMEOUT, writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(target: "bridge", error = %err, "writer task failed"),
        Err(_) => tracing::warn!(
            target: "bridge",
            "outbound writer did not drain within {:?}",
            WRITER_DRAIN_TIMEOUT
        ),
    }
    Ok(())
}

fn accept(router: &Arc<MessageRouter>, outbox: &Outbox, bytes: &[u8]) {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(target: "bridge", error = %err, "dropping frame that is not JSON");
            return;
        }
    };
    let id = value.get("id").and_then(Value::as_u64);

    let frame: InboundFrame = match serde_json::from_value(value) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(target: "bridge", error = %err, id, "unrecognised message");
            if let Some(id) = id {
                outbox.send(OutboundFrame::Reply {
                    id,
                    response: error_response(format!("invalid request: {err}")),
                });
            }
            return;
        }
    };

    let router = router.clone();
    let outbox = outbox.clone();
    tokio::spawn(async move {
        let response = router.handle(frame).await;
        match (id, response) {
            (Some(id), Some(response)) => outbox.send(OutboundFrame::Reply { id, response }),
            (None, Some(_)) => {
                tracing::debug!(target: "bridge", "response without request id discarded")
            }
            _ => {}
        }
    });
}

async fn write_loop<W>(
    mut writer: W,
    mut frames: UnboundedReceiver<OutboundFrame>,
    mut shutdown: ShutdownListener,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => frame,
            _ = shutdown.notified() => break,
        };
        let Some(frame) = frame else {
            return;
        };
        write_one(&mut writer, &frame).await;
    }

    while let Ok(frame) = frames.try_recv() {
        write_one(&mut writer, &frame).await;
    }
}

async fn write_one<W>(writer: &mut W, frame: &OutboundFrame)
where
    W: AsyncWrite + Unpin,
{
    match write_encoded(writer, frame).await {
        Ok(()) => {}
        Err(FrameError::TooLarge(len, limit)) => match frame {
            // Every request with an id still gets exactly one reply.
            OutboundFrame::Reply { id, .. } => {
                tracing::warn!(target: "bridge", id, len, limit, "reply too large; answering with an error");
                let fallback = OutboundFrame::Reply {
                    id: *id,
                    response: error_response("response too large"),
                };
                if let Err(err) = write_encoded(writer, &fallback).await {
                    tracing::error!(target: "bridge", id, error = %err, "failed to write fallback reply");
                }
            }
            _ => tracing::error!(target: "bridge", len, limit, "dropping oversized outbound frame"),
        },
        Err(err) => {
            tracing::error!(target: "bridge", error = %err, "failed to write outbound frame");
        }
    }
}

async fn write_encoded<W>(writer: &mut W, frame: &OutboundFrame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(frame)?;
    write_frame(writer, &body).await
}
