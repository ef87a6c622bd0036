//! Broadcast tap: one reader over the inbound stream, many subscribers.
//!
//! The reader task republishes every [`Frame`] as an [`InboundEvent`] on a
//! `tokio::sync::broadcast` channel and records the close code. Subscribers
//! attached after the stream finished receive `Done` straight away.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wsfan_core::InboundEvent;

use crate::transport::Frame;

/// Connection state as seen by the reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TapStatus {
    /// The inbound stream has ended.
    pub finished: bool,
    /// Status code of the close frame, if one arrived.
    pub close_code: Option<u16>,
}

struct Shared {
    tx: broadcast::Sender<InboundEvent>,
    status: Mutex<TapStatus>,
}

/// Multiplexes one inbound stream to any number of receivers.
pub struct BroadcastTap {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

impl BroadcastTap {
    /// Start reading `inbound` on the current runtime.
    ///
    /// `capacity` bounds how far a slow receiver may fall behind before it
    /// starts skipping events.
    pub fn spawn(inbound: BoxStream<'static, Frame>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let shared = Arc::new(Shared {
            tx,
            status: Mutex::new(TapStatus::default()),
        });
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(inbound, Arc::clone(&shared), cancel.clone()));
        Self {
            shared,
            cancel,
            reader,
        }
    }

    /// Attach a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        let status = self.shared.status.lock();
        if status.finished {
            let (tx, rx) = broadcast::channel(1);
            drop(tx);
            return rx;
        }
        self.shared.tx.subscribe()
    }

    /// Snapshot of the connection state.
    pub fn status(&self) -> TapStatus {
        *self.shared.status.lock()
    }

    /// Close code received from the server, if any.
    pub fn close_code(&self) -> Option<u16> {
        self.shared.status.lock().close_code
    }

    /// Receivers currently attached.
    pub fn receiver_count(&self) -> usize {
        self.shared.tx.receiver_count()
    }

    /// Stop the reader and drop the inbound stream.
    pub fn close(self) {
        debug!(receivers = self.receiver_count(), "closing broadcast tap");
    }
}

impl Drop for BroadcastTap {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.reader.abort();
    }
}

impl std::fmt::Debug for BroadcastTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastTap")
            .field("status", &self.status())
            .field("receivers", &self.receiver_count())
            .finish_non_exhaustive()
    }
}

async fn read_loop(
    mut inbound: BoxStream<'static, Frame>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("broadcast tap cancelled");
                return;
            }
            frame = inbound.next() => frame,
        };

        match frame {
            Some(Frame::Text(text)) => {
                let _ = shared.tx.send(InboundEvent::Message(text));
            }
            Some(Frame::Error(error)) => {
                warn!(%error, "websocket read error");
                let _ = shared.tx.send(InboundEvent::Error(error));
            }
            Some(Frame::Close(code)) => {
                info!(close_code = ?code, "websocket closed by server");
                finish(&shared, code);
                return;
            }
            None => {
                info!("websocket stream ended");
                finish(&shared, None);
                return;
            }
        }
    }
}

fn finish(shared: &Shared, code: Option<u16>) {
    let mut status = shared.status.lock();
    status.finished = true;
    status.close_code = code;
    let _ = shared.tx.send(InboundEvent::Done);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn tap(capacity: usize) -> (mpsc::UnboundedSender<Frame>, BroadcastTap) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tap = BroadcastTap::spawn(Box::pin(UnboundedReceiverStream::new(rx)), capacity);
        (tx, tap)
    }

    #[tokio::test]
    async fn fans_out_to_every_receiver() {
        let (frames, tap) = tap(8);
        let mut a = tap.subscribe();
        let mut b = tap.subscribe();
        assert_eq!(tap.receiver_count(), 2);

        frames.send(Frame::Text("tick".into())).unwrap();
        assert_eq!(a.recv().await.unwrap(), InboundEvent::Message("tick".into()));
        assert_eq!(b.recv().await.unwrap(), InboundEvent::Message("tick".into()));
    }

    #[tokio::test]
    async fn errors_are_republished() {
        let (frames, tap) = tap(8);
        let mut rx = tap.subscribe();

        frames.send(Frame::Error("reset".into())).unwrap();
        assert_eq!(rx.recv().await.unwrap(), InboundEvent::Error("reset".into()));
        assert!(!tap.status().finished);
    }

    #[tokio::test]
    async fn close_records_code_and_publishes_done() {
        let (frames, tap) = tap(8);
        let mut rx = tap.subscribe();

        frames.send(Frame::Close(Some(1005))).unwrap();
        assert_eq!(rx.recv().await.unwrap(), InboundEvent::Done);
        assert_eq!(
            tap.status(),
            TapStatus {
                finished: true,
                close_code: Some(1005),
            }
        );
        assert_eq!(tap.close_code(), Some(1005));
    }

    #[tokio::test]
    async fn stream_end_without_close_frame() {
        let (frames, tap) = tap(8);
        let mut rx = tap.subscribe();

        drop(frames);
        assert_eq!(rx.recv().await.unwrap(), InboundEvent::Done);
        assert!(tap.status().finished);
        assert_eq!(tap.close_code(), None);
    }

    #[tokio::test]
    async fn late_subscriber_sees_closed_channel() {
        let (frames, tap) = tap(8);
        let mut early = tap.subscribe();
        frames.send(Frame::Close(Some(1000))).unwrap();
        assert_eq!(early.recv().await.unwrap(), InboundEvent::Done);

        let mut late = tap.subscribe();
        assert!(matches!(late.recv().await, Err(RecvError::Closed)));
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let (frames, tap) = tap(2);
        let mut rx = tap.subscribe();
        for i in 0..5 {
            frames.send(Frame::Text(format!("m{i}"))).unwrap();
        }
        frames.send(Frame::Close(Some(1000))).unwrap();

        while !tap.status().finished {
            tokio::task::yield_now().await;
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn close_stops_reader() {
        let (frames, tap) = tap(8);
        tap.close();
        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), frames.closed()).await;
        assert!(closed.is_ok());
    }
}
