use crate::orchestrator::{Orchestrator, Recognition, RecognizeError};
use image::RgbImage;
use rollcall_core::FaceAnalyzer;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Requests buffered ahead of the engine thread before senders wait.
const ENGINE_QUEUE_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Recognize(#[from] RecognizeError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Recognize {
        image: RgbImage,
        reply: oneshot::Sender<Result<Recognition, RecognizeError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run detection, matching and the ledger write for one decoded image.
    pub async fn recognize(&self, image: RgbImage) -> Result<Recognition, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Recognize {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The orchestrator's analyzer holds inference sessions that need exclusive
/// access, so requests are processed one at a time in arrival order.
pub fn spawn_engine<A>(mut orchestrator: Orchestrator<A>) -> Result<EngineHandle, EngineError>
where
    A: FaceAnalyzer + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(ENGINE_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Recognize { image, reply } => {
                        let result = orchestrator.recognize_and_record(&image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{alice_bob_gallery, FixedAnalyzer};
    use rollcall_core::Identification;
    use rollcall_ledger::{CsvStore, Ledger};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_engine_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = alice_bob_gallery();
        let ledger = Arc::new(Ledger::new(
            Box::new(CsvStore::new(dir.path().join("attendance.csv"))),
            gallery.identities(),
        ));
        let orchestrator = Orchestrator::new(
            FixedAnalyzer(vec![vec![0.85, 0.0]]),
            gallery,
            Arc::clone(&ledger),
            0.5,
        );
        let engine = spawn_engine(orchestrator).unwrap();

        let first = engine.recognize(RgbImage::new(2, 2)).await.unwrap();
        let second = engine.clone().recognize(RgbImage::new(2, 2)).await.unwrap();
        assert_eq!(first.identification, Identification::Known("Bob".into()));
        assert_eq!(second.identification, first.identification);
        assert_eq!(ledger.lookup("Bob").unwrap().unwrap().status, rollcall_ledger::Status::Present);
    }
}
