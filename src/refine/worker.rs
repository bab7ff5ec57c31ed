//! Background thread for refinement runs.
//!
//! A session hands a [`RefineJob`] to the worker and keeps interacting; the
//! finished mask comes back as a [`RefineDone`] tagged with the session it
//! belongs to. Each job carries its own [`CancelToken`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use image::RgbImage;

use crate::mask::{IdPlane, LabelMask};
use crate::model::LabelPalette;
use crate::refine::grower::CancelToken;
use crate::refine::refiner::{RefineOptions, SegmentationRefiner};
use crate::refine::RefineError;
use crate::session::SessionId;

/// Everything a refinement run reads, detached from the session.
#[derive(Debug, Clone)]
pub struct RefineJob {
    pub session: SessionId,
    pub image: Arc<RgbImage>,
    pub markers: IdPlane,
    /// Palette as it was when the job was submitted
    pub palette: LabelPalette,
    pub options: RefineOptions,
    pub cancel: CancelToken,
}

/// Outcome of a job.
#[derive(Debug)]
pub struct RefineDone {
    pub session: SessionId,
    pub result: Result<LabelMask, RefineError>,
    ticket: u64,
}

enum WorkerMessage {
    Refine { ticket: u64, job: Box<RefineJob> },
    Shutdown,
}

/// Owns the refinement thread; joins it on drop.
pub struct RefineWorker {
    request_tx: Sender<WorkerMessage>,
    result_rx: Receiver<RefineDone>,
    thread_handle: Option<JoinHandle<()>>,
    /// Latest ticket and cancel token per session with a job not yet collected
    pending: HashMap<SessionId, (u64, CancelToken)>,
    next_ticket: u64,
}

impl RefineWorker {
    /// Spawn the worker thread around `refiner`.
    pub fn spawn(refiner: SegmentationRefiner) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerMessage>();
        let (result_tx, result_rx) = mpsc::channel::<RefineDone>();

        let thread_handle = thread::Builder::new()
            .name("mask-refiner".to_string())
            .spawn(move || {
                log::info!("Refinement thread started");
                Self::thread_loop(&refiner, request_rx, result_tx);
                log::info!("Refinement thread exiting");
            })?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            pending: HashMap::new(),
            next_ticket: 0,
        })
    }

    fn thread_loop(
        refiner: &SegmentationRefiner,
        request_rx: Receiver<WorkerMessage>,
        result_tx: Sender<RefineDone>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(WorkerMessage::Refine { ticket, job }) => {
                    let done = Self::run_job(refiner, ticket, *job);
                    if result_tx.send(done).is_err() {
                        log::warn!("Result channel closed, refinement thread exiting");
                        break;
                    }
                }
                Ok(WorkerMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    log::debug!("Request channel closed, refinement thread exiting");
                    break;
                }
            }
        }
    }

    fn run_job(refiner: &SegmentationRefiner, ticket: u64, job: RefineJob) -> RefineDone {
        log::debug!("Refining session {}", job.session);
        let result = if job.cancel.is_cancelled() {
            Err(RefineError::Cancelled)
        } else {
            refiner.run_markers(&job.image, &job.markers, &job.palette, job.options, &job.cancel)
        };
        if let Err(e) = &result {
            log::debug!("Refinement of session {} ended: {}", job.session, e);
        }
        RefineDone {
            session: job.session,
            result,
            ticket,
        }
    }

    /// Queue a job. A job already pending for the same session is cancelled
    /// and its result is reported as stale by [`RefineWorker::is_current`].
    pub fn submit(&mut self, job: RefineJob) -> Result<(), RefineError> {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let session = job.session;
        if let Some((_, previous)) = self.pending.insert(session, (ticket, job.cancel.clone())) {
            previous.cancel();
        }
        if self
            .request_tx
            .send(WorkerMessage::Refine {
                ticket,
                job: Box::new(job),
            })
            .is_err()
        {
            self.pending.remove(&session);
            log::error!("Failed to queue refinement: worker gone");
            return Err(RefineError::WorkerGone);
        }
        log::debug!("Queued refinement {} for session {}", ticket, session);
        Ok(())
    }

    /// Request cancellation of the pending job of `session`, if any.
    pub fn cancel(&self, session: SessionId) -> bool {
        match self.pending.get(&session) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Take one finished job without blocking.
    pub fn try_recv(&mut self) -> Option<RefineDone> {
        match self.result_rx.try_recv() {
            Ok(done) => {
                self.forget(&done);
                Some(done)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Refinement thread disconnected");
                None
            }
        }
    }

    /// Block until the next job finishes.
    pub fn recv(&mut self) -> Result<RefineDone, RefineError> {
        let done = self
            .result_rx
            .recv()
            .map_err(|RecvError| RefineError::WorkerGone)?;
        self.forget(&done);
        Ok(done)
    }

    /// Whether `done` answers the latest job submitted for its session.
    pub fn is_current(&self, done: &RefineDone) -> bool {
        self.pending
            .get(&done.session)
            .is_none_or(|(ticket, _)| *ticket == done.ticket)
    }

    fn forget(&mut self, done: &RefineDone) {
        if self
            .pending
            .get(&done.session)
            .is_some_and(|(ticket, _)| *ticket == done.ticket)
        {
            self.pending.remove(&done.session);
        }
    }

    pub fn is_pending(&self, session: SessionId) -> bool {
        self.pending.contains_key(&session)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for RefineWorker {
    fn drop(&mut self) {
        log::debug!("Shutting down refinement thread");
        for (_, token) in self.pending.values() {
            token.cancel();
        }
        let _ = self.request_tx.send(WorkerMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Refinement thread panicked: {:?}", e);
            }
        }
    }
}
