//! Background request worker for the terminal UI.
//!
//! One thread owns the repository and executes requests in submission order.
//! Completions are drained by the event loop with [`RequestWorker::try_recv`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error};

use crate::mutation::{self, Completion, Request};
use crate::remote::ContactRepository;

pub struct RequestWorker {
    requests: Option<Sender<Request>>,
    completions: Receiver<Completion>,
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl RequestWorker {
    pub fn spawn(repo: Arc<dyn ContactRepository>) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (completion_tx, completion_rx) = mpsc::channel::<Completion>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("rldesk-requests".into())
            .spawn(move || {
                for request in request_rx {
                    if stop.load(Ordering::Relaxed) {
                        debug!(request = %request.describe(), "skipping queued request");
                        break;
                    }
                    debug!(request = %request.describe(), "executing request");
                    let completion = mutation::execute(repo.as_ref(), request);
                    if completion_tx.send(completion).is_err() {
                        break;
                    }
                }
                debug!("request worker stopped");
            })
            .context("failed to start request worker")?;

        Ok(Self {
            requests: Some(request_tx),
            completions: completion_rx,
            handle: Some(handle),
            shutdown,
        })
    }

    /// Queue a request behind any already submitted.
    pub fn submit(&self, request: Request) -> Result<()> {
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("request worker is shut down"))?;
        sender
            .send(request)
            .map_err(|_| anyhow!("request worker is gone"))
    }

    /// Next finished request, if any, without blocking.
    pub fn try_recv(&self) -> Option<Completion> {
        match self.completions.try_recv() {
            Ok(completion) => Some(completion),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                error!("request worker disconnected");
                None
            }
        }
    }

    /// Block until the next completion arrives.
    #[cfg(test)]
    pub fn recv(&self) -> Option<Completion> {
        self.completions.recv().ok()
    }
}

impl Drop for RequestWorker {
    fn drop(&mut self) {
        // The request in progress finishes; anything still queued is skipped
        self.shutdown.store(true, Ordering::Relaxed);
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("request worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    use crate::contact::{Contact, ContactId, ContactPatch, NewContact};
    use crate::error::RemoteError;
    use crate::mutation::fake::FakeRepository;

    fn contact(id: i64) -> Contact {
        Contact {
            id: ContactId(id),
            fname: format!("F{}", id),
            lname: String::new(),
            email: String::new(),
            phone: String::new(),
            created_at: None,
        }
    }

    /// Counts list calls, each taking a while.
    struct SlowRepository {
        calls: AtomicUsize,
    }

    impl ContactRepository for SlowRepository {
        fn list(&self) -> Result<Vec<Contact>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            Ok(Vec::new())
        }

        fn create(&self, _: &NewContact) -> Result<Contact, RemoteError> {
            Err(RemoteError::Status { status: 501 })
        }

        fn update(&self, _: &ContactPatch) -> Result<Contact, RemoteError> {
            Err(RemoteError::Status { status: 501 })
        }

        fn delete(&self, _: ContactId) -> Result<(), RemoteError> {
            Err(RemoteError::Status { status: 501 })
        }
    }

    #[test]
    fn test_drop_skips_queued_requests() {
        let repo = Arc::new(SlowRepository {
            calls: AtomicUsize::new(0),
        });
        let worker = RequestWorker::spawn(repo.clone()).unwrap();
        for _ in 0..5 {
            worker.submit(Request::Load).unwrap();
        }

        let started = Instant::now();
        drop(worker);
        assert!(repo.calls.load(Ordering::SeqCst) <= 1);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_requests_complete_in_submission_order() {
        let repo = Arc::new(FakeRepository::with(vec![contact(1), contact(2)]));
        let worker = RequestWorker::spawn(repo.clone()).unwrap();

        worker.submit(Request::Delete(ContactId(2))).unwrap();
        worker.submit(Request::Load).unwrap();

        match worker.recv() {
            Some(Completion::Deleted(id, Ok(()))) => assert_eq!(id, ContactId(2)),
            other => panic!("unexpected {:?}", other),
        }
        match worker.recv() {
            Some(Completion::Loaded(Ok(list))) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].id, ContactId(1));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(worker.try_recv().is_none());
        assert_eq!(
            repo.requests(),
            vec![Request::Delete(ContactId(2)), Request::Load]
        );
    }
}
