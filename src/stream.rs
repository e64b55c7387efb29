//! Cancellable hand-off between a producer thread and a consumer.
//!
//! A [`StreamWorker`] runs an iterator (typically a preview pass) on its own
//! thread and feeds a bounded channel. When the buffer is full the producer
//! polls the [`CancelToken`] between retries, so a cancel request is noticed
//! even while the consumer is not draining. On completion or cancellation the
//! producer enqueues an end-of-stream marker; nothing already delivered is
//! taken back.
//!
//! [`Cancellable`] is the consumer-side counterpart: it stops pulling from an
//! iterator once cancellation has been requested.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default number of items buffered between producer and consumer.
pub const DEFAULT_CAPACITY: usize = 256;

/// How long the producer waits before retrying a send into a full buffer.
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// A shared cancellation flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum Message<T> {
    Item(T),
    End,
}

enum SendOutcome {
    Sent,
    Cancelled,
    Disconnected,
}

/// Consumer handle on a producer thread. Iterating it yields the produced
/// items until the end-of-stream marker arrives or the producer goes away.
pub struct StreamWorker<T> {
    receiver: Receiver<Message<T>>,
    handle: JoinHandle<usize>,
    token: CancelToken,
    finished: bool,
}

impl<T: Send + 'static> StreamWorker<T> {
    /// Spawns a producer thread running `produce()` and forwarding its items
    /// through a channel holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<F, I>(produce: F, capacity: usize, token: CancelToken) -> std::io::Result<Self>
    where
        F: FnOnce() -> I + Send + 'static,
        I: IntoIterator<Item = T>,
    {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let producer_token = token.clone();

        let handle = thread::Builder::new()
            .name("fileflow-producer".to_string())
            .spawn(move || run_producer(produce(), sender, producer_token))?;

        Ok(Self {
            receiver,
            handle,
            token,
            finished: false,
        })
    }
}

impl<T> StreamWorker<T> {
    /// Requests that the producer stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stops consuming and waits for the producer to exit. Returns how many
    /// items the producer enqueued, or `None` if it panicked.
    pub fn join(self) -> Option<usize> {
        let Self {
            receiver, handle, ..
        } = self;
        drop(receiver);
        handle.join().ok()
    }
}

impl<T> Iterator for StreamWorker<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        match self.receiver.recv() {
            Ok(Message::Item(item)) => Some(item),
            Ok(Message::End) | Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

fn run_producer<T, I>(items: I, sender: SyncSender<Message<T>>, token: CancelToken) -> usize
where
    I: IntoIterator<Item = T>,
{
    let mut sent = 0;
    for item in items {
        if token.is_cancelled() {
            break;
        }
        match send_polling(&sender, Message::Item(item), &token) {
            SendOutcome::Sent => sent += 1,
            SendOutcome::Cancelled => break,
            SendOutcome::Disconnected => return sent,
        }
    }

    // If the buffer is full and we are cancelled the marker is dropped; the
    // sender going away ends the stream just the same.
    let _ = send_polling(&sender, Message::End, &token);
    if token.is_cancelled() {
        tracing::debug!(sent, "producer stopped on cancellation");
    }
    sent
}

fn send_polling<T>(
    sender: &SyncSender<Message<T>>,
    mut message: Message<T>,
    token: &CancelToken,
) -> SendOutcome {
    loop {
        match sender.try_send(message) {
            Ok(()) => return SendOutcome::Sent,
            Err(TrySendError::Disconnected(_)) => return SendOutcome::Disconnected,
            Err(TrySendError::Full(returned)) => {
                if token.is_cancelled() {
                    return SendOutcome::Cancelled;
                }
                message = returned;
                thread::sleep(SEND_RETRY_INTERVAL);
            }
        }
    }
}

/// Iterator adapter that stops pulling once its token is cancelled.
pub struct Cancellable<I> {
    inner: I,
    token: CancelToken,
}

impl<I: Iterator> Cancellable<I> {
    pub fn new(inner: I, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<I: Iterator> Iterator for Cancellable<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.token.is_cancelled() {
            return None;
        }
        self.inner.next()
    }
}

/// Adds [`until_cancelled`](CancellableExt::until_cancelled) to every iterator.
pub trait CancellableExt: Iterator + Sized {
    fn until_cancelled(self, token: &CancelToken) -> Cancellable<Self> {
        Cancellable::new(self, token.clone())
    }
}

impl<I: Iterator> CancellableExt for I {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn test_token_is_sticky() {
        let token = CancelToken::new();
        let reader = token.clone();
        assert!(!reader.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(reader.is_cancelled());
    }

    #[test]
    fn test_stream_delivers_everything_in_order() {
        let worker = StreamWorker::spawn(|| 0..100, 4, CancelToken::new()).unwrap();
        let items: Vec<_> = worker.collect();
        assert_eq!(items, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancel_while_buffer_full_stops_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let token = CancelToken::new();

        let mut worker = StreamWorker::spawn(
            move || {
                (0..).inspect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            },
            2,
            token.clone(),
        )
        .unwrap();

        // Let the producer fill the buffer and block on it.
        thread::sleep(Duration::from_millis(100));
        assert!(!worker.handle.is_finished());
        token.cancel();

        // The consumer is still holding the receiver, so only the token can
        // release the producer.
        let started = Instant::now();
        while !worker.handle.is_finished() {
            assert!(
                started.elapsed() < Duration::from_secs(5),
                "producer ignored cancellation"
            );
            thread::sleep(Duration::from_millis(10));
        }
        assert!(produced.load(Ordering::SeqCst) <= 3);

        // Buffered items still arrive, then the stream ends.
        let rest: Vec<_> = worker.by_ref().collect();
        assert!(rest.len() <= 2);
        assert_eq!(worker.next(), None);
    }

    #[test]
    fn test_consumer_drains_then_sees_end_after_cancel() {
        let token = CancelToken::new();
        let mut worker = StreamWorker::spawn(|| 0..1_000_000, 8, token.clone()).unwrap();

        assert_eq!(worker.next(), Some(0));
        worker.cancel();

        // Whatever was already buffered may still arrive, then the stream ends.
        let rest: Vec<_> = worker.by_ref().collect();
        assert!(rest.len() <= 9);
        assert_eq!(worker.next(), None);
    }

    #[test]
    fn test_dropping_consumer_releases_producer() {
        let token = CancelToken::new();
        let worker = StreamWorker::spawn(|| 0.., 1, token).unwrap();
        // Dropping the receiver disconnects the channel; join must return.
        assert!(worker.join().is_some());
    }

    #[test]
    fn test_cancellable_stops_pulling() {
        let token = CancelToken::new();
        let mut pulled = 0;
        let mut iter = (0..10).inspect(|_| pulled += 1).until_cancelled(&token);

        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next(), Some(1));
        token.cancel();
        assert_eq!(iter.next(), None);
        drop(iter);
        assert_eq!(pulled, 2);
    }
}
