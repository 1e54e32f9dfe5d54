use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;

/// Resolve-once result of an asynchronous protocol operation.
///
/// Either block on it with [`wait`](Self::wait) or `.await` it. If the
/// producing side goes away without resolving, the completion resolves to
/// `T::default()` (`false` for the boolean completions of the protocol
/// contract).
#[derive(Debug)]
pub struct Completion<T = bool> {
    rx: flume::Receiver<T>,
}

/// Producing half of a [`Completion`].
#[derive(Debug)]
pub struct Completer<T = bool> {
    tx: flume::Sender<T>,
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        // the receiver may already be gone
        let _ = self.tx.send(value);
    }
}

impl<T: Default> Completion<T> {
    pub fn pending() -> (Completer<T>, Completion<T>) {
        let (tx, rx) = flume::bounded(1);
        (Completer { tx }, Completion { rx })
    }

    pub fn ready(value: T) -> Self {
        let (tx, rx) = flume::bounded(1);
        let _ = tx.send(value);
        Completion { rx }
    }

    /// Blocks until resolved.
    pub fn wait(self) -> T {
        self.rx.recv().unwrap_or_default()
    }

    /// `None` on timeout.
    pub fn wait_timeout(self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Some(v),
            Err(flume::RecvTimeoutError::Timeout) => None,
            Err(flume::RecvTimeoutError::Disconnected) => Some(T::default()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.rx.is_empty() || self.rx.is_disconnected()
    }
}

impl<T: Default + Send + 'static> IntoFuture for Completion<T> {
    type Output = T;
    type IntoFuture = Pin<Box<dyn Future<Output = T> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.rx.recv_async().await.unwrap_or_default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_completer_resolves_default() {
        let (completer, completion) = Completion::<bool>::pending();
        assert!(!completion.is_resolved());
        drop(completer);
        assert!(completion.is_resolved());
        assert!(!completion.wait());
    }

    #[test]
    fn resolves_across_threads() {
        let (completer, completion) = Completion::pending();
        std::thread::spawn(move || completer.complete(true));
        assert_eq!(completion.wait_timeout(Duration::from_secs(5)), Some(true));
    }

    #[test]
    fn timeout_is_none() {
        let (_completer, completion) = Completion::<bool>::pending();
        assert_eq!(completion.wait_timeout(Duration::from_millis(10)), None);
    }
}
