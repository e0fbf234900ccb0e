//! Sender abstraction for delivering queued records.

use crate::error::{DrainError, DrainResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Delivers records to the collection endpoint.
///
/// Sends are synchronous; the pipeline runs each one on a helper thread and
/// waits for it with a timeout, so an implementation may block.
pub trait BatchSender<T>: Send + Sync {
    /// Delivers a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record was not accepted.
    fn send_one(&self, item: &T) -> DrainResult<()>;

    /// Delivers several records in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was not accepted.
    fn send_batch(&self, items: &[T]) -> DrainResult<()>;
}

/// A call recorded by [`MockSender`].
#[derive(Debug, Clone, PartialEq)]
pub enum SentCall<T> {
    /// `send_one` was called.
    One(T),
    /// `send_batch` was called.
    Batch(Vec<T>),
}

impl<T> SentCall<T> {
    /// Number of records in the call.
    pub fn len(&self) -> usize {
        match self {
            SentCall::One(_) => 1,
            SentCall::Batch(items) => items.len(),
        }
    }

    /// Returns true for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scripted result for one [`MockSender`] call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Accept the records.
    Ok,
    /// Reject the records with a message.
    Fail(String),
    /// Sleep, then accept (`true`) or reject (`false`).
    Delay(Duration, bool),
}

/// A sender for testing.
///
/// Calls consume scripted responses in order; once the script is empty,
/// every call gets the default response.
#[derive(Debug)]
pub struct MockSender<T> {
    calls: Mutex<Vec<SentCall<T>>>,
    script: Mutex<VecDeque<MockResponse>>,
    accept_by_default: AtomicBool,
}

impl<T> Default for MockSender<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MockSender<T> {
    /// Creates a mock sender that accepts everything.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            accept_by_default: AtomicBool::new(true),
        }
    }

    /// Creates a mock sender that rejects everything.
    pub fn failing() -> Self {
        let sender = Self::new();
        sender.set_accept_by_default(false);
        sender
    }

    /// Sets the response used once the script is exhausted.
    pub fn set_accept_by_default(&self, accept: bool) {
        self.accept_by_default.store(accept, Ordering::SeqCst);
    }

    /// Appends a scripted response.
    pub fn push_response(&self, response: MockResponse) {
        self.script.lock().push_back(response);
    }

    /// Makes the next unscripted call succeed.
    pub fn succeed_next(&self) {
        self.push_response(MockResponse::Ok);
    }

    /// Makes the next unscripted call fail.
    pub fn fail_next(&self) {
        self.push_response(MockResponse::Fail("scripted failure".into()));
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears the recorded calls.
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    fn respond(&self) -> DrainResult<()> {
        let next = self.script.lock().pop_front();
        match next {
            Some(MockResponse::Ok) => Ok(()),
            Some(MockResponse::Fail(message)) => Err(DrainError::Send(message)),
            Some(MockResponse::Delay(delay, accept)) => {
                std::thread::sleep(delay);
                if accept {
                    Ok(())
                } else {
                    Err(DrainError::send("delayed failure"))
                }
            }
            None if self.accept_by_default.load(Ordering::SeqCst) => Ok(()),
            None => Err(DrainError::send("mock sender rejects all records")),
        }
    }
}

impl<T: Clone> MockSender<T> {
    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<SentCall<T>> {
        self.calls.lock().clone()
    }

    /// Returns every record passed to the sender, in call order.
    pub fn sent_items(&self) -> Vec<T> {
        self.calls
            .lock()
            .iter()
            .flat_map(|call| match call {
                SentCall::One(item) => vec![item.clone()],
                SentCall::Batch(items) => items.clone(),
            })
            .collect()
    }
}

impl<T: Clone + Send + Sync> BatchSender<T> for MockSender<T> {
    fn send_one(&self, item: &T) -> DrainResult<()> {
        self.calls.lock().push(SentCall::One(item.clone()));
        self.respond()
    }

    fn send_batch(&self, items: &[T]) -> DrainResult<()> {
        self.calls.lock().push(SentCall::Batch(items.to_vec()));
        self.respond()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_sender_records_calls() {
        let sender = MockSender::<u32>::new();
        sender.send_one(&1).unwrap();
        sender.send_batch(&[2, 3]).unwrap();

        assert_eq!(sender.call_count(), 2);
        assert_eq!(sender.calls(), vec![SentCall::One(1), SentCall::Batch(vec![2, 3])]);
        assert_eq!(sender.sent_items(), vec![1, 2, 3]);
    }

    #[test]
    fn mock_sender_follows_script() {
        let sender = MockSender::<u32>::new();
        sender.succeed_next();
        sender.fail_next();

        assert!(sender.send_one(&1).is_ok());
        assert!(matches!(sender.send_one(&2), Err(DrainError::Send(_))));
        // Script exhausted, default accepts.
        assert!(sender.send_one(&3).is_ok());
    }

    #[test]
    fn failing_mock_sender() {
        let sender = MockSender::<u32>::failing();
        assert!(sender.send_batch(&[1, 2]).is_err());
        assert_eq!(sender.calls()[0].len(), 2);
    }
}
