//! One-shot handle for the outcome of a deferred host call.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use crate::bridge::correlation::CorrelationId;
use crate::bridge::error::{BridgeError, Result};
use crate::model::value::Value;

/// A value or error that becomes available later. Settles exactly once.
#[derive(Debug)]
pub struct Deferred {
    id: Option<CorrelationId>,
    capability: String,
    rx: Option<Receiver<Result<Value>>>,
    outcome: Option<Result<Value>>,
}

impl Deferred {
    /// A pending handle and the sender that settles it.
    pub(crate) fn channel(
        id: CorrelationId,
        capability: impl Into<String>,
    ) -> (Self, Sender<Result<Value>>) {
        let (tx, rx) = mpsc::channel();
        let deferred = Self {
            id: Some(id),
            capability: capability.into(),
            rx: Some(rx),
            outcome: None,
        };
        (deferred, tx)
    }

    /// A handle that has already failed. No correlation id was allocated.
    pub(crate) fn failed(capability: impl Into<String>, err: BridgeError) -> Self {
        Self {
            id: None,
            capability: capability.into(),
            rx: None,
            outcome: Some(Err(err)),
        }
    }

    pub fn id(&self) -> Option<CorrelationId> {
        self.id
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_wait().is_some()
    }

    /// The outcome, if it has arrived. Never blocks.
    pub fn try_wait(&mut self) -> Option<Result<Value>> {
        if self.outcome.is_none()
            && let Some(rx) = self.rx.as_ref()
        {
            match rx.try_recv() {
                Ok(outcome) => self.settle(outcome),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.settle(Err(self.abandoned())),
            }
        }
        self.outcome.clone()
    }

    /// Block until the outcome arrives.
    pub fn wait(mut self) -> Result<Value> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }

        let abandoned = self.abandoned();
        match self.rx.take() {
            Some(rx) => rx.recv().unwrap_or(Err(abandoned)),
            None => Err(abandoned),
        }
    }

    /// Block for at most `timeout`. The call stays pending when time runs out.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<Value>> {
        if self.outcome.is_none()
            && let Some(rx) = self.rx.as_ref()
        {
            match rx.recv_timeout(timeout) {
                Ok(outcome) => self.settle(outcome),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => self.settle(Err(self.abandoned())),
            }
        }
        self.outcome.clone()
    }

    fn settle(&mut self, outcome: Result<Value>) {
        self.outcome = Some(outcome);
        self.rx = None;
    }

    fn abandoned(&self) -> BridgeError {
        BridgeError::Abandoned {
            capability: self.capability.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn try_wait_is_empty_until_settled_then_sticky() {
        let (mut deferred, tx) = Deferred::channel(CorrelationId::from_raw(1), "double");
        assert_eq!(deferred.try_wait(), None);

        tx.send(Ok(Value::Int(42))).unwrap();
        assert_eq!(deferred.try_wait(), Some(Ok(Value::Int(42))));
        assert_eq!(deferred.try_wait(), Some(Ok(Value::Int(42))));
        assert_eq!(deferred.wait(), Ok(Value::Int(42)));
    }

    #[test]
    fn failed_handle_has_no_id() {
        let err = BridgeError::HostUnavailable {
            capability: "double".into(),
        };
        let mut deferred = Deferred::failed("double", err.clone());
        assert_eq!(deferred.id(), None);
        assert!(deferred.is_settled());
        assert_eq!(deferred.wait(), Err(err));
    }

    #[test]
    fn dropped_sender_reports_abandoned() {
        let (mut deferred, tx) = Deferred::channel(CorrelationId::from_raw(2), "lost");
        drop(tx);
        assert_eq!(
            deferred.try_wait(),
            Some(Err(BridgeError::Abandoned {
                capability: "lost".into()
            }))
        );
    }

    #[test]
    fn wait_blocks_for_a_completion_from_another_thread() {
        let (deferred, tx) = Deferred::channel(CorrelationId::from_raw(3), "slow");
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(Ok(Value::from("done"))).unwrap();
        });

        assert_eq!(deferred.wait(), Ok(Value::from("done")));
        worker.join().unwrap();
    }

    #[test]
    fn wait_timeout_leaves_the_handle_pending() {
        let (mut deferred, tx) = Deferred::channel(CorrelationId::from_raw(4), "slow");
        assert_eq!(deferred.wait_timeout(Duration::from_millis(5)), None);

        tx.send(Err(BridgeError::Cancelled(CorrelationId::from_raw(4))))
            .unwrap();
        assert_eq!(
            deferred.wait_timeout(Duration::from_millis(5)),
            Some(Err(BridgeError::Cancelled(CorrelationId::from_raw(4))))
        );
    }
}
