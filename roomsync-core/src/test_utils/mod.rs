//! Test fixtures and doubles
//!
//! Shared by unit tests and the integration suite.

use crate::core_model::{ConnectionId, Identity, UserId};
use crate::transport::{ServerEvent, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn user(name: &str) -> UserId {
    UserId::new(name.to_string())
}

pub fn identity(name: &str) -> Identity {
    Identity::new(user(name), name)
}

pub fn conn(id: &str) -> ConnectionId {
    ConnectionId::new(id.to_string())
}

/// Where a recorded event was pushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushTarget {
    Channel(String),
    Connection(ConnectionId),
}

/// Transport double that records every push and subscription
#[derive(Default)]
pub struct RecordingTransport {
    pushes: Mutex<Vec<(PushTarget, ServerEvent)>>,
    subscriptions: Mutex<HashSet<(ConnectionId, String)>>,
    fail_emits: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent emit fail, for exercising swallow-and-log
    pub fn fail_emits(&self, fail: bool) {
        self.fail_emits.store(fail, Ordering::SeqCst);
    }

    /// All recorded pushes in order
    pub fn pushes(&self) -> Vec<(PushTarget, ServerEvent)> {
        self.pushes.lock().unwrap().clone()
    }

    /// Events pushed to a logical channel, in order
    pub fn events_on(&self, channel: &str) -> Vec<ServerEvent> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == PushTarget::Channel(channel.to_string()))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Events pushed directly to a connection, in order
    pub fn events_to(&self, connection_id: &ConnectionId) -> Vec<ServerEvent> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == PushTarget::Connection(connection_id.clone()))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Channels a connection is currently subscribed to
    pub fn subscriptions_of(&self, connection_id: &ConnectionId) -> Vec<String> {
        let mut channels: Vec<_> = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(conn, _)| conn == connection_id)
            .map(|(_, channel)| channel.clone())
            .collect();
        channels.sort();
        channels
    }

    pub fn clear(&self) {
        self.pushes.lock().unwrap().clear();
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.fail_emits.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("simulated failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn subscribe(
        &self,
        connection_id: &ConnectionId,
        channel: &str,
    ) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .insert((connection_id.clone(), channel.to_string()));
        Ok(())
    }

    async fn unsubscribe(
        &self,
        connection_id: &ConnectionId,
        channel: &str,
    ) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .remove(&(connection_id.clone(), channel.to_string()));
        Ok(())
    }

    async fn emit(&self, channel: &str, event: &ServerEvent) -> Result<(), TransportError> {
        self.check()?;
        self.pushes
            .lock()
            .unwrap()
            .push((PushTarget::Channel(channel.to_string()), event.clone()));
        Ok(())
    }

    async fn emit_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), TransportError> {
        self.check()?;
        self.pushes
            .lock()
            .unwrap()
            .push((PushTarget::Connection(connection_id.clone()), event.clone()));
        Ok(())
    }
}
