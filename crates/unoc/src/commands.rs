//! Reversible commands and the undo/redo history
//!
//! Every state mutation of the simulation goes through a [`SimulationCommand`].
//! Commands capture the prior value of whatever they overwrite when they run,
//! so `undo` is always the exact inverse of the last `execute`.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::model::{DeviceStatus, LinkStatus, PropertyMap};
use crate::store::TopologyStore;
use crate::{Result, SimulatorError};

/// A reversible unit of change against the topology store
#[async_trait]
pub trait SimulationCommand: Debug + Send + Sync {
    /// Apply the change, recording the state it replaces
    async fn execute(&mut self, store: &dyn TopologyStore) -> Result<()>;

    /// Restore the state recorded by the last `execute`
    async fn undo(&mut self, store: &dyn TopologyStore) -> Result<()>;

    /// Human readable summary for the event log
    fn describe(&self) -> String;
}

/// Set the status of one link
#[derive(Debug, Clone)]
pub struct UpdateLinkStatus {
    pub link_id: String,
    pub new_status: LinkStatus,
    old_status: Option<LinkStatus>,
}

impl UpdateLinkStatus {
    pub fn new(link_id: impl Into<String>, new_status: LinkStatus) -> Self {
        Self {
            link_id: link_id.into(),
            new_status,
            old_status: None,
        }
    }

    pub fn old_status(&self) -> Option<LinkStatus> {
        self.old_status
    }
}

#[async_trait]
impl SimulationCommand for UpdateLinkStatus {
    async fn execute(&mut self, store: &dyn TopologyStore) -> Result<()> {
        let link = store.get_link(&self.link_id).await?;
        store.set_link_status(&self.link_id, self.new_status).await?;
        self.old_status = Some(link.status);
        Ok(())
    }

    async fn undo(&mut self, store: &dyn TopologyStore) -> Result<()> {
        let old = self.old_status.ok_or_else(|| {
            SimulatorError::InvalidOperation(format!(
                "undo of link '{}' status change called before execute",
                self.link_id
            ))
        })?;
        store.set_link_status(&self.link_id, old).await
    }

    fn describe(&self) -> String {
        match self.old_status {
            Some(old) => format!(
                "Status of link '{}' changed from '{}' to '{}'",
                self.link_id, old, self.new_status
            ),
            None => format!("Set link '{}' to '{}'", self.link_id, self.new_status),
        }
    }
}

/// Set the status of one device
#[derive(Debug, Clone)]
pub struct UpdateDeviceStatus {
    pub device_id: String,
    pub new_status: DeviceStatus,
    old_status: Option<DeviceStatus>,
}

impl UpdateDeviceStatus {
    pub fn new(device_id: impl Into<String>, new_status: DeviceStatus) -> Self {
        Self {
            device_id: device_id.into(),
            new_status,
            old_status: None,
        }
    }
}

#[async_trait]
impl SimulationCommand for UpdateDeviceStatus {
    async fn execute(&mut self, store: &dyn TopologyStore) -> Result<()> {
        let device = store.get_device(&self.device_id).await?;
        store.set_device_status(&self.device_id, self.new_status).await?;
        self.old_status = Some(device.status);
        Ok(())
    }

    async fn undo(&mut self, store: &dyn TopologyStore) -> Result<()> {
        let old = self.old_status.ok_or_else(|| {
            SimulatorError::InvalidOperation(format!(
                "undo of device '{}' status change called before execute",
                self.device_id
            ))
        })?;
        store.set_device_status(&self.device_id, old).await
    }

    fn describe(&self) -> String {
        match self.old_status {
            Some(old) => format!(
                "Status of device '{}' changed from '{}' to '{}'",
                self.device_id, old, self.new_status
            ),
            None => format!("Set device '{}' to '{}'", self.device_id, self.new_status),
        }
    }
}

/// Merge a set of properties into a link's property map
#[derive(Debug, Clone)]
pub struct UpdateLinkProperties {
    pub link_id: String,
    pub changes: PropertyMap,
    old_properties: Option<PropertyMap>,
}

impl UpdateLinkProperties {
    pub fn new(link_id: impl Into<String>, changes: PropertyMap) -> Self {
        Self {
            link_id: link_id.into(),
            changes,
            old_properties: None,
        }
    }
}

#[async_trait]
impl SimulationCommand for UpdateLinkProperties {
    async fn execute(&mut self, store: &dyn TopologyStore) -> Result<()> {
        let link = store.get_link(&self.link_id).await?;
        let mut merged = link.properties.clone();
        merged.extend(self.changes.clone());
        store.set_link_properties(&self.link_id, merged).await?;
        self.old_properties = Some(link.properties);
        Ok(())
    }

    async fn undo(&mut self, store: &dyn TopologyStore) -> Result<()> {
        let old = self.old_properties.clone().ok_or_else(|| {
            SimulatorError::InvalidOperation(format!(
                "undo of link '{}' property change called before execute",
                self.link_id
            ))
        })?;
        store.set_link_properties(&self.link_id, old).await
    }

    fn describe(&self) -> String {
        let keys: Vec<&str> = self.changes.keys().map(String::as_str).collect();
        format!("Properties {:?} of link '{}' updated", keys, self.link_id)
    }
}

/// Ordered group of commands applied and reverted as one history entry
#[derive(Debug, Default)]
pub struct CompositeCommand {
    pub label: String,
    commands: Vec<Box<dyn SimulationCommand>>,
}

impl CompositeCommand {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: impl SimulationCommand + 'static) {
        self.commands.push(Box::new(command));
    }

    pub fn with(mut self, command: impl SimulationCommand + 'static) -> Self {
        self.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[async_trait]
impl SimulationCommand for CompositeCommand {
    /// Runs sub-commands in order. On failure the applied prefix is rolled back.
    async fn execute(&mut self, store: &dyn TopologyStore) -> Result<()> {
        for idx in 0..self.commands.len() {
            if let Err(err) = self.commands[idx].execute(store).await {
                tracing::warn!(
                    "[COMMANDS] '{}' failed at step {}: {} - rolling back",
                    self.label,
                    idx,
                    err
                );
                for applied in self.commands[..idx].iter_mut().rev() {
                    if let Err(rollback_err) = applied.undo(store).await {
                        tracing::error!(
                            "[COMMANDS] rollback of '{}' failed: {}",
                            applied.describe(),
                            rollback_err
                        );
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Reverts sub-commands in reverse order. On failure the already reverted
    /// suffix is re-applied so the store stays at the post-execute state.
    async fn undo(&mut self, store: &dyn TopologyStore) -> Result<()> {
        for idx in (0..self.commands.len()).rev() {
            if let Err(err) = self.commands[idx].undo(store).await {
                tracing::warn!(
                    "[COMMANDS] undo of '{}' failed at step {}: {} - re-applying",
                    self.label,
                    idx,
                    err
                );
                for reverted in self.commands[idx + 1..].iter_mut() {
                    if let Err(reapply_err) = reverted.execute(store).await {
                        tracing::error!(
                            "[COMMANDS] re-apply of '{}' failed: {}",
                            reverted.describe(),
                            reapply_err
                        );
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self.commands.as_slice() {
            [single] => single.describe(),
            _ => format!("{} ({} changes)", self.label, self.commands.len()),
        }
    }
}

/// Undo / redo availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Linear undo/redo history of executed commands
#[derive(Debug, Default)]
pub struct CommandHistory {
    undo_stack: Vec<Box<dyn SimulationCommand>>,
    redo_stack: Vec<Box<dyn SimulationCommand>>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a command and record it. A new command discards forward history.
    pub async fn execute(
        &mut self,
        mut command: Box<dyn SimulationCommand>,
        store: &dyn TopologyStore,
    ) -> Result<String> {
        command.execute(store).await?;
        let summary = command.describe();
        tracing::debug!("[COMMANDS] executed: {}", summary);
        self.undo_stack.push(command);
        self.redo_stack.clear();
        Ok(summary)
    }

    /// Revert the most recent command
    pub async fn undo(&mut self, store: &dyn TopologyStore) -> Result<String> {
        let mut command = self.undo_stack.pop().ok_or(SimulatorError::NothingToUndo)?;
        if let Err(err) = command.undo(store).await {
            self.undo_stack.push(command);
            return Err(err);
        }
        let summary = command.describe();
        self.redo_stack.push(command);
        Ok(summary)
    }

    /// Re-apply the most recently undone command
    pub async fn redo(&mut self, store: &dyn TopologyStore) -> Result<String> {
        let mut command = self.redo_stack.pop().ok_or(SimulatorError::NothingToRedo)?;
        if let Err(err) = command.execute(store).await {
            self.redo_stack.push(command);
            return Err(err);
        }
        let summary = command.describe();
        self.undo_stack.push(command);
        Ok(summary)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::model::{Device, Link, ObjectKind, Ring, TopologySnapshot};
    use crate::store::InMemoryStore;
    use crate::test_fixtures::reference_store;

    /// Store whose link writes fail for one id once armed
    #[derive(Debug)]
    struct FailingLinkStore {
        inner: InMemoryStore,
        failing_link: &'static str,
        armed: AtomicBool,
    }

    impl FailingLinkStore {
        fn new(failing_link: &'static str) -> Self {
            Self {
                inner: reference_store(),
                failing_link,
                armed: AtomicBool::new(false),
            }
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TopologyStore for FailingLinkStore {
        async fn get_device(&self, id: &str) -> Result<Device> {
            self.inner.get_device(id).await
        }

        async fn get_link(&self, id: &str) -> Result<Link> {
            self.inner.get_link(id).await
        }

        async fn list_devices(&self) -> Result<Vec<Device>> {
            self.inner.list_devices().await
        }

        async fn list_links(&self) -> Result<Vec<Link>> {
            self.inner.list_links().await
        }

        async fn list_rings(&self) -> Result<Vec<Ring>> {
            self.inner.list_rings().await
        }

        async fn set_device_status(&self, id: &str, status: DeviceStatus) -> Result<()> {
            self.inner.set_device_status(id, status).await
        }

        async fn set_link_status(&self, id: &str, status: LinkStatus) -> Result<()> {
            if id == self.failing_link && self.armed.load(Ordering::SeqCst) {
                return Err(SimulatorError::Io(std::io::Error::other("link write rejected")));
            }
            self.inner.set_link_status(id, status).await
        }

        async fn set_link_properties(&self, id: &str, properties: PropertyMap) -> Result<()> {
            self.inner.set_link_properties(id, properties).await
        }

        async fn replace_all(&self, topology: TopologySnapshot) -> Result<()> {
            self.inner.replace_all(topology).await
        }
    }

    #[tokio::test]
    async fn test_link_status_round_trip() {
        let store = reference_store();
        let mut history = CommandHistory::new();

        history
            .execute(Box::new(UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Down)), &store)
            .await
            .unwrap();
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Down);

        history.undo(&store).await.unwrap();
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Up);

        history.redo(&store).await.unwrap();
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Down);
        assert_eq!(history.status(), HistoryStatus { can_undo: true, can_redo: false });
    }

    #[tokio::test]
    async fn test_empty_history_errors() {
        let store = reference_store();
        let mut history = CommandHistory::new();

        assert!(matches!(history.undo(&store).await, Err(SimulatorError::NothingToUndo)));
        assert!(matches!(history.redo(&store).await, Err(SimulatorError::NothingToRedo)));
    }

    #[tokio::test]
    async fn test_new_command_discards_redo() {
        let store = reference_store();
        let mut history = CommandHistory::new();

        history
            .execute(Box::new(UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Down)), &store)
            .await
            .unwrap();
        history.undo(&store).await.unwrap();
        assert!(history.can_redo());

        history
            .execute(Box::new(UpdateDeviceStatus::new("ONT-01", DeviceStatus::Maintenance)), &store)
            .await
            .unwrap();
        assert!(!history.can_redo());
        assert!(matches!(history.redo(&store).await, Err(SimulatorError::NothingToRedo)));
    }

    #[tokio::test]
    async fn test_undo_before_execute_is_invalid() {
        let store = reference_store();
        let mut command = UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Down);
        let err = command.undo(&store).await.unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_composite_rolls_back_on_failure() {
        let store = reference_store();
        let mut composite = CompositeCommand::new("partial")
            .with(UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Down))
            .with(UpdateDeviceStatus::new("SPLITTER-01", DeviceStatus::Offline))
            .with(UpdateLinkStatus::new("no-such-link", LinkStatus::Down));

        let err = composite.execute(&store).await.unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound { kind: ObjectKind::Link, .. }));
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Up);
        assert_eq!(
            store.get_device("SPLITTER-01").await.unwrap().status,
            DeviceStatus::Online
        );
    }

    #[tokio::test]
    async fn test_composite_undo_runs_in_reverse() {
        let store = reference_store();
        // Both commands touch the same link: reverse order restores the original value
        let mut composite = CompositeCommand::new("twice")
            .with(UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Degraded))
            .with(UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Down));

        composite.execute(&store).await.unwrap();
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Down);

        composite.undo(&store).await.unwrap();
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Up);
    }

    #[tokio::test]
    async fn test_link_properties_merge_and_restore() {
        let store = reference_store();
        let before = store.get_link("link-spl1-ont1").await.unwrap().properties;

        let mut changes = PropertyMap::new();
        changes.insert("utilization_percent".to_string(), serde_json::json!(95.0));
        let mut command = UpdateLinkProperties::new("link-spl1-ont1", changes);

        command.execute(&store).await.unwrap();
        let after = store.get_link("link-spl1-ont1").await.unwrap();
        assert_eq!(after.utilization_percent(), 95.0);
        assert_eq!(after.length_km(), 0.8);

        command.undo(&store).await.unwrap();
        assert_eq!(store.get_link("link-spl1-ont1").await.unwrap().properties, before);
    }

    #[tokio::test]
    async fn test_composite_undo_failure_reapplies_reverted_steps() {
        let store = FailingLinkStore::new("link-olt1-spl1");
        let mut history = CommandHistory::new();

        let composite = CompositeCommand::new("cut feeder")
            .with(UpdateLinkStatus::new("link-olt1-spl1", LinkStatus::Down))
            .with(UpdateLinkStatus::new("link-spl1-ont1", LinkStatus::Down));
        history.execute(Box::new(composite), &store).await.unwrap();

        store.arm();
        assert!(matches!(history.undo(&store).await, Err(SimulatorError::Io(_))));

        // the second step was reverted first, then re-applied after the first failed
        assert_eq!(store.get_link("link-olt1-spl1").await.unwrap().status, LinkStatus::Down);
        assert_eq!(store.get_link("link-spl1-ont1").await.unwrap().status, LinkStatus::Down);
        assert_eq!(history.status(), HistoryStatus { can_undo: true, can_redo: false });
    }
}
