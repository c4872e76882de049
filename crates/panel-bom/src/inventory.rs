//! Access to the panel build inventory.
//!
//! The allocator never talks to storage directly. It reads a consistent
//! [`InventoryData`] snapshot through [`Inventory::snapshot`] and performs all
//! writes inside [`Inventory::transaction`], which must be all-or-nothing.
//!
//! [`MemoryInventory`] keeps the rows in process. [`FileInventory`] keeps them
//! in a JSON file shared between processes and serialises writers with a
//! lock file next to it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use atomicwrites::{AtomicFile, OverwriteBehavior};
use fslock::LockFile;
use serde::{Deserialize, Serialize};

use crate::{
    Board, BomError, ComponentInstance, ComponentType, MosfetBoard, PanelSection, PinAssignment,
    PinId,
};

/// Storage seen by the allocator and the power calculator.
pub trait Inventory {
    /// A consistent copy of every row the engine reads
    fn snapshot(&self) -> Result<InventoryData, BomError>;

    /// Run `f` as one atomic write scope.
    ///
    /// Writes made through the transaction become visible only if `f`
    /// returns `Ok`; any error discards all of them.
    fn transaction<T, F>(&self, f: F) -> Result<T, BomError>
    where
        F: FnOnce(&mut dyn InventoryTx) -> Result<T, BomError>;
}

/// Reads and writes available inside [`Inventory::transaction`].
///
/// Reads observe the transaction's own writes.
pub trait InventoryTx {
    fn section(&self, id: &str) -> Result<Option<PanelSection>, BomError>;
    fn component(&self, id: &str) -> Result<Option<ComponentInstance>, BomError>;
    fn component_type(&self, id: &str) -> Result<Option<ComponentType>, BomError>;
    fn board(&self, id: &str) -> Result<Option<Board>, BomError>;
    fn pin_assignment_at(
        &self,
        board_id: &str,
        pin: PinId,
    ) -> Result<Option<PinAssignment>, BomError>;
    fn create_pin_assignment(&mut self, assignment: PinAssignment) -> Result<(), BomError>;
}

/// Every inventory row, as stored in `inventory.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryData {
    #[serde(default)]
    pub sections: Vec<PanelSection>,
    #[serde(default)]
    pub component_types: Vec<ComponentType>,
    #[serde(default)]
    pub components: Vec<ComponentInstance>,
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub pin_assignments: Vec<PinAssignment>,
    #[serde(default)]
    pub mosfet_boards: Vec<MosfetBoard>,
}

impl InventoryData {
    pub fn parse(content: &str) -> Result<Self, BomError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BomError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write the inventory as pretty JSON, replacing the file atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BomError> {
        let json = serde_json::to_string_pretty(self)?;
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(json.as_bytes())?;
                f.flush()
            })
            .map_err(|err| match err {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => BomError::Io(e),
            })
    }

    pub fn find_section(&self, id: &str) -> Option<&PanelSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn find_component(&self, id: &str) -> Option<&ComponentInstance> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn find_component_type(&self, id: &str) -> Option<&ComponentType> {
        self.component_types.iter().find(|t| t.id == id)
    }

    pub fn find_board(&self, id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == id)
    }

    pub fn find_pin_assignment(&self, board_id: &str, pin: PinId) -> Option<&PinAssignment> {
        self.pin_assignments
            .iter()
            .find(|a| a.board_id == board_id && a.pin_number == pin)
    }

    /// Components of a section in build order: `sort_order`, then name, then id
    pub fn components_in_section(&self, section_id: &str) -> Vec<&ComponentInstance> {
        let mut components: Vec<_> = self
            .components
            .iter()
            .filter(|c| c.panel_section_id == section_id)
            .collect();
        components.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        components
    }

    /// Boards ordered by name, ties broken by id
    pub fn boards_by_name(&self) -> Vec<&Board> {
        let mut boards: Vec<_> = self.boards.iter().collect();
        boards.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        boards
    }

    /// Number of pins already assigned to a component instance
    pub fn assigned_pin_count(&self, component_instance_id: &str) -> u32 {
        self.pin_assignments
            .iter()
            .filter(|a| a.component_instance_id.as_deref() == Some(component_instance_id))
            .count() as u32
    }
}

impl InventoryTx for InventoryData {
    fn section(&self, id: &str) -> Result<Option<PanelSection>, BomError> {
        Ok(self.find_section(id).cloned())
    }

    fn component(&self, id: &str) -> Result<Option<ComponentInstance>, BomError> {
        Ok(self.find_component(id).cloned())
    }

    fn component_type(&self, id: &str) -> Result<Option<ComponentType>, BomError> {
        Ok(self.find_component_type(id).cloned())
    }

    fn board(&self, id: &str) -> Result<Option<Board>, BomError> {
        Ok(self.find_board(id).cloned())
    }

    fn pin_assignment_at(
        &self,
        board_id: &str,
        pin: PinId,
    ) -> Result<Option<PinAssignment>, BomError> {
        Ok(self.find_pin_assignment(board_id, pin).cloned())
    }

    fn create_pin_assignment(&mut self, assignment: PinAssignment) -> Result<(), BomError> {
        if self
            .find_pin_assignment(&assignment.board_id, assignment.pin_number)
            .is_some()
        {
            let board = self
                .find_board(&assignment.board_id)
                .map(|b| b.name.clone())
                .unwrap_or(assignment.board_id);
            return Err(BomError::Conflict {
                board,
                pin: assignment.pin_number,
            });
        }
        self.pin_assignments.push(assignment);
        Ok(())
    }
}

/// Process-local inventory guarded by a mutex.
///
/// A transaction holds the lock for its whole duration and works on a staged
/// copy that replaces the live data only on success.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    data: Mutex<InventoryData>,
}

impl MemoryInventory {
    pub fn new(data: InventoryData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    pub fn into_data(self) -> InventoryData {
        self.data
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<InventoryData> for MemoryInventory {
    fn from(data: InventoryData) -> Self {
        Self::new(data)
    }
}

impl Inventory for MemoryInventory {
    fn snapshot(&self) -> Result<InventoryData, BomError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.clone())
    }

    fn transaction<T, F>(&self, f: F) -> Result<T, BomError>
    where
        F: FnOnce(&mut dyn InventoryTx) -> Result<T, BomError>,
    {
        let mut live = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut staged = live.clone();

        match f(&mut staged) {
            Ok(value) => {
                *live = staged;
                Ok(value)
            }
            Err(e) => {
                log::debug!("Rolling back inventory transaction: {e}");
                Err(e)
            }
        }
    }
}

/// Inventory kept in a JSON file that several processes may write.
///
/// A transaction takes an exclusive lock on `<file>.lock`, re-reads the file
/// under it and writes it back before unlocking, so rows committed by another
/// process are seen by the re-checks of the next transaction.
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling lock file, e.g. `inventory.json.lock`
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn lock(&self) -> Result<LockFile, BomError> {
        let lock_path = self.lock_path();
        let mut lock = LockFile::open(&lock_path).map_err(|e| lock_error(&lock_path, e))?;
        lock.lock().map_err(|e| lock_error(&lock_path, e))?;
        log::debug!("Locked {}", lock_path.display());
        Ok(lock)
    }
}

fn lock_error(path: &Path, e: impl std::fmt::Display) -> BomError {
    BomError::Lock {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl Inventory for FileInventory {
    fn snapshot(&self) -> Result<InventoryData, BomError> {
        // Saves replace the file atomically, so readers need no lock
        InventoryData::load(&self.path)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T, BomError>
    where
        F: FnOnce(&mut dyn InventoryTx) -> Result<T, BomError>,
    {
        let _lock = self.lock()?;

        // Re-read under the lock; anything loaded earlier may be stale
        let mut staged = InventoryData::load(&self.path)?;
        match f(&mut staged) {
            Ok(value) => {
                staged.save(&self.path)?;
                Ok(value)
            }
            Err(e) => {
                log::debug!("Rolling back inventory transaction: {e}");
                Err(e)
            }
        }
    }
}
