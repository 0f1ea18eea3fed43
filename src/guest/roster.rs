//! Guest roster storage.
//!
//! The roster is small (a few hundred guests at most), so the whole list is
//! kept in memory and rewritten to one JSON file on every change.

use parking_lot::RwLock;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::guest::model::{CreateGuestRequest, GuestRecord, UpdateGuestRequest};

pub const ROSTER_FILE: &str = "invitados.json";

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("invitado {0} no encontrado")]
    NotFound(i64),
    #[error("{0}")]
    Invalid(String),
    #[error("failed to read roster {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("roster file {} is not valid JSON: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to persist roster: {0}")]
    Persist(#[source] std::io::Error),
}

/// Record-level access to the guest list.
pub trait GuestRoster: Send + Sync {
    fn list(&self) -> Result<Vec<GuestRecord>, RosterError>;
    fn get(&self, id: i64) -> Result<GuestRecord, RosterError>;
    fn create(&self, request: CreateGuestRequest) -> Result<GuestRecord, RosterError>;
    /// Insert several guests with a single write. All or nothing.
    fn create_many(&self, requests: Vec<CreateGuestRequest>) -> Result<Vec<GuestRecord>, RosterError>;
    fn update(&self, id: i64, request: &UpdateGuestRequest) -> Result<GuestRecord, RosterError>;
    fn delete(&self, id: i64) -> Result<(), RosterError>;
}

fn check_required(request: &CreateGuestRequest) -> Result<(), RosterError> {
    if request.nombre_completo.trim().is_empty() {
        return Err(RosterError::Invalid("El nombre completo es obligatorio".to_string()));
    }
    if request.caracter_invitacion.trim().is_empty() {
        return Err(RosterError::Invalid(
            "El carácter de la invitación es obligatorio".to_string(),
        ));
    }
    Ok(())
}

fn next_id(guests: &[GuestRecord]) -> i64 {
    guests.iter().map(|g| g.id).max().unwrap_or(0) + 1
}

/// Roster kept in `<data dir>/invitados.json`.
pub struct JsonFileRoster {
    path: PathBuf,
    guests: RwLock<Vec<GuestRecord>>,
}

impl JsonFileRoster {
    /// Load the roster from `path`. A missing file is an empty roster.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RosterError> {
        let path = path.into();
        let guests = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| RosterError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(RosterError::Load { path, source }),
        };

        log::info!("Loaded {} guest(s) from {}", guests.len(), path.display());
        Ok(Self {
            path,
            guests: RwLock::new(guests),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, guests: &[GuestRecord]) -> Result<(), RosterError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(RosterError::Persist)?;

        let json = serde_json::to_vec_pretty(guests)
            .map_err(|e| RosterError::Persist(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let mut temp_file = NamedTempFile::new_in(&dir).map_err(RosterError::Persist)?;
        temp_file.write_all(&json).map_err(RosterError::Persist)?;
        temp_file.flush().map_err(RosterError::Persist)?;
        temp_file
            .persist(&self.path)
            .map_err(|e| RosterError::Persist(e.error))?;

        log::debug!("Roster persisted ({} guests)", guests.len());
        Ok(())
    }

    /// Apply `change` to a copy of the list and keep it only if it persists.
    fn write<T>(
        &self,
        change: impl FnOnce(&mut Vec<GuestRecord>) -> Result<T, RosterError>,
    ) -> Result<T, RosterError> {
        let mut guests = self.guests.write();
        let mut updated = guests.clone();
        let value = change(&mut updated)?;
        self.persist(&updated)?;
        *guests = updated;
        Ok(value)
    }
}

impl GuestRoster for JsonFileRoster {
    fn list(&self) -> Result<Vec<GuestRecord>, RosterError> {
        Ok(self.guests.read().clone())
    }

    fn get(&self, id: i64) -> Result<GuestRecord, RosterError> {
        self.guests
            .read()
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or(RosterError::NotFound(id))
    }

    fn create(&self, request: CreateGuestRequest) -> Result<GuestRecord, RosterError> {
        check_required(&request)?;
        let guest = self.write(|guests| {
            let guest = request.into_record(next_id(guests));
            guests.push(guest.clone());
            Ok(guest)
        })?;
        log::info!("Created guest {} ({})", guest.id, guest.nombre_completo);
        Ok(guest)
    }

    fn create_many(&self, requests: Vec<CreateGuestRequest>) -> Result<Vec<GuestRecord>, RosterError> {
        for request in &requests {
            check_required(request)?;
        }
        self.write(|guests| {
            let mut created = Vec::with_capacity(requests.len());
            for request in requests {
                let guest = request.into_record(next_id(guests));
                guests.push(guest.clone());
                created.push(guest);
            }
            Ok(created)
        })
    }

    fn update(&self, id: i64, request: &UpdateGuestRequest) -> Result<GuestRecord, RosterError> {
        self.write(|guests| {
            let guest = guests
                .iter_mut()
                .find(|g| g.id == id)
                .ok_or(RosterError::NotFound(id))?;
            request.apply(guest);
            if guest.nombre_completo.is_empty() || guest.caracter_invitacion.is_empty() {
                return Err(RosterError::Invalid(
                    "El nombre y el carácter de la invitación no pueden quedar vacíos".to_string(),
                ));
            }
            Ok(guest.clone())
        })
    }

    fn delete(&self, id: i64) -> Result<(), RosterError> {
        self.write(|guests| {
            let before = guests.len();
            guests.retain(|g| g.id != id);
            if guests.len() == before {
                return Err(RosterError::NotFound(id));
            }
            Ok(())
        })?;
        log::info!("Deleted guest {}", id);
        Ok(())
    }
}
