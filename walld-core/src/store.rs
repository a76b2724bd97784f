use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::{Result, WalldError};
use crate::interface::ResolvedCommand;
use crate::models::{TimeUnit, Value};
use crate::rotation::{RotationSnapshot, RotationState};
use crate::variable::Variable;

/// Daemon state: the configuration, the wallpaper set and the rotation
/// state. Every read and write goes through these methods; validation
/// always happens before anything is changed.
pub struct Store {
    config: Configuration,
    wallpapers: Vec<PathBuf>,
    /// Set by an explicit file list; a pinned set is never rescanned.
    pinned: bool,
    rotation: RotationState,
    rng: StdRng,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub enabled: bool,
    pub args: Vec<String>,
    pub variables: BTreeMap<String, Variable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub interval_secs: u64,
    pub shuffle: bool,
    pub source_path: Option<PathBuf>,
    pub recursive: bool,
    pub pinned: bool,
    pub wallpapers: Vec<PathBuf>,
    pub active_interfaces: Vec<String>,
    pub interfaces: Vec<InterfaceInfo>,
    pub rotation: RotationSnapshot,
}

/// Everything the dispatcher needs for one rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    pub wallpaper: PathBuf,
    pub commands: Vec<ResolvedCommand>,
}

impl Store {
    pub fn new(config: Configuration, wallpapers: Vec<PathBuf>) -> Self {
        Self::with_rng(config, wallpapers, StdRng::from_os_rng())
    }

    pub fn with_rng(config: Configuration, wallpapers: Vec<PathBuf>, mut rng: StdRng) -> Self {
        let mut rotation = RotationState::default();
        rotation.reset(&wallpapers, config.shuffle, &mut rng);
        Self {
            config,
            wallpapers,
            pinned: false,
            rotation,
            rng,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            interval_secs: self.config.interval.as_secs(),
            shuffle: self.config.shuffle,
            source_path: self.config.source_path.clone(),
            recursive: self.config.recursive,
            pinned: self.pinned,
            wallpapers: self.wallpapers.clone(),
            active_interfaces: self.list_active(),
            interfaces: self.list_interfaces(),
            rotation: self.rotation.snapshot(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Directory to rescan before a rotation, unless the set is pinned.
    pub fn scan_source(&self) -> Option<(PathBuf, bool)> {
        if self.pinned {
            return None;
        }
        self.config
            .source_path
            .clone()
            .map(|p| (p, self.config.recursive))
    }

    pub fn set_schedule(&mut self, value: i64, unit: &str) -> Result<Duration> {
        if value <= 0 {
            return Err(WalldError::InvalidSchedule(value));
        }
        let unit: TimeUnit = unit
            .parse()
            .map_err(|_| WalldError::UnknownTimeUnits(unit.to_string()))?;
        let interval = unit
            .duration(value as u64)
            .ok_or(WalldError::InvalidSchedule(value))?;
        self.config.interval = interval;
        info!(value, unit = %unit, "schedule changed");
        Ok(interval)
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.config.shuffle = shuffle;
        self.rotation
            .reset(&self.wallpapers, shuffle, &mut self.rng);
        info!(shuffle, "shuffle changed");
    }

    /// Pin the wallpaper set to exactly `paths`. Each path must be an
    /// existing regular file with a UTF-8 canonical path; nothing changes
    /// if any is not.
    pub fn set_files(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        if paths.is_empty() {
            return Err(WalldError::NoFilesProvided);
        }
        let resolved = paths
            .into_iter()
            .map(|p| match std::fs::canonicalize(&p) {
                Ok(abs) if abs.is_file() && abs.to_str().is_some() => Ok(abs),
                _ => Err(WalldError::InvalidFile(p)),
            })
            .collect::<Result<Vec<_>>>()?;

        info!(count = resolved.len(), "wallpaper set pinned");
        self.pinned = true;
        self.replace_wallpapers(resolved);
        Ok(())
    }

    /// Take the result of a rescan. Ignored while the set is pinned.
    /// Returns whether the set changed.
    pub fn refresh_files(&mut self, scanned: Vec<PathBuf>) -> bool {
        if self.pinned || scanned == self.wallpapers {
            return false;
        }
        debug!(count = scanned.len(), "wallpaper set rescanned");
        self.replace_wallpapers(scanned);
        true
    }

    fn replace_wallpapers(&mut self, wallpapers: Vec<PathBuf>) {
        self.wallpapers = wallpapers;
        self.rotation
            .reset(&self.wallpapers, self.config.shuffle, &mut self.rng);
    }

    pub fn set_variable(&mut self, interface: &str, name: &str, value: Value) -> Result<()> {
        let iface = self
            .config
            .interfaces
            .get_mut(interface)
            .ok_or_else(|| WalldError::InvalidInterfaceName(interface.to_string()))?;
        let var = iface
            .variable_mut(name)
            .ok_or_else(|| WalldError::InvalidVariableName {
                interface: interface.to_string(),
                variable: name.to_string(),
            })?;
        var.assign(name, value)?;
        info!(interface, variable = name, value = %var.value(), "variable set");
        Ok(())
    }

    /// Returns whether the active set changed.
    pub fn set_interface_enabled(&mut self, name: &str, enabled: bool) -> Result<bool> {
        if !self.config.interfaces.contains_key(name) {
            return Err(WalldError::InvalidInterfaceName(name.to_string()));
        }
        let active = &mut self.config.active_interfaces;
        let position = active.iter().position(|n| n == name);
        let changed = match (enabled, position) {
            (true, None) => {
                active.push(name.to_string());
                true
            }
            (false, Some(i)) => {
                active.remove(i);
                true
            }
            _ => false,
        };
        if changed {
            info!(interface = name, enabled, "interface toggled");
        }
        Ok(changed)
    }

    pub fn list_interfaces(&self) -> Vec<InterfaceInfo> {
        self.config
            .interfaces
            .values()
            .map(|iface| InterfaceInfo {
                name: iface.name().to_string(),
                enabled: self.is_active(iface.name()),
                args: iface.template(),
                variables: iface.variables().clone(),
            })
            .collect()
    }

    pub fn list_active(&self) -> Vec<String> {
        self.config.active_interfaces.clone()
    }

    fn is_active(&self, name: &str) -> bool {
        self.config.active_interfaces.iter().any(|n| n == name)
    }

    pub fn current_wallpaper(&self) -> Result<&Path> {
        self.rotation.current().ok_or(WalldError::NoWallpaperSelected)
    }

    /// Select the next wallpaper and resolve every active interface against
    /// it. `None` when the set is empty.
    pub fn rotate(&mut self) -> Option<Rotation> {
        let wallpaper = self
            .rotation
            .advance(&self.wallpapers, self.config.shuffle, &mut self.rng)?;
        let commands = self
            .config
            .active_interfaces
            .iter()
            .filter_map(|name| self.config.interfaces.get(name))
            .map(|iface| iface.resolve(&wallpaper))
            .collect();
        Some(Rotation {
            wallpaper,
            commands,
        })
    }
}
