//! Error types for every phase of the engine.
//!
//! Only [`EngineError`] and [`ConfigError`] ever abort an invocation. The
//! per-item errors are collected into the run summary.

use crate::*;
use serde::Serialize;

/// Why a library master was rejected as a malformed sequential cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ClassifyError {
    #[error("master '{master}': bit {bit} has no {role} pin")]
    MissingSlotPin {
        master: String,
        bit: u32,
        role: &'static str,
    },
    #[error("master '{master}': bit {bit} declares more than one {role} pin")]
    DuplicateSlotPin {
        master: String,
        bit: u32,
        role: &'static str,
    },
    #[error("master '{master}': mixes a shared clock pin with per-bit clock pins")]
    InconsistentClocking { master: String },
    #[error("master '{master}': declares more than one shared {role} pin")]
    DuplicateSharedPin { master: String, role: &'static str },
    #[error("master '{master}': scan-in present on some bits only")]
    PartialScan { master: String },
    #[error("master '{master}': scan-in pins without a scan-enable pin")]
    MissingScanEnable { master: String },
    #[error("master '{master}': mixes indexed and unindexed data pins")]
    MixedBitIndexing { master: String },
}

/// Why a flip-flop instance could not enter the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum InventoryError {
    #[error("instance '{inst}': pin '{pin}' is not connected")]
    MissingConnection { inst: String, pin: String },
    #[error("instance '{inst}': on a path with slack {slack:.3} below the critical limit")]
    TimingCritical { inst: String, slack: float },
}

/// Why a cluster could not be mapped onto any tray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum AssignError {
    #[error("no tray can hold {size} flops with the required features")]
    NoCompatibleTray { size: usize },
    #[error("tray '{tray}' has {capacity} slots, cluster has {size} flops")]
    CapacityExceeded {
        tray: String,
        capacity: usize,
        size: usize,
    },
    #[error("tray '{tray}' lacks a feature the cluster needs: {feature}")]
    MissingFeature {
        tray: String,
        feature: &'static str,
    },
}

/// Why a planned tray was rolled back during legalization.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum LegalizeError {
    #[error("no free legal site for '{tray}' within {radius:.3} of ({x:.3}, {y:.3})")]
    NoLegalSite {
        tray: String,
        x: float,
        y: float,
        radius: float,
    },
    #[error("tray '{tray}' slot {slot} has no pin for net of flop '{flop}' ({role})")]
    PinMismatch {
        tray: String,
        slot: usize,
        flop: String,
        role: &'static str,
    },
    #[error("tray master '{0}' is not in the design library")]
    UnknownMaster(String),
    #[error("flop '{0}' is no longer in the design")]
    MissingFlop(String),
}

/// Design file parse failure with the offending line.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read design: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown {kind} '{name}'")]
    Unknown {
        line: usize,
        kind: &'static str,
        name: String,
    },
}

/// Invalid invocation parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("threads must be at least 1")]
    ZeroThreads,
    #[error("multistart must be at least 1")]
    ZeroMultistart,
    #[error("{field} must be finite and non-negative, got {value}")]
    NegativeWeight { field: &'static str, value: float },
    #[error("timeout_secs must be finite and non-negative, got {0}")]
    InvalidTimeout(float),
    #[error("max_displacement must be non-negative, got {0}")]
    InvalidDisplacement(float),
    #[error("failed to read configuration: {0}")]
    Read(String),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("search exceeded the {0:.1}s time limit; all trials discarded")]
    Timeout(float),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
