// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for pool and allocator construction.
//!
//! Only *creation* can fail: invalid population/worker geometry, out-of-range
//! algorithm parameters, allocator sizes that overflow, or a failed thread
//! spawn. Ill-formed allocator use at runtime (bad lane, misaligned free,
//! double free) is a silently tolerated no-op and never surfaces here.

/// Errors returned by evopool operations.
#[derive(Debug)]
pub enum Error {
    /// Population/worker geometry is unusable (requires `solutions >= workers >= 1`).
    InvalidGeometry { solutions: usize, workers: usize },
    /// An algorithm parameter is outside its documented range.
    InvalidParams(String),
    /// Allocator geometry is zero-sized or its byte size overflows `usize`.
    OutOfMemory,
    /// A worker thread could not be spawned.
    ThreadSpawn(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidGeometry { solutions, workers } => write!(
                f,
                "invalid pool geometry: {} solutions / {} workers (need solutions >= workers >= 1)",
                solutions, workers
            ),
            Error::InvalidParams(msg) => write!(f, "invalid parameters: {}", msg),
            Error::OutOfMemory => write!(f, "allocator geometry is empty or overflows usize"),
            Error::ThreadSpawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ThreadSpawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
