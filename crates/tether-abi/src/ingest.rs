//! Per-module metadata blob decoding
//!
//! The external ingestion collaborator serializes one blob per foreign
//! module: a tree keyed by type-kind arrays. This module decodes the blob
//! into typed [`TypeDescription`]s and validates that every entry landed in
//! the array matching its kind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meta::{TypeDescription, TypeKind};

/// Errors produced while decoding a metadata blob.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The blob is not valid JSON or does not match the description shape.
    #[error("Malformed metadata blob: {0}")]
    Decode(#[from] serde_json::Error),

    /// An entry appeared in the wrong kind array.
    #[error("Type '{name}' declared as {found:?} inside the {expected:?} array")]
    KindMismatch {
        /// Qualified name of the offending entry.
        name: String,
        /// Kind the enclosing array requires.
        expected: TypeKind,
        /// Kind the entry actually declared.
        found: TypeKind,
    },
}

/// Decoded metadata for a single foreign module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module name.
    pub module: String,
    /// Source units compiled into the module, used to map change batches
    /// back to modules during hot reload.
    #[serde(default)]
    pub units: Vec<String>,
    /// Class descriptions.
    #[serde(default)]
    pub classes: Vec<TypeDescription>,
    /// Struct descriptions.
    #[serde(default)]
    pub structs: Vec<TypeDescription>,
    /// Enum descriptions.
    #[serde(default)]
    pub enums: Vec<TypeDescription>,
    /// Interface descriptions.
    #[serde(default)]
    pub interfaces: Vec<TypeDescription>,
}

impl ModuleMetadata {
    /// Decode and validate a metadata blob from JSON text.
    pub fn from_json(json: &str) -> Result<Self, IngestError> {
        let meta: ModuleMetadata = serde_json::from_str(json)?;
        meta.validate()?;
        Ok(meta)
    }

    /// Decode and validate a metadata blob from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IngestError> {
        let meta: ModuleMetadata = serde_json::from_slice(bytes)?;
        meta.validate()?;
        Ok(meta)
    }

    /// Check that every entry sits in the array matching its kind.
    pub fn validate(&self) -> Result<(), IngestError> {
        for (expected, bucket) in [
            (TypeKind::Class, &self.classes),
            (TypeKind::Struct, &self.structs),
            (TypeKind::Enum, &self.enums),
            (TypeKind::Interface, &self.interfaces),
        ] {
            for desc in bucket {
                // Delegates ride in the class array; their kind is honored.
                if desc.kind != expected && desc.kind != TypeKind::Delegate {
                    return Err(IngestError::KindMismatch {
                        name: desc.qualified_name(),
                        expected,
                        found: desc.kind,
                    });
                }
            }
        }
        Ok(())
    }

    /// Iterate every description in the blob, classes first.
    pub fn descriptions(&self) -> impl Iterator<Item = &TypeDescription> {
        self.classes
            .iter()
            .chain(self.structs.iter())
            .chain(self.enums.iter())
            .chain(self.interfaces.iter())
    }

    /// Total number of descriptions in the blob.
    pub fn len(&self) -> usize {
        self.classes.len() + self.structs.len() + self.enums.len() + self.interfaces.len()
    }

    /// Check whether the blob describes no types.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
