// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Named parameter sets, after the RFC 8391 families.
//!
//! The registry is closed: lookups resolve the four names below or fail.
//! Nothing ever falls back to a default set.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{Result, XmssError};

/// Hash family a parameter set is defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFamily {
    Sha2,
    Shake,
}

/// A single named parameter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmssParameters {
    pub name: &'static str,
    pub height: u32,
    pub winternitz_w: usize,
    pub hash_family: HashFamily,
    /// Security parameter in bytes.
    pub n: usize,
    pub signature_bytes: usize,
}

static PARAMETER_SETS: Lazy<HashMap<&'static str, XmssParameters>> = Lazy::new(|| {
    let mut sets = HashMap::new();
    sets.insert(
        "SHA2_10_256",
        XmssParameters {
            name: "SHA2_10_256",
            height: 10,
            winternitz_w: 16,
            hash_family: HashFamily::Sha2,
            n: 32,
            signature_bytes: 2500,
        },
    );
    sets.insert(
        "SHA2_16_256",
        XmssParameters {
            name: "SHA2_16_256",
            height: 16,
            winternitz_w: 16,
            hash_family: HashFamily::Sha2,
            n: 32,
            signature_bytes: 3988,
        },
    );
    sets.insert(
        "SHAKE_10_256",
        XmssParameters {
            name: "SHAKE_10_256",
            height: 10,
            winternitz_w: 16,
            hash_family: HashFamily::Shake,
            n: 32,
            signature_bytes: 2500,
        },
    );
    sets.insert(
        "SHAKE_16_256",
        XmssParameters {
            name: "SHAKE_16_256",
            height: 16,
            winternitz_w: 16,
            hash_family: HashFamily::Shake,
            n: 32,
            signature_bytes: 3988,
        },
    );
    sets
});

/// Looks up a parameter set by its exact name.
pub fn get_parameters_by_name(name: &str) -> Result<&'static XmssParameters> {
    PARAMETER_SETS.get(name).ok_or_else(|| {
        XmssError::InvalidParameter(format!("unknown parameter set: {}", name))
    })
}

/// Names of every registered parameter set.
pub fn parameter_set_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PARAMETER_SETS.keys().copied().collect();
    names.sort_unstable();
    names
}
