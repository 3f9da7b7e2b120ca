// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Addressing into the State Store's three namespaces (spec.md §4.3).
///
/// The spec describes these as "dotted paths" (`device.<host>.brightness`),
/// but device hosts are themselves dotted IPv4 addresses — a flat
/// dot-split parser cannot tell `device.10.0.0.5.brightness` apart from
/// `device.10.brightness` on host `0.0.5`. We keep the compound-path
/// *concept* but carry the host/scene name as opaque segments instead of
/// splitting them on `.` (recorded as DESIGN.md OQ-2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    Global,
    Device(String),
    Scene(String, String),
}

impl Path {
    pub fn device(host: impl Into<String>) -> Self {
        Self::Device(host.into())
    }

    pub fn scene(host: impl Into<String>, scene: impl Into<String>) -> Self {
        Self::Scene(host.into(), scene.into())
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Device(host) => write!(f, "device[{host}]"),
            Self::Scene(host, scene) => write!(f, "scene[{host}][{scene}]"),
        }
    }
}
