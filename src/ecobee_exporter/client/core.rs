// Ecobee Exporter - Thermostat and sensor metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Formatter};

/// Temperature as reported by the Ecobee API, in tenths of a degree
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize)]
#[repr(transparent)]
pub struct TenthsOfDegree(f64);

impl From<f64> for TenthsOfDegree {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

/// Temperature, in degrees
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Degrees(f64);

/// Every temperature the Ecobee API reports is an integer scaled by ten. This
/// is the only place that scale is removed.
impl From<TenthsOfDegree> for Degrees {
    fn from(v: TenthsOfDegree) -> Self {
        Self(v.0 / 10.0)
    }
}

impl From<Degrees> for f64 {
    fn from(v: Degrees) -> Self {
        v.0
    }
}

impl From<f64> for Degrees {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

/// Which thermostats to fetch and which parts of each thermostat to include.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub selection_type: String,
    pub selection_match: String,
    pub include_sensors: bool,
    pub include_runtime: bool,
}

impl Selection {
    /// All thermostats registered to the account, including remote sensors and
    /// runtime state.
    pub fn registered() -> Self {
        Selection {
            selection_type: "registered".to_owned(),
            selection_match: String::new(),
            include_sensors: true,
            include_runtime: true,
        }
    }
}

/// A single thermostat and all remote sensors attached to it.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermostat {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub remote_sensors: Vec<RemoteSensor>,
}

/// Live operating state of a thermostat. Temperatures are in tenths of a degree.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Runtime {
    pub connected: bool,
    pub actual_temperature: TenthsOfDegree,
    pub desired_heat: TenthsOfDegree,
    pub desired_cool: TenthsOfDegree,
}

/// Sensor attached to a thermostat, including the sensor built in to the thermostat.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSensor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    #[serde(default)]
    pub in_use: bool,
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<Capability>,
}

/// Single measurement made by a sensor. The type describes how to interpret
/// the value, e.g. `temperature`, `humidity`, or `occupancy`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub capability_type: String,
    pub value: String,
}

/// Source of thermostat and sensor state, usually the Ecobee API.
///
/// Implementations are shared between concurrent metric collections and are
/// responsible for any synchronization they need internally.
pub trait ThermostatProvider: Send + Sync {
    fn get_thermostats(&self, selection: &Selection) -> Result<Vec<Thermostat>, ClientError>;
}

/// Potential kinds of errors that can be encountered fetching thermostats
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum ClientErrorKind {
    Io,
    Http,
    Decode,
    Authentication,
    Api,
}

impl ClientErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientErrorKind::Io => "io",
            ClientErrorKind::Http => "http",
            ClientErrorKind::Decode => "decode",
            ClientErrorKind::Authentication => "authentication",
            ClientErrorKind::Api => "api",
        }
    }
}

/// Error loading credentials or fetching thermostats from the Ecobee API
#[derive(Debug)]
pub enum ClientError {
    Api(i64, String),
    HttpStatus(u16),
    KindMsg(ClientErrorKind, &'static str),
    KindMsgCause(ClientErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            ClientError::Api(_, _) => ClientErrorKind::Api,
            ClientError::HttpStatus(_) => ClientErrorKind::Http,
            ClientError::KindMsg(kind, _) => *kind,
            ClientError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Api(code, msg) => write!(f, "api error {}: {}", code, msg),
            ClientError::HttpStatus(status) => write!(f, "unexpected HTTP status {}", status),
            ClientError::KindMsg(_, msg) => msg.fmt(f),
            ClientError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
