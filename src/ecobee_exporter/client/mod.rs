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

mod core;
mod ecobee;

pub use crate::client::core::{
    Capability, ClientError, ClientErrorKind, Degrees, RemoteSensor, Runtime, Selection, TenthsOfDegree, Thermostat,
    ThermostatProvider,
};
pub use crate::client::ecobee::{ClientConfig, EcobeeClient, DEFAULT_API_URL, DEFAULT_TIMEOUT};

#[cfg(test)]
pub(crate) use crate::client::test::{connected, disconnected, sensor, thermostat, ScriptedProvider};
