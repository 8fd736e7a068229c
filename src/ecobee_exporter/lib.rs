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

//! Export Ecobee thermostat and remote sensor readings as Prometheus metrics.
//!
//! ## Features
//!
//! `ecobee_exporter` fetches the state of every thermostat registered to an Ecobee account
//! using the [Ecobee API] each time it is scraped by Prometheus and emits it as metrics. The
//! following metrics are emitted (names shown with the default `ecobee` prefix).
//!
//! * `ecobee_fetch_time` - Seconds spent fetching data from the Ecobee API for this scrape.
//! * `ecobee_actual_temperature{thermostat_id, thermostat_name}` - Current temperature, averaged
//!   over all sensors in use, in degrees.
//! * `ecobee_target_temperature_max{thermostat_id, thermostat_name}` - Cooling setpoint, in degrees.
//! * `ecobee_target_temperature_min{thermostat_id, thermostat_name}` - Heating setpoint, in degrees.
//! * `ecobee_temperature{thermostat_id, thermostat_name, sensor_id, sensor_name, sensor_type}` -
//!   Temperature measured by a sensor, in degrees.
//! * `ecobee_humidity{...}` - Relative humidity (0-100) measured by a sensor.
//! * `ecobee_occupancy{...}` - Whether a sensor detects occupancy (0 or 1).
//! * `ecobee_in_use{...}` - Whether a sensor is used by the thermostat (0 or 1).
//!
//! Thermostat runtime metrics are only emitted for thermostats connected to the Ecobee
//! servers. If the Ecobee API can't be reached, only `ecobee_fetch_time` is emitted.
//!
//! [Ecobee API]: https://www.ecobee.com/home/developer/api/introduction/index.shtml
//!
//! ## Build
//!
//! `ecobee_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ### Credentials
//!
//! `ecobee_exporter` needs an application key from the Ecobee developer portal and a token
//! cache file containing OAuth tokens authorized (via the PIN flow) for your account. The
//! cache file is JSON and looks like the example below. It is rewritten whenever the tokens
//! are refreshed so it must be writable by `ecobee_exporter`.
//!
//! ```text
//! {"access_token": "...", "refresh_token": "...", "token_type": "Bearer"}
//! ```
//!
//! ### Run
//!
//! ```text
//! ./ecobee_exporter --app-id YOUR_APP_KEY --cache-file /var/lib/ecobee_exporter/tokens.json
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9783` at `/metrics`. The Ecobee API only updates
//! thermostat data every few minutes, so scraping more often than once a minute has no benefit.
//!
//! ```yaml
//! # Sample config for Prometheus.
//!
//! global:
//!   scrape_interval:     1m
//!   evaluation_interval: 1m
//!   external_labels:
//!       monitor: 'my_prom'
//!
//! scrape_configs:
//!   - job_name: ecobee_exporter
//!     static_configs:
//!       - targets: ['example:9783']
//! ```
//!

pub mod client;
pub mod http;
pub mod metrics;
