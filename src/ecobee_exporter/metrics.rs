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

use crate::client::{Capability, Degrees, RemoteSensor, Selection, TenthsOfDegree, Thermostat, ThermostatProvider};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::time::Instant;
use tokio::task;
use tracing::{event, span, Instrument, Level};

const THERMOSTAT_LABELS: &[&str] = &["thermostat_id", "thermostat_name"];
const SENSOR_LABELS: &[&str] = &["thermostat_id", "thermostat_name", "sensor_id", "sensor_name", "sensor_type"];

/// Every metric a `ThermostatCollector` is able to emit, in the order they are described.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    FetchTime,
    ActualTemperature,
    TargetTemperatureMax,
    TargetTemperatureMin,
    Temperature,
    Humidity,
    Occupancy,
    InUse,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::FetchTime,
        Metric::ActualTemperature,
        Metric::TargetTemperatureMax,
        Metric::TargetTemperatureMin,
        Metric::Temperature,
        Metric::Humidity,
        Metric::Occupancy,
        Metric::InUse,
    ];

    /// Name of the metric, without any prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::FetchTime => "fetch_time",
            Metric::ActualTemperature => "actual_temperature",
            Metric::TargetTemperatureMax => "target_temperature_max",
            Metric::TargetTemperatureMin => "target_temperature_min",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Occupancy => "occupancy",
            Metric::InUse => "in_use",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Metric::FetchTime => "elapsed time fetching data via Ecobee API",
            Metric::ActualTemperature => "thermostat-averaged current temperature in degrees",
            Metric::TargetTemperatureMax => "maximum temperature for thermostat to maintain in degrees",
            Metric::TargetTemperatureMin => "minimum temperature for thermostat to maintain in degrees",
            Metric::Temperature => "temperature reported by a sensor in degrees",
            Metric::Humidity => "humidity reported by a sensor in percent",
            Metric::Occupancy => "occupancy reported by a sensor (0 or 1)",
            Metric::InUse => "is sensor being used in thermostat calculations (0 or 1)",
        }
    }

    /// Names of the labels each sample of this metric carries, in order.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Metric::FetchTime => &[],
            Metric::ActualTemperature | Metric::TargetTemperatureMax | Metric::TargetTemperatureMin => {
                THERMOSTAT_LABELS
            }
            Metric::Temperature | Metric::Humidity | Metric::Occupancy | Metric::InUse => SENSOR_LABELS,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Fixed set of Prometheus descriptors, one per `Metric`, sharing a name prefix.
#[derive(Debug)]
pub struct DescriptorSet {
    descs: Vec<Desc>,
}

impl DescriptorSet {
    /// Build descriptors for every `Metric` named `<prefix>_<name>`.
    ///
    /// # Panics
    ///
    /// Panics if the prefix is empty, if any resulting name is not a valid Prometheus
    /// metric name, or if two descriptors end up with the same name.
    pub fn new(prefix: &str) -> Self {
        assert!(!prefix.is_empty(), "metric prefix must not be empty");

        let mut names = HashSet::new();
        let descs = Metric::ALL
            .iter()
            .map(|m| {
                let fq_name = format!("{}_{}", prefix, m.name());
                assert!(names.insert(fq_name.clone()), "duplicate metric name {}", fq_name);

                let labels = m.labels().iter().map(|l| (*l).to_owned()).collect();
                Desc::new(fq_name.clone(), m.help().to_owned(), labels, HashMap::new())
                    .unwrap_or_else(|e| panic!("unable to declare metric {}: {}", fq_name, e))
            })
            .collect();

        DescriptorSet { descs }
    }

    pub fn get(&self, metric: Metric) -> &Desc {
        &self.descs[metric.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Desc> {
        self.descs.iter()
    }
}

/// Value of a single metric along with label values, in the order declared by
/// the metric.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub metric: Metric,
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    fn new(metric: Metric, labels: &[String], value: f64) -> Self {
        Sample {
            metric,
            labels: labels.to_vec(),
            value,
        }
    }
}

/// Prometheus Collector implementation that fetches thermostat and sensor state
/// on every scrape. Each collection performs exactly one fetch and keeps nothing
/// from it afterwards.
pub struct ThermostatCollector<P> {
    provider: P,
    descs: DescriptorSet,
}

impl<P> ThermostatCollector<P>
where
    P: ThermostatProvider,
{
    pub fn new(provider: P, prefix: &str) -> Self {
        Self {
            provider,
            descs: DescriptorSet::new(prefix),
        }
    }

    /// Fetch thermostats and convert them to samples, in the order thermostats,
    /// sensors, and capabilities were returned. The time spent fetching is always
    /// the first sample, even when the fetch fails.
    pub fn samples(&self) -> Vec<Sample> {
        let mut out = Vec::new();
        let start = Instant::now();
        let res = self.provider.get_thermostats(&Selection::registered());
        out.push(Sample::new(Metric::FetchTime, &[], start.elapsed().as_secs_f64()));

        let thermostats = match res {
            Ok(thermostats) => thermostats,
            Err(e) => {
                event!(
                    Level::ERROR,
                    message = "unable to fetch thermostats for metric collection",
                    kind = e.kind().as_label(),
                    error = %e,
                );
                return out;
            }
        };

        event!(
            Level::DEBUG,
            message = "fetched thermostats",
            num_thermostats = thermostats.len(),
        );

        for t in thermostats.iter() {
            thermostat_samples(t, &mut out);
        }

        out
    }
}

impl<P> Collector for ThermostatCollector<P>
where
    P: ThermostatProvider,
{
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        metric_families(&self.descs, self.samples())
    }
}

fn thermostat_samples(t: &Thermostat, out: &mut Vec<Sample>) {
    let labels = [t.identifier.clone(), t.name.clone()];

    if t.runtime.connected {
        let runtime = &t.runtime;
        out.push(Sample::new(Metric::ActualTemperature, &labels, degrees(runtime.actual_temperature)));
        out.push(Sample::new(Metric::TargetTemperatureMax, &labels, degrees(runtime.desired_cool)));
        out.push(Sample::new(Metric::TargetTemperatureMin, &labels, degrees(runtime.desired_heat)));
    }

    for s in t.remote_sensors.iter() {
        sensor_samples(t, s, out);
    }
}

fn sensor_samples(t: &Thermostat, s: &RemoteSensor, out: &mut Vec<Sample>) {
    let labels = [
        t.identifier.clone(),
        t.name.clone(),
        s.id.clone(),
        s.name.clone(),
        s.sensor_type.clone(),
    ];

    out.push(Sample::new(Metric::InUse, &labels, if s.in_use { 1.0 } else { 0.0 }));
    out.extend(s.capabilities.iter().filter_map(|c| capability_sample(c, &labels)));
}

fn capability_sample(c: &Capability, labels: &[String]) -> Option<Sample> {
    match c.capability_type.as_str() {
        "temperature" => parse_value(c)
            .map(|v| Sample::new(Metric::Temperature, labels, degrees(TenthsOfDegree::from(v)))),
        "humidity" => parse_value(c).map(|v| Sample::new(Metric::Humidity, labels, v)),
        "occupancy" => match c.value.as_str() {
            "true" => Some(Sample::new(Metric::Occupancy, labels, 1.0)),
            "false" => Some(Sample::new(Metric::Occupancy, labels, 0.0)),
            _ => {
                event!(
                    Level::ERROR,
                    message = "unknown sensor occupancy value",
                    value = %c.value,
                );
                None
            }
        },
        _ => {
            event!(
                Level::INFO,
                message = "ignoring sensor capability",
                capability = %c.capability_type,
            );
            None
        }
    }
}

fn parse_value(c: &Capability) -> Option<f64> {
    match c.value.parse::<f64>() {
        Ok(v) => Some(v),
        Err(e) => {
            event!(
                Level::ERROR,
                message = "unable to parse sensor capability value",
                capability = %c.capability_type,
                value = %c.value,
                error = %e,
            );
            None
        }
    }
}

fn degrees(v: TenthsOfDegree) -> f64 {
    Degrees::from(v).into()
}

/// Group samples into one gauge family per metric, in descriptor order. Metrics
/// without any samples are left out.
fn metric_families(descs: &DescriptorSet, samples: Vec<Sample>) -> Vec<MetricFamily> {
    let mut by_metric: Vec<Vec<proto::Metric>> = Metric::ALL.iter().map(|_| Vec::new()).collect();

    for s in samples {
        let desc = descs.get(s.metric);
        let mut m = proto::Metric::default();

        for (name, value) in desc.variable_labels.iter().zip(s.labels) {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value);
            m.mut_label().push(pair);
        }

        let mut gauge = proto::Gauge::default();
        gauge.set_value(s.value);
        m.set_gauge(gauge);
        by_metric[s.metric.index()].push(m);
    }

    Metric::ALL
        .iter()
        .zip(by_metric)
        .filter(|(_, metrics)| !metrics.is_empty())
        .map(|(m, metrics)| {
            let desc = descs.get(*m);
            let mut mf = MetricFamily::default();
            mf.set_name(desc.fq_name.clone());
            mf.set_help(desc.help.clone());
            mf.set_field_type(MetricType::GAUGE);

            for metric in metrics {
                mf.mut_metric().push(metric);
            }

            mf
        })
        .collect()
}

/// Error exposing Prometheus metrics in the text exposition format.
#[derive(Debug)]
pub enum ExpositionError {
    Runtime(&'static str, Box<dyn Error + Send + Sync + 'static>),
    Encoding(&'static str, Box<dyn Error + Send + Sync + 'static>),
}

impl fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpositionError::Runtime(msg, ref e) => write!(f, "{}: {}", msg, e),
            ExpositionError::Encoding(msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for ExpositionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExpositionError::Runtime(_, ref e) => Some(e.as_ref()),
            ExpositionError::Encoding(_, ref e) => Some(e.as_ref()),
        }
    }
}

/// Wrapper that exposes metrics from a Prometheus registry in the text exposition format.
///
/// This wrapper gathers all metrics from the registry in a separate thread, managed by the
/// tokio runtime in order to avoid blocking the future it is called from.
#[derive(Debug)]
pub struct MetricsExposition {
    registry: Registry,
}

impl MetricsExposition {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Collect all metrics from the registry and encode them in the Prometheus text exposition
    /// format, returning an error if metrics couldn't be collected or encoded for some reason.
    pub async fn encoded_text(&self) -> Result<Vec<u8>, ExpositionError> {
        let registry = self.registry.clone();

        // Registry::gather() calls the collect() method of each registered collector. The
        // thermostat collector blocks on a request to the Ecobee API, which can take seconds.
        // Run it in a thread pool to avoid blocking the HTTP request future while it does.
        task::spawn_blocking(move || {
            let metric_families = registry.gather();
            let mut buffer = Vec::new();
            let encoder = TextEncoder::new();

            event!(
                Level::DEBUG,
                message = "encoding metric families to text exposition format",
                num_metrics = metric_families.len(),
            );

            encoder
                .encode(&metric_families, &mut buffer)
                .map_err(|e| ExpositionError::Encoding("unable to encode Prometheus metrics", Box::new(e)))
                .map(|_| buffer)
        })
        .instrument(span!(Level::DEBUG, "ecobee_gather"))
        .await
        .map_err(|e| ExpositionError::Runtime("unable to gather Prometheus metrics", Box::new(e)))?
    }
}

#[cfg(test)]
mod test {
    use super::{DescriptorSet, Metric, MetricsExposition, Sample, ThermostatCollector};
    use crate::client::{connected, disconnected, sensor, thermostat, ScriptedProvider, Selection};
    use prometheus::core::Collector;
    use prometheus::proto::MetricType;
    use prometheus::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Layer that counts error and info events so tests can check what was logged.
    #[derive(Clone, Default)]
    struct EventCounts {
        errors: Arc<AtomicUsize>,
        infos: Arc<AtomicUsize>,
    }

    impl EventCounts {
        fn errors(&self) -> usize {
            self.errors.load(Ordering::SeqCst)
        }

        fn infos(&self) -> usize {
            self.infos.load(Ordering::SeqCst)
        }
    }

    impl<S: Subscriber> Layer<S> for EventCounts {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let level = *event.metadata().level();
            if level == Level::ERROR {
                self.errors.fetch_add(1, Ordering::SeqCst);
            } else if level == Level::INFO {
                self.infos.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn collect_samples(provider: ScriptedProvider) -> (Vec<Sample>, EventCounts) {
        let counts = EventCounts::default();
        let subscriber = tracing_subscriber::registry().with(counts.clone());
        let collector = ThermostatCollector::new(provider, "ecobee");
        let samples = tracing::subscriber::with_default(subscriber, || collector.samples());
        (samples, counts)
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    fn sensor_labels(sensor_id: &str, sensor_name: &str) -> Vec<String> {
        labels(&["t1", "Home", sensor_id, sensor_name, "ecobee3_remote_sensor"])
    }

    fn of_metric(samples: &[Sample], metric: Metric) -> Vec<&Sample> {
        samples.iter().filter(|s| s.metric == metric).collect()
    }

    #[test]
    fn test_descriptor_set_names_and_labels() {
        let descs = DescriptorSet::new("ecobee");
        let names: Vec<&str> = descs.iter().map(|d| d.fq_name.as_str()).collect();

        assert_eq!(
            vec![
                "ecobee_fetch_time",
                "ecobee_actual_temperature",
                "ecobee_target_temperature_max",
                "ecobee_target_temperature_min",
                "ecobee_temperature",
                "ecobee_humidity",
                "ecobee_occupancy",
                "ecobee_in_use",
            ],
            names
        );

        assert!(descs.get(Metric::FetchTime).variable_labels.is_empty());
        assert_eq!(
            labels(&["thermostat_id", "thermostat_name"]),
            descs.get(Metric::ActualTemperature).variable_labels
        );
        assert_eq!(
            labels(&["thermostat_id", "thermostat_name", "sensor_id", "sensor_name", "sensor_type"]),
            descs.get(Metric::Occupancy).variable_labels
        );
    }

    #[test]
    #[should_panic]
    fn test_descriptor_set_empty_prefix() {
        DescriptorSet::new("");
    }

    #[test]
    #[should_panic]
    fn test_descriptor_set_invalid_prefix() {
        DescriptorSet::new("not a metric");
    }

    #[test]
    fn test_collector_desc_idempotent() {
        let collector = ThermostatCollector::new(ScriptedProvider::thermostats(vec![]), "ecobee");
        let first: Vec<String> = collector.desc().iter().map(|d| d.fq_name.clone()).collect();
        let second: Vec<String> = collector.desc().iter().map(|d| d.fq_name.clone()).collect();
        let first_ids: Vec<u64> = collector.desc().iter().map(|d| d.id).collect();
        let second_ids: Vec<u64> = collector.desc().iter().map(|d| d.id).collect();

        assert_eq!(Metric::ALL.len(), first.len());
        assert_eq!(first, second);
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_samples_selection() {
        let collector = ThermostatCollector::new(ScriptedProvider::thermostats(vec![]), "ecobee");
        let _ = collector.samples();
        let _ = collector.samples();

        assert_eq!(
            vec![Selection::registered(), Selection::registered()],
            collector.provider.selections()
        );
    }

    #[test]
    fn test_samples_fetch_failure() {
        let (samples, counts) = collect_samples(ScriptedProvider::failure("connection refused"));

        assert_eq!(1, samples.len());
        assert_eq!(Metric::FetchTime, samples[0].metric);
        assert!(samples[0].labels.is_empty());
        assert!(samples[0].value >= 0.0);
        assert_eq!(1, counts.errors());
    }

    #[test]
    fn test_samples_connected_runtime() {
        let thermostats = vec![thermostat("t1", "Home", connected(705.0, 680.0, 750.0), vec![])];
        let (samples, counts) = collect_samples(ScriptedProvider::thermostats(thermostats));
        let tlabels = labels(&["t1", "Home"]);

        assert_eq!(4, samples.len());
        assert_eq!(Metric::FetchTime, samples[0].metric);
        assert_eq!(Sample::new(Metric::ActualTemperature, &tlabels, 70.5), samples[1]);
        assert_eq!(Sample::new(Metric::TargetTemperatureMax, &tlabels, 75.0), samples[2]);
        assert_eq!(Sample::new(Metric::TargetTemperatureMin, &tlabels, 68.0), samples[3]);
        assert_eq!(0, counts.errors());
    }

    #[test]
    fn test_samples_disconnected_runtime() {
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            disconnected(),
            vec![sensor("rs:100", "Bedroom", false, &[])],
        )];
        let (samples, _) = collect_samples(ScriptedProvider::thermostats(thermostats));

        assert!(of_metric(&samples, Metric::ActualTemperature).is_empty());
        assert!(of_metric(&samples, Metric::TargetTemperatureMax).is_empty());
        assert!(of_metric(&samples, Metric::TargetTemperatureMin).is_empty());
        assert_eq!(
            vec![&Sample::new(Metric::InUse, &sensor_labels("rs:100", "Bedroom"), 0.0)],
            of_metric(&samples, Metric::InUse)
        );
    }

    #[test]
    fn test_samples_sensor_capabilities() {
        let capabilities = [
            ("temperature", "213"),
            ("humidity", "45"),
            ("occupancy", "true"),
            ("co2", "400"),
        ];
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            disconnected(),
            vec![sensor("rs:100", "Bedroom", true, &capabilities)],
        )];
        let (samples, counts) = collect_samples(ScriptedProvider::thermostats(thermostats));
        let slabels = sensor_labels("rs:100", "Bedroom");

        assert_eq!(
            vec![
                Sample::new(Metric::InUse, &slabels, 1.0),
                Sample::new(Metric::Temperature, &slabels, 21.3),
                Sample::new(Metric::Humidity, &slabels, 45.0),
                Sample::new(Metric::Occupancy, &slabels, 1.0),
            ],
            samples[1..].to_vec()
        );
        assert_eq!(0, counts.errors());
        assert_eq!(1, counts.infos());
    }

    #[test]
    fn test_samples_unparsable_temperature() {
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            disconnected(),
            vec![
                sensor("rs:100", "Bedroom", true, &[("temperature", "abc"), ("humidity", "51")]),
                sensor("rs:101", "Kitchen", false, &[("temperature", "695")]),
            ],
        )];
        let (samples, counts) = collect_samples(ScriptedProvider::thermostats(thermostats));

        assert_eq!(
            vec![&Sample::new(Metric::Temperature, &sensor_labels("rs:101", "Kitchen"), 69.5)],
            of_metric(&samples, Metric::Temperature)
        );
        assert_eq!(
            vec![&Sample::new(Metric::Humidity, &sensor_labels("rs:100", "Bedroom"), 51.0)],
            of_metric(&samples, Metric::Humidity)
        );
        assert_eq!(2, of_metric(&samples, Metric::InUse).len());
        assert_eq!(1, counts.errors());
    }

    #[test]
    fn test_samples_unparsable_humidity() {
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            disconnected(),
            vec![sensor("rs:100", "Bedroom", true, &[("humidity", "")])],
        )];
        let (samples, counts) = collect_samples(ScriptedProvider::thermostats(thermostats));

        assert!(of_metric(&samples, Metric::Humidity).is_empty());
        assert_eq!(1, counts.errors());
    }

    #[test]
    fn test_samples_occupancy_values() {
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            disconnected(),
            vec![
                sensor("rs:100", "Bedroom", true, &[("occupancy", "false")]),
                sensor("rs:101", "Kitchen", true, &[("occupancy", "TRUE")]),
                sensor("rs:102", "Office", true, &[("occupancy", "true")]),
            ],
        )];
        let (samples, counts) = collect_samples(ScriptedProvider::thermostats(thermostats));

        assert_eq!(
            vec![
                &Sample::new(Metric::Occupancy, &sensor_labels("rs:100", "Bedroom"), 0.0),
                &Sample::new(Metric::Occupancy, &sensor_labels("rs:102", "Office"), 1.0),
            ],
            of_metric(&samples, Metric::Occupancy)
        );
        assert_eq!(1, counts.errors());
    }

    #[test]
    fn test_samples_thermostat_order() {
        let thermostats = vec![
            thermostat("t2", "Upstairs", connected(700.0, 650.0, 780.0), vec![]),
            thermostat("t1", "Home", connected(705.0, 680.0, 750.0), vec![]),
        ];
        let (samples, _) = collect_samples(ScriptedProvider::thermostats(thermostats));
        let actual = of_metric(&samples, Metric::ActualTemperature);

        assert_eq!(2, actual.len());
        assert_eq!(labels(&["t2", "Upstairs"]), actual[0].labels);
        assert_eq!(labels(&["t1", "Home"]), actual[1].labels);
    }

    #[test]
    fn test_collect_metric_families() {
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            connected(705.0, 680.0, 750.0),
            vec![
                sensor("rs:100", "Bedroom", true, &[("temperature", "213")]),
                sensor("rs:101", "Kitchen", false, &[("temperature", "690")]),
            ],
        )];
        let collector = ThermostatCollector::new(ScriptedProvider::thermostats(thermostats), "ecobee");
        let families = collector.collect();
        let names: Vec<&str> = families.iter().map(|mf| mf.get_name()).collect();

        assert_eq!(
            vec![
                "ecobee_fetch_time",
                "ecobee_actual_temperature",
                "ecobee_target_temperature_max",
                "ecobee_target_temperature_min",
                "ecobee_temperature",
                "ecobee_in_use",
            ],
            names
        );

        let temperature = &families[4];
        assert_eq!(MetricType::GAUGE, temperature.get_field_type());
        assert_eq!("temperature reported by a sensor in degrees", temperature.get_help());
        assert_eq!(2, temperature.get_metric().len());

        let first = &temperature.get_metric()[0];
        let pairs: Vec<(&str, &str)> = first
            .get_label()
            .iter()
            .map(|p| (p.get_name(), p.get_value()))
            .collect();

        assert_eq!(
            vec![
                ("thermostat_id", "t1"),
                ("thermostat_name", "Home"),
                ("sensor_id", "rs:100"),
                ("sensor_name", "Bedroom"),
                ("sensor_type", "ecobee3_remote_sensor"),
            ],
            pairs
        );
        assert_eq!(21.3, first.get_gauge().get_value());
    }

    #[test]
    fn test_collect_fetch_failure() {
        let collector = ThermostatCollector::new(ScriptedProvider::failure("timeout"), "ecobee");
        let families = collector.collect();

        assert_eq!(1, families.len());
        assert_eq!("ecobee_fetch_time", families[0].get_name());
        assert_eq!(1, families[0].get_metric().len());
        assert!(families[0].get_metric()[0].get_label().is_empty());
    }

    #[tokio::test]
    async fn test_exposition_encoded_text() {
        let thermostats = vec![thermostat(
            "t1",
            "Home",
            connected(705.0, 680.0, 750.0),
            vec![sensor("rs:100", "Bedroom", true, &[("temperature", "213")])],
        )];
        let registry = Registry::new();
        registry
            .register(Box::new(ThermostatCollector::new(
                ScriptedProvider::thermostats(thermostats),
                "ecobee",
            )))
            .unwrap();

        let exposition = MetricsExposition::new(registry);
        let text = String::from_utf8(exposition.encoded_text().await.unwrap()).unwrap();

        assert!(text.contains("# TYPE ecobee_fetch_time gauge"));
        assert!(text.contains("# HELP ecobee_temperature temperature reported by a sensor in degrees"));
        assert!(text.contains("ecobee_actual_temperature{thermostat_id=\"t1\",thermostat_name=\"Home\"} 70.5"));
        assert!(text.contains(
            "ecobee_temperature{thermostat_id=\"t1\",thermostat_name=\"Home\",sensor_id=\"rs:100\",\
             sensor_name=\"Bedroom\",sensor_type=\"ecobee3_remote_sensor\"} 21.3"
        ));
    }

    #[test]
    fn test_registry_rejects_same_prefix_twice() {
        let registry = Registry::new();
        let first = ThermostatCollector::new(ScriptedProvider::thermostats(vec![]), "ecobee");
        let second = ThermostatCollector::new(ScriptedProvider::thermostats(vec![]), "ecobee");

        assert!(registry.register(Box::new(first)).is_ok());
        assert!(registry.register(Box::new(second)).is_err());
    }
}
