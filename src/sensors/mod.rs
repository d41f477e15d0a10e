//! Reading providers
//!
//! Sensor acquisition proper (DHT11/DS18B20 driver stacks) lives outside the
//! core; the protocol only pulls [`Reading`]s through the [`ReadingSource`]
//! trait. Each provider enforces its own minimum re-sample interval so the
//! duty cycle cannot poke slow hardware faster than it can measure.
//!
//! [`LastGood`] implements the transient-failure policy: a failed sample is
//! logged with its classification and replaced by the last successfully
//! measured value, never aborting the batch.

use crate::error::Result;
use crate::wire::{fixed2, Reading};
use std::time::{Duration, Instant};

/// Pull-based provider of one hive's readings
pub trait ReadingSource: Send {
    /// Logical source identifier carried in every reading
    fn hive_name(&self) -> &str;

    /// Produce the current reading
    ///
    /// Implementations re-measure at most once per their minimum re-sample
    /// interval and may return a cached measurement in between.
    fn sample(&mut self) -> Result<Reading>;
}

impl ReadingSource for Box<dyn ReadingSource> {
    fn hive_name(&self) -> &str {
        self.as_ref().hive_name()
    }

    fn sample(&mut self) -> Result<Reading> {
        self.as_mut().sample()
    }
}

/// Gateway board temperature for the status heartbeat
pub trait TemperatureProbe: Send {
    fn read_celsius(&mut self) -> Result<f64>;
}

/// Last-good-value fallback around any [`ReadingSource`]
///
/// Before the first successful sample the fallback is a zeroed temperature,
/// matching the underlying drivers' initial state.
pub struct LastGood<S> {
    inner: S,
    last: Option<Reading>,
}

impl<S: ReadingSource> LastGood<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, last: None }
    }

    fn fallback(&self) -> Reading {
        self.last
            .clone()
            .unwrap_or_else(|| Reading::new(self.inner.hive_name(), 0.0))
    }
}

impl<S: ReadingSource> ReadingSource for LastGood<S> {
    fn hive_name(&self) -> &str {
        self.inner.hive_name()
    }

    fn sample(&mut self) -> Result<Reading> {
        match self.inner.sample() {
            Ok(reading) => {
                self.last = Some(reading.clone());
                Ok(reading)
            }
            Err(e) => {
                log::warn!(
                    "sensor {} failed ({e}), substituting last good value",
                    self.inner.hive_name()
                );
                Ok(self.fallback())
            }
        }
    }
}

/// Deterministic bench source for running without sensor hardware
///
/// Produces a slow triangle wobble around a base temperature, with an
/// optional humidity track, honoring a minimum re-sample interval the way a
/// real driver would.
pub struct SimulatedSensor {
    name: String,
    base_temperature: f64,
    humidity: Option<f64>,
    min_interval: Duration,
    last_measured: Option<Instant>,
    cached: Option<Reading>,
    tick: u32,
}

impl SimulatedSensor {
    pub fn new(name: impl Into<String>, base_temperature: f64, min_interval: Duration) -> Self {
        Self {
            name: name.into(),
            base_temperature,
            humidity: None,
            min_interval,
            last_measured: None,
            cached: None,
            tick: 0,
        }
    }

    /// Also report a humidity track around the given base value
    pub fn with_humidity(mut self, base: f64) -> Self {
        self.humidity = Some(base);
        self
    }

    fn measure(&mut self) -> Reading {
        self.tick = self.tick.wrapping_add(1);
        // Triangle wave, ±0.25 over a 10-sample period
        let phase = (self.tick % 10) as f64;
        let wobble = (5.0 - (phase - 5.0).abs()) * 0.05;
        let mut reading = Reading::new(&self.name, self.base_temperature + wobble);
        if let Some(h) = self.humidity {
            reading.humidity = Some(fixed2(h - wobble));
        }
        reading
    }
}

impl ReadingSource for SimulatedSensor {
    fn hive_name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self) -> Result<Reading> {
        let stale = match self.last_measured {
            Some(at) => at.elapsed() >= self.min_interval,
            None => true,
        };
        if stale || self.cached.is_none() {
            self.last_measured = Some(Instant::now());
            let reading = self.measure();
            self.cached = Some(reading);
        }
        // Cached value is always present here
        Ok(self.cached.clone().unwrap_or_else(|| Reading::new(&self.name, 0.0)))
    }
}

/// Raw board temperature sensor
///
/// The SoC register reports Fahrenheit; [`BoardThermometer`] owns the
/// conversion so every consumer sees Celsius.
pub trait RawBoardSensor: Send {
    fn read_fahrenheit(&mut self) -> Result<f64>;
}

/// Board thermometer over a raw-Fahrenheit sensor
pub struct BoardThermometer<R> {
    raw: R,
}

impl<R: RawBoardSensor> BoardThermometer<R> {
    pub fn new(raw: R) -> Self {
        Self { raw }
    }
}

impl<R: RawBoardSensor> TemperatureProbe for BoardThermometer<R> {
    fn read_celsius(&mut self) -> Result<f64> {
        Ok((self.raw.read_fahrenheit()? - 32.0) / 1.8)
    }
}

/// Deterministic raw board sensor for bench gateways
///
/// Wobbles around a base Fahrenheit value the same way [`SimulatedSensor`]
/// wobbles its hive temperature, so successive heartbeats vary.
pub struct SimulatedBoardSensor {
    base_fahrenheit: f64,
    tick: u32,
}

impl SimulatedBoardSensor {
    pub fn new(base_fahrenheit: f64) -> Self {
        Self {
            base_fahrenheit,
            tick: 0,
        }
    }
}

impl RawBoardSensor for SimulatedBoardSensor {
    fn read_fahrenheit(&mut self) -> Result<f64> {
        self.tick = self.tick.wrapping_add(1);
        let phase = (self.tick % 10) as f64;
        let wobble = (5.0 - (phase - 5.0).abs()) * 0.1;
        Ok(self.base_fahrenheit + wobble)
    }
}
