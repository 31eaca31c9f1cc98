//! Soil moisture and acidity sensor

use super::round1;
use crate::device::TelemetrySource;
use greenhouse_shared::{zone_label_of, TelemetryMessage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const INITIAL_HUMIDITY: i64 = 80;
const PH_BASE: f64 = 5.4;
const PH_SPAN: f64 = 1.4;

/// Simulated soil probe. Humidity only ever decreases between readings.
pub struct SoilSensor {
    zone: String,
    humidity: i64,
    rng: StdRng,
}

impl SoilSensor {
    pub fn new(device_id: &str) -> Self {
        Self::with_rng(device_id, StdRng::from_entropy())
    }

    pub fn with_rng(device_id: &str, rng: StdRng) -> Self {
        Self {
            zone: zone_label_of(device_id),
            humidity: INITIAL_HUMIDITY,
            rng,
        }
    }

    /// Dry out by 1..=3 points. There is no floor.
    pub fn read_humidity(&mut self) -> i64 {
        self.humidity -= self.rng.gen_range(1..=3);
        self.humidity
    }

    pub fn read_ph(&mut self) -> f64 {
        round1(PH_BASE + self.rng.gen::<f64>() * PH_SPAN)
    }
}

impl TelemetrySource for SoilSensor {
    fn next_message(&mut self) -> TelemetryMessage {
        let humidity = self.read_humidity();
        let ph = self.read_ph();
        TelemetryMessage::new(self.zone.clone())
            .measurement("humidity", humidity)
            .measurement("ph", ph)
    }
}
