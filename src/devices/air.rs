//! Greenhouse air sensor

use super::round1;
use crate::device::TelemetrySource;
use greenhouse_shared::TelemetryMessage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const INFO_GROUP: &str = "general-info";

pub struct AirSensor {
    rng: StdRng,
}

impl AirSensor {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Relative humidity in 35..=70
    pub fn read_humidity(&mut self) -> i64 {
        35 + self.rng.gen_range(0..=35)
    }

    /// Temperature in 22.0..=32.0, one decimal
    pub fn read_temperature(&mut self) -> f64 {
        round1(22.0 + self.rng.gen::<f64>() * 10.0)
    }
}

impl Default for AirSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for AirSensor {
    fn next_message(&mut self) -> TelemetryMessage {
        let humidity = self.read_humidity();
        let temperature = self.read_temperature();
        TelemetryMessage::new(INFO_GROUP)
            .measurement("humidity", humidity)
            .measurement("temperature", temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_stay_in_range() {
        let mut air = AirSensor::with_rng(StdRng::seed_from_u64(11));
        for _ in 0..500 {
            let humidity = air.read_humidity();
            assert!((35..=70).contains(&humidity));
            let temperature = air.read_temperature();
            assert!((22.0..=32.0).contains(&temperature));
        }
    }

    #[test]
    fn test_message_uses_general_group() {
        let message = AirSensor::new().next_message();
        assert_eq!(message.info_group, "general-info");
        assert_eq!(message.measurements.len(), 2);
    }
}
