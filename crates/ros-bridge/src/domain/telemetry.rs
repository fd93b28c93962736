//! Latest-value cache for physiology channels.
//!
//! The physiology engine publishes each channel roughly five times a second.
//! The bridge keeps only the most recent value per channel, already rendered
//! as text, so outbound messages can embed it without reformatting.

use std::collections::HashMap;

/// Channel names the bridge knows about.
pub mod channels {
    /// Heart rate in beats per minute.
    pub const HEART_RATE: &str = "Cardiovascular_HeartRate";
    /// Systolic arterial pressure.
    pub const SYSTOLIC_PRESSURE: &str = "Cardiovascular_Arterial_Systolic_Pressure";
    /// Diastolic arterial pressure.
    pub const DIASTOLIC_PRESSURE: &str = "Cardiovascular_Arterial_Diastolic_Pressure";
    /// Oxygen saturation.
    pub const OXYGEN_SATURATION: &str = "BloodChemistry_Oxygen_Saturation";
    /// End-tidal CO2.
    pub const END_TIDAL_CO2: &str = "Respiration_EndTidalCarbonDioxide";
    /// Respiration rate.
    pub const RESPIRATION_RATE: &str = "Respiratory_Respiration_Rate";
    /// Core temperature.
    pub const CORE_TEMPERATURE: &str = "Energy_Core_Temperature";
    /// Simulated time in seconds.  Updates once per simulation tick and
    /// paces the outbound telemetry report.
    pub const SIM_TIME: &str = "SIM_TIME";

    /// Channels seeded with `"0"` when the bridge starts.
    pub const KNOWN: [&str; 8] = [
        HEART_RATE,
        SYSTOLIC_PRESSURE,
        DIASTOLIC_PRESSURE,
        OXYGEN_SATURATION,
        END_TIDAL_CO2,
        RESPIRATION_RATE,
        CORE_TEMPERATURE,
        SIM_TIME,
    ];
}

/// Channel name → latest value as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryCache {
    values: HashMap<String, String>,
}

impl TelemetryCache {
    /// Creates a cache with every [`channels::KNOWN`] channel set to `"0"`.
    pub fn seeded() -> Self {
        let values = channels::KNOWN
            .iter()
            .map(|name| (name.to_string(), "0".to_string()))
            .collect();
        Self { values }
    }

    /// Stores `value` for `channel` and returns the stored text.
    ///
    /// NaN values are filtered: the cache is left untouched and `None` is
    /// returned.  [`channels::SIM_TIME`] is stored in fixed-point notation
    /// with one decimal; every other channel uses the shortest round-trip
    /// text of the value.
    pub fn update(&mut self, channel: &str, value: f64) -> Option<&str> {
        if value.is_nan() {
            return None;
        }
        let text = format_value(channel, value);
        let slot = self.values.entry(channel.to_string()).or_default();
        *slot = text;
        Some(slot.as_str())
    }

    /// Returns the cached text for `channel`, if any.
    pub fn get(&self, channel: &str) -> Option<&str> {
        self.values.get(channel).map(String::as_str)
    }

    /// Drops every cached value.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of channels with a cached value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no channel has a cached value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Renders a channel value for caching.
pub fn format_value(channel: &str, value: f64) -> String {
    if channel == channels::SIM_TIME {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_cache_holds_zero_for_known_channels() {
        let cache = TelemetryCache::seeded();
        assert_eq!(cache.len(), channels::KNOWN.len());
        assert_eq!(cache.get(channels::HEART_RATE), Some("0"));
    }

    #[test]
    fn test_update_overwrites_previous_value() {
        // Arrange
        let mut cache = TelemetryCache::seeded();

        // Act
        cache.update(channels::HEART_RATE, 72.0);
        cache.update(channels::HEART_RATE, 75.5);

        // Assert
        assert_eq!(cache.get(channels::HEART_RATE), Some("75.5"));
    }

    #[test]
    fn test_nan_update_is_ignored() {
        // Arrange
        let mut cache = TelemetryCache::seeded();
        cache.update(channels::HEART_RATE, 72.0);

        // Act
        let stored = cache.update(channels::HEART_RATE, f64::NAN);

        // Assert
        assert_eq!(stored, None);
        assert_eq!(cache.get(channels::HEART_RATE), Some("72"));
    }

    #[test]
    fn test_nan_update_for_new_channel_does_not_create_entry() {
        let mut cache = TelemetryCache::default();
        cache.update("Renal_UrineOutput", f64::NAN);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sim_time_uses_one_fixed_decimal() {
        let mut cache = TelemetryCache::default();
        assert_eq!(cache.update(channels::SIM_TIME, 12.34), Some("12.3"));
        assert_eq!(cache.update(channels::SIM_TIME, 5.0), Some("5.0"));
        assert_eq!(cache.update(channels::SIM_TIME, 1.0e7), Some("10000000.0"));
    }

    #[test]
    fn test_clear_removes_every_channel() {
        // Arrange
        let mut cache = TelemetryCache::seeded();
        cache.update("Custom_Channel", 1.0);

        // Act
        cache.clear();

        // Assert
        assert!(cache.is_empty());
        assert_eq!(cache.get(channels::HEART_RATE), None);
        assert_eq!(cache.get("Custom_Channel"), None);
    }

    #[test]
    fn test_other_channels_keep_plain_formatting() {
        assert_eq!(format_value(channels::HEART_RATE, 72.0), "72");
        assert_eq!(format_value(channels::OXYGEN_SATURATION, 0.97), "0.97");
    }
}
