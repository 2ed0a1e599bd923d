//! `POST /sensors` - hardware knob bridge
//!
//! A microcontroller posts raw 12-bit potentiometer readings; they become a
//! `parameters` message sent to every client.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use splice_core::engine::Knobs;
use splice_core::sync::SyncMessage;
use splice_core::NUM_KNOBS;

use crate::app::AppState;

/// Full-scale ADC reading
pub const POT_MAX: f32 = 4095.0;

/// Raw readings; absent pots keep the knob's current value
#[derive(Debug, Default, Deserialize)]
pub struct SensorReading {
    pub pot1: Option<u16>,
    pub pot2: Option<u16>,
    pub pot3: Option<u16>,
    pub pot4: Option<u16>,
}

impl SensorReading {
    /// Overlay the posted pots on `base`
    pub fn knobs_over(&self, base: Knobs) -> Knobs {
        let pots: [Option<u16>; NUM_KNOBS] = [self.pot1, self.pot2, self.pot3, self.pot4];
        let mut knobs = base;
        for (index, pot) in pots.iter().enumerate() {
            if let Some(raw) = pot {
                knobs.set(index, *raw as f32 / POT_MAX);
            }
        }
        knobs
    }
}

pub async fn handler(
    State(state): State<AppState>,
    Json(reading): Json<SensorReading>,
) -> (StatusCode, &'static str) {
    let base = state.hub.latest_knobs().unwrap_or_default();
    let message = SyncMessage::Parameters {
        knobs: reading.knobs_over(base),
    };
    match state.hub.broadcast(&message) {
        Ok(()) => (StatusCode::OK, "great!"),
        Err(e) => {
            log::error!("sensors: failed to encode parameters: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "encode failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pots_scale_to_unit_range() {
        let reading = SensorReading {
            pot1: Some(4095),
            pot2: Some(0),
            pot3: Some(2048),
            pot4: None,
        };
        let knobs = reading.knobs_over(Knobs::default());
        assert_eq!(knobs.0[0], 1.0);
        assert_eq!(knobs.0[1], 0.0);
        assert!((knobs.0[2] - 0.5001).abs() < 1e-3);
        assert_eq!(knobs.0[3], Knobs::default().0[3]);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let reading = SensorReading {
            pot1: Some(9000),
            ..Default::default()
        };
        assert_eq!(reading.knobs_over(Knobs::default()).0[0], 1.0);
    }

    #[test]
    fn test_absent_pots_keep_stored_values() {
        let stored = Knobs([0.2, 0.4, 0.6, 0.8]);
        let reading = SensorReading {
            pot2: Some(0),
            ..Default::default()
        };
        assert_eq!(reading.knobs_over(stored).0, [0.2, 0.0, 0.6, 0.8]);
    }
}
