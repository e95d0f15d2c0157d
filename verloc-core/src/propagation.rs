use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::*;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationModel {
    /// Signal travels at two thirds of the speed of light (fibre).
    TwoThirdsC,
    OneThirdC,
    /// Curve fit to measured internet latencies. Its value is a speed.
    #[default]
    Empirical,
}

impl PropagationModel {
    /// Seconds for the constant-speed models, m/s for `Empirical`. Use
    /// [`Self::modelled_time`] when a time is needed.
    pub fn propagation_time(&self, distance_m: f64) -> f64 {
        let value = match self {
            Self::TwoThirdsC => distance_m / (2.0 / 3.0 * SPEED_OF_LIGHT_M_S),
            Self::OneThirdC => distance_m / (1.0 / 3.0 * SPEED_OF_LIGHT_M_S),
            Self::Empirical => {
                EMPIRICAL_A * (EMPIRICAL_B * distance_m).exp()
                    - EMPIRICAL_C * (-EMPIRICAL_D * distance_m).exp()
            }
        };
        if value.is_finite() {
            value
        } else {
            warn!(model = %self, distance_m, "propagation model evaluation failed");
            0.0
        }
    }

    /// Speed in m/s the model assumes over `distance_m`. Zero when the
    /// model cannot be evaluated.
    pub fn implied_speed(&self, distance_m: f64) -> f64 {
        match self {
            Self::TwoThirdsC => 2.0 / 3.0 * SPEED_OF_LIGHT_M_S,
            Self::OneThirdC => 1.0 / 3.0 * SPEED_OF_LIGHT_M_S,
            Self::Empirical => self.propagation_time(distance_m),
        }
    }

    pub fn modelled_time(&self, distance_m: f64) -> f64 {
        let speed = self.implied_speed(distance_m);
        if speed > 0.0 {
            distance_m / speed
        } else {
            0.0
        }
    }
}

impl fmt::Display for PropagationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TwoThirdsC => "two_thirds_c",
            Self::OneThirdC => "one_third_c",
            Self::Empirical => "empirical",
        };
        f.write_str(name)
    }
}

impl FromStr for PropagationModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "2/3c" | "two_thirds_c" => Ok(Self::TwoThirdsC),
            "1/3c" | "one_third_c" => Ok(Self::OneThirdC),
            "paper" | "empirical" => Ok(Self::Empirical),
            other => Err(Error::Config(format!("unknown propagation model: {other}"))),
        }
    }
}

pub fn two_thirds_c_distance(time_s: f64) -> f64 {
    2.0 / 3.0 * SPEED_OF_LIGHT_M_S * time_s
}
