//! Linear mass and energy balance of a power-to-ammonia plant.
//!
//! Every stream scales with the electrolysis power relative to a 2997 MW
//! reference plant.

use serde::Serialize;

use super::round_to;
use crate::error::{ServiceError, ServiceResult};

/// Electrolysis power of the reference plant (MW).
pub const REFERENCE_MW: f64 = 2997.0;
/// Default electrolysis power (MW).
pub const DEFAULT_MW: f64 = 1000.0;

// Reference plant streams at REFERENCE_MW.
const HYDROGEN_NM3_H: f64 = 592_000.0;
const OXYGEN_NM3_H: f64 = 295_504.0;
const NITROGEN_NM3_H: f64 = 201_406.0;
const AMMONIA_T_H: f64 = 291.7;
const TAIL_GAS_NM3_H: f64 = 4252.0;
const WATER_T_H: f64 = 530.0;
const COOLING_WATER_T_H: f64 = 41_316.0;

/// Plant streams for a given electrolysis power, each rounded to 0.1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmmoniaBalance {
    /// Electrolysis power (MW).
    pub mw: f64,
    /// Dry hydrogen produced (Nm³/h).
    pub hydrogen_nm3_h: f64,
    /// Oxygen produced (Nm³/h).
    pub oxygen_nm3_h: f64,
    /// Nitrogen required for Haber-Bosch (Nm³/h).
    pub nitrogen_nm3_h: f64,
    /// Liquid ammonia produced (t/h).
    pub ammonia_t_h: f64,
    /// Dry tail gas to flare (Nm³/h).
    pub tail_gas_nm3_h: f64,
    /// Water for electrolysis (t/h).
    pub water_t_h: f64,
    /// Cooling water for electrolysis (t/h).
    pub cooling_water_t_h: f64,
}

/// Scales the reference plant to `mw` of electrolysis power.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidInput`] if `mw` is negative or not finite.
pub fn ammonia_balance(mw: f64) -> ServiceResult<AmmoniaBalance> {
    if !mw.is_finite() || mw < 0.0 {
        return Err(ServiceError::InvalidInput(
            "mw must be a non-negative number".into(),
        ));
    }
    let scale = |reference: f64| round_to(reference / REFERENCE_MW * mw, 1);
    Ok(AmmoniaBalance {
        mw,
        hydrogen_nm3_h: scale(HYDROGEN_NM3_H),
        oxygen_nm3_h: scale(OXYGEN_NM3_H),
        nitrogen_nm3_h: scale(NITROGEN_NM3_H),
        ammonia_t_h: scale(AMMONIA_T_H),
        tail_gas_nm3_h: scale(TAIL_GAS_NM3_H),
        water_t_h: scale(WATER_T_H),
        cooling_water_t_h: scale(COOLING_WATER_T_H),
    })
}
