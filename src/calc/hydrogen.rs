//! Levelized cost of hydrogen from an annuity on electrolyser capex.

use serde::{Deserialize, Serialize};

use super::round_to;
use crate::error::{ServiceError, ServiceResult};

const HOURS_PER_YEAR: f64 = 8760.0;
/// Fixed O&M as a share of total capex per year.
const OPEX_SHARE: f64 = 0.03;
/// Assumed electrolyser capacity factor.
const CAPACITY_FACTOR: f64 = 0.5;

/// Inputs of the LCOH calculation. Missing fields take the reference
/// plant's values.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LcohInputs {
    /// Electricity price ($/MWh).
    pub elec_price: f64,
    /// Specific electrolyser capex ($/kW).
    pub capex: f64,
    /// Electrolyser capacity (kW).
    pub capacity: f64,
    /// Annual hydrogen production (kg/yr).
    pub h2prod: f64,
    /// Economic lifetime (yr).
    pub lifetime: u32,
    /// Discount rate (fraction).
    pub discount: f64,
}

impl Default for LcohInputs {
    fn default() -> Self {
        Self {
            elec_price: 40.0,
            capex: 1000.0,
            capacity: 10_000.0,
            h2prod: 450_000.0,
            lifetime: 20,
            discount: 0.08,
        }
    }
}

/// Annual cost components and the resulting LCOH.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LcohBreakdown {
    pub inputs: LcohInputs,
    /// Total installed capex ($).
    pub capex_total: f64,
    /// Capital recovery per year ($/yr).
    pub annuity: f64,
    /// Fixed O&M per year ($/yr).
    pub opex: f64,
    /// Electricity cost per year ($/yr).
    pub electricity: f64,
    /// Levelized cost of hydrogen ($/kg), rounded to cents.
    pub lcoh: f64,
}

/// Computes the levelized cost of hydrogen.
///
/// `annuity = capex_total · d / (1 − (1 + d)^−n)`, falling back to
/// straight-line `capex_total / n` at a zero discount rate.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidInput`] for non-finite inputs,
/// non-positive capacity, production or lifetime, or a negative discount
/// rate.
pub fn levelized_cost(inputs: LcohInputs) -> ServiceResult<LcohBreakdown> {
    let LcohInputs {
        elec_price,
        capex,
        capacity,
        h2prod,
        lifetime,
        discount,
    } = inputs;

    let fields = [
        ("elec_price", elec_price),
        ("capex", capex),
        ("capacity", capacity),
        ("h2prod", h2prod),
        ("discount", discount),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(ServiceError::InvalidInput(format!("{name} must be a finite number")));
    }
    if capacity <= 0.0 {
        return Err(ServiceError::InvalidInput("capacity must be > 0".into()));
    }
    if h2prod <= 0.0 {
        return Err(ServiceError::InvalidInput("h2prod must be > 0".into()));
    }
    if lifetime == 0 {
        return Err(ServiceError::InvalidInput("lifetime must be > 0".into()));
    }
    if discount < 0.0 {
        return Err(ServiceError::InvalidInput("discount must be >= 0".into()));
    }

    let capex_total = capex * capacity;
    let opex = OPEX_SHARE * capex_total;
    let years = f64::from(lifetime);
    let annuity = if discount == 0.0 {
        capex_total / years
    } else {
        capex_total * discount / (1.0 - (1.0 + discount).powf(-years))
    };
    let electricity = elec_price / 1000.0 * capacity * HOURS_PER_YEAR * CAPACITY_FACTOR;
    let lcoh = (annuity + opex + electricity) / h2prod;

    Ok(LcohBreakdown {
        inputs,
        capex_total,
        annuity,
        opex,
        electricity,
        lcoh: round_to(lcoh, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_plant() {
        let r = levelized_cost(LcohInputs::default()).expect("valid inputs");
        assert_eq!(r.capex_total, 1.0e7);
        assert_eq!(r.opex, 3.0e5);
        assert!((r.electricity - 1_752_000.0).abs() < 1e-6);
        let annuity = 1.0e7 * 0.08 / (1.0 - 1.08_f64.powi(-20));
        assert!((r.annuity - annuity).abs() < 1e-6);
        // (1_018_522.09 + 300_000 + 1_752_000) / 450_000
        assert_eq!(r.lcoh, 6.82);
    }

    #[test]
    fn zero_discount_is_straight_line() {
        let inputs = LcohInputs {
            discount: 0.0,
            ..LcohInputs::default()
        };
        let r = levelized_cost(inputs).expect("valid inputs");
        assert_eq!(r.annuity, 5.0e5);
        // (500_000 + 300_000 + 1_752_000) / 450_000
        assert_eq!(r.lcoh, 5.67);
    }

    #[test]
    fn rejects_out_of_domain_inputs() {
        let bad = [
            LcohInputs {
                capacity: 0.0,
                ..LcohInputs::default()
            },
            LcohInputs {
                h2prod: -1.0,
                ..LcohInputs::default()
            },
            LcohInputs {
                lifetime: 0,
                ..LcohInputs::default()
            },
            LcohInputs {
                discount: -0.01,
                ..LcohInputs::default()
            },
            LcohInputs {
                elec_price: f64::INFINITY,
                ..LcohInputs::default()
            },
        ];
        for inputs in bad {
            assert!(
                matches!(levelized_cost(inputs), Err(ServiceError::InvalidInput(_))),
                "{inputs:?} should be rejected"
            );
        }
    }
}
