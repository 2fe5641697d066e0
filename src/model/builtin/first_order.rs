use super::Dynamics;

const PORTS: &[&str] = &["u", "x"];
const U: usize = 0;
const X: usize = 1;

/// First-order lag `T·dx/dt = k·u − x`.
///
/// Integrated with the exact zero-order-hold solution, so the result does
/// not depend on the communication step size for piecewise-constant input.
#[derive(Debug, Clone)]
pub struct FirstOrder {
    time_constant: f64,
    gain: f64,
}

impl Default for FirstOrder {
    fn default() -> Self {
        Self {
            time_constant: 1.0,
            gain: 1.0,
        }
    }
}

impl Dynamics for FirstOrder {
    fn ports(&self) -> &'static [&'static str] {
        PORTS
    }

    fn initialize(&mut self, params: &dyn Fn(&str) -> Option<f64>, _ports: &mut [f64]) {
        if let Some(t) = params("T").filter(|t| *t > 0.0) {
            self.time_constant = t;
        }
        if let Some(k) = params("k") {
            self.gain = k;
        }
    }

    fn advance(&mut self, ports: &mut [f64], h: f64) {
        let target = self.gain * ports[U];
        let decay = (-h / self.time_constant).exp();
        ports[X] = target + (ports[X] - target) * decay;
    }
}
