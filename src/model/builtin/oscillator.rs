use super::{Dynamics, MAX_SUBSTEPS, substeps};

const PORTS: &[&str] = &[
    "inputs",
    "outputs[1]",
    "outputs[2]",
    "outputs[3]",
    "outputs[4]",
];
const FORCE: usize = 0;
const POSITION: usize = 1;
const VELOCITY: usize = 2;
const ACCELERATION: usize = 3;
const ENERGY: usize = 4;

/// Largest internal integration step (s).
const MAX_INTERNAL_STEP: f64 = 1e-4;

/// Damped spring–mass oscillator driven by an external force.
///
/// `m·a = F − c·v − k·x`, integrated with semi-implicit Euler. Outputs are
/// position, velocity, acceleration and total mechanical energy.
#[derive(Debug, Clone)]
pub struct Oscillator {
    mass: f64,
    damping: f64,
    stiffness: f64,
    x: f64,
    v: f64,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self {
            mass: 1.0,
            damping: 0.2,
            // 1 Hz natural frequency for unit mass
            stiffness: 4.0 * std::f64::consts::PI * std::f64::consts::PI,
            x: 0.0,
            v: 0.0,
        }
    }
}

impl Oscillator {
    fn acceleration(&self, force: f64) -> f64 {
        (force - self.damping * self.v - self.stiffness * self.x) / self.mass
    }

    fn publish(&self, ports: &mut [f64]) {
        ports[POSITION] = self.x;
        ports[VELOCITY] = self.v;
        ports[ACCELERATION] = self.acceleration(ports[FORCE]);
        ports[ENERGY] = 0.5 * self.mass * self.v * self.v + 0.5 * self.stiffness * self.x * self.x;
    }
}

impl Dynamics for Oscillator {
    fn ports(&self) -> &'static [&'static str] {
        PORTS
    }

    fn max_step_size(&self) -> f64 {
        MAX_INTERNAL_STEP * MAX_SUBSTEPS as f64
    }

    fn initialize(&mut self, params: &dyn Fn(&str) -> Option<f64>, ports: &mut [f64]) {
        if let Some(m) = params("m").filter(|m| *m > 0.0) {
            self.mass = m;
        }
        if let Some(c) = params("c").filter(|c| *c >= 0.0) {
            self.damping = c;
        }
        if let Some(k) = params("k").filter(|k| *k > 0.0) {
            self.stiffness = k;
        }
        self.x = ports[POSITION];
        self.v = ports[VELOCITY];
        self.publish(ports);
    }

    fn advance(&mut self, ports: &mut [f64], h: f64) {
        let force = ports[FORCE];
        let (n, dt) = substeps(h, MAX_INTERNAL_STEP);
        for _ in 0..n {
            self.v += self.acceleration(force) * dt;
            self.x += self.v * dt;
        }
        self.publish(ports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(x0: f64) -> (Oscillator, [f64; 5]) {
        let mut m = Oscillator::default();
        let mut ports = [0.0, x0, 0.0, 0.0, 0.0];
        m.initialize(&|_| None, &mut ports);
        (m, ports)
    }

    #[test]
    fn initial_energy_is_potential() {
        let (m, ports) = started(1.0);
        assert!((ports[ENERGY] - 0.5 * m.stiffness).abs() < 1e-12);
    }

    #[test]
    fn damping_dissipates_energy() {
        let (mut m, mut ports) = started(1.0);
        let e0 = ports[ENERGY];
        for _ in 0..100 {
            m.advance(&mut ports, 0.01);
        }
        assert!(ports[ENERGY] < e0);
        assert!(ports[ENERGY] > 0.0);
    }

    #[test]
    fn constant_force_shifts_equilibrium() {
        let (mut m, mut ports) = started(0.0);
        ports[FORCE] = m.stiffness;
        // long enough for the 0.2 damping to settle
        for _ in 0..6000 {
            m.advance(&mut ports, 0.01);
        }
        assert!((ports[POSITION] - 1.0).abs() < 1e-2, "x = {}", ports[POSITION]);
    }
}
