use super::{Dynamics, MAX_SUBSTEPS, substeps};

const PORTS: &[&str] = &["flowSetpoint", "actualFlow", "powerConsumption"];
const SETPOINT: usize = 0;
const FLOW: usize = 1;
const POWER: usize = 2;

const MAX_INTERNAL_STEP: f64 = 1e-4;

/// Centrifugal pump under PID flow control.
///
/// The controller drives the pump speed command `s ∈ [0, s_max]`; the
/// delivered flow follows the command through a first-order lag
/// `τ·dq/dt = g·s − q`. Shaft power follows the affinity law
/// `P = P_rated·(q/q_rated)³ / η`. The integral term is frozen while the
/// command is saturated.
#[derive(Debug, Clone)]
pub struct PumpPid {
    kp: f64,
    ki: f64,
    kd: f64,
    tau: f64,
    pump_gain: f64,
    max_speed: f64,
    rated_flow: f64,
    rated_power: f64,
    efficiency: f64,
    integral: f64,
    last_error: Option<f64>,
    flow: f64,
}

impl Default for PumpPid {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 10.0,
            kd: 0.0,
            tau: 0.1,
            pump_gain: 1.0,
            max_speed: 2.0,
            rated_flow: 1.0,
            rated_power: 1500.0,
            efficiency: 0.7,
            integral: 0.0,
            last_error: None,
            flow: 0.0,
        }
    }
}

impl PumpPid {
    fn power(&self) -> f64 {
        let ratio = self.flow.max(0.0) / self.rated_flow;
        self.rated_power * ratio.powi(3) / self.efficiency
    }
}

impl Dynamics for PumpPid {
    fn ports(&self) -> &'static [&'static str] {
        PORTS
    }

    fn max_step_size(&self) -> f64 {
        MAX_INTERNAL_STEP * MAX_SUBSTEPS as f64
    }

    fn initialize(&mut self, params: &dyn Fn(&str) -> Option<f64>, ports: &mut [f64]) {
        let positive = |name: &str| params(name).filter(|v| *v > 0.0);
        if let Some(v) = params("kp") {
            self.kp = v;
        }
        if let Some(v) = params("ki") {
            self.ki = v;
        }
        if let Some(v) = params("kd") {
            self.kd = v;
        }
        if let Some(v) = positive("tau") {
            self.tau = v;
        }
        if let Some(v) = positive("pump_gain") {
            self.pump_gain = v;
        }
        if let Some(v) = positive("max_speed") {
            self.max_speed = v;
        }
        if let Some(v) = positive("rated_flow") {
            self.rated_flow = v;
        }
        if let Some(v) = positive("rated_power") {
            self.rated_power = v;
        }
        if let Some(v) = params("efficiency").filter(|v| *v > 0.0 && *v <= 1.0) {
            self.efficiency = v;
        }
        self.flow = ports[FLOW];
        self.integral = 0.0;
        self.last_error = None;
        ports[POWER] = self.power();
    }

    fn advance(&mut self, ports: &mut [f64], h: f64) {
        let setpoint = ports[SETPOINT];
        let (n, dt) = substeps(h, MAX_INTERNAL_STEP);
        for _ in 0..n {
            let error = setpoint - self.flow;
            let derivative = self.last_error.map_or(0.0, |e| (error - e) / dt);
            self.last_error = Some(error);

            let unclamped = self.kp * error + self.ki * self.integral + self.kd * derivative;
            let speed = unclamped.clamp(0.0, self.max_speed);
            let saturated = (unclamped > self.max_speed && error > 0.0)
                || (unclamped < 0.0 && error < 0.0);
            if !saturated {
                self.integral += error * dt;
            }

            self.flow += (self.pump_gain * speed - self.flow) / self.tau * dt;
        }
        ports[FLOW] = self.flow;
        ports[POWER] = self.power();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(setpoint: f64, seconds: f64) -> [f64; 3] {
        let mut m = PumpPid::default();
        let mut ports = [setpoint, 0.0, 0.0];
        m.initialize(&|_| None, &mut ports);
        let steps = (seconds / 1e-3) as usize;
        for _ in 0..steps {
            m.advance(&mut ports, 1e-3);
        }
        ports
    }

    #[test]
    fn tracks_setpoint() {
        let ports = run(0.8, 5.0);
        assert!((ports[FLOW] - 0.8).abs() < 1e-2, "flow = {}", ports[FLOW]);
    }

    #[test]
    fn power_follows_affinity_law() {
        let ports = run(0.5, 5.0);
        let expected = 1500.0 * ports[FLOW].powi(3) / 0.7;
        assert!((ports[POWER] - expected).abs() < 1e-9);
    }

    #[test]
    fn unreachable_setpoint_saturates() {
        // max flow is pump_gain * max_speed = 2.0
        let ports = run(5.0, 5.0);
        assert!(ports[FLOW] <= 2.0 + 1e-9);
        assert!(ports[FLOW] > 1.9);
    }

    #[test]
    fn zero_setpoint_draws_no_power() {
        let ports = run(0.0, 1.0);
        assert_eq!(ports[FLOW], 0.0);
        assert_eq!(ports[POWER], 0.0);
    }
}
