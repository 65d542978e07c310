//! Point-mass gravity and explicit integrators for small N-body systems.
//!
//! Units are whatever the scenario uses consistently; `G` is the SI value, so
//! the four-body preset uses solar-scale masses over short distances.

use std::ops::Add;

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Gravitational constant.
pub const G: f64 = 6.67408e-11;
/// Mass of a star in the four-body preset, in Earth masses.
pub const STAR_MASS: f64 = 333_000.0;
pub const EARTH_MASS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub position: DVec2,
    #[serde(default)]
    pub velocity: DVec2,
}

impl Body {
    pub fn new(name: impl Into<String>, mass: f64, position: DVec2, velocity: DVec2) -> Self {
        Self {
            name: name.into(),
            mass,
            position,
            velocity,
        }
    }

    /// Acceleration this body feels from `other`: `G * m_other / r²` towards it.
    ///
    /// Coincident bodies exert no acceleration on each other.
    pub fn acceleration_from(&self, other: &Body) -> DVec2 {
        let offset = other.position - self.position;
        let distance_squared = offset.length_squared();
        if distance_squared == 0.0 {
            return DVec2::ZERO;
        }
        let intensity = G * other.mass / distance_squared;
        offset / distance_squared.sqrt() * intensity
    }

    pub fn cumulative_acceleration<'a>(&self, others: impl IntoIterator<Item = &'a Body>) -> DVec2 {
        others
            .into_iter()
            .fold(DVec2::ZERO, |total, other| total + self.acceleration_from(other))
    }

    pub fn derivative<'a>(&self, others: impl IntoIterator<Item = &'a Body>) -> Derivative {
        Derivative {
            velocity: self.velocity,
            acceleration: self.cumulative_acceleration(others),
        }
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.length_squared()
    }
}

/// Rate of change of one body's state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Derivative {
    pub velocity: DVec2,
    pub acceleration: DVec2,
}

impl Derivative {
    pub fn scale(&self, factor: f64) -> Derivative {
        Derivative {
            velocity: self.velocity * factor,
            acceleration: self.acceleration * factor,
        }
    }

    pub fn halve(&self) -> Derivative {
        self.scale(0.5)
    }
}

impl Add for Derivative {
    type Output = Derivative;

    fn add(self, rhs: Derivative) -> Derivative {
        Derivative {
            velocity: self.velocity + rhs.velocity,
            acceleration: self.acceleration + rhs.acceleration,
        }
    }
}

impl<'a, 'b> Add<&'b Derivative> for &'a Body {
    type Output = Body;

    fn add(self, rhs: &'b Derivative) -> Body {
        Body {
            name: self.name.clone(),
            mass: self.mass,
            position: self.position + rhs.velocity,
            velocity: self.velocity + rhs.acceleration,
        }
    }
}

/// Ordered set of mutually attracting bodies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct System {
    bodies: Vec<Body>,
}

impl System {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self { bodies }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.iter().find(|body| body.name == name)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Derivative of every body against all the others, in body order.
    pub fn euler_delta(&self) -> Vec<Derivative> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(index, body)| {
                body.derivative(
                    self.bodies
                        .iter()
                        .enumerate()
                        .filter(|(other, _)| *other != index)
                        .map(|(_, other)| other),
                )
            })
            .collect()
    }

    /// Classical fourth-order Runge-Kutta increment for a step of `dt`.
    pub fn rk4_delta(&self, dt: f64) -> Vec<Derivative> {
        let k1 = scale_all(&self.euler_delta(), dt);
        let k2 = scale_all(&self.advanced_by(&scale_all(&k1, 0.5)).euler_delta(), dt);
        let k3 = scale_all(&self.advanced_by(&scale_all(&k2, 0.5)).euler_delta(), dt);
        let k4 = scale_all(&self.advanced_by(&k3).euler_delta(), dt);

        k1.iter()
            .zip(&k2)
            .zip(&k3)
            .zip(&k4)
            .map(|(((a, b), c), d)| (*a + b.scale(2.0) + c.scale(2.0) + *d).scale(1.0 / 6.0))
            .collect()
    }

    pub fn euler_step(&self, dt: f64) -> System {
        self.advanced_by(&scale_all(&self.euler_delta(), dt))
    }

    pub fn rk4_step(&self, dt: f64) -> System {
        self.advanced_by(&self.rk4_delta(dt))
    }

    /// Applies one derivative per body. Extra derivatives are ignored.
    pub fn advanced_by(&self, deltas: &[Derivative]) -> System {
        System {
            bodies: self
                .bodies
                .iter()
                .zip(deltas)
                .map(|(body, delta)| body + delta)
                .collect(),
        }
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    pub fn potential_energy(&self) -> f64 {
        let mut energy = 0.0;
        for (index, body) in self.bodies.iter().enumerate() {
            for other in &self.bodies[index + 1..] {
                let distance = body.position.distance(other.position);
                if distance > 0.0 {
                    energy -= G * body.mass * other.mass / distance;
                }
            }
        }
        energy
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    pub fn momentum(&self) -> DVec2 {
        self.bodies
            .iter()
            .fold(DVec2::ZERO, |total, body| total + body.velocity * body.mass)
    }
}

fn scale_all(deltas: &[Derivative], factor: f64) -> Vec<Derivative> {
    deltas.iter().map(|delta| delta.scale(factor)).collect()
}
