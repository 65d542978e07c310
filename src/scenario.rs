use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::DVec2;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::physics::{Body, System, EARTH_MASS, G, STAR_MASS};

/// Initial conditions and integration settings for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_steps")]
    pub steps: u64,
    pub bodies: Vec<Body>,
}

impl Scenario {
    /// Parses a scenario document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scenario XML")?;
        let root = document.root_element();
        if !root.has_tag_name("scenario") {
            return Err(anyhow!(
                "expected <scenario> root element, found <{}>",
                root.tag_name().name()
            ));
        }

        let name = root.attribute("name").unwrap_or("unnamed").to_string();
        let dt = parse_f64(optional_text(&root, "dt"), default_dt())?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(anyhow!("<dt> must be a positive number, got {dt}"));
        }
        let steps = match optional_text(&root, "steps") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|err| anyhow!("failed to parse <steps>: {err}"))?,
            None => default_steps(),
        };

        let mut bodies: Vec<Body> = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("body")) {
            let name = required_text(&node, "name")?;
            if bodies.iter().any(|body| body.name == name) {
                return Err(anyhow!("body name {name} is used more than once"));
            }
            let mass = parse_f64(Some(required_text(&node, "mass")?), 0.0)
                .with_context(|| format!("body {name} has an invalid mass"))?;
            if !(mass.is_finite() && mass > 0.0) {
                return Err(anyhow!("body {name} must have a positive mass, got {mass}"));
            }
            let position = parse_dvec2(optional_text(&node, "position"), DVec2::ZERO)
                .with_context(|| format!("body {name} has an invalid position"))?;
            let velocity = parse_dvec2(optional_text(&node, "velocity"), DVec2::ZERO)
                .with_context(|| format!("body {name} has an invalid velocity"))?;
            bodies.push(Body::new(name, mass, position, velocity));
        }

        if bodies.is_empty() {
            return Err(anyhow!("scenario {name} does not define any <body>"));
        }

        Ok(Self {
            name,
            dt,
            steps,
            bodies,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read scenario {}", path.display()))?;
        Self::from_xml(&xml)
    }

    /// Three equal stars on a rotating equilateral triangle with a planet
    /// orbiting the group from further out.
    pub fn four_body() -> Self {
        let star_radius = 1.0;
        let side = star_radius * 3f64.sqrt();
        let angular_speed = (G * 3.0 * STAR_MASS / side.powi(3)).sqrt();
        let star_speed = angular_speed * star_radius;

        let mut bodies: Vec<Body> = ["star_a", "star_b", "star_c"]
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let angle = index as f64 * std::f64::consts::TAU / 3.0;
                let direction = DVec2::from_angle(angle);
                Body::new(
                    *name,
                    STAR_MASS,
                    direction * star_radius,
                    direction.perp() * star_speed,
                )
            })
            .collect();

        let planet_radius = 5.0;
        let planet_speed = (G * 3.0 * STAR_MASS / planet_radius).sqrt();
        bodies.push(Body::new(
            "planet",
            EARTH_MASS,
            DVec2::new(planet_radius, 0.0),
            DVec2::new(0.0, planet_speed),
        ));

        Self {
            name: "four-body".to_string(),
            dt: default_dt(),
            steps: 1000,
            bodies,
        }
    }

    pub fn system(&self) -> System {
        System::new(self.bodies.clone())
    }
}

fn default_dt() -> f64 {
    1.0
}

fn default_steps() -> u64 {
    1
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_dvec2(value: Option<String>, default: DVec2) -> Result<DVec2> {
    let Some(value) = value else {
        return Ok(default);
    };
    let components = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f64>()
                .map_err(|err| anyhow!("invalid component {component:?}: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    match components.as_slice() {
        [x, y] => Ok(DVec2::new(*x, *y)),
        _ => Err(anyhow!(
            "vector needs exactly 2 components, found {}",
            components.len()
        )),
    }
}

fn parse_f64(value: Option<String>, default: f64) -> Result<f64> {
    match value {
        Some(value) => value
            .parse::<f64>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}
