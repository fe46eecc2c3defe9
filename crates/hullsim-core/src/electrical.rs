//! Electrical elements hosted by points: cables, lamps, pumps, doors and
//! generators.
//!
//! Current flows from every working generator through connected, conducting
//! elements. Connections follow the springs between host points and are
//! maintained by the ship's destroy and restore handlers.

use std::collections::VecDeque;

use rand::Rng;

use hullsim_logic::constants::water_constants::WET_POINT_THRESHOLD;
use hullsim_logic::materials::{ElectricalKind, ElectricalMaterial, LampBreakage};
use hullsim_logic::parameters::SimulationParameters;

use crate::points::Points;
use crate::types::{ElectricalDestroyReason, ElementIndex};

/// Odds that a spark hitting a lit lamp makes it explode.
const SPARK_LAMP_EXPLOSION_PROBABILITY: f64 = 0.05;

/// Outcome of one electrical update, applied by the ship.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElectricalUpdate {
    pub destroyed: Vec<(ElementIndex, ElectricalDestroyReason)>,
    /// Watertight doors whose state changed, as (host point, is open).
    pub door_changes: Vec<(ElementIndex, bool)>,
}

/// What light diffusion needs to know about one lamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LampLight {
    pub point: ElementIndex,
    pub luminiscence: f32,
    pub light_spread: f32,
    pub available_light: f32,
}

pub struct ElectricalElements {
    is_deleted: Vec<bool>,
    point: Vec<ElementIndex>,
    material: Vec<ElectricalMaterial>,
    connected: Vec<Vec<ElementIndex>>,
    factory_connected: Vec<Vec<ElementIndex>>,
    is_powered: Vec<bool>,
    available_light: Vec<f32>,
    /// Simulation time until which the element is knocked out by a spark.
    disabled_until: Vec<f32>,
    /// Doors only: whether the door currently lets water through.
    is_door_open: Vec<bool>,
    lamps: Vec<ElementIndex>,
}

impl ElectricalElements {
    pub fn new() -> Self {
        Self {
            is_deleted: Vec::new(),
            point: Vec::new(),
            material: Vec::new(),
            connected: Vec::new(),
            factory_connected: Vec::new(),
            is_powered: Vec::new(),
            available_light: Vec::new(),
            disabled_until: Vec::new(),
            is_door_open: Vec::new(),
            lamps: Vec::new(),
        }
    }

    pub fn add(&mut self, point: ElementIndex, material: ElectricalMaterial) -> ElementIndex {
        let e = self.is_deleted.len();
        if material.kind == ElectricalKind::Lamp {
            self.lamps.push(e);
        }
        self.is_deleted.push(false);
        self.point.push(point);
        self.material.push(material);
        self.connected.push(Vec::new());
        self.factory_connected.push(Vec::new());
        self.is_powered.push(false);
        self.available_light.push(0.0);
        self.disabled_until.push(0.0);
        // Unpowered doors stand open
        self.is_door_open.push(true);
        e
    }

    pub(crate) fn add_factory_connection(&mut self, a: ElementIndex, b: ElementIndex) {
        if !self.factory_connected[a].contains(&b) {
            self.factory_connected[a].push(b);
            self.factory_connected[b].push(a);
            self.connected[a].push(b);
            self.connected[b].push(a);
        }
    }

    pub fn element_count(&self) -> usize {
        self.is_deleted.len()
    }

    pub fn is_deleted(&self, e: ElementIndex) -> bool {
        self.is_deleted[e]
    }

    pub fn point_index(&self, e: ElementIndex) -> ElementIndex {
        self.point[e]
    }

    pub fn material(&self, e: ElementIndex) -> &ElectricalMaterial {
        &self.material[e]
    }

    pub fn kind(&self, e: ElementIndex) -> ElectricalKind {
        self.material[e].kind
    }

    pub fn connected(&self, e: ElementIndex) -> &[ElementIndex] {
        &self.connected[e]
    }

    pub fn factory_connected(&self, e: ElementIndex) -> &[ElementIndex] {
        &self.factory_connected[e]
    }

    pub fn is_powered(&self, e: ElementIndex) -> bool {
        self.is_powered[e]
    }

    pub fn available_light(&self, e: ElementIndex) -> f32 {
        self.available_light[e]
    }

    pub fn is_door_open(&self, e: ElementIndex) -> bool {
        self.is_door_open[e]
    }

    pub fn lamp_count(&self) -> usize {
        self.lamps.len()
    }

    /// Live lamps with their light parameters.
    pub fn lamp_lights(&self) -> Vec<LampLight> {
        self.lamps
            .iter()
            .filter(|&&e| !self.is_deleted[e])
            .map(|&e| LampLight {
                point: self.point[e],
                luminiscence: self.material[e].luminiscence,
                light_spread: self.material[e].light_spread,
                available_light: self.available_light[e],
            })
            .collect()
    }

    pub(crate) fn connect(&mut self, a: ElementIndex, b: ElementIndex) {
        if !self.connected[a].contains(&b) {
            self.connected[a].push(b);
            self.connected[b].push(a);
            self.sort_connections(a);
            self.sort_connections(b);
        }
    }

    pub(crate) fn disconnect(&mut self, a: ElementIndex, b: ElementIndex) {
        self.connected[a].retain(|&x| x != b);
        self.connected[b].retain(|&x| x != a);
    }

    fn sort_connections(&mut self, e: ElementIndex) {
        let order = &self.factory_connected[e];
        self.connected[e].sort_by_key(|x| order.iter().position(|f| f == x).unwrap_or(usize::MAX));
    }

    /// Drop every connection of `e`, on both sides.
    pub(crate) fn disconnect_all(&mut self, e: ElementIndex) {
        for other in std::mem::take(&mut self.connected[e]) {
            self.connected[other].retain(|&x| x != e);
        }
    }

    pub(crate) fn mark_deleted(&mut self, e: ElementIndex) {
        debug_assert!(!self.is_deleted[e]);
        self.is_deleted[e] = true;
        self.is_powered[e] = false;
        self.available_light[e] = 0.0;
    }

    pub(crate) fn mark_restored(&mut self, e: ElementIndex) {
        debug_assert!(self.is_deleted[e]);
        self.is_deleted[e] = false;
        self.disabled_until[e] = 0.0;
    }

    /// A spark knocks generators and lamps out for a while; a lit lamp may
    /// explode. Returns the lamp to destroy, if any.
    pub(crate) fn on_electric_spark(
        &mut self,
        e: ElementIndex,
        current_time: f32,
        rng: &mut impl Rng,
    ) -> Option<ElectricalDestroyReason> {
        if self.is_deleted[e] {
            return None;
        }
        match self.material[e].kind {
            ElectricalKind::Generator => {
                self.disabled_until[e] = current_time + rng.gen_range(15.0..28.0);
                None
            }
            ElectricalKind::Lamp => {
                let was_lit = self.available_light[e] > 0.0;
                self.disabled_until[e] = current_time + rng.gen_range(4.0..8.0);
                if was_lit && rng.gen_bool(SPARK_LAMP_EXPLOSION_PROBABILITY) {
                    Some(ElectricalDestroyReason::LampExploded)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Propagate current, drive lamps, pumps and doors, and find the lamps
    /// that fail.
    pub(crate) fn update(
        &mut self,
        current_time: f32,
        points: &mut Points,
        _params: &SimulationParameters,
    ) -> ElectricalUpdate {
        let mut result = ElectricalUpdate::default();

        self.propagate_current(current_time, points);

        for e in 0..self.element_count() {
            if self.is_deleted[e] {
                continue;
            }
            let p = self.point[e];
            let is_working = self.is_powered[e] && current_time >= self.disabled_until[e];
            match self.material[e].kind {
                ElectricalKind::Lamp => {
                    let material = &self.material[e];
                    if points.water(p) >= WET_POINT_THRESHOLD
                        || points.temperature(p) > material.max_operating_temperature
                    {
                        let reason = match material.lamp_breakage {
                            LampBreakage::Break => ElectricalDestroyReason::LampBroken,
                            LampBreakage::Explosion => ElectricalDestroyReason::LampExploded,
                            LampBreakage::Implosion => ElectricalDestroyReason::LampImploded,
                        };
                        result.destroyed.push((e, reason));
                    } else {
                        self.available_light[e] = if is_working { 1.0 } else { 0.0 };
                    }
                }
                ElectricalKind::WaterPump => {
                    let force = if is_working {
                        self.material[e].water_pump_nominal_force
                    } else {
                        0.0
                    };
                    points.set_water_pump_force(p, force);
                }
                ElectricalKind::WatertightDoor => {
                    // Powered doors seal
                    let is_open = !is_working;
                    if is_open != self.is_door_open[e] {
                        self.is_door_open[e] = is_open;
                        result.door_changes.push((p, is_open));
                    }
                }
                ElectricalKind::Cable | ElectricalKind::Generator => {}
            }
        }

        result
    }

    fn propagate_current(&mut self, current_time: f32, points: &Points) {
        self.is_powered.iter_mut().for_each(|p| *p = false);

        let mut queue: VecDeque<ElementIndex> = VecDeque::new();
        for e in 0..self.element_count() {
            if !self.is_deleted[e]
                && self.material[e].kind == ElectricalKind::Generator
                && current_time >= self.disabled_until[e]
                && points.water(self.point[e]) < WET_POINT_THRESHOLD
            {
                self.is_powered[e] = true;
                queue.push_back(e);
            }
        }

        while let Some(e) = queue.pop_front() {
            if !self.material[e].conducts_electricity {
                continue;
            }
            for i in 0..self.connected[e].len() {
                let other = self.connected[e][i];
                if !self.is_deleted[other] && !self.is_powered[other] {
                    self.is_powered[other] = true;
                    queue.push_back(other);
                }
            }
        }
    }
}

impl Default for ElectricalElements {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hullsim_logic::materials::MaterialPreset;
    use hullsim_logic::vectors::Vec2f;

    fn setup() -> (ElectricalElements, Points) {
        let params = SimulationParameters::default();
        let mut points = Points::new(vec![MaterialPreset::Steel.material()], &params);
        for i in 0..4 {
            points.add(Vec2f::new(i as f32, 5.0), 0, 0.0, false, 0.5, &params);
        }
        points.finalize(0, &params);

        let mut electrical = ElectricalElements::new();
        let generator = electrical.add(0, ElectricalMaterial::generator());
        let cable = electrical.add(1, ElectricalMaterial::cable());
        let lamp = electrical.add(2, ElectricalMaterial::lamp(1.0, 10.0, LampBreakage::Implosion));
        let pump = electrical.add(3, ElectricalMaterial::water_pump(-0.5));
        electrical.add_factory_connection(generator, cable);
        electrical.add_factory_connection(cable, lamp);
        electrical.add_factory_connection(cable, pump);
        (electrical, points)
    }

    #[test]
    fn test_current_reaches_lamp_and_pump() {
        let (mut electrical, mut points) = setup();
        let params = SimulationParameters::default();

        let update = electrical.update(0.0, &mut points, &params);
        assert!(update.destroyed.is_empty());
        assert!(electrical.is_powered(2));
        assert_eq!(electrical.available_light(2), 1.0);
        assert_eq!(points.leaking(3).water_pump_force, -0.5);
        assert_eq!(electrical.lamp_lights().len(), 1);
    }

    #[test]
    fn test_cut_cable_darkens_lamp() {
        let (mut electrical, mut points) = setup();
        let params = SimulationParameters::default();

        electrical.disconnect(1, 2);
        electrical.update(0.0, &mut points, &params);
        assert!(!electrical.is_powered(2));
        assert_eq!(electrical.available_light(2), 0.0);

        electrical.connect(2, 1);
        assert_eq!(electrical.connected(1), electrical.factory_connected(1));
        electrical.update(0.0, &mut points, &params);
        assert!(electrical.is_powered(2));
    }

    #[test]
    fn test_flooded_lamp_fails_with_its_breakage_kind() {
        let (mut electrical, mut points) = setup();
        let params = SimulationParameters::default();

        points.set_water(2, 1.0);
        let update = electrical.update(0.0, &mut points, &params);
        assert_eq!(update.destroyed, vec![(2, ElectricalDestroyReason::LampImploded)]);
    }

    #[test]
    fn test_disconnect_all_is_symmetric() {
        let (mut electrical, _) = setup();
        electrical.disconnect_all(1);
        assert!(electrical.connected(1).is_empty());
        assert!(electrical.connected(0).is_empty());
        assert!(electrical.connected(2).is_empty());
    }
}
