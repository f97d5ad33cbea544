// src/world.rs
use crate::debounce::MovementDecision;
use crate::types::Direction;

pub const CHAIR_RADIUS: f32 = 1.2;
pub const CONE_RADIUS: f32 = 0.6;
pub const MAX_CONE_HITS: u32 = 7;
const KNOCK_SPEED: f32 = 10.0;
const CONE_FRICTION: f32 = 3.0;

/// Top-down pose. Heading is in degrees, 0 faces +z, positive turns right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub z: f32,
    pub heading_deg: f32,
}

pub const START_POSE: Pose = Pose {
    x: 678.0,
    z: 79.0,
    heading_deg: 180.0,
};

impl Pose {
    pub fn forward(&self) -> (f32, f32) {
        let h = self.heading_deg.to_radians();
        (h.sin(), h.cos())
    }
}

/// Manual driving axes, each in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KeyAxes {
    pub vertical: f32,
    pub horizontal: f32,
}

pub struct Wheelchair {
    pub pose: Pose,
    pub speed: f32,
    pub rotation_speed: f32,
}

impl Wheelchair {
    pub fn new(speed: f32, rotation_speed: f32) -> Self {
        Self {
            pose: START_POSE,
            speed,
            rotation_speed,
        }
    }

    fn translate(&mut self, distance: f32) {
        let (fx, fz) = self.pose.forward();
        self.pose.x += fx * distance;
        self.pose.z += fz * distance;
    }

    fn rotate(&mut self, degrees: f32) {
        self.pose.heading_deg = (self.pose.heading_deg + degrees).rem_euclid(360.0);
    }

    /// Keys and the BCI decision both apply; they add up when used together.
    pub fn step(&mut self, dt: f32, keys: KeyAxes, decision: MovementDecision, enabled: bool) {
        if !enabled {
            return;
        }
        self.translate(keys.vertical.clamp(-1.0, 1.0) * self.speed * dt);
        self.rotate(keys.horizontal.clamp(-1.0, 1.0) * self.rotation_speed * dt);

        if decision.forward {
            self.translate(self.speed * dt);
        }
        match decision.turn {
            Some(Direction::Right) => self.rotate(self.rotation_speed * dt),
            Some(Direction::Left) => self.rotate(-self.rotation_speed * dt),
            _ => {}
        }
    }

    pub fn respawn(&mut self) {
        self.pose = START_POSE;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cone {
    pub x: f32,
    pub z: f32,
    vx: f32,
    vz: f32,
    in_contact: bool,
}

impl Cone {
    pub fn at(x: f32, z: f32) -> Self {
        Self {
            x,
            z,
            vx: 0.0,
            vz: 0.0,
            in_contact: false,
        }
    }

    fn slide(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.z += self.vz * dt;
        let decay = (1.0 - CONE_FRICTION * dt).max(0.0);
        self.vx *= decay;
        self.vz *= decay;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Bounds {
    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    ConeHit(u32),
    TooManyCones,
    OutOfBounds,
}

pub struct World {
    pub chair: Wheelchair,
    pub cones: Vec<Cone>,
    pub bounds: Bounds,
    cones_hit: u32,
}

impl World {
    pub fn new(chair: Wheelchair, cones: Vec<Cone>, bounds: Bounds) -> Self {
        Self {
            chair,
            cones,
            bounds,
            cones_hit: 0,
        }
    }

    /// Slalom of cone gates laid out ahead of the start pose.
    pub fn slalom(speed: f32, rotation_speed: f32) -> Self {
        let mut cones = Vec::new();
        for gate in 0..10 {
            let z = START_POSE.z - 20.0 - gate as f32 * 18.0;
            let centre = START_POSE.x + if gate % 2 == 0 { -6.0 } else { 6.0 };
            cones.push(Cone::at(centre - 5.0, z));
            cones.push(Cone::at(centre + 5.0, z));
        }
        let bounds = Bounds {
            min_x: START_POSE.x - 60.0,
            max_x: START_POSE.x + 60.0,
            min_z: START_POSE.z - 240.0,
            max_z: START_POSE.z + 20.0,
        };
        Self::new(Wheelchair::new(speed, rotation_speed), cones, bounds)
    }

    pub fn cones_hit(&self) -> u32 {
        self.cones_hit
    }

    pub fn step(
        &mut self,
        dt: f32,
        keys: KeyAxes,
        decision: MovementDecision,
        enabled: bool,
    ) -> Vec<WorldEvent> {
        let mut events = Vec::new();
        self.chair.step(dt, keys, decision, enabled);

        let pose = self.chair.pose;
        let (fx, fz) = pose.forward();
        let reach = CHAIR_RADIUS + CONE_RADIUS;
        for cone in &mut self.cones {
            cone.slide(dt);
            let dx = cone.x - pose.x;
            let dz = cone.z - pose.z;
            let dist = (dx * dx + dz * dz).sqrt();
            let touching = dist < reach;
            if touching && !cone.in_contact {
                cone.vx = fx * KNOCK_SPEED;
                cone.vz = fz * KNOCK_SPEED;
                self.cones_hit += 1;
                events.push(WorldEvent::ConeHit(self.cones_hit));
            }
            if touching && dist > f32::EPSILON {
                // keep the cone outside the chair
                let push = (reach - dist) / dist;
                cone.x += dx * push;
                cone.z += dz * push;
            }
            cone.in_contact = touching;
        }

        if self.cones_hit >= MAX_CONE_HITS {
            self.chair.respawn();
            self.cones_hit = 0;
            events.push(WorldEvent::TooManyCones);
        }
        if !self.bounds.contains(self.chair.pose.x, self.chair.pose.z) {
            self.chair.respawn();
            events.push(WorldEvent::OutOfBounds);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn go(forward: bool, turn: Option<Direction>) -> MovementDecision {
        MovementDecision { forward, turn }
    }

    fn open_field() -> World {
        let bounds = Bounds {
            min_x: -1000.0,
            max_x: 1000.0,
            min_z: -1000.0,
            max_z: 1000.0,
        };
        World::new(Wheelchair::new(10.0, 90.0), Vec::new(), bounds)
    }

    #[test]
    fn forward_decision_moves_along_heading() {
        let mut chair = Wheelchair::new(10.0, 90.0);
        chair.step(1.0, KeyAxes::default(), go(true, None), true);
        // heading 180 faces -z
        assert!((chair.pose.z - (START_POSE.z - 10.0)).abs() < 1e-3);
        assert!((chair.pose.x - START_POSE.x).abs() < 1e-3);
    }

    #[test]
    fn turns_rotate_in_opposite_directions() {
        let mut chair = Wheelchair::new(10.0, 90.0);
        chair.step(0.5, KeyAxes::default(), go(false, Some(Direction::Right)), true);
        assert!((chair.pose.heading_deg - 225.0).abs() < 1e-3);
        chair.step(1.0, KeyAxes::default(), go(false, Some(Direction::Left)), true);
        assert!((chair.pose.heading_deg - 135.0).abs() < 1e-3);
    }

    #[test]
    fn keys_drive_and_disabled_chair_stays_put() {
        let mut chair = Wheelchair::new(10.0, 90.0);
        let keys = KeyAxes {
            vertical: -1.0,
            horizontal: 0.0,
        };
        chair.step(1.0, keys, MovementDecision::default(), false);
        assert_eq!(chair.pose, START_POSE);
        chair.step(1.0, keys, MovementDecision::default(), true);
        assert!((chair.pose.z - (START_POSE.z + 10.0)).abs() < 1e-3);
    }

    #[test]
    fn each_contact_counts_once() {
        let mut world = open_field();
        let (fx, fz) = START_POSE.forward();
        world.cones.push(Cone::at(START_POSE.x + fx * 1.0, START_POSE.z + fz * 1.0));
        let events = world.step(0.01, KeyAxes::default(), MovementDecision::default(), true);
        assert_eq!(events, vec![WorldEvent::ConeHit(1)]);
        let events = world.step(0.01, KeyAxes::default(), MovementDecision::default(), true);
        assert!(events.is_empty());
        assert_eq!(world.cones_hit(), 1);
    }

    #[test]
    fn seventh_cone_respawns_chair() {
        let mut world = open_field();
        world.chair.pose.x += 50.0;
        let here = world.chair.pose;
        for _ in 0..MAX_CONE_HITS {
            world.cones.push(Cone::at(here.x, here.z + 0.5));
        }
        let events = world.step(0.0, KeyAxes::default(), MovementDecision::default(), true);
        assert!(events.contains(&WorldEvent::ConeHit(MAX_CONE_HITS)));
        assert!(events.contains(&WorldEvent::TooManyCones));
        assert_eq!(world.chair.pose, START_POSE);
        assert_eq!(world.cones_hit(), 0);
    }

    #[test]
    fn leaving_bounds_respawns() {
        let mut world = World::slalom(10.0, 90.0);
        world.cones.clear();
        world.chair.pose.z = START_POSE.z + 100.0;
        let events = world.step(0.0, KeyAxes::default(), MovementDecision::default(), true);
        assert_eq!(events, vec![WorldEvent::OutOfBounds]);
        assert_eq!(world.chair.pose, START_POSE);
    }

    #[test]
    fn slalom_start_is_clear_of_cones() {
        let mut world = World::slalom(10.0, 90.0);
        let events = world.step(0.0, KeyAxes::default(), MovementDecision::default(), true);
        assert!(events.is_empty());
        assert_eq!(world.cones.len(), 20);
    }
}
