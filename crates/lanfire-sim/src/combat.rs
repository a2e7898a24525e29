use rand::Rng;
use smallvec::SmallVec;

use lanfire_core::map::MapGeometry;
use lanfire_core::math::{Vec3, dir_from_yaw_pitch, yaw_pitch_from_dir};
use lanfire_core::net::messages::{HitPart, Impact, ShotHit, ShotMsg, ShotTrace};
use lanfire_core::player::PlayerId;
use lanfire_core::weapon::{WeaponSpec, WeaponTable};

use crate::config::SimConfig;
use crate::geometry::{nearest_obstacle, ray_sphere};
use crate::registry::{Player, PlayerRegistry};

/// Per-weapon ammunition state. Reload completion is applied lazily by
/// [`Magazine::settle`] the next time the weapon is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Magazine {
    pub ammo: u32,
    /// When the in-progress reload finishes (ms).
    pub reload_end: Option<u64>,
}

impl Magazine {
    pub fn full(spec: &WeaponSpec) -> Self {
        Self {
            ammo: spec.magazine,
            reload_end: None,
        }
    }

    /// Complete a pending reload if its deadline has passed.
    pub fn settle(&mut self, now: u64, spec: &WeaponSpec) {
        if let Some(end) = self.reload_end
            && now >= end
        {
            self.ammo = spec.magazine;
            self.reload_end = None;
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_end.is_some()
    }

    /// Start a reload. Returns false when one is already running or the
    /// magazine is full.
    pub fn begin_reload(&mut self, now: u64, spec: &WeaponSpec) -> bool {
        if self.is_reloading() || self.ammo >= spec.magazine {
            return false;
        }
        self.reload_end = Some(now + spec.reload_duration().as_millis() as u64);
        true
    }
}

/// Result of a fire request.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// A shot went out. `kills` lists victims whose health reached zero on
    /// this shot, in the order they died.
    Fired {
        shot: ShotMsg,
        kills: SmallVec<[PlayerId; 4]>,
    },
    /// The magazine was empty; a reload began instead of a shot.
    ReloadStarted,
    /// A reload is still running.
    Reloading,
    /// Too soon after the previous shot.
    RateLimited,
    /// Dead or unknown shooter, or a weapon missing from the table.
    Ignored,
}

/// What a single pellet ray stopped on, before damage is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedImpact {
    Player {
        id: PlayerId,
        part: HitPart,
        distance: f32,
    },
    Target {
        id: String,
        distance: f32,
    },
    Obstacle {
        distance: f32,
    },
    /// Nothing within range.
    Miss {
        distance: f32,
    },
}

impl ResolvedImpact {
    pub fn distance(&self) -> f32 {
        match self {
            Self::Player { distance, .. }
            | Self::Target { distance, .. }
            | Self::Obstacle { distance }
            | Self::Miss { distance } => *distance,
        }
    }

    fn to_wire(&self) -> Option<Impact> {
        match self {
            Self::Player { id, part, .. } => Some(Impact::Player {
                target_id: *id,
                part: *part,
            }),
            Self::Target { id, .. } => Some(Impact::Target {
                target_id: id.clone(),
            }),
            Self::Obstacle { .. } => Some(Impact::Obstacle),
            Self::Miss { .. } => None,
        }
    }
}

/// Jitter a unit direction by up to `spread / 2` on yaw and pitch.
pub fn spread_direction<R: Rng + ?Sized>(base: Vec3, spread: f32, rng: &mut R) -> Vec3 {
    if spread <= 0.0 {
        return base;
    }
    let (yaw, pitch) = yaw_pitch_from_dir(base);
    let yaw = yaw + (rng.random::<f32>() - 0.5) * spread;
    let pitch = pitch + (rng.random::<f32>() - 0.5) * spread;
    dir_from_yaw_pitch(yaw, pitch)
}

/// Closest hitbox of `player` along the ray. The head wins ties.
fn hitbox_hit(config: &SimConfig, player: &Player, origin: Vec3, dir: Vec3) -> Option<(HitPart, f32)> {
    let body = ray_sphere(
        origin,
        dir,
        player.position.raised(config.body_center_y),
        config.body_radius,
    );
    let head = ray_sphere(
        origin,
        dir,
        player.position.raised(config.head_center_y),
        config.head_radius,
    );
    match (head, body) {
        (Some(h), Some(b)) if h <= b => Some((HitPart::Head, h)),
        (Some(h), None) => Some((HitPart::Head, h)),
        (_, Some(b)) => Some((HitPart::Body, b)),
        (None, None) => None,
    }
}

/// Trace one pellet against obstacles, living players other than the
/// shooter, and practice targets.
pub fn resolve_impact(
    config: &SimConfig,
    map: &MapGeometry,
    players: &PlayerRegistry,
    shooter: PlayerId,
    origin: Vec3,
    dir: Vec3,
    range: f32,
) -> ResolvedImpact {
    let wall = nearest_obstacle(origin, dir, range, &map.obstacles);
    let unblocked = |t: f32| t <= range && wall.is_none_or(|w| t < w);

    let player_hit = players
        .iter()
        .filter(|p| p.id != shooter && !p.dead)
        .filter_map(|p| {
            let (part, t) = hitbox_hit(config, p, origin, dir)?;
            unblocked(t).then_some((p.id, part, t))
        })
        .min_by(|a, b| a.2.total_cmp(&b.2));

    let target_hit = map
        .targets
        .iter()
        .filter_map(|target| {
            let t = ray_sphere(origin, dir, target.position, target.radius)?;
            unblocked(t).then_some((target, t))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));

    match (player_hit, target_hit) {
        (Some((id, part, t)), target) if target.is_none_or(|(_, tt)| t <= tt) => {
            ResolvedImpact::Player {
                id,
                part,
                distance: t,
            }
        },
        (_, Some((target, t))) => ResolvedImpact::Target {
            id: target.id.clone(),
            distance: t,
        },
        _ => match wall {
            Some(distance) => ResolvedImpact::Obstacle { distance },
            None => ResolvedImpact::Miss { distance: range },
        },
    }
}

/// Handle a fire request from `shooter_id` at time `now` (ms).
pub fn fire<R: Rng + ?Sized>(
    config: &SimConfig,
    map: &MapGeometry,
    weapons: &WeaponTable,
    players: &mut PlayerRegistry,
    shooter_id: PlayerId,
    now: u64,
    rng: &mut R,
) -> FireOutcome {
    let Some(shooter) = players.get_mut(shooter_id) else {
        return FireOutcome::Ignored;
    };
    if shooter.dead {
        return FireOutcome::Ignored;
    }
    let weapon_id = shooter.weapon;
    let Some(spec) = weapons.get(weapon_id) else {
        return FireOutcome::Ignored;
    };
    let Some(magazine) = shooter.magazines.get_mut(&weapon_id) else {
        return FireOutcome::Ignored;
    };

    magazine.settle(now, spec);
    if magazine.is_reloading() {
        return FireOutcome::Reloading;
    }
    if magazine.ammo == 0 {
        magazine.begin_reload(now, spec);
        return FireOutcome::ReloadStarted;
    }
    let interval = spec.fire_interval().as_millis() as u64;
    if shooter
        .last_shot_at
        .is_some_and(|last| now.saturating_sub(last) < interval)
    {
        return FireOutcome::RateLimited;
    }

    magazine.ammo -= 1;
    shooter.last_shot_at = Some(now);

    let origin = shooter.position.raised(config.eye_height);
    let base = dir_from_yaw_pitch(shooter.yaw, shooter.pitch);
    let dirs: SmallVec<[Vec3; 8]> = (0..spec.pellets)
        .map(|_| spread_direction(base, spec.spread, rng))
        .collect();

    let mut traces = Vec::with_capacity(dirs.len());
    let mut hits = Vec::new();
    let mut kills = SmallVec::new();

    for dir in dirs {
        let impact = resolve_impact(config, map, players, shooter_id, origin, dir, spec.range);
        traces.push(ShotTrace {
            dir,
            distance: impact.distance(),
            impact: impact.to_wire(),
        });

        match impact {
            ResolvedImpact::Player { id, part, distance } => {
                let Some(victim) = players.get_mut(id) else {
                    continue;
                };
                let damage = spec.damage_for(part == HitPart::Head);
                victim.health = victim.health.saturating_sub(damage);
                hits.push(ShotHit::Player {
                    target_id: id,
                    part,
                    damage,
                    remaining: victim.health,
                    distance,
                });

                if victim.health == 0 && !victim.dead {
                    victim.dead = true;
                    victim.deaths += 1;
                    kills.push(id);
                    if let Some(shooter) = players.get_mut(shooter_id) {
                        shooter.kills += 1;
                    }
                    tracing::info!(
                        killer = %shooter_id,
                        victim = %id,
                        weapon = %weapon_id,
                        "Player killed"
                    );
                }
            },
            ResolvedImpact::Target { id, distance } => {
                hits.push(ShotHit::Target {
                    target_id: id,
                    distance,
                });
            },
            ResolvedImpact::Obstacle { .. } | ResolvedImpact::Miss { .. } => {},
        }
    }

    FireOutcome::Fired {
        shot: ShotMsg {
            shooter_id,
            origin,
            weapon: weapon_id,
            traces,
            hits,
        },
        kills,
    }
}

/// Explicit reload of the current weapon. Returns true if a reload began.
pub fn reload(weapons: &WeaponTable, players: &mut PlayerRegistry, id: PlayerId, now: u64) -> bool {
    let Some(player) = players.get_mut(id) else {
        return false;
    };
    if player.dead {
        return false;
    }
    let Some(spec) = weapons.get(player.weapon) else {
        return false;
    };
    let Some(magazine) = player.magazines.get_mut(&player.weapon) else {
        return false;
    };
    magazine.settle(now, spec);
    magazine.begin_reload(now, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanfire_core::player::MAX_HEALTH;
    use lanfire_core::test_helpers::{make_target, open_map, walled_map};
    use lanfire_core::weapon::WeaponId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct World {
        config: SimConfig,
        map: MapGeometry,
        weapons: WeaponTable,
        players: PlayerRegistry,
        rng: StdRng,
    }

    impl World {
        fn new(map: MapGeometry) -> Self {
            Self {
                config: SimConfig::default(),
                map,
                weapons: WeaponTable::default(),
                players: PlayerRegistry::new(),
                rng: StdRng::seed_from_u64(7),
            }
        }

        fn spawn(&mut self, position: Vec3, weapon: WeaponId) -> PlayerId {
            let player = self.players.insert(position, &self.weapons);
            player.weapon = weapon;
            player.id
        }

        fn fire(&mut self, id: PlayerId, now: u64) -> FireOutcome {
            fire(
                &self.config,
                &self.map,
                &self.weapons,
                &mut self.players,
                id,
                now,
                &mut self.rng,
            )
        }

        fn player(&self, id: PlayerId) -> &Player {
            self.players.get(id).unwrap()
        }
    }

    fn expect_shot(outcome: FireOutcome) -> (ShotMsg, SmallVec<[PlayerId; 4]>) {
        match outcome {
            FireOutcome::Fired { shot, kills } => (shot, kills),
            other => panic!("expected a shot, got {other:?}"),
        }
    }

    #[test]
    fn rifle_point_blank_headshot() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Rifle);
        let victim = w.spawn(Vec3::new(0.0, 0.0, -4.0), WeaponId::Rifle);

        let (shot, kills) = expect_shot(w.fire(shooter, 1000));
        assert!(kills.is_empty());
        assert_eq!(shot.origin, Vec3::new(0.0, 1.6, 0.0));
        assert_eq!(shot.traces.len(), 1);
        assert_eq!(
            shot.hits,
            vec![ShotHit::Player {
                target_id: victim,
                part: HitPart::Head,
                damage: 21,
                remaining: 79,
                distance: shot.traces[0].distance,
            }]
        );
        assert_eq!(w.player(victim).health, 79);
        assert_eq!(w.player(shooter).ammo(WeaponId::Rifle), Some(29));
    }

    #[test]
    fn low_aim_hits_the_body() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Sniper);
        let victim = w.spawn(Vec3::new(0.0, 0.0, -10.0), WeaponId::Rifle);
        // Aim at the body center, 0.65 below eye level, 10 units out.
        w.players.get_mut(shooter).unwrap().pitch = (-0.65f32 / 10.0).atan();

        let (shot, _) = expect_shot(w.fire(shooter, 0));
        match &shot.hits[..] {
            [ShotHit::Player { part, damage, .. }] => {
                assert_eq!(*part, HitPart::Body);
                assert_eq!(*damage, 80);
            },
            other => panic!("expected one body hit, got {other:?}"),
        }
        assert_eq!(w.player(victim).health, 20);
    }

    #[test]
    fn shotgun_behind_wall_hits_only_the_wall() {
        let mut w = World::new(walled_map(-3.0));
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Shotgun);
        let victim = w.spawn(Vec3::new(0.0, 0.0, -6.0), WeaponId::Rifle);

        let (shot, _) = expect_shot(w.fire(shooter, 0));
        assert_eq!(shot.traces.len(), 8);
        assert!(
            shot.traces
                .iter()
                .all(|t| t.impact == Some(Impact::Obstacle))
        );
        assert!(shot.hits.is_empty());
        assert_eq!(w.player(victim).health, MAX_HEALTH);
    }

    #[test]
    fn fire_rate_gate_drops_fast_second_shot() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Deagle);

        expect_shot(w.fire(shooter, 1000));
        assert_eq!(w.fire(shooter, 1050), FireOutcome::RateLimited);
        expect_shot(w.fire(shooter, 1500));
        assert_eq!(w.player(shooter).ammo(WeaponId::Deagle), Some(5));
    }

    #[test]
    fn dead_shooter_cannot_fire() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Rifle);
        w.players.get_mut(shooter).unwrap().dead = true;
        assert_eq!(w.fire(shooter, 0), FireOutcome::Ignored);
        assert_eq!(w.fire(PlayerId(99), 0), FireOutcome::Ignored);
    }

    #[test]
    fn death_is_credited_once() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Sniper);
        let victim = w.spawn(Vec3::new(0.0, 0.0, -8.0), WeaponId::Rifle);

        let (_, kills) = expect_shot(w.fire(shooter, 0));
        assert_eq!(kills.as_slice(), &[victim]);
        assert!(w.player(victim).dead);
        assert_eq!(w.player(victim).health, 0);

        // Corpses are not hit again.
        let (shot, kills) = expect_shot(w.fire(shooter, 5000));
        assert!(kills.is_empty());
        assert!(shot.hits.is_empty());
        assert_eq!(shot.traces[0].impact, None);
        assert_eq!(w.player(shooter).kills, 1);
        assert_eq!(w.player(victim).deaths, 1);
    }

    #[test]
    fn shooter_is_never_hit_by_own_ray() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Pistol);
        // Straight down through the shooter's own hitboxes.
        w.players.get_mut(shooter).unwrap().pitch = -1.3;
        let (shot, _) = expect_shot(w.fire(shooter, 0));
        assert!(shot.hits.is_empty());
        assert_eq!(w.player(shooter).health, MAX_HEALTH);
    }

    #[test]
    fn out_of_range_ray_reports_full_range() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Shotgun);
        w.spawn(Vec3::new(0.0, 0.0, -40.0), WeaponId::Rifle);
        let (shot, _) = expect_shot(w.fire(shooter, 0));
        assert!(shot.hits.is_empty());
        for trace in &shot.traces {
            assert_eq!(trace.impact, None);
            assert!((trace.distance - 35.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn practice_target_is_reported() {
        let mut map = open_map();
        map.targets
            .push(make_target("t1", Vec3::new(0.0, 1.6, -20.0), 0.6));
        let mut w = World::new(map);
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Sniper);

        let (shot, _) = expect_shot(w.fire(shooter, 0));
        match &shot.hits[..] {
            [ShotHit::Target { target_id, distance }] => {
                assert_eq!(target_id, "t1");
                assert!((distance - 19.4).abs() < 1e-3);
            },
            other => panic!("expected one target hit, got {other:?}"),
        }
    }

    #[test]
    fn wall_hides_target_behind_it() {
        let mut map = walled_map(-3.0);
        map.targets
            .push(make_target("t1", Vec3::new(0.0, 1.6, -20.0), 0.6));
        let mut w = World::new(map);
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Sniper);

        let (shot, _) = expect_shot(w.fire(shooter, 0));
        assert_eq!(shot.traces[0].impact, Some(Impact::Obstacle));
        assert!((shot.traces[0].distance - 2.75).abs() < 1e-3);
        assert!(shot.hits.is_empty());
    }

    #[test]
    fn player_in_front_of_farther_wall_is_hit() {
        let mut w = World::new(walled_map(-15.0));
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Sniper);
        let victim = w.spawn(Vec3::new(0.0, 0.0, -6.0), WeaponId::Rifle);

        let (shot, _) = expect_shot(w.fire(shooter, 0));
        assert!(matches!(
            shot.traces[0].impact,
            Some(Impact::Player { target_id, .. }) if target_id == victim
        ));
        assert!(shot.traces[0].distance < 14.75);
        match &shot.hits[..] {
            [ShotHit::Player { target_id, distance, .. }] => {
                assert_eq!(*target_id, victim);
                assert!(*distance < 14.75);
            },
            other => panic!("expected one player hit, got {other:?}"),
        }
        assert!(w.player(victim).health < MAX_HEALTH);
    }

    #[test]
    fn player_in_front_of_target_wins() {
        let mut map = open_map();
        map.targets
            .push(make_target("t1", Vec3::new(0.0, 1.6, -20.0), 0.6));
        let mut w = World::new(map);
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Sniper);
        let victim = w.spawn(Vec3::new(0.0, 0.0, -10.0), WeaponId::Rifle);

        let (shot, _) = expect_shot(w.fire(shooter, 0));
        assert!(matches!(
            shot.traces[0].impact,
            Some(Impact::Player { target_id, .. }) if target_id == victim
        ));
    }

    #[test]
    fn empty_magazine_starts_reload_instead_of_firing() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Deagle);

        let mut now = 0;
        for _ in 0..7 {
            expect_shot(w.fire(shooter, now));
            now += 500;
        }
        assert_eq!(w.player(shooter).ammo(WeaponId::Deagle), Some(0));

        assert_eq!(w.fire(shooter, now), FireOutcome::ReloadStarted);
        assert_eq!(w.fire(shooter, now + 1000), FireOutcome::Reloading);
        // Deagle reload is 1.7 s.
        expect_shot(w.fire(shooter, now + 1700));
        assert_eq!(w.player(shooter).ammo(WeaponId::Deagle), Some(6));
    }

    #[test]
    fn explicit_reload_rules() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Rifle);

        // Full magazine: nothing to do.
        assert!(!reload(&w.weapons, &mut w.players, shooter, 0));

        expect_shot(w.fire(shooter, 0));
        assert!(reload(&w.weapons, &mut w.players, shooter, 100));
        // Already reloading.
        assert!(!reload(&w.weapons, &mut w.players, shooter, 200));
        assert_eq!(w.fire(shooter, 500), FireOutcome::Reloading);
        // Rifle reload is 1.6 s; completion is applied on the next touch.
        assert_eq!(w.player(shooter).ammo(WeaponId::Rifle), Some(29));
        expect_shot(w.fire(shooter, 1700));
        assert_eq!(w.player(shooter).ammo(WeaponId::Rifle), Some(29));
    }

    #[test]
    fn magazines_are_per_weapon() {
        let mut w = World::new(open_map());
        let shooter = w.spawn(Vec3::ZERO, WeaponId::Rifle);
        expect_shot(w.fire(shooter, 0));
        w.players.get_mut(shooter).unwrap().weapon = WeaponId::Pistol;
        expect_shot(w.fire(shooter, 1000));
        assert_eq!(w.player(shooter).ammo(WeaponId::Rifle), Some(29));
        assert_eq!(w.player(shooter).ammo(WeaponId::Pistol), Some(11));
    }

    #[test]
    fn zero_spread_keeps_base_direction() {
        let mut rng = StdRng::seed_from_u64(1);
        let base = dir_from_yaw_pitch(0.4, -0.2);
        assert_eq!(spread_direction(base, 0.0, &mut rng), base);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn spread_stays_within_half_angle(
                yaw in -3.0f32..3.0,
                pitch in -1.2f32..1.2,
                spread in 0.001f32..0.3,
                seed in any::<u64>(),
            ) {
                let mut rng = StdRng::seed_from_u64(seed);
                let base = dir_from_yaw_pitch(yaw, pitch);
                let dir = spread_direction(base, spread, &mut rng);
                prop_assert!((dir.length() - 1.0).abs() < 1e-4);
                // Half spread on each of two axes bounds the total angle.
                let angle = base.dot(dir).clamp(-1.0, 1.0).acos();
                prop_assert!(angle <= spread + 1e-3);
            }
        }
    }
}
