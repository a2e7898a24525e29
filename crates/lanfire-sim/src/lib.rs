pub mod combat;
pub mod config;
pub mod flash;
pub mod geometry;
pub mod registry;
pub mod schedule;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use lanfire_core::map::MapGeometry;
use lanfire_core::math::{Vec3, wrap_angle};
use lanfire_core::net::messages::{
    ClientMessage, DeathMsg, FlashMsg, FlashThrowMsg, PlayerJoinMsg, PlayerLeaveMsg, ServerMessage,
    StateMsg, StateUpdateMsg, WelcomeMsg,
};
use lanfire_core::player::{PlayerId, sanitize_name};
use lanfire_core::weapon::{WeaponId, WeaponTable};

use combat::FireOutcome;
use config::SimConfig;
use registry::PlayerRegistry;
use schedule::{ScheduledTask, Scheduler};

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    AllExcept(PlayerId),
    Only(PlayerId),
}

impl Recipient {
    pub fn includes(self, id: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(except) => except != id,
            Self::Only(only) => only == id,
        }
    }
}

/// A message produced by the simulation, addressed for fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub msg: ServerMessage,
}

impl Outbound {
    fn all(msg: ServerMessage) -> Self {
        Self {
            to: Recipient::All,
            msg,
        }
    }
}

/// The whole authoritative world. Every handler takes `&mut self` and runs
/// to completion, returning the messages it wants delivered.
///
/// Time is passed in explicitly as milliseconds since the simulation
/// started, so the same inputs always produce the same world.
pub struct Simulation {
    config: SimConfig,
    map: MapGeometry,
    weapons: WeaponTable,
    players: PlayerRegistry,
    scheduler: Scheduler,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimConfig, map: MapGeometry, weapons: WeaponTable) -> Self {
        Self::with_rng(config, map, weapons, StdRng::from_os_rng())
    }

    /// Deterministic spawn choice and spread, for tests and replays.
    pub fn with_seed(config: SimConfig, map: MapGeometry, weapons: WeaponTable, seed: u64) -> Self {
        Self::with_rng(config, map, weapons, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimConfig, map: MapGeometry, weapons: WeaponTable, rng: StdRng) -> Self {
        Self {
            config,
            map,
            weapons,
            players: PlayerRegistry::new(),
            scheduler: Scheduler::new(),
            rng,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn map(&self) -> &MapGeometry {
        &self.map
    }

    pub fn weapons(&self) -> &WeaponTable {
        &self.weapons
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Earliest pending respawn or detonation (ms).
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    /// Add a player for a new connection.
    ///
    /// Returns the new id plus a private `welcome` and a `player_join` for
    /// everyone else.
    pub fn connect(&mut self) -> (PlayerId, Vec<Outbound>) {
        let spawn = pick_spawn(&self.map, &mut self.rng);
        let player = self.players.insert(spawn, &self.weapons);
        let id = player.id;
        let joined = player.snapshot();
        tracing::info!(player_id = %id, players = self.players.len(), "Player connected");

        let welcome = ServerMessage::Welcome(Box::new(WelcomeMsg {
            id,
            map: self.map.clone(),
            weapons: self.weapons.clone(),
            players: self.players.snapshots(),
        }));
        let out = vec![
            Outbound {
                to: Recipient::Only(id),
                msg: welcome,
            },
            Outbound {
                to: Recipient::AllExcept(id),
                msg: ServerMessage::PlayerJoin(PlayerJoinMsg { player: joined }),
            },
        ];
        (id, out)
    }

    /// Remove a player whose connection closed.
    pub fn disconnect(&mut self, id: PlayerId) -> Vec<Outbound> {
        if self.players.remove(id).is_none() {
            return Vec::new();
        }
        tracing::info!(player_id = %id, players = self.players.len(), "Player disconnected");
        vec![Outbound::all(ServerMessage::PlayerLeave(PlayerLeaveMsg {
            id,
        }))]
    }

    /// Apply one decoded client message at time `now`.
    pub fn handle(&mut self, id: PlayerId, msg: ClientMessage, now: u64) -> Vec<Outbound> {
        if !self.players.contains(id) {
            return Vec::new();
        }
        match msg {
            ClientMessage::State(update) => {
                self.apply_state(id, update);
                Vec::new()
            },
            ClientMessage::SetName(set) => {
                if let Some(player) = self.players.get_mut(id) {
                    player.name = sanitize_name(set.name.as_deref().unwrap_or_default(), id);
                    tracing::debug!(player_id = %id, name = %player.name, "Name set");
                }
                Vec::new()
            },
            ClientMessage::Shoot {} => self.shoot(id, now),
            ClientMessage::Reload {} => {
                if combat::reload(&self.weapons, &mut self.players, id, now) {
                    tracing::debug!(player_id = %id, "Reload started");
                }
                Vec::new()
            },
            ClientMessage::SwitchWeapon(switch) => {
                self.select_weapon(id, switch.weapon);
                Vec::new()
            },
            ClientMessage::ThrowFlash(throw) => self.throw_flash(id, throw.charge, now),
        }
    }

    /// Run every scheduled task due at or before `now`.
    pub fn advance(&mut self, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Some(task) = self.scheduler.pop_due(now) {
            match task {
                ScheduledTask::Respawn { player_id } => self.respawn(player_id),
                ScheduledTask::Detonate { origin, radius } => {
                    tracing::debug!(x = origin.x, y = origin.y, z = origin.z, "Flash detonated");
                    out.push(Outbound::all(ServerMessage::Flash(FlashMsg {
                        origin,
                        radius,
                    })));
                },
            }
        }
        out
    }

    /// Periodic snapshot of every player.
    pub fn state_message(&self) -> ServerMessage {
        ServerMessage::State(StateMsg {
            players: self.players.snapshots(),
        })
    }

    fn apply_state(&mut self, id: PlayerId, update: StateUpdateMsg) {
        let bounds = self.map.bounds;
        let max_pitch = self.config.max_pitch;
        let max_height = self.config.max_player_height;
        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        if player.dead {
            return;
        }
        if let Some(position) = update.position.filter(|p| p.is_finite()) {
            player.position = bounds.clamp(position, 0.0, max_height);
        }
        if let Some(yaw) = update.yaw.filter(|y| y.is_finite()) {
            player.yaw = wrap_angle(yaw);
        }
        if let Some(pitch) = update.pitch.filter(|p| p.is_finite()) {
            player.pitch = pitch.clamp(-max_pitch, max_pitch);
        }
        if let Some(stance) = update.stance {
            player.stance = stance;
        }
        self.select_weapon(id, update.weapon);
    }

    fn select_weapon(&mut self, id: PlayerId, weapon: Option<WeaponId>) {
        let Some(weapon) = weapon.filter(|w| self.weapons.contains(*w)) else {
            return;
        };
        if let Some(player) = self.players.get_mut(id)
            && player.weapon != weapon
        {
            player.weapon = weapon;
            tracing::trace!(player_id = %id, %weapon, "Weapon switched");
        }
    }

    fn shoot(&mut self, id: PlayerId, now: u64) -> Vec<Outbound> {
        let outcome = combat::fire(
            &self.config,
            &self.map,
            &self.weapons,
            &mut self.players,
            id,
            now,
            &mut self.rng,
        );
        match outcome {
            FireOutcome::Fired { shot, kills } => {
                let mut out = Vec::with_capacity(kills.len() + 1);
                for victim in kills {
                    self.scheduler.schedule(
                        now + self.config.respawn_delay_ms,
                        ScheduledTask::Respawn { player_id: victim },
                    );
                    out.push(Outbound::all(ServerMessage::Death(DeathMsg {
                        id: victim,
                        killer_id: id,
                    })));
                }
                out.push(Outbound::all(ServerMessage::Shot(shot)));
                out
            },
            FireOutcome::ReloadStarted => {
                tracing::debug!(player_id = %id, "Magazine empty, reloading");
                Vec::new()
            },
            rejected @ (FireOutcome::Reloading | FireOutcome::RateLimited | FireOutcome::Ignored) => {
                tracing::trace!(player_id = %id, outcome = ?rejected, "Shot rejected");
                Vec::new()
            },
        }
    }

    fn throw_flash(&mut self, id: PlayerId, charge: Option<f32>, now: u64) -> Vec<Outbound> {
        let flash_cfg = &self.config.flash;
        let Some(player) = self.players.get_mut(id) else {
            return Vec::new();
        };
        if player.dead {
            return Vec::new();
        }
        if player
            .last_flash_at
            .is_some_and(|last| now.saturating_sub(last) < flash_cfg.cooldown_ms)
        {
            tracing::trace!(player_id = %id, "Flash on cooldown");
            return Vec::new();
        }
        player.last_flash_at = Some(now);

        let eye = player.position.raised(self.config.eye_height);
        let plan = flash::plan_throw(
            flash_cfg,
            &self.map.bounds,
            eye,
            player.yaw,
            player.pitch,
            charge,
        );
        self.scheduler.schedule(
            now + flash_cfg.fuse_ms,
            ScheduledTask::Detonate {
                origin: plan.detonation,
                radius: flash_cfg.radius,
            },
        );
        tracing::debug!(player_id = %id, "Flash thrown");

        vec![Outbound::all(ServerMessage::FlashThrow(FlashThrowMsg {
            origin: plan.origin,
            velocity: plan.velocity,
            fuse_ms: flash_cfg.fuse_ms,
        }))]
    }

    fn respawn(&mut self, id: PlayerId) {
        let spawn = pick_spawn(&self.map, &mut self.rng);
        match self.players.get_mut(id) {
            Some(player) if player.dead => {
                player.respawn(spawn, &self.weapons);
                tracing::debug!(player_id = %id, "Player respawned");
            },
            _ => tracing::trace!(player_id = %id, "Respawn skipped"),
        }
    }
}

fn pick_spawn(map: &MapGeometry, rng: &mut StdRng) -> Vec3 {
    map.spawns.choose(rng).copied().unwrap_or(Vec3::ZERO)
}
