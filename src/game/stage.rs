//! Stage
//!
//! Owns the maze, the camera, the controller slots and every player, and runs
//! one simulation tick against an explicitly passed transport.
//!
//! ## Tick Order
//!
//! ```text
//! 1. spawn local player in tile (0, 0) if inactive
//! 2. steer local player from input
//! 3. send local state to every known remote
//! 4. drain transport events (joins, leaves, deltas)
//! 5. resolve movement for every active player
//! 6. refresh camera target
//! ```

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::core::vec2::Vec2;
use crate::game::camera::Camera;
use crate::game::collision::resolve_movement;
use crate::game::grid::{GridError, TileCoord, TileGrid};
use crate::game::input::{ControllerTable, InputError, InputSource};
use crate::game::player::{PeerId, PlayerEntity, SpriteId};
use crate::network::protocol::{DeltaTracker, StateDelta};
use crate::network::transport::{Transport, TransportEvent};

/// Tile every player spawns in.
pub const SPAWN_TILE: TileCoord = TileCoord::new(0, 0);

/// Controller slot that steers the local player.
pub const LOCAL_CONTROLLER: usize = 0;

/// Stage construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Maze could not be built.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

/// What happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number (first tick is 1)
    pub tick: u64,
    /// Updates handed to the transport
    pub sent: usize,
    /// Updates decoded and applied
    pub received: usize,
    /// Messages dropped because they failed to decode
    pub dropped: usize,
}

/// One sprite to draw at a screen position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    /// Sprite handle
    pub sprite: SpriteId,
    /// Top-left corner on screen
    pub screen_position: Vec2,
}

/// A running maze with its players.
#[derive(Debug)]
pub struct Stage {
    config: SimConfig,
    grid: TileGrid,
    camera: Camera,
    local_id: PeerId,
    players: BTreeMap<PeerId, PlayerEntity>,
    trackers: BTreeMap<PeerId, DeltaTracker>,
    disconnected: BTreeSet<PeerId>,
    controllers: ControllerTable,
    camera_center: Vec2,
    tick: u64,
}

impl Stage {
    /// Build the configured maze with an inactive local player.
    pub fn new(config: SimConfig, local_id: PeerId) -> Result<Self, StageError> {
        let grid = TileGrid::generate(
            config.grid_width,
            config.grid_height,
            config.tile_width,
            config.tile_height,
            config.maze_seed,
            config.wall_one_in,
        )?;
        Ok(Self::with_grid(config, grid, local_id))
    }

    /// Use a prebuilt maze. Grid settings in `config` are ignored.
    pub fn with_grid(config: SimConfig, grid: TileGrid, local_id: PeerId) -> Self {
        let mut camera = Camera::new(
            grid.stage_width(),
            grid.stage_height(),
            config.screen_width,
            config.screen_height,
        );
        camera.follow(local_id);

        let mut stage = Self {
            config,
            grid,
            camera,
            local_id,
            players: BTreeMap::new(),
            trackers: BTreeMap::new(),
            disconnected: BTreeSet::new(),
            controllers: ControllerTable::new(),
            camera_center: Vec2::ZERO,
            tick: 0,
        };
        let local = stage.new_player();
        stage.players.insert(local_id, local);
        stage
    }

    /// Plug an input source into a controller slot. Slot
    /// [`LOCAL_CONTROLLER`] steers the local player.
    pub fn attach_input(&mut self, index: usize, source: Box<dyn InputSource>) -> Result<(), InputError> {
        self.controllers.attach(index, source)
    }

    fn new_player(&self) -> PlayerEntity {
        PlayerEntity::new(
            self.config.player_width,
            self.config.player_height,
            SpriteId(self.config.player_sprite),
        )
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Run one tick.
    pub fn tick(&mut self, transport: &mut dyn Transport) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        self.spawn_local();

        self.controllers.update_all();
        if let Ok(controller) = self.controllers.get(LOCAL_CONTROLLER) {
            let (direction, next, prev) =
                (controller.move_direction(), controller.next_player(), controller.prev_player());
            if let Some(local) = self.players.get_mut(&self.local_id) {
                local.state.steer(direction);
            }
            if next {
                self.cycle_camera(true);
            } else if prev {
                self.cycle_camera(false);
            }
        }

        report.sent = self.send_local_state(transport);
        self.receive(transport, &mut report);

        let scan = self.config.collision_scan;
        for player in self.players.values_mut().filter(|p| p.is_active()) {
            player.set_velocity(player.moving_velocity());
            resolve_movement(player, &self.grid, scan);
        }

        self.update_camera();

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            "Tick {}: sent={} received={} dropped={}",
            report.tick,
            report.sent,
            report.received,
            report.dropped
        );

        report
    }

    fn spawn_local(&mut self) {
        let Some(local) = self.players.get_mut(&self.local_id) else {
            return;
        };
        if local.is_active() {
            return;
        }
        if let Err(e) = self.grid.center_in_tile(SPAWN_TILE, local) {
            warn!("Could not place local player: {}", e);
        }
        local.state.set_active(true);
        info!("Local player {} spawned at {}", self.local_id, local.position());
    }

    fn send_local_state(&mut self, transport: &mut dyn Transport) -> usize {
        let Some(local) = self.players.get(&self.local_id) else {
            return 0;
        };

        let policy = self.config.sync_policy;
        let mut buf = Vec::new();
        let mut sent = 0;
        for (&peer, tracker) in self.trackers.iter_mut() {
            let Some(delta) = tracker.next_delta(policy, local) else {
                continue;
            };
            buf.clear();
            delta.encode_into(&mut buf);

            match transport.send(peer, &buf) {
                Ok(()) => {
                    sent += 1;
                    log_delta("Sent to", peer, &delta, &buf);
                }
                Err(e) => {
                    warn!("Failed to send to {}: {}", peer, e);
                    // Resend everything once the peer is reachable again
                    tracker.reset();
                }
            }
        }
        sent
    }

    fn receive(&mut self, transport: &mut dyn Transport, report: &mut TickReport) {
        while let Some(event) = transport.poll_event() {
            match event {
                TransportEvent::PeerJoined(peer) => self.add_peer(peer),
                TransportEvent::PeerLeft(peer) => self.remove_peer(peer),
                TransportEvent::Message { from, payload } => {
                    if from == self.local_id || self.disconnected.contains(&from) {
                        continue;
                    }
                    match StateDelta::decode(&payload) {
                        Ok(delta) => {
                            if !self.players.contains_key(&from) {
                                self.add_peer(from);
                            }
                            if let Some(player) = self.players.get_mut(&from) {
                                delta.apply(player);
                            }
                            report.received += 1;
                            log_delta("Received from", from, &delta, &payload);
                        }
                        Err(e) => {
                            report.dropped += 1;
                            warn!("Dropping message from {}: {} [{}]", from, e, hex::encode(&payload));
                            if self.config.disconnect_on_decode_error {
                                self.kick(from, transport);
                            }
                        }
                    }
                }
            }
        }
    }

    fn add_peer(&mut self, peer: PeerId) {
        if peer == self.local_id || self.players.contains_key(&peer) {
            return;
        }
        self.disconnected.remove(&peer);
        let player = self.new_player();
        self.players.insert(peer, player);
        self.trackers.insert(peer, DeltaTracker::new());
        info!("Player {} joined", peer);
    }

    fn remove_peer(&mut self, peer: PeerId) {
        self.disconnected.remove(&peer);
        if peer == self.local_id {
            return;
        }
        self.trackers.remove(&peer);
        if self.players.remove(&peer).is_some() {
            info!("Player {} left", peer);
        }
        if self.camera.following() == Some(peer) {
            self.camera.follow(self.local_id);
        }
    }

    fn kick(&mut self, peer: PeerId, transport: &mut dyn Transport) {
        warn!("Disconnecting {} after undecodable message", peer);
        self.remove_peer(peer);
        self.disconnected.insert(peer);
        transport.disconnect(peer);
    }

    fn cycle_camera(&mut self, forward: bool) {
        let active: Vec<PeerId> = self
            .players
            .iter()
            .filter(|(_, p)| p.is_active())
            .map(|(&id, _)| id)
            .collect();
        if active.is_empty() {
            return;
        }
        let current = self
            .camera
            .following()
            .and_then(|id| active.iter().position(|&a| a == id))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % active.len()
        } else {
            (current + active.len() - 1) % active.len()
        };
        self.camera.follow(active[next]);
        debug!("Camera following {}", active[next]);
    }

    fn update_camera(&mut self) {
        let followed = self.camera.following().and_then(|id| self.players.get(&id));
        match followed {
            Some(player) => self.camera_center = player.center(),
            None => {
                self.camera.follow(self.local_id);
                if let Some(local) = self.players.get(&self.local_id) {
                    self.camera_center = local.center();
                }
            }
        }
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Sprites to draw this frame: visible tiles row by row, then active
    /// players.
    pub fn draw_list(&self) -> Vec<DrawCommand> {
        let visible = self.camera.visible_tiles(&self.grid, self.camera_center);
        let mut commands = Vec::new();

        for y in visible.min.y..=visible.max.y {
            for x in visible.min.x..=visible.max.x {
                if let Some(tile) = self.grid.get(TileCoord::new(x, y)) {
                    commands.push(DrawCommand {
                        sprite: tile.sprite,
                        screen_position: self.camera.to_screen(tile.bounds.position(), self.camera_center),
                    });
                }
            }
        }

        for player in self.players.values().filter(|p| p.is_active()) {
            commands.push(DrawCommand {
                sprite: player.sprite,
                screen_position: self.camera.to_screen(player.position(), self.camera_center),
            });
        }

        commands
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// The maze.
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Controller slots.
    pub fn controllers(&self) -> &ControllerTable {
        &self.controllers
    }

    /// The camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Current draw offset.
    pub fn camera_offset(&self) -> Vec2 {
        self.camera.offset_for(self.camera_center)
    }

    /// Id of the local player.
    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    /// The local player.
    pub fn local_player(&self) -> Option<&PlayerEntity> {
        self.players.get(&self.local_id)
    }

    /// A player by id.
    pub fn player(&self, id: PeerId) -> Option<&PlayerEntity> {
        self.players.get(&id)
    }

    /// All players in id order.
    pub fn players(&self) -> impl Iterator<Item = (PeerId, &PlayerEntity)> + '_ {
        self.players.iter().map(|(&id, p)| (id, p))
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

fn log_delta(what: &str, peer: PeerId, delta: &StateDelta, bytes: &[u8]) {
    debug!(
        "{} {}: direction={} position={} facing={} [{}]",
        what,
        peer,
        delta.direction.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
        delta.position.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
        delta.facing.map(|f| f.to_string()).unwrap_or_else(|| "-".into()),
        hex::encode(bytes)
    );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::direction::{DirectionFlags, Facing};
    use crate::game::input::{InputFrame, ScriptedInput, MAX_CONTROLLERS};
    use crate::network::transport::LoopbackHub;

    fn open_stage(local: PeerId) -> Stage {
        let grid = TileGrid::from_fn(10, 10, 48, 48, |_| false).unwrap();
        Stage::with_grid(SimConfig::default(), grid, local)
    }

    fn walking(x: f32, y: f32) -> Box<dyn InputSource> {
        Box::new(ScriptedInput::from_frames([InputFrame::with_movement(x, y)]))
    }

    #[test]
    fn test_new_stage_from_config() {
        let stage = Stage::new(SimConfig::default(), PeerId(1)).unwrap();
        assert_eq!(stage.grid().stage_width(), 1920);
        assert_eq!(stage.camera().following(), Some(PeerId(1)));
        assert!(!stage.local_player().unwrap().is_active());
    }

    #[test]
    fn test_oversized_maze_is_an_error() {
        let config = SimConfig {
            grid_width: 50_000,
            grid_height: 1,
            tile_width: 50_000,
            wall_one_in: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            Stage::new(config, PeerId(1)),
            Err(StageError::Grid(GridError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_first_tick_spawns_and_moves_local_player() {
        let hub = LoopbackHub::new();
        let mut transport = hub.connect();
        let mut stage = open_stage(transport.local_id());
        stage.attach_input(LOCAL_CONTROLLER, walking(1.0, 0.0)).unwrap();

        let report = stage.tick(&mut transport);
        assert_eq!(report.tick, 1);
        assert_eq!(report.sent, 0);

        let local = stage.local_player().unwrap();
        assert!(local.is_active());
        // Centered in tile (0, 0) at (8, 2), then one step right
        assert_eq!(local.position(), Vec2::new(12.0, 2.0));
        assert_eq!(local.facing(), Facing::West);
    }

    #[test]
    fn test_two_stages_sync() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let mut tb = hub.connect();
        let mut a = open_stage(ta.local_id());
        let mut b = open_stage(tb.local_id());
        a.attach_input(LOCAL_CONTROLLER, walking(0.0, 1.0)).unwrap();

        // Tick 1 learns about the other peer
        a.tick(&mut ta);
        b.tick(&mut tb);
        // Tick 2 sends full state both ways
        let ra = a.tick(&mut ta);
        assert_eq!(ra.sent, 1);
        let rb = b.tick(&mut tb);
        assert_eq!(rb.received, 1);

        // b saw a's tick-2 pre-move state, then simulated one step itself
        let remote = b.player(ta.local_id()).unwrap();
        let local = a.local_player().unwrap();
        assert!(remote.is_active());
        assert_eq!(remote.state.direction(), DirectionFlags::HARD_DOWN);
        assert_eq!(remote.position(), local.position());
        assert_eq!(remote.facing(), Facing::South);
    }

    #[test]
    fn test_undecodable_message_dropped() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let mut tb = hub.connect();
        let mut a = open_stage(ta.local_id());
        a.tick(&mut ta);

        tb.send(ta.local_id(), &[0xff]).unwrap();
        let report = a.tick(&mut ta);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.received, 0);
        // Peer stays connected by default
        assert!(a.player(tb.local_id()).is_some());
        assert_eq!(hub.peer_count(), 2);
    }

    #[test]
    fn test_undecodable_message_disconnects_when_configured() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let mut tb = hub.connect();
        let mut tc = hub.connect();
        let config = SimConfig {
            disconnect_on_decode_error: true,
            ..SimConfig::default()
        };
        let grid = TileGrid::from_fn(10, 10, 48, 48, |_| false).unwrap();
        let mut a = Stage::with_grid(config, grid, ta.local_id());
        a.tick(&mut ta);

        tb.send(ta.local_id(), &[0x03, 0x00]).unwrap();
        tb.send(ta.local_id(), &[0x00]).unwrap();
        tc.send(ta.local_id(), &[0x00]).unwrap();

        let report = a.tick(&mut ta);
        assert_eq!(report.dropped, 1);
        // b's follow-up is ignored, c is unaffected
        assert_eq!(report.received, 1);
        assert!(a.player(tb.local_id()).is_none());
        assert!(a.player(tc.local_id()).unwrap().is_active());
        assert_eq!(hub.peer_count(), 2);
    }

    #[test]
    fn test_peer_left_removes_player() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let tb = hub.connect();
        let mut a = open_stage(ta.local_id());
        a.tick(&mut ta);
        assert!(a.player(tb.local_id()).is_some());

        drop(tb);
        a.tick(&mut ta);
        assert_eq!(a.players().count(), 1);
    }

    #[test]
    fn test_camera_cycles_through_active_players() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let mut tb = hub.connect();
        let mut a = open_stage(ta.local_id());
        a.tick(&mut ta);
        tb.send(ta.local_id(), &StateDelta::default().encode()).unwrap();
        a.tick(&mut ta);

        let mut next = InputFrame::new();
        next.set_flag(InputFrame::FLAG_NEXT, true);
        a.attach_input(LOCAL_CONTROLLER, Box::new(ScriptedInput::from_frames([next]))).unwrap();
        a.tick(&mut ta);
        assert_eq!(a.camera().following(), Some(tb.local_id()));

        // Held button does not cycle again
        a.tick(&mut ta);
        assert_eq!(a.camera().following(), Some(tb.local_id()));

        drop(tb);
        a.tick(&mut ta);
        assert_eq!(a.camera().following(), Some(ta.local_id()));
    }

    #[test]
    fn test_draw_list() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let mut a = open_stage(ta.local_id());
        a.tick(&mut ta);

        // 480×480 stage fits on screen: every tile plus the local player
        let commands = a.draw_list();
        assert_eq!(commands.len(), 101);
        assert_eq!(commands[0].screen_position, Vec2::ZERO);
        assert_eq!(commands[1].screen_position, Vec2::new(48.0, 0.0));
        let player = commands[100];
        assert_eq!(player.sprite, SpriteId(2));
        assert_eq!(player.screen_position, Vec2::new(8.0, 2.0));
    }

    #[test]
    fn test_only_local_slot_steers() {
        let hub = LoopbackHub::new();
        let mut ta = hub.connect();
        let mut a = open_stage(ta.local_id());
        a.attach_input(1, walking(1.0, 0.0)).unwrap();
        assert_eq!(
            a.attach_input(MAX_CONTROLLERS, walking(1.0, 0.0)),
            Err(InputError::InvalidPlayer(MAX_CONTROLLERS))
        );

        a.tick(&mut ta);
        assert_eq!(a.local_player().unwrap().position(), Vec2::new(8.0, 2.0));
        // Every slot is polled
        assert_eq!(a.controllers().get(1).unwrap().move_direction(), Vec2::RIGHT);
    }
}
