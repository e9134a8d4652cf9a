//! Per-recipient payload building
//!
//! Everything a client receives about the world goes through here. The
//! [`SerializationView`] decides which tanks are shown in detail and which
//! cells are revealed; everything else is left out of the payload.

use crate::ws::packet::{EnumFormat, Wire};
use crate::ws::payload::{
    AbilityEntry, BulletEntry, GameEndPayload, GameStatePayload, GridDimensions, ItemEntry,
    LaserEntry, LobbyPayload, LobbyPlayer, LobbySettings, LobbyTeam, MapPayload, MineEntry,
    PlayerEntry, PlayerMap, SerializationView, SpectatorMap, TankEntry, TeamEntry, Tile,
    TurretEntry, WallEntry, ZoneEntry, ZoneStatusEntry,
};

use super::ability::{AbilityType, Regenerable};
use super::direction::Position;
use super::entity::{Bullet, Laser, Mine, SecondaryItem};
use super::player::{Player, PlayerId};
use super::systems::VisibilityGrid;
use super::tank::Tank;
use super::world::World;
use super::zone::{Captor, Zone, ZoneState};

/// What one recipient is allowed to know
struct Perspective<'a> {
    view: &'a SerializationView,
    /// Tanks shown with full detail
    detailed: Vec<PlayerId>,
    /// `None` reveals everything
    visibility: Option<VisibilityGrid>,
    team: Option<&'a str>,
}

impl<'a> Perspective<'a> {
    fn new(world: &'a World, view: &'a SerializationView) -> Self {
        match view {
            SerializationView::Spectator => Self {
                view,
                detailed: world.players.iter().map(|p| p.id).collect(),
                visibility: None,
                team: None,
            },
            SerializationView::Player(id) => {
                let team = world.player(*id).and_then(|p| p.team.as_deref());
                let detailed = match team.and_then(|t| world.team(t)) {
                    Some(team) if world.ruleset().is_team() => team.members.clone(),
                    _ => vec![*id],
                };
                Self {
                    view,
                    detailed,
                    visibility: Some(world.view_of(*id)),
                    team,
                }
            }
            SerializationView::Team(name) => {
                let members = world
                    .team(name)
                    .map(|t| t.members.clone())
                    .unwrap_or_default();
                Self {
                    view,
                    visibility: Some(world.visibility.team_view(&members)),
                    detailed: members,
                    team: Some(name.as_str()),
                }
            }
        }
    }

    fn is_spectator(&self) -> bool {
        self.view.is_spectator()
    }

    fn sees(&self, p: Position) -> bool {
        self.visibility.as_ref().map_or(true, |v| v.is_visible(p))
    }

    /// Private stats are shown to spectators, the player and their team view
    fn knows_stats_of(&self, player: &Player) -> bool {
        match self.view {
            SerializationView::Spectator => true,
            SerializationView::Player(id) => *id == player.id,
            SerializationView::Team(name) => player.team.as_deref() == Some(name.as_str()),
        }
    }

    fn knows_team_score(&self, team: &str) -> bool {
        self.is_spectator() || self.team == Some(team)
    }
}

pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn lobby(
        world: &World,
        settings: &LobbySettings,
        recipient: Option<PlayerId>,
        format: EnumFormat,
    ) -> LobbyPayload {
        let players = world
            .players
            .iter()
            .map(|p| LobbyPlayer {
                id: p.id,
                nickname: p.nickname.clone(),
                color: p.color,
                team_name: p.team.clone(),
                tank_type: p.tank_type.map(|t| Wire::new(t, format)),
            })
            .collect();
        let teams = world.ruleset().is_team().then(|| {
            world
                .teams
                .iter()
                .map(|t| LobbyTeam {
                    name: t.name.clone(),
                    color: t.color,
                    players: t.members.clone(),
                })
                .collect()
        });

        LobbyPayload {
            player_id: recipient,
            players,
            teams,
            server_settings: settings.clone(),
        }
    }

    pub fn game_state(
        world: &World,
        id: &str,
        view: &SerializationView,
        format: EnumFormat,
    ) -> GameStatePayload {
        let perspective = Perspective::new(world, view);
        let map = if perspective.is_spectator() {
            MapPayload::Spectator(Self::spectator_map(world, format))
        } else {
            MapPayload::Player(Self::player_map(world, &perspective, format))
        };

        GameStatePayload {
            id: id.to_owned(),
            tick: world.tick(),
            players: Self::player_entries(world, &perspective),
            teams: Self::team_entries(world, &perspective),
            map,
        }
    }

    /// Final standings, best first
    pub fn game_end(world: &World, valid: bool) -> GameEndPayload {
        let view = SerializationView::Spectator;
        let perspective = Perspective::new(world, &view);

        let mut players = Self::player_entries(world, &perspective);
        players.sort_by(|a, b| b.score.cmp(&a.score).then(b.kills.cmp(&a.kills)));
        let teams = Self::team_entries(world, &perspective).map(|mut teams| {
            teams.sort_by(|a, b| b.score.cmp(&a.score));
            teams
        });

        GameEndPayload {
            ticks: world.tick(),
            players,
            teams,
            ended_at: chrono::Utc::now().to_rfc3339(),
            valid,
        }
    }

    fn player_entries(world: &World, perspective: &Perspective) -> Vec<PlayerEntry> {
        world
            .players
            .iter()
            .map(|p| {
                let private = perspective.knows_stats_of(p);
                let respawn = world
                    .grid
                    .tank(p.id)
                    .filter(|t| t.is_dead())
                    .and_then(|t| t.remaining_regeneration_ticks());
                PlayerEntry {
                    id: p.id,
                    nickname: p.nickname.clone(),
                    color: p.color,
                    ping: p.ping_ms,
                    team_name: p.team.clone(),
                    score: private.then_some(p.score),
                    kills: private.then_some(p.kills),
                    ticks_to_respawn: respawn.filter(|_| private),
                }
            })
            .collect()
    }

    fn team_entries(world: &World, perspective: &Perspective) -> Option<Vec<TeamEntry>> {
        world.ruleset().is_team().then(|| {
            world
                .teams
                .iter()
                .map(|t| TeamEntry {
                    name: t.name.clone(),
                    color: t.color,
                    score: perspective.knows_team_score(&t.name).then_some(t.score),
                    players: t.members.clone(),
                })
                .collect()
        })
    }

    fn player_map(world: &World, perspective: &Perspective, format: EnumFormat) -> PlayerMap {
        let dim = world.grid.dim();
        let mut tiles: Vec<Vec<Vec<Tile>>> = vec![vec![Vec::new(); dim]; dim];

        for p in world.grid.walls() {
            if let Some(tile) = cell_mut(&mut tiles, p) {
                tile.push(Tile::Wall);
            }
        }
        for tank in &world.grid.tanks {
            let Some(p) = tank.position() else { continue };
            if !perspective.sees(p) {
                continue;
            }
            let detailed = perspective.detailed.contains(&tank.owner);
            if let Some(tile) = cell_mut(&mut tiles, p) {
                tile.push(Tile::Tank(tank_entry(tank, detailed, false, format)));
            }
        }
        for bullet in &world.grid.bullets {
            let p = bullet.cell();
            if perspective.sees(p) {
                if let Some(tile) = cell_mut(&mut tiles, p) {
                    tile.push(Tile::Bullet(bullet_entry(bullet, false, format)));
                }
            }
        }
        for laser in &world.grid.lasers {
            if perspective.sees(laser.position) {
                if let Some(tile) = cell_mut(&mut tiles, laser.position) {
                    tile.push(Tile::Laser(laser_entry(laser, false, format)));
                }
            }
        }
        for mine in &world.grid.mines {
            if perspective.sees(mine.position) {
                if let Some(tile) = cell_mut(&mut tiles, mine.position) {
                    tile.push(Tile::Mine(mine_entry(mine, false)));
                }
            }
        }
        for item in &world.grid.items {
            if perspective.sees(item.position) {
                if let Some(tile) = cell_mut(&mut tiles, item.position) {
                    tile.push(Tile::Item(item_entry(item, false, format)));
                }
            }
        }

        let visibility = perspective
            .visibility
            .as_ref()
            .map(VisibilityGrid::to_rows)
            .unwrap_or_default();

        PlayerMap {
            tiles,
            zones: world.grid.zones.iter().map(zone_entry).collect(),
            visibility,
        }
    }

    fn spectator_map(world: &World, format: EnumFormat) -> SpectatorMap {
        let dim = world.grid.dim();
        SpectatorMap {
            grid_dimensions: GridDimensions {
                width: dim,
                height: dim,
            },
            walls: world
                .grid
                .walls()
                .map(|p| WallEntry { x: p.x, y: p.y })
                .collect(),
            tanks: world
                .grid
                .tanks
                .iter()
                .filter(|t| !t.is_dead())
                .map(|t| tank_entry(t, true, true, format))
                .collect(),
            bullets: world
                .grid
                .bullets
                .iter()
                .map(|b| bullet_entry(b, true, format))
                .collect(),
            lasers: world
                .grid
                .lasers
                .iter()
                .map(|l| laser_entry(l, true, format))
                .collect(),
            mines: world.grid.mines.iter().map(|m| mine_entry(m, true)).collect(),
            items: world
                .grid
                .items
                .iter()
                .map(|i| item_entry(i, true, format))
                .collect(),
            zones: world.grid.zones.iter().map(zone_entry).collect(),
        }
    }
}

fn cell_mut(tiles: &mut [Vec<Vec<Tile>>], p: Position) -> Option<&mut Vec<Tile>> {
    let x = usize::try_from(p.x).ok()?;
    let y = usize::try_from(p.y).ok()?;
    tiles.get_mut(x)?.get_mut(y)
}

fn tank_entry(tank: &Tank, detailed: bool, absolute: bool, format: EnumFormat) -> TankEntry {
    let position = tank.position().filter(|_| absolute);
    let bullet = &tank.abilities.bullet;
    let abilities = detailed.then(|| {
        AbilityType::ALL
            .iter()
            .copied()
            .filter(|kind| tank.abilities.has(*kind))
            .map(|kind| AbilityEntry {
                kind: Wire::new(kind, format),
                remaining_ticks: tank.abilities.remaining_ticks(kind),
            })
            .collect()
    });

    TankEntry {
        owner_id: tank.owner,
        direction: Wire::new(tank.direction, format),
        turret: TurretEntry {
            direction: Wire::new(tank.turret.direction, format),
            bullet_count: detailed.then(|| bullet.count()),
            ticks_to_bullet: bullet
                .remaining_regeneration_ticks()
                .filter(|_| detailed),
        },
        x: position.map(|p| p.x),
        y: position.map(|p| p.y),
        health: detailed.then_some(tank.health),
        tank_type: tank.kind.map(|k| Wire::new(k, format)),
        secondary_item: tank
            .secondary_item
            .filter(|_| detailed)
            .map(|i| Wire::new(i, format)),
        abilities,
        is_using_radar: detailed.then(|| tank.abilities.radar_active()),
    }
}

fn bullet_entry(bullet: &Bullet, absolute: bool, format: EnumFormat) -> BulletEntry {
    let p = bullet.cell();
    BulletEntry {
        id: bullet.id,
        direction: Wire::new(bullet.direction, format),
        speed: bullet.speed,
        kind: Wire::new(bullet.kind, format),
        x: absolute.then_some(p.x),
        y: absolute.then_some(p.y),
        damage: absolute.then_some(bullet.damage),
        shooter_id: bullet.shooter.filter(|_| absolute),
    }
}

fn laser_entry(laser: &Laser, absolute: bool, format: EnumFormat) -> LaserEntry {
    LaserEntry {
        id: laser.id,
        orientation: Wire::new(laser.orientation, format),
        x: absolute.then_some(laser.position.x),
        y: absolute.then_some(laser.position.y),
        damage: absolute.then_some(laser.damage),
        shooter_id: laser.shooter.filter(|_| absolute),
    }
}

fn mine_entry(mine: &Mine, absolute: bool) -> MineEntry {
    MineEntry {
        id: mine.id,
        explosion_remaining_ticks: mine.explosion_remaining_ticks,
        x: absolute.then_some(mine.position.x),
        y: absolute.then_some(mine.position.y),
        damage: absolute.then_some(mine.damage),
        layer_id: mine.layer.filter(|_| absolute),
    }
}

fn item_entry(item: &SecondaryItem, absolute: bool, format: EnumFormat) -> ItemEntry {
    ItemEntry {
        kind: Wire::new(item.kind, format),
        x: absolute.then_some(item.position.x),
        y: absolute.then_some(item.position.y),
    }
}

fn captor_name(captor: &Captor) -> String {
    match captor {
        Captor::Player(id) => id.to_string(),
        Captor::Team(name) => name.clone(),
    }
}

fn zone_entry(zone: &Zone) -> ZoneEntry {
    let status = match &zone.state {
        ZoneState::Neutral => ZoneStatusEntry::Neutral,
        ZoneState::BeingCaptured { by, remaining_ticks } => ZoneStatusEntry::BeingCaptured {
            remaining_ticks: *remaining_ticks,
            by: captor_name(by),
        },
        ZoneState::Captured { by } => ZoneStatusEntry::Captured {
            by: captor_name(by),
        },
        ZoneState::BeingContested { captured_by } => ZoneStatusEntry::BeingContested {
            captured_by: captured_by.as_ref().map(captor_name),
        },
        ZoneState::BeingRetaken {
            captured_by,
            retaken_by,
            remaining_ticks,
        } => ZoneStatusEntry::BeingRetaken {
            remaining_ticks: *remaining_ticks,
            captured_by: captor_name(captured_by),
            retaken_by: captor_name(retaken_by),
        },
    };

    ZoneEntry {
        index: zone.index,
        x: zone.x,
        y: zone.y,
        width: zone.width,
        height: zone.height,
        status,
    }
}

/// Outbound byte counters, logged when a game ends
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_recipients_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, recipients: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        let n = self.total_snapshots as f32;
        self.avg_recipients_per_snapshot =
            self.avg_recipients_per_snapshot * ((n - 1.0) / n) + (recipients as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::direction::Direction;
    use crate::game::grid::Grid;
    use crate::game::player::PlayerKind;
    use crate::game::ability::SecondaryItemType;
    use crate::game::action::Action;
    use crate::game::ruleset::Ruleset;
    use crate::game::systems::ItemSystem;
    use crate::ws::packet::{Packet, PacketType};
    use crate::ws::payload::{ConnectionRejectedPayload, LobbySettings};
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use serde_json::Value;
    use uuid::Uuid;

    fn place(world: &mut World, at: Position, facing: Direction) -> PlayerId {
        let id = Uuid::new_v4();
        world.add_player(Player::new(id, format!("P{}", world.players.len()), PlayerKind::Bot, 0));
        world.grid.tank_mut(id).unwrap().respawn_at(at, facing, facing);
        id
    }

    /// Two tanks with a wall between them, neither can see the other
    fn walled_world() -> (World, PlayerId, PlayerId) {
        let mut grid = Grid::new(9);
        for y in 0..9 {
            grid.set_wall(Position::new(4, y), true);
        }
        let mut world = World::with_grid(grid, Ruleset::Solo, 3);
        let a = place(&mut world, Position::new(1, 4), Direction::Right);
        let b = place(&mut world, Position::new(7, 4), Direction::Left);
        world.update(1.0);
        (world, a, b)
    }

    fn encode(world: &World, view: SerializationView) -> String {
        let payload = SnapshotBuilder::game_state(world, "state", &view, EnumFormat::String);
        Packet::with_payload(PacketType::GameState, &payload)
            .unwrap()
            .encode(EnumFormat::String)
    }

    /// Send through the envelope and read the payload back as a client would
    fn read_back<P: Serialize + DeserializeOwned>(kind: PacketType, payload: &P, format: EnumFormat) -> P {
        let text = Packet::with_payload(kind, payload).unwrap().encode(format);
        let packet = Packet::decode(&text).unwrap();
        assert_eq!(packet.packet_type, kind);
        serde_json::from_value(packet.payload.unwrap()).unwrap()
    }

    fn team_world() -> (World, Vec<PlayerId>) {
        let mut world = World::with_grid(Grid::new(12), Ruleset::Team, 3);
        let ids: Vec<PlayerId> = (0..2)
            .map(|i| {
                let id = Uuid::new_v4();
                let mut player = Player::new(id, format!("T{i}"), PlayerKind::Bot, 0);
                player.team = Some("red".into());
                world.add_player(player);
                id
            })
            .collect();
        world
            .grid
            .tank_mut(ids[0])
            .unwrap()
            .respawn_at(Position::new(1, 1), Direction::Down, Direction::Down);
        world
            .grid
            .tank_mut(ids[1])
            .unwrap()
            .respawn_at(Position::new(10, 10), Direction::Up, Direction::Up);
        world.update(1.0);
        (world, ids)
    }

    fn tanks_in(json: &Value) -> Vec<Value> {
        let mut found = Vec::new();
        for column in json["payload"]["map"]["tiles"].as_array().unwrap() {
            for tile in column.as_array().unwrap() {
                for entity in tile.as_array().unwrap() {
                    if entity["type"] == "tank" {
                        found.push(entity["payload"].clone());
                    }
                }
            }
        }
        found
    }

    #[test]
    fn hidden_enemy_is_not_leaked() {
        let (world, a, b) = walled_world();
        let json: Value = serde_json::from_str(&encode(&world, SerializationView::Player(a))).unwrap();

        let tanks = tanks_in(&json);
        assert_eq!(tanks.len(), 1);
        assert_eq!(tanks[0]["ownerId"], a.to_string());
        assert_eq!(tanks[0]["health"], 100);
        let roster = json["payload"]["players"].as_array().unwrap();
        let enemy = roster.iter().find(|p| p["id"] == b.to_string()).unwrap();
        assert!(enemy.get("score").is_none());
        assert!(enemy.get("kills").is_none());
    }

    #[test]
    fn visible_enemy_exposes_public_fields_only() {
        let mut world = World::with_grid(Grid::new(9), Ruleset::Solo, 3);
        let a = place(&mut world, Position::new(4, 6), Direction::Up);
        let b = place(&mut world, Position::new(4, 3), Direction::Down);
        world.update(1.0);

        let json: Value = serde_json::from_str(&encode(&world, SerializationView::Player(a))).unwrap();
        let enemy = tanks_in(&json)
            .into_iter()
            .find(|t| t["ownerId"] == b.to_string())
            .unwrap();
        assert_eq!(enemy["direction"], "down");
        assert!(enemy.get("health").is_none());
        assert!(enemy.get("secondaryItem").is_none());
        assert!(enemy["turret"].get("bulletCount").is_none());
        assert!(enemy.get("x").is_none());
    }

    #[test]
    fn different_views_encode_differently() {
        let (world, a, b) = walled_world();
        let for_a = encode(&world, SerializationView::Player(a));
        let for_b = encode(&world, SerializationView::Player(b));
        let for_spectator = encode(&world, SerializationView::Spectator);
        assert_ne!(for_a, for_b);
        assert_ne!(for_a, for_spectator);
    }

    #[test]
    fn spectator_sees_absolute_details() {
        let (world, _, _) = walled_world();
        let json: Value = serde_json::from_str(&encode(&world, SerializationView::Spectator)).unwrap();
        let map = &json["payload"]["map"];
        assert_eq!(map["gridDimensions"]["width"], 9);
        assert_eq!(map["walls"].as_array().unwrap().len(), 9);
        let tanks = map["tanks"].as_array().unwrap();
        assert_eq!(tanks.len(), 2);
        assert!(tanks.iter().all(|t| t.get("x").is_some() && t.get("health").is_some()));
        assert!(json["payload"]["players"][0].get("score").is_some());
    }

    #[test]
    fn visibility_rows_match_dimension() {
        let (world, a, _) = walled_world();
        let payload = SnapshotBuilder::game_state(
            &world,
            "state",
            &SerializationView::Player(a),
            EnumFormat::Int,
        );
        let MapPayload::Player(map) = payload.map else {
            panic!("player map expected");
        };
        assert_eq!(map.visibility.len(), 9);
        assert!(map.visibility.iter().all(|row| row.len() == 9));
        // nothing beyond the wall column is visible
        assert!(map.visibility.iter().all(|row| !row[5..].contains('1')));
        assert_eq!(map.tiles.len(), 9);
        assert!(matches!(map.tiles[4][0][0], Tile::Wall));
    }

    #[test]
    fn team_members_share_detail() {
        let (world, ids) = team_world();
        let json: Value =
            serde_json::from_str(&encode(&world, SerializationView::Player(ids[0]))).unwrap();
        let tanks = tanks_in(&json);
        assert_eq!(tanks.len(), 2);
        assert!(tanks.iter().all(|t| t.get("health").is_some()));
        assert!(json["payload"]["teams"][0].get("score").is_some());
    }

    #[test]
    fn game_state_reads_back_for_every_view_and_format() {
        let mut world = World::with_grid(Grid::new(9), Ruleset::Solo, 3);
        let a = place(&mut world, Position::new(4, 6), Direction::Up);
        place(&mut world, Position::new(4, 3), Direction::Down);
        ItemSystem::drop_near(&mut world.grid, SecondaryItemType::Radar, Position::new(1, 1));
        world
            .apply_action(a, Action::UseAbility(AbilityType::FireBullet))
            .unwrap();
        world.update(1.0);
        let (team, _) = team_world();

        let cases = [
            (&world, SerializationView::Spectator),
            (&world, SerializationView::Player(a)),
            (&team, SerializationView::Team("red".into())),
            (&team, SerializationView::Spectator),
        ];
        for (world, view) in &cases {
            for format in [EnumFormat::Int, EnumFormat::String] {
                let sent = SnapshotBuilder::game_state(world, "state", view, format);
                let received = read_back(PacketType::GameState, &sent, format);
                assert_eq!(received, sent, "{view:?} in {format:?}");
            }
        }
        let spectator = SnapshotBuilder::game_state(&world, "s", &SerializationView::Spectator, EnumFormat::Int);
        assert!(matches!(
            read_back(PacketType::GameState, &spectator, EnumFormat::Int).map,
            MapPayload::Spectator(_)
        ));
    }

    #[test]
    fn lobby_end_and_rejection_read_back() {
        let (world, ids) = team_world();
        let settings = LobbySettings {
            grid_dimension: 12,
            number_of_players: 2,
            seed: 3,
            broadcast_interval: 100,
            ruleset: "team".into(),
            sandbox_mode: false,
            eager_broadcast: false,
            ticks: Some(50),
            match_name: None,
            version: "1.0.0".into(),
        };
        for format in [EnumFormat::Int, EnumFormat::String] {
            let lobby = SnapshotBuilder::lobby(&world, &settings, Some(ids[0]), format);
            assert_eq!(read_back(PacketType::LobbyData, &lobby, format), lobby);
        }

        let end = SnapshotBuilder::game_end(&world, false);
        let received = read_back(PacketType::GameEnded, &end, EnumFormat::String);
        assert_eq!(received, end);
        assert!(!received.valid);

        let rejected = ConnectionRejectedPayload {
            reason: "GameFull".into(),
        };
        assert_eq!(
            read_back(PacketType::ConnectionRejected, &rejected, EnumFormat::Int),
            rejected
        );
    }

    #[test]
    fn game_end_sorts_by_score() {
        let (mut world, a, b) = walled_world();
        world.award_score(b, 30);
        world.award_score(a, 10);
        let end = SnapshotBuilder::game_end(&world, true);
        assert_eq!(end.players[0].id, b);
        assert_eq!(end.players[0].score, Some(30));
        assert_eq!(end.players[1].id, a);
    }
}
