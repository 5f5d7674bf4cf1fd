//! Session construction from a template and a submitted fleet

use crate::constants::FULL_HP_RANT;
use crate::protocol::{
    CommanderInfo, CurrentChapterInfo, Cs13101, Cs13101Kr, EliteFleetInfo, FleetDutyPair, GroupInChapter,
    ShipInChapter, StrategyInfo, TeamInfo,
};

use super::grid::{build_chapter_cells, choose_spawn, select_spawn_positions, Attachment, ChapterPos};
use super::template::ChapterTemplate;
use super::TemplateError;

const COMMANDER_POS_MAIN: u32 = 1;
const COMMANDER_POS_SUB: u32 = 2;

/// Fields shared by both entry variants.
struct SessionFrame<'a> {
    chapter_id: u32,
    loop_flag: u32,
    operation_buff_id: u32,
    fleet_duties: &'a [FleetDutyPair],
    now: u32,
}

/// Build a fresh session from team ship lists.
///
/// Returns the session and the number of ships that entered.
pub fn build_current_chapter(
    template: &ChapterTemplate,
    request: &Cs13101,
    operation_buff_id: u32,
    now: u32,
) -> Result<(CurrentChapterInfo, u32), TemplateError> {
    let grids = template.parse_grids()?;
    let main_spawns = select_spawn_positions(&grids, Attachment::Born);
    let sub_spawns = select_spawn_positions(&grids, Attachment::BornSub);

    let (main_teams, sub_teams, support_teams) = match &request.fleet {
        Some(fleet) => (
            fleet.main_team.as_slice(),
            fleet.submarine_team.as_slice(),
            fleet.support_team.as_slice(),
        ),
        None => (&[][..], &[][..], &[][..]),
    };

    let (main_groups, main_count) = build_groups_from_teams(main_teams, &main_spawns, template.ammo_total);
    let (sub_groups, sub_count) = build_groups_from_teams(sub_teams, &sub_spawns, template.ammo_submarine);
    let (support_groups, support_count) = build_groups_from_teams(support_teams, &main_spawns, template.ammo_total);
    let ship_count = main_count + sub_count + support_count;

    let frame = SessionFrame {
        chapter_id: request.id,
        loop_flag: request.loop_flag(),
        operation_buff_id,
        fleet_duties: &request.fleet_duties,
        now,
    };
    let mut session = new_session(template, &frame, ship_count);
    session.cell_list = build_chapter_cells(&grids, template);
    session.main_group_list = main_groups;
    session.submarine_group_list = sub_groups;
    session.support_group_list = support_groups;
    Ok((session, ship_count))
}

/// Build a fresh session from pre-formed elite groups (KR clients).
pub fn build_current_chapter_kr(
    template: &ChapterTemplate,
    request: &Cs13101Kr,
    operation_buff_id: u32,
    now: u32,
) -> Result<(CurrentChapterInfo, u32), TemplateError> {
    let grids = template.parse_grids()?;
    let main_spawns = select_spawn_positions(&grids, Attachment::Born);
    let (main_groups, ship_count) = build_groups_from_elite(
        &request.group_id_list,
        &request.elite_fleet_list,
        &main_spawns,
        template.ammo_total,
    );

    let frame = SessionFrame {
        chapter_id: request.id,
        loop_flag: request.loop_flag(),
        operation_buff_id,
        fleet_duties: &request.fleet_duties,
        now,
    };
    let mut session = new_session(template, &frame, ship_count);
    session.cell_list = build_chapter_cells(&grids, template);
    session.main_group_list = main_groups;
    Ok((session, ship_count))
}

fn new_session(template: &ChapterTemplate, frame: &SessionFrame<'_>, ship_count: u32) -> CurrentChapterInfo {
    CurrentChapterInfo {
        id: frame.chapter_id,
        time: frame.now.saturating_add(template.time),
        operation_buff: operation_buff_list(frame.operation_buff_id),
        loop_flag: frame.loop_flag,
        chapter_strategy_list: template
            .chapter_strategy
            .iter()
            .map(|&id| StrategyInfo { id, count: 0 })
            .collect(),
        init_ship_count: ship_count,
        fleet_duties: frame.fleet_duties.to_vec(),
        ..Default::default()
    }
}

fn operation_buff_list(buff_id: u32) -> Vec<u32> {
    if buff_id == 0 {
        Vec::new()
    } else {
        vec![buff_id]
    }
}

fn full_health(ship_ids: &[u32]) -> Vec<ShipInChapter> {
    ship_ids
        .iter()
        .map(|&id| ShipInChapter {
            id,
            hp_rant: FULL_HP_RANT,
        })
        .collect()
}

fn new_group(group_id: u32, ships: Vec<ShipInChapter>, spawn: ChapterPos, ammo: u32, commanders: Vec<CommanderInfo>) -> GroupInChapter {
    GroupInChapter {
        id: group_id,
        ship_list: ships,
        pos: Some(spawn.into()),
        bullet: ammo,
        start_pos: Some(spawn.into()),
        commander_list: commanders,
        fleet_id: group_id,
        ..Default::default()
    }
}

/// Group ids of zero are replaced by their 1-based position.
fn resolve_group_id(group_id: u32, index: usize) -> u32 {
    if group_id == 0 {
        index as u32 + 1
    } else {
        group_id
    }
}

fn build_groups_from_teams(teams: &[TeamInfo], spawns: &[ChapterPos], ammo: u32) -> (Vec<GroupInChapter>, u32) {
    let mut ship_count = 0;
    let groups = teams
        .iter()
        .enumerate()
        .map(|(index, team)| {
            ship_count += team.ship_list.len() as u32;
            new_group(
                resolve_group_id(team.id, index),
                full_health(&team.ship_list),
                choose_spawn(spawns, index),
                ammo,
                commander_list(team.commander_main(), team.commander_sub()),
            )
        })
        .collect();
    (groups, ship_count)
}

fn build_groups_from_elite(
    group_ids: &[u32],
    elite: &[EliteFleetInfo],
    spawns: &[ChapterPos],
    ammo: u32,
) -> (Vec<GroupInChapter>, u32) {
    let mut ship_count = 0;
    let groups = group_ids
        .iter()
        .enumerate()
        .map(|(index, &group_id)| {
            let fleet = elite.get(index);
            let ships = fleet.map(|f| full_health(&f.ship_id_list)).unwrap_or_default();
            let commanders = fleet.map(|f| f.commanders.clone()).unwrap_or_default();
            ship_count += ships.len() as u32;
            new_group(
                resolve_group_id(group_id, index),
                ships,
                choose_spawn(spawns, index),
                ammo,
                commanders,
            )
        })
        .collect();
    (groups, ship_count)
}

fn commander_list(main: u32, sub: u32) -> Vec<CommanderInfo> {
    [(COMMANDER_POS_MAIN, main), (COMMANDER_POS_SUB, sub)]
        .into_iter()
        .filter(|&(_, id)| id != 0)
        .map(|(pos, id)| CommanderInfo { pos, id })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FleetInfo;
    use serde_json::json;

    fn template(grids: serde_json::Value) -> ChapterTemplate {
        ChapterTemplate {
            id: 101,
            grids: serde_json::from_value(grids).unwrap(),
            ammo_total: 5,
            ammo_submarine: 3,
            time: 3600,
            chapter_strategy: vec![7, 8],
            ..Default::default()
        }
    }

    fn team(id: u32, ships: &[u32]) -> TeamInfo {
        TeamInfo {
            id,
            ship_list: ships.to_vec(),
            commander_main: None,
            commander_sub: None,
        }
    }

    fn request(fleet: FleetInfo) -> Cs13101 {
        Cs13101 {
            id: 101,
            fleet: Some(fleet),
            operation_item: None,
            loop_flag: None,
            fleet_duties: vec![FleetDutyPair { key: 1, value: 2 }],
        }
    }

    #[test]
    fn test_two_cell_scenario() {
        let template = template(json!([[1, 1, true, 1], [1, 2, true, 0]]));
        let fleet = FleetInfo {
            id: 1,
            main_team: vec![team(1, &[11, 12])],
            submarine_team: vec![],
            support_team: vec![],
        };
        let (session, ships) = build_current_chapter(&template, &request(fleet), 0, 1_000).unwrap();

        assert_eq!(ships, 2);
        assert_eq!(session.init_ship_count, 2);
        assert_eq!(session.main_group_list.len(), 1);

        let group = &session.main_group_list[0];
        assert_eq!(group.position(), ChapterPos::new(1, 1));
        assert_eq!(group.start_pos, group.pos);
        assert_eq!(group.bullet, 5);
        assert_eq!(group.step_count, 0);
        assert_eq!(group.fleet_id, 1);
        assert!(group.ship_list.iter().all(|s| s.hp_rant == FULL_HP_RANT));

        // Only the spawn carries an attachment
        assert_eq!(session.cell_list.len(), 1);
        assert_eq!(session.time, 4_600);
        assert_eq!(session.fleet_duties.len(), 1);
        assert!(session.operation_buff.is_empty());
        assert_eq!(
            session.chapter_strategy_list,
            vec![StrategyInfo { id: 7, count: 0 }, StrategyInfo { id: 8, count: 0 }]
        );
    }

    #[test]
    fn test_one_group_per_team_with_kind_ammo() {
        let template = template(json!([
            [1, 1, true, 1], [1, 2, true, 1], [2, 1, true, 16], [2, 2, true, 0]
        ]));
        let mut main = team(0, &[1]);
        main.commander_main = Some(501);
        main.commander_sub = Some(0);
        let fleet = FleetInfo {
            id: 1,
            main_team: vec![main, team(0, &[2, 3])],
            submarine_team: vec![team(9, &[4])],
            support_team: vec![team(0, &[5]), team(0, &[6]), team(0, &[7])],
        };
        let (session, ships) = build_current_chapter(&template, &request(fleet), 88, 0).unwrap();

        assert_eq!(ships, 7);
        assert_eq!(session.operation_buff, vec![88]);

        let main_ids: Vec<u32> = session.main_group_list.iter().map(|g| g.id).collect();
        assert_eq!(main_ids, vec![1, 2]);
        assert_eq!(session.main_group_list[1].position(), ChapterPos::new(1, 2));
        assert_eq!(
            session.main_group_list[0].commander_list,
            vec![CommanderInfo { pos: 1, id: 501 }]
        );

        let sub = &session.submarine_group_list[0];
        assert_eq!((sub.id, sub.bullet), (9, 3));
        assert_eq!(sub.position(), ChapterPos::new(2, 1));

        // Support groups reuse main spawns, round robin falling back to the first
        let support: Vec<ChapterPos> = session.support_group_list.iter().map(|g| g.position()).collect();
        assert_eq!(
            support,
            vec![ChapterPos::new(1, 1), ChapterPos::new(1, 2), ChapterPos::new(1, 1)]
        );
        assert!(session.support_group_list.iter().all(|g| g.bullet == 5));
    }

    #[test]
    fn test_empty_grid_spawns_at_origin() {
        let template = template(json!([]));
        let fleet = FleetInfo {
            id: 1,
            main_team: vec![team(1, &[1])],
            submarine_team: vec![team(2, &[2])],
            support_team: vec![],
        };
        let (session, _) = build_current_chapter(&template, &request(fleet), 0, 0).unwrap();
        assert_eq!(session.main_group_list[0].position(), ChapterPos::FALLBACK_SPAWN);
        assert_eq!(session.submarine_group_list[0].position(), ChapterPos::FALLBACK_SPAWN);
        assert!(session.cell_list.is_empty());
    }

    #[test]
    fn test_bad_grid_fails_build() {
        let template = template(json!([[1, 1, "maybe", 1]]));
        let fleet = FleetInfo {
            id: 1,
            main_team: vec![team(1, &[1])],
            submarine_team: vec![],
            support_team: vec![],
        };
        assert!(build_current_chapter(&template, &request(fleet), 0, 0).is_err());
    }

    #[test]
    fn test_elite_variant() {
        let template = template(json!([[1, 1, true, 1], [3, 3, true, 1]]));
        let request = Cs13101Kr {
            id: 101,
            group_id_list: vec![0, 7, 8],
            operation_item: None,
            loop_flag: Some(1),
            elite_fleet_list: vec![
                EliteFleetInfo {
                    ship_id_list: vec![1, 2],
                    commanders: vec![CommanderInfo { pos: 2, id: 33 }],
                },
                EliteFleetInfo {
                    ship_id_list: vec![3],
                    commanders: vec![],
                },
            ],
            fleet_duties: vec![],
        };
        let (session, ships) = build_current_chapter_kr(&template, &request, 0, 0).unwrap();

        assert_eq!(ships, 3);
        assert_eq!(session.loop_flag, 1);
        assert!(session.submarine_group_list.is_empty());
        assert!(session.support_group_list.is_empty());

        let groups = &session.main_group_list;
        assert_eq!(groups.iter().map(|g| g.id).collect::<Vec<_>>(), vec![1, 7, 8]);
        assert_eq!(groups[0].commander_list, vec![CommanderInfo { pos: 2, id: 33 }]);
        assert_eq!(groups[1].position(), ChapterPos::new(3, 3));
        // A group id without a matching elite fleet enters empty
        assert!(groups[2].ship_list.is_empty());
        assert_eq!(groups[2].position(), ChapterPos::new(1, 1));
    }
}
