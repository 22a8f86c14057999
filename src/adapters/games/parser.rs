//! Esports payload parsing.
//!
//! Turns raw provider JSON into [`GameEvent`]s and detects match
//! completion. League of Legends payloads follow the PandaScore live
//! frame layout, Dota 2 payloads the OpenDota match layout. Events the
//! belief model has no likelihoods for are dropped here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::types::{EventType, GameEvent, GameType, Team};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LolEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    killer_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monster_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    building_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LolFrame {
    #[serde(default)]
    events: Vec<LolEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct LolMatch {
    #[serde(default)]
    frames: Vec<LolFrame>,
    #[serde(default)]
    finished: Option<bool>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DotaObjective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    team: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct DotaMatch {
    #[serde(default)]
    objectives: Vec<DotaObjective>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    radiant_win: Option<bool>,
}

/// OpenDota marks radiant objectives with team 2.
const DOTA_RADIANT: i64 = 2;

fn lowercase(value: Option<&str>) -> String {
    value.unwrap_or_default().to_ascii_lowercase()
}

fn classify_lol(event: &LolEvent) -> Option<EventType> {
    match lowercase(event.kind.as_deref()).as_str() {
        "champion_kill" | "kill" => Some(EventType::Kill),
        "dragon_kill" | "elite_monster_kill" => {
            let monster = lowercase(event.monster_type.as_deref());
            if monster.contains("dragon") {
                Some(EventType::Dragon)
            } else if monster.contains("baron") {
                Some(EventType::Baron)
            } else {
                None
            }
        }
        "building_kill" => {
            let building = lowercase(event.building_type.as_deref());
            if building.contains("tower") {
                Some(EventType::Tower)
            } else if building.contains("inhibitor") {
                Some(EventType::Inhibitor)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn classify_dota(objective: &DotaObjective) -> Option<EventType> {
    let kind = lowercase(objective.kind.as_deref());
    if kind == "roshan" {
        Some(EventType::Roshan)
    } else if kind.contains("tower") {
        Some(EventType::Tower)
    } else if kind.contains("barracks") {
        Some(EventType::Inhibitor)
    } else {
        None
    }
}

fn parse_lol(raw: &Value) -> Vec<GameEvent> {
    let data = LolMatch::deserialize(raw).unwrap_or_default();
    data.frames
        .iter()
        .flat_map(|frame| frame.events.iter())
        .filter_map(|event| {
            let event_type = classify_lol(event)?;
            let stamp = event.timestamp.as_deref().unwrap_or("unknown");
            let timestamp = event
                .timestamp
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map_or_else(Utc::now, |t| t.with_timezone(&Utc));
            Some(GameEvent {
                event_type,
                team: Team::from_label(event.killer_team.as_deref().unwrap_or("unknown")),
                timestamp,
                event_id: format!("{stamp}_{}", event.kind.as_deref().unwrap_or_default()),
                details: serde_json::to_value(event).unwrap_or(Value::Null),
            })
        })
        .collect()
}

fn parse_dota(raw: &Value) -> Vec<GameEvent> {
    let data = DotaMatch::deserialize(raw).unwrap_or_default();
    data.objectives
        .iter()
        .filter_map(|objective| {
            let event_type = classify_dota(objective)?;
            let time = objective
                .time
                .map_or_else(|| "unknown".to_string(), |t| t.to_string());
            Some(GameEvent {
                event_type,
                team: if objective.team == Some(DOTA_RADIANT) {
                    Team::Radiant
                } else {
                    Team::Dire
                },
                timestamp: Utc::now(),
                event_id: format!("{time}_{}", objective.kind.as_deref().unwrap_or_default()),
                details: serde_json::to_value(objective).unwrap_or(Value::Null),
            })
        })
        .collect()
}

/// Every recognised event in `raw`, in provider order.
pub fn parse_events(raw: &Value, game: GameType) -> Vec<GameEvent> {
    match game {
        GameType::Lol => parse_lol(raw),
        GameType::Dota => parse_dota(raw),
    }
}

/// Whether the provider reports the match as over.
pub fn is_match_complete(raw: &Value, game: GameType) -> bool {
    match game {
        GameType::Lol => {
            let data = LolMatch::deserialize(raw).unwrap_or_default();
            data.finished == Some(true) || data.status.as_deref() == Some("finished")
        }
        GameType::Dota => {
            let data = DotaMatch::deserialize(raw).unwrap_or_default();
            data.duration.is_some() && data.radiant_win.is_some()
        }
    }
}
