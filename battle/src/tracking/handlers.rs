//! Built-in handlers, one per protocol command

use duelist_protocol::{GameType, Player, Pokemon, ProtocolLine, Stat};

use super::battle::{BattleState, Phase};
use super::interpreter::{Handler, Interpreter};
use crate::types::{BattlePokemon, LogEntry, LogKind, Status, Type, effect_id};

pub(super) const BUILTIN: &[(&str, Handler)] = &[
    ("player", player),
    ("teamsize", teamsize),
    ("gametype", gametype),
    ("turn", turn),
    ("switch", switch),
    ("drag", switch),
    ("replace", switch),
    ("detailschange", forme_change),
    ("-formechange", forme_change),
    ("move", use_move),
    ("-damage", hp_change),
    ("-heal", hp_change),
    ("-sethp", hp_change),
    ("faint", faint),
    ("-status", status),
    ("-curestatus", cure_status),
    ("-cureteam", cure_team),
    ("-boost", boost),
    ("-unboost", boost),
    ("-setboost", boost),
    ("-clearboost", clear_boosts),
    ("-clearpositiveboost", clear_boosts),
    ("-clearnegativeboost", clear_boosts),
    ("-invertboost", clear_boosts),
    ("-clearallboost", clear_all_boosts),
    ("-copyboost", copy_boosts),
    ("-weather", weather),
    ("-fieldstart", field_start),
    ("-fieldend", field_end),
    ("-sidestart", side_start),
    ("-sideend", side_end),
    ("-swapsideconditions", swap_side_conditions),
    ("-item", item),
    ("-enditem", end_item),
    ("-ability", ability),
    ("-endability", end_ability),
    ("-terastallize", terastallize),
    ("-start", volatile_start),
    ("-end", volatile_end),
    ("-transform", transform),
    ("-activate", activate),
    ("-crit", hit_note),
    ("-supereffective", hit_note),
    ("-resisted", hit_note),
    ("-immune", hit_note),
    ("cant", cant),
    ("win", win),
    ("tie", tie),
];

fn entry(state: &BattleState, kind: LogKind, text: impl Into<String>) -> Option<LogEntry> {
    Some(LogEntry::new(state.turn, kind, text))
}

fn label(ident: &Pokemon) -> String {
    format!("{}: {}", ident.player, ident.name)
}

/// " (from X)" suffix for lines carrying a `[from]` tag
fn cause(line: &ProtocolLine) -> String {
    line.tag("from")
        .map(|from| format!(" (from {from})"))
        .unwrap_or_default()
}

/// Items and abilities revealed through `[from] item: X` / `[from] ability: X`
fn reveal_from(poke: &mut BattlePokemon, line: &ProtocolLine) {
    let Some(from) = line.tag("from") else {
        return;
    };
    if let Some(item) = from.strip_prefix("item: ") {
        poke.item = Some(item.to_string());
    } else if let Some(ability) = from.strip_prefix("ability: ")
        && line.tag("of").is_none()
    {
        poke.ability = Some(ability.to_string());
    }
}

fn fill_from_dex(interp: &Interpreter, poke: &mut BattlePokemon) {
    if let Some(data) = interp.dex().and_then(|dex| dex.species(&poke.species)) {
        poke.set_species_types(data.types.clone());
        poke.base_speed = Some(data.base_speed);
    }
}

fn player(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let player = Player::parse(line.arg(0)?)?;
    let name = line.arg_or_empty(1);
    if name.is_empty() {
        return None;
    }
    state.side_mut(player).name = name.to_string();
    entry(state, LogKind::Setup, format!("{name} joined as {player}"))
}

fn teamsize(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let player = Player::parse(line.arg(0)?)?;
    let size = line.arg(1)?.parse().ok()?;
    state.side_mut(player).team_size = Some(size);
    None
}

fn gametype(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let game_type = GameType::parse(line.arg(0)?)?;
    state.set_game_type(game_type);
    None
}

fn turn(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let number: u32 = line.arg(0)?.parse().ok()?;
    if number < state.turn {
        tracing::debug!(current = state.turn, received = number, "Ignoring stale turn");
        return None;
    }

    if number > state.turn && state.turn > 0 {
        state.field.tick();
        for side in state.sides.iter_mut() {
            side.tick_conditions();
        }
    }

    state.turn = number;
    state.log.clear();
    if state.phase != Phase::Ended {
        state.phase = Phase::Battle;
    }
    entry(state, LogKind::Turn, format!("Turn {number}"))
}

fn switch(interp: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let details = line.details(1);
    let slot = ident.slot().unwrap_or(0);

    let side = state.side_mut(ident.player);
    let idx = side.find_or_insert(&ident.name, None, || {
        BattlePokemon::from_details(&details, &ident.name)
    });

    let poke = &mut side.team[idx];
    poke.apply_details(&details);
    if let Some(hp) = line.hp_status(2) {
        poke.apply_hp_status(&hp);
    }
    if poke.species_types.is_empty() || poke.base_speed.is_none() {
        fill_from_dex(interp, poke);
    }
    side.set_active(slot, Some(idx));

    let text = match line.command.as_str() {
        "drag" => format!("{} was dragged out", label(&ident)),
        "replace" => format!("{} was revealed", label(&ident)),
        _ => format!("{} switched in", label(&ident)),
    };
    entry(state, LogKind::Switch, text)
}

fn forme_change(
    interp: &Interpreter,
    state: &mut BattleState,
    line: &ProtocolLine,
) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let details = line.details(1);
    let poke = state.pokemon_mut(&ident)?;

    if line.command == "detailschange" {
        poke.apply_details(&details);
    } else if !details.species.is_empty() {
        poke.species = details.species.clone();
    }
    if let Some(hp) = line.hp_status(2) {
        poke.apply_hp_status(&hp);
    }
    fill_from_dex(interp, poke);

    let species = poke.species.clone();
    entry(
        state,
        LogKind::Effect,
        format!("{} changed into {species}", label(&ident)),
    )
}

fn use_move(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let name = line.arg(1)?;
    let from = line.tag("from");
    let poke = state.pokemon_mut(&ident)?;

    // Moves called by another move (Sleep Talk, Metronome) are not part of the set
    if !from.is_some_and(|f| f.starts_with("move:")) {
        poke.record_move(name);
    }
    if from.is_none()
        && let Some(known) = poke.find_move_mut(&effect_id(name))
        && let Some(pp) = known.pp.as_mut()
    {
        *pp = pp.saturating_sub(1);
    }

    entry(state, LogKind::Move, format!("{} used {name}", label(&ident)))
}

fn hp_change(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let hp = line.hp_status(1)?;
    let poke = state.pokemon_mut(&ident)?;
    poke.apply_hp_status(&hp);
    reveal_from(poke, line);
    let percent = poke.hp_percent;

    let (kind, verb) = match line.command.as_str() {
        "-damage" => (LogKind::Damage, "took damage"),
        "-heal" => (LogKind::Heal, "restored HP"),
        _ => (LogKind::Heal, "had its HP set"),
    };
    entry(
        state,
        kind,
        format!("{} {verb}{}, now at {percent}%", label(&ident), cause(line)),
    )
}

fn faint(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let side = state.side_mut(ident.player);
    let idx = side.find_index(&ident.name, ident.slot())?;

    let poke = &mut side.team[idx];
    poke.on_switch_out();
    poke.faint();
    for slot in side.active.iter_mut() {
        if *slot == Some(idx) {
            *slot = None;
        }
    }

    entry(state, LogKind::Faint, format!("{} fainted", label(&ident)))
}

fn status(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let status = Status::from_protocol(line.arg(1)?)?;
    let poke = state.pokemon_mut(&ident)?;
    poke.status = Some(status);
    reveal_from(poke, line);

    entry(
        state,
        LogKind::Status,
        format!("{} is now {status}{}", label(&ident), cause(line)),
    )
}

fn cure_status(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let poke = state.pokemon_mut(&ident)?;
    poke.status = None;
    entry(
        state,
        LogKind::Status,
        format!("{} was cured{}", label(&ident), cause(line)),
    )
}

fn cure_team(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    for poke in state.side_mut(ident.player).team.iter_mut() {
        poke.status = None;
    }
    entry(
        state,
        LogKind::Status,
        format!("{}'s team was cured", ident.player),
    )
}

fn boost(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let stat = Stat::parse(line.arg(1)?)?;
    let amount: i8 = line.arg(2)?.parse().ok()?;
    let poke = state.pokemon_mut(&ident)?;

    let change = match line.command.as_str() {
        "-boost" => poke.boosts.boost(stat, amount),
        "-unboost" => poke.boosts.unboost(stat, amount),
        _ => {
            let before = poke.boosts.get(stat);
            poke.boosts.set(stat, amount);
            poke.boosts.get(stat) - before
        }
    };
    let stage = poke.boosts.get(stat);

    entry(
        state,
        LogKind::Boost,
        format!(
            "{} {} {change:+} (now {stage:+})",
            label(&ident),
            line.arg_or_empty(1)
        ),
    )
}

fn clear_boosts(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let poke = state.pokemon_mut(&ident)?;
    let text = match line.command.as_str() {
        "-clearpositiveboost" => {
            poke.boosts.clear_positive();
            "lost its stat boosts"
        }
        "-clearnegativeboost" => {
            poke.boosts.clear_negative();
            "lost its stat drops"
        }
        "-invertboost" => {
            poke.boosts.invert();
            "had its stat changes inverted"
        }
        _ => {
            poke.boosts.clear();
            "had its stat changes removed"
        }
    };
    entry(state, LogKind::Boost, format!("{} {text}", label(&ident)))
}

fn clear_all_boosts(
    _: &Interpreter,
    state: &mut BattleState,
    _: &ProtocolLine,
) -> Option<LogEntry> {
    for side in state.sides.iter_mut() {
        for poke in side.team.iter_mut().filter(|p| p.active) {
            poke.boosts.clear();
        }
    }
    entry(state, LogKind::Boost, "All stat changes were removed")
}

fn copy_boosts(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let source = line.pokemon(0)?;
    let target = line.pokemon(1)?;
    let boosts = state.pokemon(&source)?.boosts;
    state.pokemon_mut(&target)?.boosts = boosts;
    entry(
        state,
        LogKind::Boost,
        format!("{} copied {}'s stat changes", label(&target), label(&source)),
    )
}

fn weather(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let name = line.arg(0)?;
    let upkeep = line.has_flag("upkeep");
    state.field.apply_weather(name, upkeep);
    if upkeep {
        return None;
    }
    let text = match state.field.weather {
        Some(weather) => format!("Weather became {weather:?}{}", cause(line)),
        None => "The weather cleared".to_string(),
    };
    entry(state, LogKind::Field, text)
}

fn field_start(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let condition = line.arg(0)?;
    state.field.apply_field_start(condition);
    entry(state, LogKind::Field, format!("{condition} started"))
}

fn field_end(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let condition = line.arg(0)?;
    state.field.apply_field_end(condition);
    entry(state, LogKind::Field, format!("{condition} ended"))
}

fn side_start(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let side = line.side(0)?;
    let id = effect_id(line.arg(1)?);
    let target = state.side_mut(side.player);
    target.add_condition(&id);
    let layers = target.layers(&id);
    entry(
        state,
        LogKind::Side,
        format!("{id} started on {}'s side ({layers})", side.player),
    )
}

fn side_end(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let side = line.side(0)?;
    let id = effect_id(line.arg(1)?);
    if !state.side_mut(side.player).remove_condition(&id) {
        return None;
    }
    entry(
        state,
        LogKind::Side,
        format!("{id} ended on {}'s side", side.player),
    )
}

fn swap_side_conditions(
    _: &Interpreter,
    state: &mut BattleState,
    _: &ProtocolLine,
) -> Option<LogEntry> {
    let [p1, p2] = &mut state.sides;
    std::mem::swap(&mut p1.conditions, &mut p2.conditions);
    entry(state, LogKind::Side, "Side conditions were swapped")
}

fn item(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let item = line.arg(1)?;
    state.pokemon_mut(&ident)?.item = Some(item.to_string());
    entry(
        state,
        LogKind::Item,
        format!("{} has {item}{}", label(&ident), cause(line)),
    )
}

fn end_item(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let item = line.arg(1)?;
    state.pokemon_mut(&ident)?.item = None;
    entry(
        state,
        LogKind::Item,
        format!("{} lost its {item}{}", label(&ident), cause(line)),
    )
}

fn ability(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let ability = line.arg(1)?;
    state.pokemon_mut(&ident)?.ability = Some(ability.to_string());
    entry(
        state,
        LogKind::Ability,
        format!("{}'s ability is {ability}", label(&ident)),
    )
}

fn end_ability(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    state
        .pokemon_mut(&ident)?
        .volatiles
        .insert("gastroacid".to_string());
    entry(
        state,
        LogKind::Ability,
        format!("{}'s ability was suppressed", label(&ident)),
    )
}

fn terastallize(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let tera = Type::from_protocol(line.arg_or_empty(1));

    let side = state.side_mut(ident.player);
    let idx = side.find_index(&ident.name, ident.slot())?;
    side.mark_terastallized();
    side.team[idx].terastallize(tera);

    entry(
        state,
        LogKind::Tera,
        format!(
            "{} terastallized into {}",
            label(&ident),
            line.arg_or_empty(1)
        ),
    )
}

fn volatile_start(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let effect = line.arg(1)?;
    let id = effect_id(effect);
    let poke = state.pokemon_mut(&ident)?;

    match id.as_str() {
        "typechange" => {
            let types = Type::parse_list(line.arg_or_empty(2));
            if !types.is_empty() {
                poke.types = types;
            }
        }
        "typeadd" => {
            if let Some(added) = Type::from_protocol(line.arg_or_empty(2))
                && !poke.types.contains(&added)
            {
                poke.types.push(added);
            }
        }
        _ => {
            poke.volatiles.insert(id);
        }
    }

    entry(
        state,
        LogKind::Effect,
        format!("{} gained {effect}", label(&ident)),
    )
}

fn volatile_end(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let effect = line.arg(1)?;
    let id = effect_id(effect);
    let poke = state.pokemon_mut(&ident)?;

    match id.as_str() {
        "typechange" | "typeadd" => poke.types = poke.species_types.clone(),
        _ => {
            if !poke.volatiles.remove(&id) {
                return None;
            }
        }
    }

    entry(
        state,
        LogKind::Effect,
        format!("{}'s {effect} ended", label(&ident)),
    )
}

fn transform(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let target = line.pokemon(1)?;
    let (types, boosts) = {
        let source = state.pokemon(&target)?;
        (source.effective_types(), source.boosts)
    };

    let poke = state.pokemon_mut(&ident)?;
    poke.types = types;
    poke.boosts = boosts;
    poke.volatiles.insert("transform".to_string());

    entry(
        state,
        LogKind::Effect,
        format!("{} transformed into {}", label(&ident), target.name),
    )
}

fn activate(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let effect = line.arg(1)?;
    let who = line
        .pokemon(0)
        .map(|p| label(&p))
        .unwrap_or_else(|| line.arg_or_empty(0).to_string());
    entry(state, LogKind::Effect, format!("{effect} activated for {who}"))
}

fn hit_note(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let text = match line.command.as_str() {
        "-crit" => format!("A critical hit on {}", label(&ident)),
        "-supereffective" => format!("It's super effective on {}", label(&ident)),
        "-resisted" => format!("{} resisted the hit", label(&ident)),
        _ => format!("{} is immune", label(&ident)),
    };
    entry(state, LogKind::Effect, text)
}

fn cant(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let ident = line.pokemon(0)?;
    let reason = line.arg_or_empty(1);
    entry(
        state,
        LogKind::Effect,
        format!("{} can't move ({reason})", label(&ident)),
    )
}

fn win(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
    let name = line.arg(0)?;
    state.winner = state.side_by_name(name);
    state.tie = false;
    state.phase = Phase::Ended;
    state.waiting_for_choice = false;
    entry(state, LogKind::Outcome, format!("{name} won the battle"))
}

fn tie(_: &Interpreter, state: &mut BattleState, _: &ProtocolLine) -> Option<LogEntry> {
    state.winner = None;
    state.tie = true;
    state.phase = Phase::Ended;
    state.waiting_for_choice = false;
    entry(state, LogKind::Outcome, "The battle ended in a tie")
}
