//! Default game roster.

/// The 26-game Atari-100k benchmark roster, in canonical order.
///
/// Used when no explicit `--games` list is given; `--num-games` selects a
/// prefix of this list.
pub const DEFAULT_GAMES: &[&str] = &[
    "Alien",
    "Amidar",
    "Assault",
    "Asterix",
    "BankHeist",
    "BattleZone",
    "Boxing",
    "Breakout",
    "ChopperCommand",
    "CrazyClimber",
    "DemonAttack",
    "Freeway",
    "Frostbite",
    "Gopher",
    "Hero",
    "Jamesbond",
    "Kangaroo",
    "Krull",
    "KungFuMaster",
    "MsPacman",
    "Pong",
    "PrivateEye",
    "Qbert",
    "RoadRunner",
    "Seaquest",
    "UpNDown",
];
