/// Which side of a fight a combatant is fighting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatantKind {
    Player,
    Npc,
}

/// One participant in a room's combat, as tracked by the combat engine.
#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: String,
    pub kind: CombatantKind,
    pub name: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub level: u32,
    pub str_mod: i32,
    pub dex_mod: i32,
    pub dead: bool,
}

impl Combatant {
    pub fn new(
        id: impl Into<String>,
        kind: CombatantKind,
        name: impl Into<String>,
        max_hp: i32,
        ac: i32,
        level: u32,
        str_mod: i32,
        dex_mod: i32,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            current_hp: max_hp,
            max_hp,
            ac,
            level,
            str_mod,
            dex_mod,
            dead: false,
        }
    }

    /// An instance is dead iff its current HP is at or below zero; this
    /// recomputes `dead` after any HP change, rather than trusting a caller
    /// to flip the flag by hand.
    pub fn apply_damage(&mut self, amount: i32) {
        self.current_hp = (self.current_hp - amount).max(0);
        self.dead = self.current_hp <= 0;
    }
}
