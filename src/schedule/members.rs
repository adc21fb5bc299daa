//! Member roster and membership-mask inference
//!
//! A slot's topic text is reduced to a one-byte mask: the low nibble carries
//! one bit per tracked member, the high nibble carries the group broadcast
//! kinds (night talk, theater, game room).

/// Tracked members, low-nibble bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    Ava,
    Bella,
    Diana,
    Eileen,
}

impl Member {
    pub const ALL: [Member; 4] = [Member::Ava, Member::Bella, Member::Diana, Member::Eileen];

    pub fn bit(&self) -> u8 {
        match self {
            Member::Ava => MemberMask::AVA,
            Member::Bella => MemberMask::BELLA,
            Member::Diana => MemberMask::DIANA,
            Member::Eileen => MemberMask::EILEEN,
        }
    }

    /// Configuration key used by the identity table.
    pub fn key(&self) -> &'static str {
        match self {
            Member::Ava => "ava",
            Member::Bella => "bella",
            Member::Diana => "diana",
            Member::Eileen => "eileen",
        }
    }

    /// Display name as written on the schedule grid.
    pub fn display_name(&self) -> &'static str {
        match self {
            Member::Ava => "向晚",
            Member::Bella => "贝拉",
            Member::Diana => "嘉然",
            Member::Eileen => "乃琳",
        }
    }

    /// Substrings that identify this member in topic text.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Member::Ava => &["向晚", "Ava", "ava"],
            Member::Bella => &["贝拉", "Bella", "bella"],
            Member::Diana => &["嘉然", "Diana", "diana"],
            Member::Eileen => &["乃琳", "Eileen", "eileen"],
        }
    }

    /// Calendar event color for a solo broadcast.
    pub fn event_color(&self) -> i32 {
        match self {
            Member::Ava => -15417089,
            Member::Bella => -562844,
            Member::Diana => -963671,
            Member::Eileen => -10392859,
        }
    }
}

/// Membership bitfield: low nibble = members, high nibble = group kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberMask(pub u8);

impl MemberMask {
    pub const AVA: u8 = 0x01;
    pub const BELLA: u8 = 0x02;
    pub const DIANA: u8 = 0x04;
    pub const EILEEN: u8 = 0x08;
    /// Default mask: text that names nobody implicitly means everyone, and
    /// is therefore *not* a usable topic match.
    pub const ALL_MEMBERS: u8 = 0x0F;

    pub const NIGHT_TALK: u8 = 0x10;
    pub const THEATER: u8 = 0x20;
    pub const GAME_ROOM: u8 = 0x40;

    /// Infer a mask from topic text by member-name and group-keyword
    /// substring matching. Text naming nobody yields the all-members
    /// default.
    pub fn from_text(text: &str) -> Self {
        let mut mask = 0u8;
        for member in Member::ALL {
            if member.aliases().iter().any(|alias| text.contains(alias)) {
                mask |= member.bit();
            }
        }
        if text.contains("夜谈") {
            mask |= Self::NIGHT_TALK;
        }
        if text.contains("小剧场") || text.contains("剧场") {
            mask |= Self::THEATER;
        }
        if text.contains("游戏室") {
            mask |= Self::GAME_ROOM;
        }
        if mask == 0 {
            mask = Self::ALL_MEMBERS;
        }
        MemberMask(mask)
    }

    /// True for the all-members fallback with no group bits.
    pub fn is_default(&self) -> bool {
        self.0 == Self::ALL_MEMBERS
    }

    /// Any group-kind bit set.
    pub fn is_group(&self) -> bool {
        self.0 & 0xF0 != 0
    }

    /// Members named by the low nibble, in roster order.
    pub fn members(&self) -> Vec<Member> {
        Member::ALL
            .into_iter()
            .filter(|m| self.0 & m.bit() != 0)
            .collect()
    }

    /// Event color: solo member masks map through the fixed table, anything
    /// else gets the calendar default.
    pub fn event_color(&self) -> i32 {
        if self.is_group() {
            return DEFAULT_EVENT_COLOR;
        }
        match self.members().as_slice() {
            [only] => only.event_color(),
            _ => DEFAULT_EVENT_COLOR,
        }
    }

    /// Broadcast-kind word used when composing the event summary.
    pub fn live_kind(&self) -> String {
        if self.0 & Self::NIGHT_TALK != 0 {
            return "夜谈".to_string();
        }
        if self.0 & Self::THEATER != 0 {
            return "小剧场".to_string();
        }
        if self.0 & Self::GAME_ROOM != 0 {
            return "游戏室".to_string();
        }
        let members = self.members();
        match members.len() {
            1 => format!("{}单播", members[0].display_name()),
            2 => "双播".to_string(),
            _ => "团播".to_string(),
        }
    }
}

/// Neutral fallback color: lets the calendar pick its own.
pub const DEFAULT_EVENT_COLOR: i32 = 0;

/// Compose an event summary from the inferred mask and the raw topic text.
pub fn compose_summary(mask: MemberMask, title: &str) -> String {
    format!("【{}】{}", mask.live_kind(), title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_member_mask() {
        let mask = MemberMask::from_text("向晚直播");
        assert_eq!(mask.0, MemberMask::AVA);
        assert!(!mask.is_default());
        assert_eq!(mask.members(), vec![Member::Ava]);
        assert_eq!(mask.event_color(), Member::Ava.event_color());
    }

    #[test]
    fn test_unnamed_text_is_default() {
        let mask = MemberMask::from_text("周年纪念回");
        assert!(mask.is_default());
        assert_eq!(mask.0, MemberMask::ALL_MEMBERS);
    }

    #[test]
    fn test_group_kind_bits() {
        let mask = MemberMask::from_text("夜谈");
        assert!(mask.is_group());
        assert_eq!(mask.live_kind(), "夜谈");

        let mask = MemberMask::from_text("游戏室大乱斗");
        assert_eq!(mask.0 & 0xF0, MemberMask::GAME_ROOM);
    }

    #[test]
    fn test_pair_mask_color_falls_back() {
        let mask = MemberMask::from_text("贝拉嘉然联动");
        assert_eq!(mask.0, MemberMask::BELLA | MemberMask::DIANA);
        assert_eq!(mask.event_color(), DEFAULT_EVENT_COLOR);
        assert_eq!(mask.live_kind(), "双播");
    }

    #[test]
    fn test_summary_contains_live_kind() {
        let mask = MemberMask::from_text("向晚直播");
        let summary = compose_summary(mask, "向晚直播");
        assert!(summary.contains("单播"));
        assert!(summary.contains("向晚直播"));
    }
}
