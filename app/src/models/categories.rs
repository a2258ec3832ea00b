//! Static option tables for the settings editors.

/// A role or channel setting that holds a single mentionable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionableOption {
    pub label: &'static str,
    pub key: &'static str,
    pub emoji: &'static str,
}

/// A boolean flag or a free-form setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleOption {
    pub label: &'static str,
    pub key: &'static str,
}

const fn mentionable(label: &'static str, key: &'static str, emoji: &'static str) -> MentionableOption {
    MentionableOption { label, key, emoji }
}

const fn simple(label: &'static str, key: &'static str) -> SimpleOption {
    SimpleOption { label, key }
}

pub const ROLES: &[MentionableOption] = &[
    mentionable("free agent", "free_agent", "🛒"),
    mentionable("operator", "operator", "🏗️"),
    mentionable("pickups host/captain", "pickups_host", "👔"),
    mentionable("pickups ping", "pickups_ping", "🏈"),
    mentionable("referee", "referee", "⚖️"),
    mentionable("statisician", "statisician", "📝"),
    mentionable("streamer", "streamer", "🎥"),
    mentionable("suspended", "suspended", "⛔"),
    mentionable("verified/eligible", "eligible", "✅"),
    mentionable("waitlist", "waitlist", "⏰"),
];

pub const CHANNELS: &[MentionableOption] = &[
    mentionable("auto update-referee list", "referee_list", "⚖️"),
    mentionable("auto update-streamer list", "streamer_list", "🎥"),
    mentionable("auto update-teams owner list", "team_owner_list", "👔"),
    mentionable("challenges", "challenges", "⚠️"),
    mentionable("contracts", "contracts", "📋"),
    mentionable("decisions", "decisions", "🧠"),
    mentionable("demands", "demands", "🐍"),
    mentionable("scheduled games (gametime)", "scheduled_games", "🕒"),
    mentionable("lfp", "lfp", "👀"),
    mentionable("notices", "notices", "🔔"),
    mentionable("notice changes", "notice_changes", "‼️"),
    mentionable("pickups", "pickups", "🏈"),
    mentionable("re-scheduled games (gametime)", "rescheduled_games", "🕖"),
    mentionable("schedule", "schedule", "📅"),
    mentionable("setting changes", "setting_changes", "⚙️"),
    mentionable("standings", "standings", "🏆"),
    mentionable("stat updates", "stat_updates", "📝"),
    mentionable("status changes", "status_changes", "🚥"),
    mentionable("suspensions & unsuspensions", "suspensions", "⛔"),
    mentionable("transactions", "transactions", "💵"),
    mentionable("waitlist pinging", "waitlist_pinging", "⏰"),
];

pub const NOTICES: &[SimpleOption] = &[
    simple("appoints", "appoints"),
    simple("notice changes", "notice_changes"),
    simple("player demand", "player_demand"),
    simple("player demand (DM)", "player_demand_dm"),
    simple("player leave", "player_leave"),
    simple("player leave (DM)", "player_leave_dm"),
    simple("setting changes", "setting_changes"),
    simple("status changes", "status_changes"),
    simple("stat updates", "stat_updates"),
    simple("suspensions & unsuspensions", "suspensions"),
    simple("team disband", "team_disband"),
    simple("team owner leave", "team_owner_leave"),
    simple("team swap", "team_swap"),
];

pub const STATUS: &[SimpleOption] = &[
    simple("contracts", "contracts"),
    simple("demands", "demands"),
    simple("demoting", "demoting"),
    simple("offering", "offering"),
    simple("promoting", "promoting"),
    simple("releasing", "releasing"),
    simple("scheduling", "scheduling"),
    simple("signing", "signing"),
    simple("standings", "standings"),
    simple("statistics", "statistics"),
    simple("waitlist", "waitlist"),
];

pub const SETTINGS: &[SimpleOption] = &[
    simple("roster cap", "roster_cap"),
    simple("demand-type", "demand_type"),
    simple("demand-amount", "demand_amount"),
    simple("demand-wait", "demand_wait"),
    simple("waitlist-type", "waitlist_type"),
];

/// Settings edited through the number modal rather than a type select.
pub const NUMERIC_SETTINGS: &[&str] = &["roster_cap", "demand_amount"];

pub const STATSHEET_POSITIONS: &[&str] =
    &["passer", "runner", "receiver", "corner", "defender", "kicker"];

/// Choices offered by the type select for `key`, as (label, value) pairs.
pub fn type_choices(key: &str) -> Vec<(String, String)> {
    let pairs = |choices: &[&str]| {
        choices
            .iter()
            .map(|c| (c.to_string(), c.to_string()))
            .collect::<Vec<_>>()
    };

    match key {
        "demand_type" => pairs(&["amount", "wait"]),
        "demand_wait" => (1..=14).map(|i| (format!("{i} days"), i.to_string())).collect(),
        "waitlist_type" => pairs(&["ping", "queue"]),
        _ => Vec::new(),
    }
}

pub fn find_mentionable(options: &'static [MentionableOption], key: &str) -> Option<&'static MentionableOption> {
    options.iter().find(|o| o.key == key)
}

pub fn find_simple(options: &'static [SimpleOption], key: &str) -> Option<&'static SimpleOption> {
    options.iter().find(|o| o.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demand_wait_offers_two_weeks() {
        let choices = type_choices("demand_wait");
        assert_eq!(choices.len(), 14);
        assert_eq!(choices[0], ("1 days".to_string(), "1".to_string()));
        assert_eq!(choices[13].1, "14");
    }

    #[test]
    fn unknown_setting_has_no_choices() {
        assert!(type_choices("roster_cap").is_empty());
    }

    #[test]
    fn notice_change_events_have_channels() {
        for event in ["setting_changes", "notice_changes", "status_changes", "notices"] {
            assert!(find_mentionable(CHANNELS, event).is_some(), "{event}");
        }
    }
}
