//! # Discovery Module
//!
//! The exclusion filter behind "who can I still match with?".
//!
//! A candidate is every user except the requester and except anyone who
//! already shares a match with the requester, whatever that match's status.
//! A rejected pairing is resolved and never resurfaces.
//!
//! ```text
//! all users ──┬── minus requester
//!             └── minus other participant of every match touching requester
//! ```
//!
//! The filter is a pure function of its inputs. It runs in
//! `O(users + matches)` and keeps the input order, so a caller that passes
//! users in a stable order gets candidates in that same order.

use std::collections::HashSet;

use crate::matches::Match;
use crate::profiles::UserProfile;

/// Filter `users` down to the candidates `requester_id` may still propose to.
///
/// Matches that do not involve the requester are ignored.
pub fn filter_candidates(
    users: Vec<UserProfile>,
    requester_id: &str,
    matches: &[Match],
) -> Vec<UserProfile> {
    let paired: HashSet<&str> = matches
        .iter()
        .filter_map(|m| m.other_participant(requester_id))
        .collect();

    users
        .into_iter()
        .filter(|user| user.id != requester_id && !paired.contains(user.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::MatchStatus;
    use crate::profiles::Role;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            handle: id.to_string(),
            email: format!("{}@example.com", id),
            phone: String::new(),
            role: Role::Player,
            bio: String::new(),
            game_systems: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn matched(a: &str, b: &str, status: MatchStatus) -> Match {
        Match {
            id: format!("{}-{}", a, b),
            user_a: a.to_string(),
            user_b: b.to_string(),
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn ids(users: &[UserProfile]) -> Vec<&str> {
        users.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn test_excludes_requester() {
        let users = vec![profile("a"), profile("b"), profile("c")];
        let result = filter_candidates(users, "a", &[]);
        assert_eq!(ids(&result), vec!["b", "c"]);
    }

    #[test]
    fn test_excludes_every_status_in_either_direction() {
        let users = vec![
            profile("a"),
            profile("b"),
            profile("c"),
            profile("d"),
            profile("e"),
        ];
        let matches = vec![
            matched("a", "b", MatchStatus::Pending),
            matched("c", "a", MatchStatus::Rejected),
            matched("a", "d", MatchStatus::Accepted),
        ];

        let result = filter_candidates(users, "a", &matches);
        assert_eq!(ids(&result), vec!["e"]);
    }

    #[test]
    fn test_ignores_unrelated_matches() {
        let users = vec![profile("a"), profile("b"), profile("c")];
        let matches = vec![matched("b", "c", MatchStatus::Accepted)];

        let result = filter_candidates(users, "a", &matches);
        assert_eq!(ids(&result), vec!["b", "c"]);
    }

    #[test]
    fn test_preserves_input_order() {
        let users = vec![profile("z"), profile("m"), profile("a"), profile("q")];
        let result = filter_candidates(users, "m", &[]);
        assert_eq!(ids(&result), vec!["z", "a", "q"]);
    }
}
