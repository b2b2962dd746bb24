//! Template rendering
//!
//! `{online}` and `{max_players}` are always substituted. `{player}` and
//! `{server}` are only substituted when rendering for a specific recipient.

use contracts::Recipient;

/// Connected recipient count
pub const ONLINE: &str = "{online}";
/// Advertised capacity
pub const MAX_PLAYERS: &str = "{max_players}";
/// Recipient display name
pub const PLAYER: &str = "{player}";
/// Recipient placement
pub const SERVER: &str = "{server}";

/// Values shared by every recipient of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderContext {
    pub online: usize,
    pub max_players: u32,
}

/// How a delivery renders its template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Per-recipient `{player}` / `{server}` substitution
    Personalized,
    /// One non-personalized rendering shared by all recipients
    Shared,
}

impl DeliveryMode {
    /// Metric label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personalized => "personalized",
            Self::Shared => "shared",
        }
    }
}

/// Render `template`
///
/// Passing `recipient` personalizes the output.
pub fn render(template: &str, ctx: &RenderContext, recipient: Option<&dyn Recipient>) -> String {
    let mut out = template.to_owned();
    replace_all(&mut out, ONLINE, &ctx.online.to_string());
    replace_all(&mut out, MAX_PLAYERS, &ctx.max_players.to_string());

    if let Some(recipient) = recipient {
        replace_all(&mut out, PLAYER, recipient.display_name());
        replace_all(&mut out, SERVER, &recipient.placement_or_unknown());
    }

    out
}

/// Whether `template` uses recipient-specific placeholders
pub fn is_personal(template: &str) -> bool {
    template.contains(PLAYER) || template.contains(SERVER)
}

fn replace_all(out: &mut String, placeholder: &str, value: &str) {
    if out.contains(placeholder) {
        *out = out.replace(placeholder, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRecipient;

    const CTX: RenderContext = RenderContext {
        online: 12,
        max_players: 500,
    };

    #[test]
    fn test_shared_render_keeps_personal_placeholders() {
        let out = render("{player} on {server}: {online}/{max_players}", &CTX, None);
        assert_eq!(out, "{player} on {server}: 12/500");
    }

    #[test]
    fn test_personalized_render() {
        let steve = MockRecipient::with_placement("Steve", "lobby");
        let out = render("Hi {player} @ {server} ({online})", &CTX, Some(&steve));
        assert_eq!(out, "Hi Steve @ lobby (12)");
    }

    #[test]
    fn test_missing_placement_falls_back_to_unknown() {
        let alex = MockRecipient::new("Alex");
        let out = render("{server}", &CTX, Some(&alex));
        assert_eq!(out, "Unknown");
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let out = render("{online}-{online}", &CTX, None);
        assert_eq!(out, "12-12");
    }

    #[test]
    fn test_plain_template_untouched() {
        assert_eq!(render("DeepCraft", &CTX, None), "DeepCraft");
        assert!(!is_personal("DeepCraft {online}"));
        assert!(is_personal("hello {player}"));
    }
}
