use owo_colors::{OwoColorize, Style};

use crate::link::LinkState;
use crate::protocol::MessageType;

/// Role a piece of terminal text plays in a view.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Tone {
    Heading,
    Success,
    Warning,
    Muted,
    Value,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Heading => Style::new().bold().cyan(),
            Self::Success => Style::new().bold().green(),
            Self::Warning => Style::new().bold().yellow(),
            Self::Muted => Style::new().dimmed(),
            Self::Value => Style::new().bold(),
        }
    }
}

/// Styles view text, or passes it through when stdout is not a terminal.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn paint(&self, tone: Tone, text: impl AsRef<str>) -> String {
        let text = text.as_ref();
        if self.use_colour {
            text.style(tone.style()).to_string()
        } else {
            text.to_owned()
        }
    }

    pub(crate) fn heading(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Heading, text)
    }

    pub(crate) fn warning(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Warning, text)
    }

    pub(crate) fn muted(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Muted, text)
    }

    pub(crate) fn value(&self, text: impl AsRef<str>) -> String {
        self.paint(Tone::Value, text)
    }

    /// `0x13A6 system_event`, with the code emphasised.
    pub(crate) fn message_type(&self, message_type: MessageType) -> String {
        format!(
            "{} {}",
            self.value(message_type.to_string()),
            message_type.name()
        )
    }

    /// Link states a finished exchange should end in read as success.
    pub(crate) fn link_state(&self, state: LinkState) -> String {
        let tone = match state {
            LinkState::Initialized | LinkState::Closed => Tone::Success,
            _ => Tone::Warning,
        };
        self.paint(tone, state.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn plain_painter_leaves_text_alone(
        #[values(Tone::Heading, Tone::Success, Tone::Warning, Tone::Muted, Tone::Value)] tone: Tone,
    ) {
        assert_eq!("frame", Painter::new(false).paint(tone, "frame"));
    }

    #[rstest]
    fn colour_painter_wraps_text_in_escapes(
        #[values(Tone::Heading, Tone::Success, Tone::Warning, Tone::Muted, Tone::Value)] tone: Tone,
    ) {
        let styled = Painter::new(true).paint(tone, "frame");

        assert!(styled.starts_with('\u{1b}'));
        assert!(styled.contains("frame"));
    }

    #[test]
    fn message_type_pairs_code_with_name() {
        assert_eq!(
            "0x13A6 system_event",
            Painter::new(false).message_type(MessageType::SYSTEM_EVENT)
        );
    }

    #[rstest]
    #[case::closed(LinkState::Closed, Tone::Success)]
    #[case::initialized(LinkState::Initialized, Tone::Success)]
    #[case::failed(LinkState::Failed, Tone::Warning)]
    fn link_state_tone_reflects_outcome(#[case] state: LinkState, #[case] tone: Tone) {
        let painter = Painter::new(true);

        assert_eq!(painter.paint(tone, state.to_string()), painter.link_state(state));
    }
}
