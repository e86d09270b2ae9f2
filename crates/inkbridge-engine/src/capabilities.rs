use inkbridge_config::SurfaceEngine;

/// Engine quirks resolved once when an editable surface is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The surface reports structured `beforeinput` intents; otherwise the
    /// hotkey table and literal text input are the editing path
    pub structured_input_events: bool,
    pub native_composition_events: bool,
    /// Committed composition text arrives as an `insertFromComposition`
    /// intent, so composition end must not insert it again
    pub composition_commits_via_input_event: bool,
    /// Writing the selection does not move focus; refocus the root afterwards
    pub refocus_after_selection_update: bool,
    pub apple_keymap: bool,
}

impl Capabilities {
    pub fn for_engine(engine: SurfaceEngine, apple: bool) -> Self {
        let base = Self {
            structured_input_events: true,
            native_composition_events: true,
            composition_commits_via_input_event: false,
            refocus_after_selection_update: false,
            apple_keymap: apple,
        };
        match engine {
            SurfaceEngine::Blink => base,
            SurfaceEngine::Gecko => Self {
                refocus_after_selection_update: true,
                ..base
            },
            SurfaceEngine::Webkit => Self {
                composition_commits_via_input_event: true,
                ..base
            },
            SurfaceEngine::Legacy => Self {
                structured_input_events: false,
                native_composition_events: false,
                ..base
            },
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::for_engine(SurfaceEngine::default(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SurfaceEngine::Blink, true, false, false)]
    #[case(SurfaceEngine::Gecko, true, false, true)]
    #[case(SurfaceEngine::Webkit, true, true, false)]
    #[case(SurfaceEngine::Legacy, false, false, false)]
    fn test_engine_table(
        #[case] engine: SurfaceEngine,
        #[case] structured: bool,
        #[case] commits_via_input: bool,
        #[case] refocus: bool,
    ) {
        let capabilities = Capabilities::for_engine(engine, true);
        assert_eq!(capabilities.structured_input_events, structured);
        assert_eq!(capabilities.composition_commits_via_input_event, commits_via_input);
        assert_eq!(capabilities.refocus_after_selection_update, refocus);
        assert!(capabilities.apple_keymap);
    }
}
