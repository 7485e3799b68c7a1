pub mod audio;
pub mod error;
pub mod host;
pub mod lexer;
pub mod modal;
pub mod nav;
pub mod registry;
pub mod selector;
pub mod sim;
pub mod stage;
pub mod story;
pub mod token;
pub mod trigger;
pub mod video;
pub mod viewer;
pub mod visibility;

#[cfg(feature = "wasm")]
pub mod web;

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use error::{CueError, Result};
use sim::SimHost;
use stage::Stage;
use story::Story;
use trigger::TriggerState;

/// Parse and validate a story from JSON text.
pub fn parse_story(source: &str) -> Result<Story> {
    Story::from_json(source)
}

/// Read, parse and validate a story file.
pub fn load_story(path: &Path) -> Result<Story> {
    Story::load(path)
}

/// Authoring warnings for a valid story. In strict mode the first warning
/// is returned as an error instead.
pub fn check_story(story: &Story, strict: bool) -> Result<Vec<String>> {
    let warnings = story.warnings();
    match warnings.first() {
        Some(first) if strict => Err(CueError::message(first)),
        _ => Ok(warnings),
    }
}

/// Page state after scrolling to one offset and letting timers settle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub offset: f64,
    /// Selectors of the reveal rules currently shown.
    pub visible: Vec<String>,
    /// Cues issued while reaching this frame, in order.
    pub cues: Vec<String>,
    /// Media elements playing at the end of the frame.
    pub playing: Vec<String>,
    /// One-shot triggers that have fired so far.
    pub fired: Vec<String>,
    pub chapter: Option<String>,
}

/// Scroll a simulated page through `offsets`, settling after each.
pub fn simulate(story: &Story, offsets: &[f64]) -> Result<Vec<Frame>> {
    let mut stage = Stage::mount(SimHost::for_story(story), story)?;
    stage.deliver_intersections();

    let mut frames = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        stage.scroll_to_offset(offset);
        stage.settle(Duration::from_secs(1));
        frames.push(snapshot(&stage, story, offset));
        stage.host_mut().clear_log();
    }
    Ok(frames)
}

fn snapshot(stage: &Stage<SimHost>, story: &Story, offset: f64) -> Frame {
    let host = stage.host();
    let cues = host
        .log()
        .iter()
        .filter_map(|event| match event {
            sim::SimEvent::Play { label, .. } => Some(label.clone()),
            sim::SimEvent::PlayUrl(url) => Some(url.clone()),
            _ => None,
        })
        .collect();
    let fired = story
        .triggers
        .iter()
        .enumerate()
        .filter(|(i, _)| stage.triggers().state(*i) == Some(TriggerState::Fired))
        .map(|(_, t)| t.name.clone())
        .collect();

    Frame {
        offset,
        visible: stage
            .visibility()
            .visible_rules()
            .map(|rule| rule.selector.to_string())
            .collect(),
        cues,
        playing: host.playing().into_iter().map(|n| host.element(n).label()).collect(),
        fired,
        chapter: stage.nav().and_then(|nav| nav.active()).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_narrative_opening() {
        let story = Story::narrative().unwrap();
        let frames = simulate(&story, &[0.0, 350.0, 650.0]).unwrap();

        assert!(frames[0].visible.is_empty());
        assert!(frames[0].cues.is_empty());

        assert_eq!(frames[1].visible, vec![".one-content", ".group-1"]);
        assert_eq!(frames[1].cues, vec![".audio-1"]);
        assert_eq!(frames[1].playing, vec![".audio-1"]);

        assert_eq!(frames[2].visible.len(), 4);
        assert_eq!(frames[2].cues, vec![".audio-2"]);
        assert_eq!(frames[2].playing, vec![".audio-2"]);
        assert_eq!(frames[2].chapter.as_deref(), Some("chapter1"));
    }

    #[test]
    fn end_to_end_door_and_ding() {
        let story = Story::narrative().unwrap();
        let frames = simulate(&story, &[2100.0, 5500.0, 5600.0]).unwrap();

        assert_eq!(frames[0].fired, vec!["door"]);
        assert!(frames[0].cues.contains(&"door".to_string()));
        assert!(frames[1].fired.contains(&"ding".to_string()));
        assert!(frames[1].cues.contains(&"ding".to_string()));
        assert!(!frames[2].cues.contains(&"ding".to_string()));
        assert_eq!(frames[1].chapter.as_deref(), Some("chapter2"));
    }

    #[test]
    fn end_to_end_scrolling_back_hides() {
        let story = Story::narrative().unwrap();
        let frames = simulate(&story, &[10600.0, 0.0]).unwrap();
        assert_eq!(frames[0].visible.len(), story.rules.len());
        assert!(frames[1].visible.is_empty());
        assert_eq!(frames[0].chapter.as_deref(), Some("chapter4"));
        assert_eq!(frames[1].chapter.as_deref(), Some("chapter1"));
    }

    #[test]
    fn strict_check_fails_on_warnings() {
        let story = parse_story(
            r#"{ "rules": [
                { "selector": "a", "threshold": 9 },
                { "selector": "a", "threshold": 10 }
            ] }"#,
        )
        .unwrap();
        assert_eq!(check_story(&story, false).unwrap().len(), 1);
        assert!(check_story(&story, true).is_err());
    }

    #[test]
    fn narrative_is_clean_under_strict() {
        let story = Story::narrative().unwrap();
        assert!(check_story(&story, true).unwrap().is_empty());
    }
}
