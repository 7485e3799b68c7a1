//! Audio arbitration: at most one member of a group is meant to be playing.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::host::{Host, PlayCue};
use crate::selector::Selector;

/// Name of a set of tracks that silence each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioGroupId(String);

impl AudioGroupId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Default for AudioGroupId {
    fn default() -> Self {
        Self("music".to_string())
    }
}

impl fmt::Display for AudioGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioTrack {
    pub selector: Selector,
    #[serde(default)]
    pub group: AudioGroupId,
}

#[derive(Debug)]
struct Member<N> {
    selector: Selector,
    group: AudioGroupId,
    node: N,
}

#[derive(Debug)]
pub struct AudioArbitrator<N> {
    members: Vec<Member<N>>,
    intended: HashMap<AudioGroupId, Selector>,
}

impl<N: Clone + PartialEq + fmt::Debug> AudioArbitrator<N> {
    /// Resolve every declared track once. Selectors in `implicit` that are not
    /// declared join the default group.
    pub fn mount<H: Host<Node = N>>(
        host: &H,
        tracks: &[AudioTrack],
        implicit: &[Selector],
    ) -> Self {
        let mut arbitrator = Self {
            members: Vec::new(),
            intended: HashMap::new(),
        };

        let declared = tracks.iter().map(|t| (t.selector.clone(), t.group.clone()));
        let undeclared = implicit
            .iter()
            .filter(|s| !tracks.iter().any(|t| &t.selector == *s))
            .map(|s| (s.clone(), AudioGroupId::default()));

        for (selector, group) in declared.chain(undeclared) {
            if arbitrator.members.iter().any(|m| m.selector == selector) {
                continue;
            }
            match host.query(&selector) {
                Some(node) => arbitrator.members.push(Member { selector, group, node }),
                None => warn!(%selector, %group, "audio element not found"),
            }
        }

        arbitrator
    }

    /// Pause the rest of the target's group, then play the target from the start.
    pub fn request_play<H: Host<Node = N>>(&mut self, host: &mut H, selector: &Selector) {
        if !self.play_member(host, selector, PlayCue::new(selector.to_string())) {
            debug!(%selector, "no audio element for cue");
        }
    }

    /// Like [`request_play`](Self::request_play) with a caller-supplied cue.
    /// Returns false, without touching the host, when `selector` is not a
    /// member of any group.
    pub fn play_member<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        selector: &Selector,
        cue: PlayCue,
    ) -> bool {
        let Some(target) = self.members.iter().find(|m| &m.selector == selector) else {
            return false;
        };

        for other in &self.members {
            if other.group == target.group && other.node != target.node {
                host.pause(&other.node);
            }
        }

        host.rewind(&target.node);
        host.play(&target.node, cue);
        debug!(%selector, group = %target.group, "audio cue");
        self.intended.insert(target.group.clone(), selector.clone());
        true
    }

    /// Track the arbitrator last started in `group`.
    pub fn intended(&self, group: &AudioGroupId) -> Option<&Selector> {
        self.intended.get(group)
    }

    pub fn group_of(&self, selector: &Selector) -> Option<&AudioGroupId> {
        self.members
            .iter()
            .find(|m| &m.selector == selector)
            .map(|m| &m.group)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
