//! Who a snapshot is being produced for

use std::fmt;

use crate::game::constants::net::{CLIP_HALF_HEIGHT, CLIP_HALF_WIDTH, VERSION_CURRENT};
use crate::game::entities::CharacterRoster;
use crate::game::player::PlayerTable;
use crate::game::state::{PlayerId, TeamId};
use crate::net::protocol::SnapLayout;
use crate::util::vec2::Vec2;

/// Snapshot recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Client(PlayerId),
    /// Demo recorder: newest protocol, sees the whole map
    Demo,
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Viewer::Client(id) => write!(f, "client {}", id),
            Viewer::Demo => write!(f, "demo"),
        }
    }
}

/// Per-viewer facts resolved once per snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerInfo {
    pub layout: SnapLayout,
    pub view_pos: Vec2,
    /// Team of the character this viewer follows, if there is one
    pub team: Option<TeamId>,
    /// Whether view-bounds clipping applies
    pub clips: bool,
}

impl ViewerInfo {
    pub fn demo() -> Self {
        Self {
            layout: SnapLayout::for_version(VERSION_CURRENT),
            view_pos: Vec2::ZERO,
            team: None,
            clips: false,
        }
    }

    /// `None` for a client slot with no connected player
    pub fn resolve(viewer: Viewer, players: &PlayerTable, characters: &CharacterRoster) -> Option<Self> {
        let player = match viewer {
            Viewer::Demo => return Some(Self::demo()),
            Viewer::Client(id) => players.get(id)?,
        };

        Some(Self {
            layout: SnapLayout::for_version(player.client_version()),
            view_pos: player.view_pos,
            team: characters.get(player.watched()).map(|c| c.team()),
            clips: true,
        })
    }

    /// Outside the rectangular view area
    pub fn is_clipped(&self, position: Vec2) -> bool {
        if !self.clips {
            return false;
        }
        let d = position - self.view_pos;
        d.x.abs() > CLIP_HALF_WIDTH || d.y.abs() > CLIP_HALF_HEIGHT
    }
}
